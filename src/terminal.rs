// SPDX-License-Identifier: GPL-3.0-only

//! Terminal-based viewfinder
//!
//! Renders the preview feed to the terminal using Unicode half-block
//! characters and drives the capture controller from the keyboard.
//!
//! Keys: space/enter shutter, `m` switch mode, `y`/`n` answer access
//! prompts, `d` dismiss a notice, `q`/Ctrl+C quit.

use crate::app::{
    CaptureController, CaptureState, Collaborators, ControllerHandle, ControllerSettings,
    Controls, SetupNotice, ShootingMode, UiUpdate,
};
use crate::backends::camera::{PreviewFrame, PreviewReceiver};
use crate::backends::permissions::{
    AccessPrompter, AccessRequest, AutoGrant, ChannelPrompter, GrantStore,
};
use crate::config::Config;
use crate::constants::timing::{SAVE_TIMEOUT_SECS, UI_POLL_MS};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use std::collections::VecDeque;
use std::io::{self, stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

/// Preview frames buffered between the pipeline and the terminal
const PREVIEW_BUFFER: usize = 4;

/// Run the terminal viewfinder
pub fn run(config: Config, auto_grant: bool) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Runtime::new()?;

    let (prompter, access_requests): (Arc<dyn AccessPrompter>, _) = if auto_grant {
        (Arc::new(AutoGrant), None)
    } else {
        let (prompter, requests) = ChannelPrompter::new();
        (Arc::new(prompter), Some(requests))
    };
    let permissions = Arc::new(GrantStore::open_default(prompter));

    let (preview_tx, preview_rx) = futures::channel::mpsc::channel(PREVIEW_BUFFER);
    let collaborators = Collaborators::from_config(&config, permissions, Some(preview_tx))?;
    let (ui_tx, ui_rx) = tokio::sync::mpsc::unbounded_channel();
    let controller =
        CaptureController::new(collaborators, ControllerSettings::from_config(&config), ui_tx)?;
    let handle = controller.handle();
    let task = runtime.spawn(controller.run());

    let mut channels = Channels {
        preview: preview_rx,
        updates: ui_rx,
        access_requests,
    };

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &handle, &mut channels);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Let an active recording reach the library before exiting
    handle.shutdown();
    drop(channels);
    let finished = runtime.block_on(async {
        tokio::time::timeout(Duration::from_secs(SAVE_TIMEOUT_SECS), task).await
    });
    if finished.is_err() {
        warn!("Controller did not stop in time");
    }

    result
}

struct Channels {
    preview: PreviewReceiver,
    updates: UnboundedReceiver<UiUpdate>,
    access_requests: Option<UnboundedReceiver<AccessRequest>>,
}

/// What the viewfinder shows about the controller
struct ViewState {
    mode: ShootingMode,
    capture_state: CaptureState,
    controls: Controls,
    recording_since: Option<Instant>,
    notice: Option<SetupNotice>,
    prompts: VecDeque<AccessRequest>,
    message: String,
}

impl ViewState {
    fn new() -> Self {
        Self {
            mode: ShootingMode::default(),
            capture_state: CaptureState::default(),
            controls: Controls::default(),
            recording_since: None,
            notice: None,
            prompts: VecDeque::new(),
            message: "Starting camera...".to_string(),
        }
    }

    fn apply(&mut self, update: UiUpdate) {
        match update {
            UiUpdate::Controls(controls) => self.controls = controls,
            UiUpdate::Mode(mode) => self.mode = mode,
            UiUpdate::CaptureState(state) => {
                self.capture_state = state;
                self.recording_since = state.is_capturing().then(Instant::now);
                if state.is_capturing() {
                    self.message = "Recording".to_string();
                } else {
                    self.message = "Saving video...".to_string();
                }
            }
            UiUpdate::SetupResolved(result) => {
                info!(%result, "Setup resolved");
                self.message = help_message();
            }
            UiUpdate::Notice(notice) => self.notice = Some(notice),
            UiUpdate::PhotoSaved(Ok(asset)) | UiUpdate::VideoSaved(Ok(asset)) => {
                self.message = format!("Saved: {}", asset.path.display());
            }
            UiUpdate::PhotoSaved(Err(e)) | UiUpdate::VideoSaved(Err(e)) => {
                self.message = format!("Error: {}", e);
            }
            UiUpdate::PhotoSaveSkipped => {
                self.message = "Photo library access denied, photo not saved".to_string();
            }
            UiUpdate::CaptureFailed(e) if e.is_terminal() => {
                self.message = format!("Error: {}", e);
            }
            UiUpdate::CaptureFailed(e) => {
                self.message = format!("Error: {} (press space to retry)", e);
            }
        }
    }
}

fn help_message() -> String {
    "SPACE: shutter | m: photo/video | q: quit".to_string()
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    handle: &ControllerHandle,
    channels: &mut Channels,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut frame_widget = FrameWidget::new();
    let mut view = ViewState::new();

    loop {
        // Drain all available frames to get latest
        while let Ok(frame) = channels.preview.try_recv() {
            frame_widget.update_frame(frame);
        }
        while let Ok(update) = channels.updates.try_recv() {
            view.apply(update);
        }
        if let Some(requests) = channels.access_requests.as_mut() {
            while let Ok(request) = requests.try_recv() {
                view.prompts.push_back(request);
            }
        }

        // Draw
        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(&frame_widget, camera_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(StatusBar { view: &view }, status_area);

            if let Some(request) = view.prompts.front() {
                let text = format!(
                    "Allow snapcam to access the {}?\n\n[y] Allow   [n] Don't Allow",
                    request.scope
                );
                render_dialog(f, camera_area, "Permission", &text);
            } else if let Some(notice) = view.notice {
                let text = format!("{}\n\n[d] Dismiss", notice.message());
                render_dialog(f, camera_area, notice.title(), &text);
            }
        })?;

        // Handle input with timeout for frame updates
        if event::poll(Duration::from_millis(UI_POLL_MS))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            // Ctrl+C to quit
            if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                break;
            }

            if !view.prompts.is_empty() {
                let answer = match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => Some(true),
                    KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Some(false),
                    _ => None,
                };
                if let Some(answer) = answer
                    && let Some(request) = view.prompts.pop_front()
                {
                    let _ = request.reply.send(answer);
                }
                continue;
            }

            match key.code {
                KeyCode::Char(' ') | KeyCode::Enter => {
                    if view.controls.shutter_enabled {
                        handle.shutter();
                    }
                }
                KeyCode::Char('m') => {
                    if view.controls.mode_switch_enabled && !view.capture_state.is_capturing() {
                        handle.select_mode(view.mode.toggled());
                    }
                }
                KeyCode::Char('d') => view.notice = None,
                KeyCode::Char('q') => break,
                _ => {}
            }
        }
    }

    Ok(())
}

fn render_dialog(f: &mut ratatui::Frame, area: Rect, title: &str, text: &str) {
    let width = area.width.min(50);
    let height = area.height.min(7);
    let dialog = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };
    f.render_widget(Clear, dialog);
    f.render_widget(
        Paragraph::new(text.to_string())
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(title.to_string())),
        dialog,
    );
}

struct FrameWidget {
    frame: Option<PreviewFrame>,
}

impl FrameWidget {
    fn new() -> Self {
        Self { frame: None }
    }

    fn update_frame(&mut self, frame: PreviewFrame) {
        self.frame = Some(frame);
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.as_ref().filter(|f| f.width > 0 && f.height > 0) else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        // Calculate display dimensions maintaining aspect ratio
        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        // Upper half (▀) colored with fg, lower half with bg
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let (r, g, b) = frame.rgb_at(src_x, src_y_top);
                let top_color = Color::Rgb(r, g, b);
                let (r, g, b) = frame.rgb_at(src_x, src_y_bottom);
                let bottom_color = Color::Rgb(r, g, b);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

/// Status bar widget
///
/// Shows mode, recording timer, control states (dimmed when disabled) and
/// the latest message.
struct StatusBar<'a> {
    view: &'a ViewState,
}

impl StatusBar<'_> {
    fn segments(&self) -> Vec<(String, Style)> {
        let base = Style::default().fg(Color::White).bg(Color::DarkGray);
        let dimmed = base.fg(Color::Gray).add_modifier(Modifier::DIM);
        let view = self.view;

        let mut segments = vec![(
            format!(" {} ", view.mode.to_string().to_uppercase()),
            base.add_modifier(Modifier::BOLD),
        )];

        if let Some(since) = view.recording_since {
            let secs = since.elapsed().as_secs();
            segments.push((
                format!(" ● {:02}:{:02} ", secs / 60, secs % 60),
                base.fg(Color::Red),
            ));
        }

        let shutter_label = match (view.mode, view.capture_state) {
            (ShootingMode::Photo, _) => " [SPACE] Shoot ",
            (ShootingMode::Video, CaptureState::Idle) => " [SPACE] Record ",
            (ShootingMode::Video, CaptureState::Capturing) => " [SPACE] Stop ",
        };
        segments.push((
            shutter_label.to_string(),
            if view.controls.shutter_enabled { base } else { dimmed },
        ));
        segments.push((
            " [m] Mode ".to_string(),
            if view.controls.mode_switch_enabled { base } else { dimmed },
        ));
        segments.push((format!(" {}", view.message), base));
        segments
    }
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let mut x = area.x;
        let right = area.x + area.width;
        for (text, style) in self.segments() {
            if x >= right {
                break;
            }
            let (next_x, _) = buf.set_stringn(x, area.y, &text, (right - x) as usize, style);
            x = next_x;
        }
    }
}
