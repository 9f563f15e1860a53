// SPDX-License-Identifier: MPL-2.0

//! Audible recording cues

use std::io::Write;
use std::sync::Arc;
use tracing::debug;

/// System sounds played around a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    RecordingStarted,
    RecordingStopped,
}

/// Plays cues without blocking the caller
pub trait CuePlayer: Send + Sync {
    fn play(&self, cue: Cue);
}

/// Terminal bell: one ring to start, two to stop
pub struct TerminalBell;

impl CuePlayer for TerminalBell {
    fn play(&self, cue: Cue) {
        let bells = match cue {
            Cue::RecordingStarted => "\x07",
            Cue::RecordingStopped => "\x07\x07",
        };
        let mut stderr = std::io::stderr();
        if let Err(e) = stderr
            .write_all(bells.as_bytes())
            .and_then(|_| stderr.flush())
        {
            debug!(error = %e, ?cue, "Failed to ring terminal bell");
        }
    }
}

/// No sound
pub struct SilentCues;

impl CuePlayer for SilentCues {
    fn play(&self, cue: Cue) {
        debug!(?cue, "Recording cue muted");
    }
}

/// Cue player for the `recording_cues` setting
pub fn cue_player(enabled: bool) -> Arc<dyn CuePlayer> {
    if enabled {
        Arc::new(TerminalBell)
    } else {
        Arc::new(SilentCues)
    }
}
