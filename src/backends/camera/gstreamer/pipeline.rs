// SPDX-License-Identifier: MPL-2.0

//! GStreamer capture pipeline
//!
//! The camera pipeline runs while the session runs and feeds an appsink.
//! Stills are encoded from the latest frame. Recordings run as a second
//! pipeline fed through an appsrc, so the preview keeps flowing while the
//! movie is written.

use super::{GstDeviceDirectory, init, make_element};
use crate::backends::camera::types::*;
use crate::backends::camera::CapturePipeline;
use crate::constants::BitratePreset;
use crate::constants::pipeline::{
    AUDIO_ENCODERS, HIGH_FRAME_SIZE, MAX_BUFFERS, MOVIE_EXTENSION, OUTPUT_FORMAT,
    PHOTO_FRAME_SIZE, RECORDING_FRAMERATE,
};
use crate::constants::timing::EOS_TIMEOUT_SECS;
use crate::pipelines::photo::encode_still;
use ::gstreamer as gst;
use gst::prelude::*;
use gstreamer_app::{AppSink, AppSinkCallbacks, AppSrc};
use gstreamer_video::VideoInfo;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Recorder input shared with the appsink callback
type SharedRecorderSrc = Arc<Mutex<Option<AppSrc>>>;

#[derive(Debug, Clone, Default)]
struct Bindings {
    inputs: Vec<CaptureDevice>,
    outputs: Vec<OutputKind>,
    preset: SessionPreset,
}

impl Bindings {
    fn input_of_kind(&self, kind: MediaKind) -> Option<&CaptureDevice> {
        self.inputs.iter().find(|d| d.media_kind == kind)
    }

    fn frame_size(&self) -> (u32, u32) {
        match self.preset {
            SessionPreset::Photo => PHOTO_FRAME_SIZE,
            SessionPreset::High => HIGH_FRAME_SIZE,
        }
    }
}

/// Running camera pipeline
struct CameraStream {
    pipeline: gst::Pipeline,
    appsink: AppSink,
    capsfilter: gst::Element,
}

/// Recording pipeline and where to report its end
struct ActiveRecording {
    pipeline: gst::Pipeline,
    path: PathBuf,
    sink: CaptureSink,
}

/// Capture pipeline over GStreamer devices
pub struct GstPipeline {
    directory: Arc<GstDeviceDirectory>,
    bitrate: BitratePreset,
    committed: Bindings,
    pending: Option<Bindings>,
    preview: Arc<Mutex<Option<PreviewSender>>>,
    latest_frame: Arc<Mutex<Option<PreviewFrame>>>,
    recorder_src: SharedRecorderSrc,
    camera: Option<CameraStream>,
    recording: Option<ActiveRecording>,
}

impl GstPipeline {
    pub fn new(directory: Arc<GstDeviceDirectory>, bitrate: BitratePreset) -> Self {
        Self {
            directory,
            bitrate,
            committed: Bindings::default(),
            pending: None,
            preview: Arc::new(Mutex::new(None)),
            latest_frame: Arc::new(Mutex::new(None)),
            recorder_src: Arc::new(Mutex::new(None)),
            camera: None,
            recording: None,
        }
    }

    fn staged(&self) -> &Bindings {
        self.pending.as_ref().unwrap_or(&self.committed)
    }

    fn staged_mut(&mut self) -> &mut Bindings {
        match self.pending {
            Some(ref mut pending) => pending,
            None => &mut self.committed,
        }
    }

    /// Resize the running preview to the committed preset
    fn apply_frame_size(&self) {
        if let Some(camera) = &self.camera {
            let (width, height) = self.committed.frame_size();
            camera
                .capsfilter
                .set_property("caps", &raw_caps(width, height));
            debug!(width, height, "Camera output resized");
        }
    }

    fn build_camera_stream(&self) -> BackendResult<CameraStream> {
        let device = self
            .committed
            .input_of_kind(MediaKind::Video)
            .ok_or_else(|| BackendError::DeviceNotFound("no video input attached".to_string()))?;
        info!(device = %device.name, "Creating camera pipeline");

        let source = self.directory.create_element(device)?;
        let convert = make_element("videoconvert")?;
        let scale = make_element("videoscale")?;
        let (width, height) = self.committed.frame_size();
        let capsfilter = gst::ElementFactory::make("capsfilter")
            .property("caps", &raw_caps(width, height))
            .build()
            .map_err(|e| BackendError::NotAvailable(format!("capsfilter: {}", e)))?;
        let appsink = AppSink::builder()
            .name("sink")
            .max_buffers(MAX_BUFFERS)
            .drop(true)
            .sync(false)
            .build();

        let pipeline = gst::Pipeline::new();
        pipeline
            .add_many([&source, &convert, &scale, &capsfilter, appsink.upcast_ref()])
            .map_err(|e| BackendError::Other(format!("Failed to add elements: {}", e)))?;
        gst::Element::link_many([&source, &convert, &scale, &capsfilter, appsink.upcast_ref()])
            .map_err(|e| BackendError::AttachFailed(format!("Failed to link camera: {}", e)))?;

        let latest_frame = Arc::clone(&self.latest_frame);
        let preview = Arc::clone(&self.preview);
        let recorder_src = Arc::clone(&self.recorder_src);
        appsink.set_callbacks(
            AppSinkCallbacks::builder()
                .new_sample(move |appsink| {
                    let sample = appsink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let frame = frame_from_sample(&sample).ok_or(gst::FlowError::Error)?;

                    *latest_frame.lock().unwrap() = Some(frame.clone());

                    {
                        let mut guard = preview.lock().unwrap();
                        if let Some(sender) = guard.as_mut()
                            && let Err(e) = sender.try_send(frame.clone())
                            && e.is_disconnected()
                        {
                            debug!("Preview receiver dropped");
                            *guard = None;
                        }
                    }

                    if let Some(src) = recorder_src.lock().unwrap().as_ref() {
                        let buffer = gst::Buffer::from_slice(frame.data.to_vec());
                        if let Err(e) = src.push_buffer(buffer) {
                            debug!(error = ?e, "Recorder refused frame");
                        }
                    }

                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        Ok(CameraStream {
            pipeline,
            appsink,
            capsfilter,
        })
    }

    fn build_recording(&self, path: &Path) -> BackendResult<(gst::Pipeline, AppSrc)> {
        let (width, height) = self.committed.frame_size();
        let caps = gst::Caps::builder("video/x-raw")
            .field("format", OUTPUT_FORMAT)
            .field("width", width as i32)
            .field("height", height as i32)
            .field("framerate", gst::Fraction::new(RECORDING_FRAMERATE, 1))
            .build();
        let appsrc = AppSrc::builder()
            .name("src")
            .caps(&caps)
            .format(gst::Format::Time)
            .is_live(true)
            .do_timestamp(true)
            .build();

        let convert = make_element("videoconvert")?;
        let encoder = make_element("x264enc")?;
        let bitrate = self.bitrate.bitrate_kbps(width);
        encoder.set_property_from_str("tune", "zerolatency");
        encoder.set_property("bitrate", bitrate);
        let parser = make_element("h264parse")?;
        let muxer = make_element("mp4mux")?;
        let filesink = gst::ElementFactory::make("filesink")
            .property("location", path.display().to_string())
            .build()
            .map_err(|e| BackendError::NotAvailable(format!("filesink: {}", e)))?;

        let pipeline = gst::Pipeline::new();
        pipeline
            .add_many([appsrc.upcast_ref(), &convert, &encoder, &parser, &muxer, &filesink])
            .map_err(|e| BackendError::Other(format!("Failed to add elements: {}", e)))?;
        gst::Element::link_many([appsrc.upcast_ref(), &convert, &encoder, &parser, &muxer])
            .map_err(|e| BackendError::Other(format!("Failed to link video: {}", e)))?;
        muxer
            .link(&filesink)
            .map_err(|e| BackendError::Other(format!("Failed to link filesink: {}", e)))?;

        if let Some(mic) = self.committed.input_of_kind(MediaKind::Audio) {
            match self.add_audio_branch(&pipeline, mic, &muxer) {
                Ok(encoder) => info!(device = %mic.name, encoder, "Recording with audio"),
                Err(e) => warn!(error = %e, "Recording without audio"),
            }
        }

        info!(
            path = %path.display(),
            width,
            height,
            bitrate_kbps = bitrate,
            "Recording pipeline created"
        );
        Ok((pipeline, appsrc))
    }

    /// Returns the name of the audio encoder in use
    fn add_audio_branch(
        &self,
        pipeline: &gst::Pipeline,
        mic: &CaptureDevice,
        muxer: &gst::Element,
    ) -> BackendResult<&'static str> {
        let (encoder_name, encoder) = AUDIO_ENCODERS
            .iter()
            .find_map(|name| make_element(name).ok().map(|e| (*name, e)))
            .ok_or_else(|| BackendError::NotAvailable("no AAC encoder".to_string()))?;

        let source = self.directory.create_element(mic)?;
        let queue = make_element("queue")?;
        let convert = make_element("audioconvert")?;
        let resample = make_element("audioresample")?;

        let elements = [&source, &queue, &convert, &resample, &encoder];
        pipeline
            .add_many(elements)
            .map_err(|e| BackendError::Other(format!("Failed to add audio: {}", e)))?;
        let linked = gst::Element::link_many(elements).and_then(|_| encoder.link(muxer));
        if let Err(e) = linked {
            let _ = pipeline.remove_many(elements);
            return Err(BackendError::AttachFailed(format!("audio branch: {}", e)));
        }
        Ok(encoder_name)
    }

    fn refuse_recording(&self) -> Option<BackendError> {
        if !self.is_running() {
            Some(BackendError::NotRunning)
        } else if !self.committed.outputs.contains(&OutputKind::Movie) {
            Some(BackendError::OutputNotBound(OutputKind::Movie))
        } else if self.recording.is_some() {
            Some(BackendError::RecordingInProgress)
        } else {
            None
        }
    }
}

impl CapturePipeline for GstPipeline {
    fn begin_configuration(&mut self) {
        if self.pending.is_none() {
            self.pending = Some(self.committed.clone());
        }
    }

    fn commit_configuration(&mut self) -> BackendResult<()> {
        if let Some(pending) = self.pending.take() {
            let camera_changed = pending.input_of_kind(MediaKind::Video).map(|d| &d.id)
                != self.committed.input_of_kind(MediaKind::Video).map(|d| &d.id);
            self.committed = pending;
            debug!(
                inputs = self.committed.inputs.len(),
                outputs = ?self.committed.outputs,
                preset = ?self.committed.preset,
                "GStreamer session configuration committed"
            );

            if camera_changed && self.camera.is_some() {
                self.stop_running();
                self.start_running()?;
            } else {
                self.apply_frame_size();
            }
        }
        Ok(())
    }

    fn can_add_input(&self, device: &CaptureDevice) -> bool {
        self.directory.contains(device) && self.staged().input_of_kind(device.media_kind).is_none()
    }

    fn add_input(&mut self, device: &CaptureDevice) -> BackendResult<()> {
        if !self.can_add_input(device) {
            return Err(BackendError::AttachFailed(format!(
                "cannot attach {} ({})",
                device.name, device.id
            )));
        }
        self.staged_mut().inputs.push(device.clone());
        Ok(())
    }

    fn remove_input(&mut self, device: &CaptureDevice) {
        self.staged_mut().inputs.retain(|d| d.id != device.id);
    }

    fn can_add_output(&self, output: OutputKind) -> bool {
        !self.staged().outputs.contains(&output)
    }

    fn add_output(&mut self, output: OutputKind) -> BackendResult<()> {
        if !self.can_add_output(output) {
            return Err(BackendError::AttachFailed(format!(
                "{} output already attached",
                output
            )));
        }
        self.staged_mut().outputs.push(output);
        Ok(())
    }

    fn remove_output(&mut self, output: OutputKind) {
        self.staged_mut().outputs.retain(|o| *o != output);
    }

    fn set_preset(&mut self, preset: SessionPreset) {
        self.staged_mut().preset = preset;
        if self.pending.is_none() {
            self.apply_frame_size();
        }
    }

    fn attach_preview(&mut self, sink: PreviewSender) {
        *self.preview.lock().unwrap() = Some(sink);
    }

    fn start_running(&mut self) -> BackendResult<()> {
        if self.camera.is_some() {
            return Ok(());
        }
        init()?;

        let camera = self.build_camera_stream()?;
        if let Err(e) = camera.pipeline.set_state(gst::State::Playing) {
            let _ = camera.pipeline.set_state(gst::State::Null);
            return Err(BackendError::Other(format!("Failed to start pipeline: {}", e)));
        }

        self.camera = Some(camera);
        info!("GStreamer camera running");
        Ok(())
    }

    fn stop_running(&mut self) {
        self.stop_recording();
        if let Some(camera) = self.camera.take() {
            camera.appsink.set_callbacks(AppSinkCallbacks::builder().build());
            if let Err(e) = camera.pipeline.set_state(gst::State::Null) {
                warn!(error = %e, "Failed to stop camera pipeline");
            }
            info!("GStreamer camera stopped");
        }
        *self.latest_frame.lock().unwrap() = None;
    }

    fn is_running(&self) -> bool {
        self.camera.is_some()
    }

    fn capture_photo(&mut self, settings: PhotoSettings, sink: CaptureSink) {
        let frame = self.latest_frame.lock().unwrap().clone();
        let frame = if !self.is_running() {
            Err(BackendError::NotRunning)
        } else if !self.committed.outputs.contains(&OutputKind::Photo) {
            Err(BackendError::OutputNotBound(OutputKind::Photo))
        } else {
            frame.ok_or_else(|| BackendError::Other("no frame received yet".to_string()))
        };

        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "Photo capture refused");
                let _ = sink.send(CaptureEvent::PhotoProcessed(Err(err.clone())));
                let _ = sink.send(CaptureEvent::PhotoCaptureFinished(Err(err)));
                return;
            }
        };

        let spawned = std::thread::Builder::new()
            .name("gst-photo".to_string())
            .spawn({
                let sink = sink.clone();
                move || {
                    let result = encode_still(&frame, &settings);
                    let finished = result.as_ref().map(|_| ()).map_err(Clone::clone);
                    let _ = sink.send(CaptureEvent::PhotoProcessed(result));
                    let _ = sink.send(CaptureEvent::PhotoCaptureFinished(finished));
                }
            });

        if let Err(e) = spawned {
            let err = BackendError::Other(format!("failed to spawn encoder: {}", e));
            let _ = sink.send(CaptureEvent::PhotoProcessed(Err(err.clone())));
            let _ = sink.send(CaptureEvent::PhotoCaptureFinished(Err(err)));
        }
    }

    fn start_recording(&mut self, path: &Path, sink: CaptureSink) {
        let path = path.to_path_buf();
        if let Some(err) = self.refuse_recording() {
            warn!(error = %err, path = %path.display(), "Recording refused");
            let _ = sink.send(CaptureEvent::RecordingFinished {
                path,
                result: Err(err),
            });
            return;
        }

        let started = self.build_recording(&path).and_then(|(pipeline, appsrc)| {
            match pipeline.set_state(gst::State::Playing) {
                Ok(_) => Ok((pipeline, appsrc)),
                Err(e) => {
                    let _ = pipeline.set_state(gst::State::Null);
                    Err(BackendError::Other(format!("Failed to start recording: {}", e)))
                }
            }
        });

        match started {
            Ok((pipeline, appsrc)) => {
                *self.recorder_src.lock().unwrap() = Some(appsrc);
                self.recording = Some(ActiveRecording {
                    pipeline,
                    path,
                    sink,
                });
                info!("Recording started");
            }
            Err(err) => {
                error!(error = %err, "Recording failed to start");
                let _ = sink.send(CaptureEvent::RecordingFinished {
                    path,
                    result: Err(err),
                });
            }
        }
    }

    fn stop_recording(&mut self) {
        let Some(recording) = self.recording.take() else {
            return;
        };
        // No more frames once EOS is on its way
        *self.recorder_src.lock().unwrap() = None;

        info!("Sending EOS to recorder");
        if !recording.pipeline.send_event(gst::event::Eos::new()) {
            warn!("Failed to send EOS event to recorder");
        }

        let spawned = std::thread::Builder::new()
            .name("gst-recorder".to_string())
            .spawn(move || finalize_recording(recording));
        if let Err(e) = spawned {
            error!(error = %e, "Failed to spawn recorder finalizer");
        }
    }

    fn movie_extension(&self) -> &'static str {
        MOVIE_EXTENSION
    }
}

impl Drop for GstPipeline {
    fn drop(&mut self) {
        self.stop_running();
    }
}

/// Wait for the recorder to drain, then report the finished movie
fn finalize_recording(recording: ActiveRecording) {
    let ActiveRecording {
        pipeline,
        path,
        sink,
    } = recording;

    let result = match pipeline.bus() {
        Some(bus) => match bus.timed_pop_filtered(
            gst::ClockTime::from_seconds(EOS_TIMEOUT_SECS),
            &[gst::MessageType::Eos, gst::MessageType::Error],
        ) {
            Some(msg) => match msg.view() {
                gst::MessageView::Error(err) => {
                    error!(
                        error = %err.error(),
                        debug = ?err.debug(),
                        source = ?err.src().map(|s| s.name()),
                        "Recorder error"
                    );
                    Err(BackendError::EncodingFailed(err.error().to_string()))
                }
                _ => Ok(()),
            },
            None => {
                warn!(timeout_secs = EOS_TIMEOUT_SECS, "Recorder did not drain in time");
                Ok(())
            }
        },
        None => Err(BackendError::Other("recorder has no bus".to_string())),
    };

    if let Err(e) = pipeline.set_state(gst::State::Null) {
        warn!(error = %e, "Failed to stop recorder");
    }
    debug!(path = %path.display(), ok = result.is_ok(), "Recorder finalized");
    let _ = sink.send(CaptureEvent::RecordingFinished { path, result });
}

fn raw_caps(width: u32, height: u32) -> gst::Caps {
    gst::Caps::builder("video/x-raw")
        .field("format", OUTPUT_FORMAT)
        .field("width", width as i32)
        .field("height", height as i32)
        .build()
}

/// Copy a sample into a tightly packed RGBA frame
fn frame_from_sample(sample: &gst::Sample) -> Option<PreviewFrame> {
    let captured_at = Instant::now();
    let buffer = sample.buffer()?;
    let info = VideoInfo::from_caps(sample.caps()?).ok()?;
    let map = buffer.map_readable().ok()?;

    let width = info.width();
    let height = info.height();
    let stride = info.stride()[0] as usize;
    let row = width as usize * 4;
    let data = map.as_slice();

    let packed: Arc<[u8]> = if stride == row {
        Arc::from(data.get(..row * height as usize)?)
    } else {
        let mut packed = Vec::with_capacity(row * height as usize);
        for y in 0..height as usize {
            packed.extend_from_slice(data.get(y * stride..y * stride + row)?);
        }
        Arc::from(packed.into_boxed_slice())
    };

    Some(PreviewFrame {
        width,
        height,
        data: packed,
        captured_at,
    })
}
