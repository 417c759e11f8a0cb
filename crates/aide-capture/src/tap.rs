//! Microphone ownership.
//!
//! Exactly one tap may be installed at a time; the capture session removes
//! it on every exit path (finalize, cancel, error).

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use aide_foundation::CaptureError;

/// A claim on the audio input device. `install` begins delivering 16-bit
/// mono frames on the given channel; `remove` releases the device.
pub trait AudioTap: Send {
    fn install(&mut self, frames: mpsc::Sender<Vec<i16>>) -> Result<(), CaptureError>;
    fn remove(&mut self);
}

/// Real microphone tap over cpal.
///
/// `cpal::Stream` is not `Send`, so the stream lives on a dedicated thread
/// for the lifetime of the tap, mirroring a dedicated audio-capture thread
/// design. Frames are downmixed to mono and dropped (not blocked on) when
/// the consumer falls behind.
pub struct CpalAudioTap {
    device_name: Option<String>,
    running: Option<Arc<AtomicBool>>,
    handle: Option<JoinHandle<()>>,
}

impl CpalAudioTap {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            running: None,
            handle: None,
        }
    }
}

impl AudioTap for CpalAudioTap {
    fn install(&mut self, frames: mpsc::Sender<Vec<i16>>) -> Result<(), CaptureError> {
        if self.handle.is_some() {
            return Err(CaptureError::AudioSession(
                "audio tap already installed".to_string(),
            ));
        }

        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let device_name = self.device_name.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();

        let handle = thread::Builder::new()
            .name("audio-tap".to_string())
            .spawn(move || {
                let stream = match build_input_stream(device_name.as_deref(), frames) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while thread_running.load(Ordering::Relaxed) {
                    thread::sleep(Duration::from_millis(50));
                }

                drop(stream);
                debug!(target: "capture", "Audio tap thread exiting");
            })
            .map_err(|e| {
                CaptureError::AudioSession(format!("failed to spawn audio thread: {e}"))
            })?;

        match ready_rx.recv_timeout(Duration::from_secs(3)) {
            Ok(Ok(())) => {
                info!(target: "capture", "Audio tap installed on device: {:?}", self.device_name);
                self.running = Some(running);
                self.handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                running.store(false, Ordering::Relaxed);
                let _ = handle.join();
                Err(CaptureError::AudioSession(
                    "timed out waiting for audio stream to start".to_string(),
                ))
            }
        }
    }

    fn remove(&mut self) {
        if let Some(running) = self.running.take() {
            running.store(false, Ordering::Relaxed);
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(target: "capture", "Audio tap thread panicked during removal");
            }
            info!(target: "capture", "Audio tap removed");
        }
    }
}

fn build_input_stream(
    device_name: Option<&str>,
    frames: mpsc::Sender<Vec<i16>>,
) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| CaptureError::AudioSession(format!("cannot enumerate devices: {e}")))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| {
                CaptureError::AudioSession(format!("input device not found: {name}"))
            })?,
        None => host.default_input_device().ok_or_else(|| {
            CaptureError::AudioSession("no default input device".to_string())
        })?,
    };

    let config = device
        .default_input_config()
        .map_err(|e| CaptureError::AudioSession(format!("no supported input config: {e}")))?;
    let channels = config.channels() as usize;
    let sample_format = config.sample_format();
    debug!(
        target: "capture",
        "Opening input stream: {} Hz, {} ch, {:?}",
        config.sample_rate().0,
        channels,
        sample_format
    );

    let err_fn = |e| error!(target: "capture", "Audio stream error: {e}");

    let stream = match sample_format {
        SampleFormat::I16 => {
            let tx = frames.clone();
            device.build_input_stream(
                &config.into(),
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    // drop on overflow rather than block the audio callback
                    let _ = tx.try_send(downmix_i16(data, channels));
                },
                err_fn,
                None,
            )
        }
        SampleFormat::F32 => {
            let tx = frames.clone();
            device.build_input_stream(
                &config.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    let _ = tx.try_send(downmix_f32(data, channels));
                },
                err_fn,
                None,
            )
        }
        other => {
            return Err(CaptureError::AudioSession(format!(
                "unsupported sample format: {other:?}"
            )))
        }
    }
    .map_err(|e| CaptureError::AudioSession(format!("failed to build input stream: {e}")))?;

    stream
        .play()
        .map_err(|e| CaptureError::AudioSession(format!("failed to start input stream: {e}")))?;

    Ok(stream)
}

fn downmix_i16(data: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| (frame.iter().map(|&s| s as i32).sum::<i32>() / channels as i32) as i16)
        .collect()
}

fn downmix_f32(data: &[f32], channels: usize) -> Vec<i16> {
    let ch = channels.max(1);
    data.chunks(ch)
        .map(|frame| {
            let avg = frame.iter().sum::<f32>() / ch as f32;
            (avg.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        })
        .collect()
}

/// Install/remove bookkeeping shared between a [`MockAudioTap`] and the test
/// that owns it.
#[derive(Debug, Default)]
pub struct TapStats {
    pub installs: AtomicUsize,
    pub removes: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
}

impl TapStats {
    fn on_install(&self) {
        self.installs.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
    }

    fn on_remove(&self) {
        self.removes.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Tap for tests and silent demos: optionally fails installation, otherwise
/// feeds silent frames until removed.
pub struct MockAudioTap {
    fail_install: bool,
    frame_interval: Duration,
    stats: Arc<TapStats>,
    running: Option<Arc<AtomicBool>>,
    handle: Option<JoinHandle<()>>,
}

impl MockAudioTap {
    pub fn new(stats: Arc<TapStats>) -> Self {
        Self {
            fail_install: false,
            frame_interval: Duration::from_millis(5),
            stats,
            running: None,
            handle: None,
        }
    }

    pub fn failing(stats: Arc<TapStats>) -> Self {
        Self {
            fail_install: true,
            ..Self::new(stats)
        }
    }
}

impl AudioTap for MockAudioTap {
    fn install(&mut self, frames: mpsc::Sender<Vec<i16>>) -> Result<(), CaptureError> {
        if self.fail_install {
            return Err(CaptureError::AudioSession(
                "simulated device claim failure".to_string(),
            ));
        }

        self.stats.on_install();
        let running = Arc::new(AtomicBool::new(true));
        let thread_running = running.clone();
        let interval = self.frame_interval;
        let handle = thread::Builder::new()
            .name("mock-audio-tap".to_string())
            .spawn(move || {
                while thread_running.load(Ordering::Relaxed) {
                    if frames.try_send(vec![0i16; 512]).is_err() && frames.is_closed() {
                        break;
                    }
                    thread::sleep(interval);
                }
            })
            .map_err(|e| {
                CaptureError::AudioSession(format!("failed to spawn mock audio thread: {e}"))
            })?;

        self.running = Some(running);
        self.handle = Some(handle);
        Ok(())
    }

    fn remove(&mut self) {
        if let Some(running) = self.running.take() {
            running.store(false, Ordering::Relaxed);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
            self.stats.on_remove();
        }
    }
}
