//! cpal-based live capture (microphone and system loopback)
//!
//! Uses the cpal crate for cross-platform audio input. cpal::Stream is not
//! Send, so the stream lives on a dedicated thread and talks to the async
//! side via channels.
//!
//! Loopback capture rides the same code path with a different device
//! resolution strategy: WASAPI exposes render endpoints as loopback inputs,
//! and PulseAudio/PipeWire expose "monitor" sources. When no such input
//! exists, opening the source fails with `LoopbackUnsupported`.

use super::{mix_to_mono, resample, AudioSource, Capture};
use crate::error::AudioError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::{mpsc, oneshot};

/// How to pick the input device
#[derive(Debug, Clone)]
enum DeviceStrategy {
    /// Named microphone, or "default" for the system default input
    Input(String),
    /// Loopback-capable source; "auto" scans for monitor/loopback inputs
    Loopback(String),
}

/// Commands sent to the capture thread
enum CaptureCommand {
    Stop(oneshot::Sender<Capture>),
}

/// Parameters for building an audio input stream
struct StreamBuildParams {
    samples: Arc<Mutex<Vec<f32>>>,
    tx: mpsc::Sender<Vec<f32>>,
    source_rate: u32,
    target_rate: u32,
    source_channels: usize,
}

/// Live capture over a cpal input stream
pub struct CpalSource {
    strategy: DeviceStrategy,
    target_rate: u32,
    cmd_tx: Option<std::sync::mpsc::Sender<CaptureCommand>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl CpalSource {
    pub fn microphone(device: &str, sample_rate: u32) -> Self {
        Self {
            strategy: DeviceStrategy::Input(device.to_string()),
            target_rate: sample_rate,
            cmd_tx: None,
            thread_handle: None,
        }
    }

    pub fn loopback(preferred: &str, sample_rate: u32) -> Self {
        Self {
            strategy: DeviceStrategy::Loopback(preferred.to_string()),
            target_rate: sample_rate,
            cmd_tx: None,
            thread_handle: None,
        }
    }

    fn resolve_device(&self, host: &cpal::Host) -> Result<cpal::Device, AudioError> {
        use cpal::traits::HostTrait;

        match &self.strategy {
            DeviceStrategy::Input(name) => {
                if name == "default" {
                    host.default_input_device()
                        .ok_or_else(|| AudioError::DeviceNotFound("default".to_string()))
                } else {
                    find_input_device(host, name)
                }
            }
            DeviceStrategy::Loopback(preferred) => find_loopback_device(host, preferred),
        }
    }
}

/// List all input device names, for `talktype devices` and error messages
pub fn list_input_devices() -> Result<Vec<String>, AudioError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| AudioError::Connection(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// Find an audio input device by name with flexible matching.
///
/// Matching strategy (in order): exact, case-insensitive exact,
/// case-insensitive substring. Users can give either a full device name or
/// a memorable fragment of it.
fn find_input_device(host: &cpal::Host, device_name: &str) -> Result<cpal::Device, AudioError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    let mut devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| AudioError::Connection(e.to_string()))?
        .collect();

    let search_lower = device_name.to_lowercase();

    let matched = devices
        .iter()
        .position(|d| d.name().map(|n| n == device_name).unwrap_or(false))
        .or_else(|| {
            devices
                .iter()
                .position(|d| d.name().map(|n| n.to_lowercase() == search_lower).unwrap_or(false))
        })
        .or_else(|| {
            devices.iter().position(|d| {
                d.name()
                    .map(|n| n.to_lowercase().contains(&search_lower))
                    .unwrap_or(false)
            })
        });

    match matched {
        Some(idx) => {
            let device = devices.swap_remove(idx);
            tracing::debug!(
                "Resolved audio device '{}' -> {:?}",
                device_name,
                device.name().ok()
            );
            Ok(device)
        }
        None => Err(AudioError::DeviceNotFound(device_name.to_string())),
    }
}

/// Device name fragments that indicate a loopback-capable input
const LOOPBACK_HINTS: &[&str] = &["loopback", "monitor", "stereo mix", "what u hear"];

/// Find a loopback-capable capture source.
///
/// A configured name (anything but "auto") is matched like a microphone
/// name. In auto mode the input list is scanned for well-known monitor
/// device names.
fn find_loopback_device(host: &cpal::Host, preferred: &str) -> Result<cpal::Device, AudioError> {
    use cpal::traits::{DeviceTrait, HostTrait};

    if !preferred.is_empty() && preferred != "auto" {
        return find_input_device(host, preferred).map_err(|_| {
            AudioError::LoopbackUnsupported(format!(
                "Configured capture source '{}' not found.",
                preferred
            ))
        });
    }

    let devices = host
        .input_devices()
        .map_err(|e| AudioError::Connection(e.to_string()))?;

    for device in devices {
        if let Ok(name) = device.name() {
            let lower = name.to_lowercase();
            if LOOPBACK_HINTS.iter().any(|hint| lower.contains(hint)) {
                tracing::debug!("Found loopback source: {}", name);
                return Ok(device);
            }
        }
    }

    Err(AudioError::LoopbackUnsupported(
        "No monitor/loopback input found. Set output_capture_source to a \
         loopback-capable device name."
            .to_string(),
    ))
}

#[async_trait::async_trait]
impl AudioSource for CpalSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>, AudioError> {
        use cpal::traits::{DeviceTrait, StreamTrait};

        let host = cpal::default_host();
        let device = self.resolve_device(&host)?;

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!("Using audio device: {}", device_name);

        let supported_config = device
            .default_input_config()
            .map_err(|e| AudioError::Connection(e.to_string()))?;

        let source_sample_rate = supported_config.sample_rate().0;
        let source_channels = supported_config.channels() as usize;
        let target_sample_rate = self.target_rate;
        let sample_format = supported_config.sample_format();

        tracing::debug!(
            "Device config: {} Hz, {} channel(s), format: {:?}",
            source_sample_rate,
            source_channels,
            sample_format
        );

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<CaptureCommand>();

        let samples = Arc::new(Mutex::new(Vec::<f32>::new()));
        let samples_clone = samples.clone();

        let thread_handle = thread::spawn(move || {
            let stream_config = cpal::StreamConfig {
                channels: supported_config.channels(),
                sample_rate: supported_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            };

            // Set by the stream error callback; reported as `truncated`
            let stream_failed = Arc::new(AtomicBool::new(false));
            let failed = stream_failed.clone();
            let err_fn = move |err| {
                tracing::error!("Audio stream error: {}", err);
                failed.store(true, Ordering::SeqCst);
            };

            let make_params = || StreamBuildParams {
                samples: samples_clone.clone(),
                tx: chunk_tx.clone(),
                source_rate: source_sample_rate,
                target_rate: target_sample_rate,
                source_channels,
            };

            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => {
                    build_stream::<f32>(&device, &stream_config, make_params(), err_fn)
                }
                cpal::SampleFormat::I16 => {
                    build_stream::<i16>(&device, &stream_config, make_params(), err_fn)
                }
                cpal::SampleFormat::U16 => {
                    build_stream::<u16>(&device, &stream_config, make_params(), err_fn)
                }
                format => {
                    tracing::error!("Unsupported sample format: {:?}", format);
                    stream_failed.store(true, Ordering::SeqCst);
                    return;
                }
            };

            let stream = match stream_result {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!("Failed to build audio stream: {}", e);
                    stream_failed.store(true, Ordering::SeqCst);
                    return;
                }
            };

            if let Err(e) = stream.play() {
                tracing::error!("Failed to start audio stream: {}", e);
                stream_failed.store(true, Ordering::SeqCst);
                return;
            }

            tracing::debug!("Audio capture thread started");

            if let Ok(CaptureCommand::Stop(response_tx)) = cmd_rx.recv() {
                drop(stream);

                let collected = samples_clone
                    .lock()
                    .map(|guard| guard.clone())
                    .unwrap_or_default();

                let _ = response_tx.send(Capture {
                    samples: collected,
                    truncated: stream_failed.load(Ordering::SeqCst),
                });
            }

            tracing::debug!("Audio capture thread stopped");
        });

        self.cmd_tx = Some(cmd_tx);
        self.thread_handle = Some(thread_handle);

        Ok(chunk_rx)
    }

    async fn stop(&mut self) -> Result<Capture, AudioError> {
        let capture = if let Some(cmd_tx) = self.cmd_tx.take() {
            let (response_tx, response_rx) = oneshot::channel();

            if cmd_tx.send(CaptureCommand::Stop(response_tx)).is_ok() {
                match tokio::time::timeout(std::time::Duration::from_secs(2), response_rx).await {
                    Ok(Ok(capture)) => capture,
                    Ok(Err(_)) => {
                        // The capture thread died before answering; whatever
                        // audio it held is gone.
                        Capture {
                            samples: Vec::new(),
                            truncated: true,
                        }
                    }
                    Err(_) => return Err(AudioError::Timeout(2)),
                }
            } else {
                Capture {
                    samples: Vec::new(),
                    truncated: true,
                }
            }
        } else {
            Capture {
                samples: Vec::new(),
                truncated: false,
            }
        };

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }

        let duration_secs = capture.samples.len() as f32 / self.target_rate as f32;
        tracing::debug!(
            "Audio capture stopped: {} samples ({:.2}s), truncated={}",
            capture.samples.len(),
            duration_secs,
            capture.truncated
        );

        Ok(capture)
    }
}

/// Build an input stream for a specific sample type
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    params: StreamBuildParams,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    use cpal::traits::DeviceTrait;

    let StreamBuildParams {
        samples,
        tx,
        source_rate,
        target_rate,
        source_channels,
    } = params;

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let f32_data: Vec<f32> = data
                    .iter()
                    .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                    .collect();
                let mono = mix_to_mono(&f32_data, source_channels);

                let resampled = if source_rate != target_rate {
                    resample(&mono, source_rate, target_rate)
                } else {
                    mono
                };

                if let Ok(mut guard) = samples.lock() {
                    guard.extend_from_slice(&resampled);
                }

                // Streaming copy for the level meter; receiver may be gone
                let _ = tx.try_send(resampled);
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::StreamError(e.to_string()))?;

    Ok(stream)
}
