//! Audio input capture.
//!
//! This module handles input device acquisition and PCM capture. Audio is read
//! from the configured input device at its native sample rate, mixed down to
//! mono, buffered until the recorder drains it as an encoded chunk, and mirrored
//! into a short live tap the level visualizer reads from.
//!
//! The device is held by a [`Capture`] value; dropping it releases the device.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SizedSample};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::encoder::encode_chunk;
use super::error::RecorderError;

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// Samples kept in the live tap; enough for a few visualizer frames.
const TAP_CAPACITY: usize = 4096;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared ring of the most recent mono samples.
#[derive(Debug, Clone)]
pub struct SampleTap {
    samples: Arc<Mutex<VecDeque<i16>>>,
    capacity: usize,
}

impl Default for SampleTap {
    fn default() -> Self {
        Self::with_capacity(TAP_CAPACITY)
    }
}

impl SampleTap {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Appends samples, evicting the oldest beyond capacity.
    pub fn push(&self, data: &[i16]) {
        let mut samples = lock(&self.samples);
        samples.extend(data.iter().copied());
        let excess = samples.len().saturating_sub(self.capacity);
        samples.drain(..excess);
    }

    /// Returns up to `count` of the newest samples, oldest first.
    pub fn latest(&self, count: usize) -> Vec<i16> {
        let samples = lock(&self.samples);
        let start = samples.len().saturating_sub(count);
        samples.range(start..).copied().collect()
    }

    pub fn clear(&self) {
        lock(&self.samples).clear();
    }
}

/// An acquired, exclusively-held input stream.
pub trait Capture {
    /// Actual capture sample rate.
    fn sample_rate(&self) -> u32;

    /// Stops buffering samples without releasing the device.
    fn pause(&mut self);

    /// Resumes buffering samples.
    fn resume(&mut self);

    /// Takes everything buffered since the last call as one encoded chunk.
    fn take_chunk(&mut self) -> Option<Vec<u8>>;

    /// Live sample feed for visualization.
    fn tap(&self) -> SampleTap;
}

/// Something that can hand out a [`Capture`].
pub trait AudioSource {
    /// Requests access to the input device.
    ///
    /// # Errors
    /// - `DeviceUnavailable` when no device exists, it cannot be opened, or its
    ///   sample format is unsupported
    fn acquire(&mut self) -> Result<Box<dyn Capture>, RecorderError>;
}

/// Input source backed by cpal.
pub struct CpalSource {
    /// Preferred sample rate (the device's native rate wins)
    requested_sample_rate: u32,
    /// Device name, numeric index, or "default"
    device_name: String,
}

impl CpalSource {
    pub fn new(requested_sample_rate: u32, device_name: String) -> Self {
        Self {
            requested_sample_rate,
            device_name,
        }
    }
}

impl AudioSource for CpalSource {
    fn acquire(&mut self) -> Result<Box<dyn Capture>, RecorderError> {
        let device = suppress_alsa_warnings(|| {
            let host = cpal::default_host();
            if self.device_name == "default" {
                host.default_input_device()
                    .ok_or_else(|| RecorderError::DeviceUnavailable("no audio input device available".to_string()))
            } else {
                find_device(&host, &self.device_name)
            }
        })?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown device".to_string());
        tracing::info!("Recording device: {}", device_name);

        let device_config = device
            .default_input_config()
            .map_err(|e| RecorderError::DeviceUnavailable(format!("{device_name}: {e}")))?;
        let sample_rate = device_config.sample_rate().0;
        let channels = device_config.channels() as usize;
        let sample_format = device_config.sample_format();

        if sample_rate != self.requested_sample_rate {
            tracing::warn!(
                "Requested sample rate {}Hz but device uses {}Hz. Recording at device rate.",
                self.requested_sample_rate,
                sample_rate
            );
        }
        tracing::debug!(
            "Device configuration: {}Hz, {} channels, {:?}",
            sample_rate,
            channels,
            sample_format
        );

        let shared = CaptureBuffers::default();
        let stream_config: cpal::StreamConfig = device_config.into();
        let stream = match sample_format {
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, channels, &shared, |s| s),
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, channels, &shared, |s| {
                (s as i32 - 32768) as i16
            }),
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, channels, &shared, |s| {
                (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
            }),
            other => {
                return Err(RecorderError::DeviceUnavailable(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| RecorderError::DeviceUnavailable(format!("failed to start stream: {e}")))?;
        tracing::debug!("Audio stream started");

        Ok(Box::new(CpalCapture {
            _stream: stream,
            buffers: shared,
            sample_rate,
        }))
    }
}

/// Buffers shared between the cpal callback and the recorder.
#[derive(Clone, Default)]
struct CaptureBuffers {
    pending: Arc<Mutex<Vec<i16>>>,
    paused: Arc<AtomicBool>,
    tap: SampleTap,
}

impl CaptureBuffers {
    /// Mixes interleaved frames down to mono and buffers them.
    fn push_interleaved(&self, data: &[i16], channels: usize) {
        if self.paused.load(Ordering::Relaxed) {
            return;
        }
        let mono: Vec<i16> = match channels {
            0 | 1 => data.to_vec(),
            n => data
                .chunks_exact(n)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                    (sum / n as i32) as i16
                })
                .collect(),
        };
        self.tap.push(&mono);
        lock(&self.pending).extend_from_slice(&mono);
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    buffers: &CaptureBuffers,
    convert: fn(T) -> i16,
) -> Result<cpal::Stream, RecorderError>
where
    T: SizedSample + Send + 'static,
{
    let buffers = buffers.clone();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let converted: Vec<i16> = data.iter().map(|&s| convert(s)).collect();
                buffers.push_interleaved(&converted, channels);
            },
            |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| RecorderError::DeviceUnavailable(format!("failed to open input stream: {e}")))
}

/// Live cpal capture. The stream (and with it the device) is released on drop.
struct CpalCapture {
    _stream: cpal::Stream,
    buffers: CaptureBuffers,
    sample_rate: u32,
}

impl Capture for CpalCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn pause(&mut self) {
        self.buffers.paused.store(true, Ordering::Relaxed);
        self.buffers.tap.clear();
        tracing::debug!("Capture paused");
    }

    fn resume(&mut self) {
        self.buffers.paused.store(false, Ordering::Relaxed);
        tracing::debug!("Capture resumed");
    }

    fn take_chunk(&mut self) -> Option<Vec<u8>> {
        let mut pending = lock(&self.buffers.pending);
        if pending.is_empty() {
            return None;
        }
        let chunk = encode_chunk(&pending);
        pending.clear();
        Some(chunk)
    }

    fn tap(&self) -> SampleTap {
        self.buffers.tap.clone()
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        tracing::debug!("Audio stream released");
    }
}

/// Finds an audio input device by name or numeric index.
fn find_device(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device, RecorderError> {
    let devices: Vec<_> = host
        .input_devices()
        .map_err(|e| RecorderError::DeviceUnavailable(format!("failed to enumerate devices: {e}")))?
        .collect();

    if let Ok(index) = device_spec.parse::<usize>() {
        let count = devices.len();
        return devices.into_iter().nth(index).ok_or_else(|| {
            RecorderError::DeviceUnavailable(format!(
                "device index {} is out of range (0-{})",
                index,
                count.saturating_sub(1)
            ))
        });
    }

    devices
        .into_iter()
        .find(|d| d.name().map(|n| n == device_spec).unwrap_or(false))
        .ok_or_else(|| {
            RecorderError::DeviceUnavailable(format!(
                "device '{device_spec}' not found. Use 'voxclip list-devices' to see available devices."
            ))
        })
}

/// Temporarily redirects stderr to /dev/null to suppress ALSA library warnings on Linux.
#[cfg(target_os = "linux")]
pub(crate) fn suppress_alsa_warnings<F, T, E>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    let Ok(dev_null) = OpenOptions::new().write(true).open("/dev/null") else {
        return f();
    };

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return f();
    }

    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(old_stderr) };
        return f();
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

/// No ALSA outside Linux.
#[cfg(not(target_os = "linux"))]
pub(crate) fn suppress_alsa_warnings<F, T, E>(f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
{
    f()
}
