//! Live level bars.
//!
//! While recording, a frame task samples the capture's live tap once per frame,
//! runs a small FFT over the newest samples and publishes byte-scaled
//! frequency magnitudes on a watch channel. The UI draws one bar per bin with a
//! colour derived from the bin index. The task is a read-only observer of the
//! input and never touches captured audio.

use ratatui::style::Color;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::audio::SampleTap;

/// FFT length; yields `FFT_SIZE / 2` bins.
pub const FFT_SIZE: usize = 64;

/// Number of bars drawn.
pub const BIN_COUNT: usize = FFT_SIZE / 2;

/// Gap between neighbouring bars, in cells.
pub const BAR_GAP: u16 = 1;

/// Decibel window mapped onto 0..=255.
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

/// One visualizer frame: a magnitude per bin, 0..=255.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelFrame {
    pub magnitudes: Vec<u8>,
}

impl Default for LevelFrame {
    fn default() -> Self {
        Self {
            magnitudes: vec![0; BIN_COUNT],
        }
    }
}

/// Stateful analyzer with a planned FFT and per-bin smoothing.
pub struct FrequencyAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
}

impl Default for FrequencyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrequencyAnalyzer {
    pub fn new() -> Self {
        let fft = FftPlanner::new().plan_fft_forward(FFT_SIZE);
        let window = (0..FFT_SIZE)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / FFT_SIZE as f32).cos()))
            .collect();
        Self {
            fft,
            window,
            smoothed: vec![0.0; BIN_COUNT],
        }
    }

    /// Computes a frame from the newest `FFT_SIZE` samples.
    ///
    /// Fewer samples are zero-padded at the front. Consecutive frames are
    /// averaged to reduce visual jitter.
    pub fn analyze(&mut self, samples: &[i16]) -> LevelFrame {
        let recent = &samples[samples.len().saturating_sub(FFT_SIZE)..];
        let offset = FFT_SIZE - recent.len();

        let mut buffer = vec![Complex::new(0.0f32, 0.0); FFT_SIZE];
        for (i, &s) in recent.iter().enumerate() {
            let idx = offset + i;
            buffer[idx] = Complex::new(s as f32 / 32768.0 * self.window[idx], 0.0);
        }
        self.fft.process(&mut buffer);

        let magnitudes = buffer[..BIN_COUNT]
            .iter()
            .zip(self.smoothed.iter_mut())
            .map(|(bin, smoothed)| {
                let magnitude = bin.norm() / FFT_SIZE as f32;
                *smoothed = (*smoothed + magnitude) / 2.0;
                to_byte(*smoothed)
            })
            .collect();

        LevelFrame { magnitudes }
    }
}

fn to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    ((db - MIN_DB) / (MAX_DB - MIN_DB) * 255.0).clamp(0.0, 255.0) as u8
}

/// Bar colour for a bin: `hsl(index % 360, 100%, 60%)`.
pub fn bar_color(index: usize) -> Color {
    let (r, g, b) = hsl_to_rgb((index % 360) as f32, 1.0, 0.6);
    Color::Rgb(r, g, b)
}

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> (u8, u8, u8) {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    let channel = |v: f32| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    (channel(r), channel(g), channel(b))
}

/// Width of each bar so `bins` bars with `gap` cells between them fit `width`.
pub fn bar_width(width: u16, bins: usize, gap: u16) -> u16 {
    if bins == 0 {
        return 0;
    }
    let bins = bins as u16;
    let gaps = gap.saturating_mul(bins.saturating_sub(1));
    (width.saturating_sub(gaps) / bins).max(1)
}

/// Owner of the frame task.
pub struct LevelVisualizer {
    frames: watch::Sender<LevelFrame>,
    frame_interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl LevelVisualizer {
    pub fn new(fps: u32) -> Self {
        let (frames, _) = watch::channel(LevelFrame::default());
        Self {
            frames,
            frame_interval: Duration::from_secs_f64(1.0 / fps.max(1) as f64),
            task: None,
        }
    }

    /// Receiver the UI renders from.
    pub fn subscribe(&self) -> watch::Receiver<LevelFrame> {
        self.frames.subscribe()
    }

    /// Starts the frame loop over `tap`, cancelling any loop already running.
    pub fn start(&mut self, tap: SampleTap) {
        if self.is_running() {
            self.stop();
        }

        let frames = self.frames.clone();
        let frame_interval = self.frame_interval;
        self.task = Some(tokio::spawn(async move {
            let mut analyzer = FrequencyAnalyzer::new();
            let mut ticker = time::interval(frame_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let frame = analyzer.analyze(&tap.latest(FFT_SIZE));
                frames.send_replace(frame);
            }
        }));
        tracing::debug!("Level visualizer started ({:?} per frame)", frame_interval);
    }

    /// Cancels the frame loop and blanks the bars.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.frames.send_replace(LevelFrame::default());
            tracing::debug!("Level visualizer stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for LevelVisualizer {
    fn drop(&mut self) {
        self.stop();
    }
}
