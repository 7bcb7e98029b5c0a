//! Recorder controller.
//!
//! Owns the recording session and everything attached to it while it is live:
//! the input capture, the countdown task and the level visualizer. All state
//! changes happen through the methods below on the UI's event loop; background
//! tasks only post events, which the loop feeds back via
//! [`RecorderController::process_events`].
//!
//! Every transition out of `Recording`/`Paused` goes through `release`, which
//! drops the capture (releasing the device) and cancels both tasks.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

use super::audio::{AudioSource, Capture};
use super::countdown::{ControllerEvent, Countdown};
use super::encoder::FinalizedAudio;
use super::error::RecorderError;
use super::ffmpeg;
use super::session::{RecordingSession, RecordingState};
use super::visualizer::{LevelFrame, LevelVisualizer};
use crate::collector::{Collector, UploadPayload};
use crate::config::{RecordingConfig, UploadFormat};

/// Tunables for a controller.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Countdown length in ticks
    pub max_duration: u32,
    /// Time between countdown ticks
    pub tick_period: Duration,
    pub upload_format: UploadFormat,
    pub visualizer_fps: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&RecordingConfig::default())
    }
}

impl ControllerSettings {
    pub fn from_config(config: &RecordingConfig) -> Self {
        Self {
            max_duration: config.max_duration_secs,
            tick_period: Duration::from_secs(1),
            upload_format: config.upload_format,
            visualizer_fps: config.visualizer_fps,
        }
    }
}

/// A stopped clip handed to the uploader.
#[derive(Debug, Clone)]
pub struct ClipUpload {
    pub title: String,
    pub audio: FinalizedAudio,
    pub format: UploadFormat,
}

impl ClipUpload {
    /// Encodes the clip into the configured upload format.
    ///
    /// # Errors
    /// - `Encoding` if ffmpeg is missing or fails
    pub fn encode(&self) -> Result<UploadPayload, RecorderError> {
        let audio = match self.format {
            UploadFormat::Wav => self.audio.bytes().to_vec(),
            UploadFormat::Webm => ffmpeg::wav_to_webm(self.audio.bytes())?,
        };
        Ok(UploadPayload {
            title: self.title.clone(),
            audio,
            file_name: self.format.file_name(),
            mime: self.format.mime(),
        })
    }
}

/// Encodes and uploads a clip. Transcoding runs on the blocking pool.
pub async fn upload_clip(
    collector: Arc<dyn Collector>,
    clip: ClipUpload,
) -> Result<(), RecorderError> {
    let payload = if clip.format.needs_transcode() {
        tokio::task::spawn_blocking(move || clip.encode())
            .await
            .map_err(|e| RecorderError::Encoding(format!("transcode task failed: {e}")))??
    } else {
        clip.encode()?
    };
    collector.upload(&payload).await?;
    Ok(())
}

/// Recording lifecycle state machine.
pub struct RecorderController {
    source: Box<dyn AudioSource>,
    settings: ControllerSettings,
    session: RecordingSession,
    capture: Option<Box<dyn Capture>>,
    sample_rate: u32,
    countdown: Option<Countdown>,
    next_generation: u64,
    visualizer: LevelVisualizer,
    events_tx: UnboundedSender<ControllerEvent>,
    events_rx: UnboundedReceiver<ControllerEvent>,
    refresh: watch::Sender<u64>,
}

impl RecorderController {
    pub fn new(source: Box<dyn AudioSource>, settings: ControllerSettings) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (refresh, _) = watch::channel(0);
        Self {
            source,
            session: RecordingSession::new(settings.max_duration),
            visualizer: LevelVisualizer::new(settings.visualizer_fps),
            settings,
            capture: None,
            sample_rate: 0,
            countdown: None,
            next_generation: 0,
            events_tx,
            events_rx,
            refresh,
        }
    }

    pub fn session(&self) -> &RecordingSession {
        &self.session
    }

    pub fn state(&self) -> RecordingState {
        self.session.state
    }

    pub fn title(&self) -> &str {
        &self.session.title
    }

    pub fn budget_remaining(&self) -> u32 {
        self.session.budget_remaining
    }

    /// Fraction of the countdown used, 0.0..=1.0.
    pub fn progress(&self) -> f64 {
        let max = self.settings.max_duration.max(1) as f64;
        (max - self.session.budget_remaining as f64) / max
    }

    /// Generation of the running countdown, if any.
    pub fn countdown_generation(&self) -> Option<u64> {
        self.countdown.as_ref().map(Countdown::generation)
    }

    pub fn subscribe_frames(&self) -> watch::Receiver<LevelFrame> {
        self.visualizer.subscribe()
    }

    /// Bumped after every successful upload; the clip list refetches on change.
    pub fn subscribe_refresh(&self) -> watch::Receiver<u64> {
        self.refresh.subscribe()
    }

    /// Edits the title while idle, or renames a stopped clip before submit.
    pub fn set_title(&mut self, title: &str) -> bool {
        if !self.session.state.title_editable() {
            return false;
        }
        self.session.title = title.to_string();
        true
    }

    /// Acquires the input device and starts recording, the countdown and the
    /// visualizer.
    ///
    /// # Errors
    /// - `EmptyTitle` if the title is blank; the device is not touched
    /// - `InvalidState` unless idle
    /// - `DeviceUnavailable` if the device cannot be opened; nothing changes
    pub fn start(&mut self, title: &str) -> Result<(), RecorderError> {
        if self.session.state != RecordingState::Idle {
            return Err(RecorderError::InvalidState {
                state: self.session.state,
                action: "start recording",
            });
        }
        let title = title.trim();
        if title.is_empty() {
            return Err(RecorderError::EmptyTitle);
        }

        let capture = self.source.acquire().map_err(|e| {
            tracing::warn!("Failed to acquire input device: {}", e);
            e
        })?;

        self.sample_rate = capture.sample_rate();
        self.session.reset(self.settings.max_duration);
        self.session.title = title.to_string();
        self.session.state = RecordingState::Recording;

        self.visualizer.start(capture.tap());
        self.capture = Some(capture);
        self.start_countdown();

        tracing::info!(
            "Recording '{}' started ({}s budget, {}Hz)",
            title,
            self.settings.max_duration,
            self.sample_rate
        );
        Ok(())
    }

    /// Freezes capture and the countdown. Ignored unless recording.
    pub fn pause(&mut self) -> bool {
        if self.session.state != RecordingState::Recording {
            tracing::debug!("Pause ignored while {}", self.session.state);
            return false;
        }

        if let Some(capture) = self.capture.as_mut() {
            capture.pause();
        }
        self.drain();
        self.countdown = None;
        self.visualizer.stop();
        self.session.state = RecordingState::Paused;

        tracing::info!("Recording paused with {}s left", self.session.budget_remaining);
        true
    }

    /// Continues a paused recording from the frozen budget. Ignored unless paused.
    pub fn resume(&mut self) -> bool {
        if self.session.state != RecordingState::Paused {
            tracing::debug!("Resume ignored while {}", self.session.state);
            return false;
        }

        let Some(capture) = self.capture.as_mut() else {
            tracing::warn!("Paused session lost its capture; stopping");
            let _ = self.stop();
            return false;
        };
        capture.resume();
        let tap = capture.tap();

        self.session.state = RecordingState::Recording;
        self.visualizer.start(tap);
        self.start_countdown();

        tracing::info!("Recording resumed with {}s left", self.session.budget_remaining);
        true
    }

    /// Ends capture and finalizes the clip.
    ///
    /// Returns `Ok(false)` when there is nothing to stop.
    ///
    /// # Errors
    /// - `Encoding` if the chunks cannot be finalized; the session is reset
    pub fn stop(&mut self) -> Result<bool, RecorderError> {
        if !self.session.state.is_live() {
            tracing::debug!("Stop ignored while {}", self.session.state);
            return Ok(false);
        }

        self.drain();
        self.release();

        let chunks = std::mem::take(&mut self.session.captured_chunks);
        match FinalizedAudio::from_chunks(&chunks, self.sample_rate) {
            Ok(audio) => {
                tracing::info!(
                    "Recording '{}' stopped: {:.1}s ({} samples at {}Hz, {} bytes)",
                    self.session.title,
                    audio.duration_secs(),
                    audio.sample_count(),
                    audio.sample_rate(),
                    audio.len()
                );
                self.session.finalized_audio = Some(audio);
                self.session.state = RecordingState::Stopped;
                Ok(true)
            }
            Err(e) => {
                tracing::error!("Failed to finalize recording: {}", e);
                self.session.reset(self.settings.max_duration);
                Err(e)
            }
        }
    }

    /// Discards the session and returns to idle.
    ///
    /// Ignored while idle or while an upload is in flight.
    pub fn cancel(&mut self) -> bool {
        match self.session.state {
            RecordingState::Idle | RecordingState::Uploading => {
                tracing::debug!("Cancel ignored while {}", self.session.state);
                false
            }
            state => {
                self.release();
                self.session.reset(self.settings.max_duration);
                tracing::info!("Recording cancelled from {}", state);
                true
            }
        }
    }

    /// Applies one countdown tick. Reaching zero stops the recording.
    ///
    /// Ticks from a cancelled countdown (stale generation) are ignored.
    pub fn tick(&mut self, generation: u64) -> bool {
        if self.session.state != RecordingState::Recording {
            return false;
        }
        if self.countdown_generation() != Some(generation) {
            tracing::debug!("Dropping stale countdown tick {}", generation);
            return false;
        }

        self.session.budget_remaining = self.session.budget_remaining.saturating_sub(1);
        if self.session.budget_remaining == 0 {
            tracing::info!("Countdown expired, stopping recording");
            if let Err(e) = self.stop() {
                tracing::warn!("Auto-stop failed: {}", e);
            }
        }
        true
    }

    /// Handles every event posted by background tasks since the last call.
    pub fn process_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                ControllerEvent::Tick { generation } => {
                    self.tick(generation);
                }
            }
            handled += 1;
        }
        handled
    }

    /// Moves buffered audio from the capture into the session. Only while recording.
    pub fn drain(&mut self) -> usize {
        if self.session.state != RecordingState::Recording {
            return 0;
        }
        let Some(capture) = self.capture.as_mut() else {
            return 0;
        };

        let mut drained = 0;
        while let Some(chunk) = capture.take_chunk() {
            self.session.captured_chunks.push(chunk);
            drained += 1;
        }
        drained
    }

    /// Hands out the stopped clip and marks the session as uploading.
    ///
    /// # Errors
    /// - `NothingToSubmit` unless stopped (or after a failed upload) with audio
    /// - `EmptyTitle` if the title is blank
    pub fn begin_submit(&mut self) -> Result<ClipUpload, RecorderError> {
        if !matches!(
            self.session.state,
            RecordingState::Stopped | RecordingState::UploadFailed
        ) {
            return Err(RecorderError::NothingToSubmit);
        }
        let audio = self
            .session
            .finalized_audio
            .clone()
            .filter(|audio| !audio.is_empty())
            .ok_or(RecorderError::NothingToSubmit)?;
        let title = self.session.title.trim().to_string();
        if title.is_empty() {
            return Err(RecorderError::EmptyTitle);
        }

        self.session.title = title;
        self.session.state = RecordingState::Uploading;
        self.session.last_error = None;
        tracing::info!("Submitting '{}' ({} bytes)", self.session.title, audio.len());

        Ok(ClipUpload {
            title: self.session.title.clone(),
            audio,
            format: self.settings.upload_format,
        })
    }

    /// Applies the outcome of an upload started with [`Self::begin_submit`].
    ///
    /// Success resets the session and signals the clip list; failure keeps the
    /// clip so the upload can be retried.
    pub fn finish_submit(
        &mut self,
        result: Result<(), RecorderError>,
    ) -> Result<(), RecorderError> {
        if self.session.state != RecordingState::Uploading {
            tracing::warn!("Upload finished while {}; ignoring outcome", self.session.state);
            return result;
        }

        match &result {
            Ok(()) => {
                tracing::info!("Clip '{}' uploaded", self.session.title);
                self.session.reset(self.settings.max_duration);
                self.refresh.send_modify(|generation| *generation += 1);
            }
            Err(e) => {
                tracing::warn!("Upload of '{}' failed: {}", self.session.title, e);
                self.session.state = RecordingState::UploadFailed;
                self.session.last_error = Some(e.to_string());
            }
        }
        result
    }

    /// Uploads the stopped clip and applies the outcome.
    pub async fn submit(&mut self, collector: Arc<dyn Collector>) -> Result<(), RecorderError> {
        let clip = self.begin_submit()?;
        let result = upload_clip(collector, clip).await;
        self.finish_submit(result)
    }

    fn start_countdown(&mut self) {
        self.next_generation += 1;
        self.countdown = Some(Countdown::spawn(
            self.next_generation,
            self.settings.tick_period,
            self.events_tx.clone(),
        ));
    }

    /// Drops the capture and cancels both background tasks.
    fn release(&mut self) {
        self.countdown = None;
        self.visualizer.stop();
        if self.capture.take().is_some() {
            tracing::debug!("Input device released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{AudioRecord, CollectorError};
    use crate::recording::audio::SampleTap;
    use crate::recording::encoder::encode_chunk;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    const MAX: u32 = 30;

    #[derive(Clone, Default)]
    struct DeviceProbe {
        acquisitions: Arc<AtomicUsize>,
        held: Arc<AtomicBool>,
    }

    impl DeviceProbe {
        fn acquisitions(&self) -> usize {
            self.acquisitions.load(Ordering::SeqCst)
        }

        fn held(&self) -> bool {
            self.held.load(Ordering::SeqCst)
        }
    }

    struct FakeSource {
        probe: DeviceProbe,
        deny: bool,
    }

    impl AudioSource for FakeSource {
        fn acquire(&mut self) -> Result<Box<dyn Capture>, RecorderError> {
            self.probe.acquisitions.fetch_add(1, Ordering::SeqCst);
            if self.deny {
                return Err(RecorderError::DeviceUnavailable("permission denied".to_string()));
            }
            assert!(!self.probe.held(), "device acquired twice");
            self.probe.held.store(true, Ordering::SeqCst);
            Ok(Box::new(FakeCapture {
                probe: self.probe.clone(),
                paused: false,
                tap: SampleTap::default(),
            }))
        }
    }

    struct FakeCapture {
        probe: DeviceProbe,
        paused: bool,
        tap: SampleTap,
    }

    impl Capture for FakeCapture {
        fn sample_rate(&self) -> u32 {
            8000
        }

        fn pause(&mut self) {
            self.paused = true;
        }

        fn resume(&mut self) {
            self.paused = false;
        }

        fn take_chunk(&mut self) -> Option<Vec<u8>> {
            if self.paused {
                None
            } else {
                Some(encode_chunk(&[100, -100]))
            }
        }

        fn tap(&self) -> SampleTap {
            self.tap.clone()
        }
    }

    impl Drop for FakeCapture {
        fn drop(&mut self) {
            self.probe.held.store(false, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct MemoryCollector {
        uploads: Mutex<Vec<UploadPayload>>,
        fail: AtomicBool,
    }

    impl MemoryCollector {
        fn upload_count(&self) -> usize {
            self.uploads.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Collector for MemoryCollector {
        async fn upload(&self, payload: &UploadPayload) -> Result<(), CollectorError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CollectorError::Status {
                    status: 500,
                    message: "collector down".to_string(),
                });
            }
            self.uploads.lock().unwrap().push(payload.clone());
            Ok(())
        }

        async fn list(&self) -> Result<Vec<AudioRecord>, CollectorError> {
            Ok(self
                .uploads
                .lock()
                .unwrap()
                .iter()
                .enumerate()
                .map(|(i, p)| AudioRecord {
                    id: i.to_string(),
                    title: p.title.clone(),
                    file_path: Some(format!("uploads/{i}.wav")),
                    url: None,
                    created_at: None,
                })
                .collect())
        }
    }

    fn controller_with(max_duration: u32, deny: bool) -> (RecorderController, DeviceProbe) {
        let probe = DeviceProbe::default();
        let source = FakeSource {
            probe: probe.clone(),
            deny,
        };
        let settings = ControllerSettings {
            max_duration,
            upload_format: UploadFormat::Wav,
            ..ControllerSettings::default()
        };
        (RecorderController::new(Box::new(source), settings), probe)
    }

    fn controller() -> (RecorderController, DeviceProbe) {
        controller_with(MAX, false)
    }

    /// Delivers a tick from the running countdown, as its task would.
    fn tick(controller: &mut RecorderController) -> bool {
        match controller.countdown_generation() {
            Some(generation) => controller.tick(generation),
            None => false,
        }
    }

    fn stopped(title: &str) -> (RecorderController, DeviceProbe) {
        let (mut c, probe) = controller();
        c.start(title).unwrap();
        c.drain();
        assert!(c.stop().unwrap());
        (c, probe)
    }

    #[tokio::test]
    async fn start_with_empty_title_is_rejected_without_device_access() {
        let (mut c, probe) = controller();

        assert_eq!(c.start(""), Err(RecorderError::EmptyTitle));
        assert_eq!(c.start("   "), Err(RecorderError::EmptyTitle));

        assert_eq!(c.state(), RecordingState::Idle);
        assert_eq!(probe.acquisitions(), 0);
        assert!(!c.capture.is_some());
    }

    #[tokio::test]
    async fn start_enters_recording_with_full_budget() {
        let (mut c, probe) = controller();

        c.start("demo").unwrap();

        assert_eq!(c.state(), RecordingState::Recording);
        assert_eq!(c.title(), "demo");
        assert_eq!(c.budget_remaining(), MAX);
        assert!(probe.held());
        assert!(c.countdown_generation().is_some());
        assert!(c.visualizer.is_running());
    }

    #[tokio::test]
    async fn start_while_recording_is_rejected() {
        let (mut c, probe) = controller();
        c.start("one").unwrap();

        let err = c.start("two").unwrap_err();

        assert!(matches!(err, RecorderError::InvalidState { state: RecordingState::Recording, .. }));
        assert_eq!(c.title(), "one");
        assert_eq!(probe.acquisitions(), 1);
    }

    #[tokio::test]
    async fn unavailable_device_leaves_session_idle() {
        let (mut c, probe) = controller_with(MAX, true);

        let err = c.start("demo").unwrap_err();

        assert!(matches!(err, RecorderError::DeviceUnavailable(_)));
        assert_eq!(c.state(), RecordingState::Idle);
        assert_eq!(c.budget_remaining(), MAX);
        assert_eq!(probe.acquisitions(), 1);
        assert!(!c.visualizer.is_running());
        assert!(c.countdown_generation().is_none());
    }

    #[tokio::test]
    async fn budget_only_moves_while_recording() {
        let (mut c, _) = controller();
        c.start("t").unwrap();

        // (operation, ticks afterwards)
        let script = [("tick", 3), ("pause", 4), ("resume", 2), ("pause", 10), ("pause", 1), ("resume", 5)];
        let mut expected = MAX;

        for (op, ticks) in script {
            match op {
                "pause" => {
                    c.pause();
                }
                "resume" => {
                    c.resume();
                }
                _ => {}
            }
            let paused = c.state() == RecordingState::Paused;
            for _ in 0..ticks {
                let before = c.budget_remaining();
                tick(&mut c);
                if paused {
                    assert_eq!(c.budget_remaining(), before);
                } else {
                    assert_eq!(c.budget_remaining(), before - 1);
                    expected -= 1;
                }
            }
        }

        assert_eq!(c.budget_remaining(), expected);
        assert_eq!(expected, MAX - 10);
    }

    #[tokio::test]
    async fn pause_ticks_do_not_count() {
        let (mut c, _) = controller();
        c.start("demo").unwrap();

        for _ in 0..5 {
            assert!(tick(&mut c));
        }
        let generation = c.countdown_generation().unwrap();
        assert!(c.pause());
        for _ in 0..3 {
            assert!(!c.tick(generation));
        }
        assert_eq!(c.budget_remaining(), MAX - 5);

        assert!(c.resume());
        assert!(c.stop().unwrap());

        assert_eq!(c.state(), RecordingState::Stopped);
        assert_eq!(c.budget_remaining(), MAX - 5);
    }

    #[tokio::test]
    async fn stop_finalizes_from_recording_and_paused() {
        for pause_first in [false, true] {
            let (mut c, probe) = controller();
            c.start("demo").unwrap();
            c.drain();
            if pause_first {
                assert!(c.pause());
            }

            assert!(c.stop().unwrap());

            assert_eq!(c.state(), RecordingState::Stopped);
            let audio = c.session().finalized_audio().expect("finalized audio");
            assert!(!audio.is_empty());
            assert!(audio.sample_count() > 0);
            assert!(c.session().captured_chunks().is_empty());
            assert!(!probe.held());
            assert!(!c.visualizer.is_running());
            assert!(c.countdown_generation().is_none());
        }
    }

    #[tokio::test]
    async fn stop_without_chunks_still_has_audio() {
        let (mut c, _) = controller();
        c.start("quiet").unwrap();
        c.pause();
        c.session.captured_chunks.clear();

        assert!(c.stop().unwrap());
        assert!(!c.session().finalized_audio().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stop_is_ignored_when_not_live() {
        let (mut c, _) = controller();
        assert_eq!(c.stop(), Ok(false));

        let (mut c, _) = stopped("x");
        let audio = c.session().finalized_audio().cloned();
        assert_eq!(c.stop(), Ok(false));
        assert_eq!(c.session().finalized_audio().cloned(), audio);
    }

    #[tokio::test]
    async fn chunks_accumulate_only_while_recording() {
        let (mut c, _) = controller();
        assert_eq!(c.drain(), 0);

        c.start("t").unwrap();
        assert_eq!(c.drain(), 1);
        assert_eq!(c.drain(), 1);
        c.pause();
        let count = c.session().captured_chunks().len();

        assert_eq!(c.drain(), 0);
        assert_eq!(c.session().captured_chunks().len(), count);
    }

    #[tokio::test]
    async fn cancel_from_any_non_idle_state_resets() {
        let setups: [fn(&mut RecorderController); 4] = [
            |c| c.start("a").unwrap(),
            |c| {
                c.start("a").unwrap();
                c.pause();
            },
            |c| {
                c.start("a").unwrap();
                c.stop().unwrap();
            },
            |c| {
                c.start("a").unwrap();
                c.stop().unwrap();
                c.begin_submit().unwrap();
                let _ = c.finish_submit(Err(RecorderError::Encoding("boom".to_string())));
            },
        ];

        for setup in setups {
            let (mut c, probe) = controller();
            setup(&mut c);
            assert_ne!(c.state(), RecordingState::Idle);
            tick(&mut c);

            assert!(c.cancel());

            assert_eq!(c.state(), RecordingState::Idle);
            assert_eq!(c.title(), "");
            assert!(c.session().finalized_audio().is_none());
            assert!(c.session().last_error().is_none());
            assert_eq!(c.budget_remaining(), MAX);
            assert!(!probe.held());
            assert!(!c.visualizer.is_running());
        }
    }

    #[tokio::test]
    async fn cancel_is_ignored_while_idle_or_uploading() {
        let (mut c, _) = controller();
        assert!(!c.cancel());

        let (mut c, _) = stopped("x");
        c.begin_submit().unwrap();
        assert!(!c.cancel());
        assert_eq!(c.state(), RecordingState::Uploading);
    }

    #[tokio::test]
    async fn countdown_expiry_stops_exactly_once() {
        let (mut c, probe) = controller_with(5, false);
        c.start("t").unwrap();
        let generation = c.countdown_generation().unwrap();

        for _ in 0..5 {
            assert!(c.tick(generation));
        }

        assert_eq!(c.state(), RecordingState::Stopped);
        assert_eq!(c.budget_remaining(), 0);
        assert!(!probe.held());
        let audio = c.session().finalized_audio().cloned().unwrap();

        assert!(!c.tick(generation));
        assert_eq!(c.state(), RecordingState::Stopped);
        assert_eq!(c.budget_remaining(), 0);
        assert_eq!(c.session().finalized_audio().unwrap().bytes().as_ptr(), audio.bytes().as_ptr());
    }

    #[tokio::test]
    async fn stale_countdown_ticks_are_ignored() {
        let (mut c, _) = controller();
        c.start("t").unwrap();
        let first = c.countdown_generation().unwrap();
        c.pause();
        c.resume();
        let second = c.countdown_generation().unwrap();
        assert_ne!(first, second);

        assert!(!c.tick(first));
        assert_eq!(c.budget_remaining(), MAX);
        assert!(c.tick(second));
        assert_eq!(c.budget_remaining(), MAX - 1);
    }

    #[tokio::test]
    async fn tick_after_cancel_does_not_touch_new_session() {
        let (mut c, _) = controller();
        c.start("first").unwrap();
        let old = c.countdown_generation().unwrap();
        c.cancel();
        c.start("second").unwrap();

        assert!(!c.tick(old));
        assert_eq!(c.budget_remaining(), MAX);
    }

    #[tokio::test]
    async fn pause_and_resume_are_ignored_in_other_states() {
        let (mut c, _) = controller();
        assert!(!c.pause());
        assert!(!c.resume());

        c.start("t").unwrap();
        assert!(!c.resume());
        assert!(c.pause());
        assert!(!c.pause());

        let (mut c, _) = stopped("t");
        assert!(!c.pause());
        assert!(!c.resume());
        assert_eq!(c.state(), RecordingState::Stopped);
    }

    #[tokio::test]
    async fn title_is_locked_while_live() {
        let (mut c, _) = controller();
        assert!(c.set_title("draft"));
        assert_eq!(c.title(), "draft");

        c.start("final").unwrap();
        assert!(!c.set_title("changed"));
        c.pause();
        assert!(!c.set_title("changed"));
        assert_eq!(c.title(), "final");
    }

    #[tokio::test]
    async fn stopped_clip_can_be_renamed_before_submit() {
        let collector = Arc::new(MemoryCollector::default());
        let (mut c, _) = stopped("first take");

        assert!(c.set_title("  renamed "));
        c.submit(collector.clone()).await.unwrap();

        let uploads = collector.uploads.lock().unwrap();
        assert_eq!(uploads[0].title, "renamed");
    }

    #[tokio::test]
    async fn clearing_title_of_stopped_clip_blocks_submit() {
        let collector = Arc::new(MemoryCollector::default());
        let (mut c, _) = stopped("first take");

        assert!(c.set_title("   "));
        assert_eq!(
            c.submit(collector.clone()).await,
            Err(RecorderError::EmptyTitle)
        );
        assert_eq!(c.state(), RecordingState::Stopped);
        assert!(c.session().finalized_audio().is_some());
        assert_eq!(collector.upload_count(), 0);
    }

    #[tokio::test]
    async fn failed_upload_can_be_retried_under_new_title() {
        let collector = Arc::new(MemoryCollector::default());
        collector.fail.store(true, Ordering::SeqCst);
        let (mut c, _) = stopped("draft");
        assert!(c.submit(collector.clone()).await.is_err());

        assert!(c.set_title("final"));
        collector.fail.store(false, Ordering::SeqCst);
        c.submit(collector.clone()).await.unwrap();

        assert_eq!(collector.uploads.lock().unwrap()[0].title, "final");
    }

    #[tokio::test]
    async fn submit_without_audio_makes_no_request() {
        let collector = Arc::new(MemoryCollector::default());

        let (mut c, _) = controller();
        assert_eq!(
            c.submit(collector.clone()).await,
            Err(RecorderError::NothingToSubmit)
        );

        c.start("t").unwrap();
        assert_eq!(
            c.submit(collector.clone()).await,
            Err(RecorderError::NothingToSubmit)
        );
        assert_eq!(c.state(), RecordingState::Recording);
        assert_eq!(collector.upload_count(), 0);
    }

    #[tokio::test]
    async fn successful_submit_resets_and_signals_refresh() {
        let collector = Arc::new(MemoryCollector::default());
        let (mut c, _) = stopped("demo");
        let mut refresh = c.subscribe_refresh();

        c.submit(collector.clone()).await.unwrap();

        assert_eq!(c.state(), RecordingState::Idle);
        assert_eq!(c.title(), "");
        assert!(c.session().finalized_audio().is_none());
        assert_eq!(c.budget_remaining(), MAX);
        assert!(refresh.has_changed().unwrap());
        assert_eq!(*refresh.borrow_and_update(), 1);

        let uploads = collector.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].title, "demo");
        assert_eq!(uploads[0].file_name, "recording.wav");
        assert_eq!(&uploads[0].audio[..4], b"RIFF");
    }

    #[tokio::test]
    async fn failed_submit_keeps_clip_for_retry() {
        let collector = Arc::new(MemoryCollector::default());
        collector.fail.store(true, Ordering::SeqCst);
        let (mut c, _) = stopped("demo");
        let mut refresh = c.subscribe_refresh();

        let err = c.submit(collector.clone()).await.unwrap_err();

        assert!(matches!(err, RecorderError::Upload(_)));
        assert_eq!(c.state(), RecordingState::UploadFailed);
        assert!(c.session().finalized_audio().is_some());
        assert!(c.session().last_error().unwrap().contains("collector down"));
        assert!(!refresh.has_changed().unwrap());

        collector.fail.store(false, Ordering::SeqCst);
        c.submit(collector.clone()).await.unwrap();

        assert_eq!(c.state(), RecordingState::Idle);
        assert_eq!(collector.upload_count(), 1);
        assert!(refresh.has_changed().unwrap());
    }

    #[tokio::test]
    async fn submitted_clip_is_listed() {
        let collector = Arc::new(MemoryCollector::default());
        let (mut c, _) = stopped("X");

        c.submit(collector.clone()).await.unwrap();

        let records = collector.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title, "X");
    }

    #[tokio::test]
    async fn finish_submit_outside_upload_is_ignored() {
        let (mut c, _) = stopped("x");
        assert!(c.finish_submit(Ok(())).is_ok());
        assert_eq!(c.state(), RecordingState::Stopped);
        assert!(c.session().finalized_audio().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_task_drives_budget() {
        let (mut c, _) = controller_with(3, false);
        c.start("t").unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(c.process_events(), 2);
        assert_eq!(c.budget_remaining(), 1);
        assert_eq!(c.state(), RecordingState::Recording);

        tokio::time::sleep(Duration::from_secs(1)).await;
        c.process_events();
        assert_eq!(c.state(), RecordingState::Stopped);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(c.process_events(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_session_receives_no_ticks() {
        let (mut c, _) = controller();
        c.start("t").unwrap();
        c.pause();

        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(c.process_events(), 0);
        assert_eq!(c.budget_remaining(), MAX);
    }

    #[tokio::test]
    async fn dropping_controller_releases_device() {
        let (mut c, probe) = controller();
        c.start("t").unwrap();
        assert!(probe.held());

        drop(c);

        assert!(!probe.held());
    }

    #[tokio::test]
    async fn progress_tracks_budget() {
        let (mut c, _) = controller_with(4, false);
        assert_eq!(c.progress(), 0.0);
        c.start("t").unwrap();
        tick(&mut c);
        assert!((c.progress() - 0.25).abs() < 1e-9);
    }
}
