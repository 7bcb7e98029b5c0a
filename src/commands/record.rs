//! Interactive clip recorder.
//!
//! Runs the recorder screen: title entry, recording with live level bars and
//! countdown, then submission to the collector. Uploads and clip list fetches
//! run as background tasks; their results are applied on this loop. SIGUSR1
//! stops a running recording from outside the terminal.

use anyhow::anyhow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::collector::{ClipList, Collector, CollectorError, HttpCollector};
use crate::config::VoxclipConfig;
use crate::recording::{
    upload_clip, ClipsView, ControllerSettings, CpalSource, RecorderController, RecorderError,
    RecorderTui, RecorderView, RecordingState, UiCommand,
};

type UploadTask = JoinHandle<Result<(), RecorderError>>;

/// Runs the recorder until the user quits.
///
/// # Errors
/// - If the collector client or terminal cannot be initialized
/// - If rendering or input handling fails
pub async fn handle_record(config: VoxclipConfig) -> Result<(), anyhow::Error> {
    tracing::info!("=== voxclip recorder started ===");
    tracing::info!(
        "Configuration loaded: device={}, sample_rate={}Hz, max_duration={}s, upload_format={}, collector={}",
        config.audio.device,
        config.audio.sample_rate,
        config.recording.max_duration_secs,
        config.recording.upload_format,
        config.server.base_url
    );

    let http = HttpCollector::new(&config.server)?;
    tracing::info!("Uploading to {}, listing from {}", http.upload_url(), http.list_url());
    let collector: Arc<dyn Collector> = Arc::new(http);
    let media_origin = config.server.media_origin().to_string();

    let source = CpalSource::new(config.audio.sample_rate, config.audio.device.clone());
    let mut controller = RecorderController::new(
        Box::new(source),
        ControllerSettings::from_config(&config.recording),
    );
    let frames = controller.subscribe_frames();
    let mut refresh = controller.subscribe_refresh();

    let mut clips = ClipList::new(Arc::clone(&collector));
    clips.request_refresh();

    let stop_requested = Arc::new(AtomicBool::new(false));
    #[cfg(unix)]
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&stop_requested))
        .map_err(|e| anyhow!("Failed to register signal handler: {e}"))?;

    let mut tui = RecorderTui::new().map_err(|e| anyhow!("Failed to initialize UI: {e}"))?;
    let frame_interval = Duration::from_secs_f64(1.0 / config.recording.visualizer_fps.max(1) as f64);

    let mut upload: Option<UploadTask> = None;
    let mut notice: Option<String> = None;
    let mut frame_count = 0u64;

    loop {
        frame_count += 1;
        if stop_requested.swap(false, Ordering::Relaxed) {
            tracing::info!("Received SIGUSR1: stopping via external trigger");
            if let Err(e) = controller.stop() {
                notice = Some(e.to_string());
            }
        }

        controller.process_events();
        controller.drain();
        if controller.state() == RecordingState::Recording && frame_count.is_multiple_of(60) {
            tracing::debug!(
                "Recording: {} chunks captured, {}s left",
                controller.session().captured_chunks().len(),
                controller.session().budget_remaining()
            );
        }

        if let Some(result) = take_finished(&mut upload).await {
            let title = controller.title().to_string();
            match controller.finish_submit(result) {
                Ok(()) => {
                    tui.reset_title();
                    notice = Some(format!("Uploaded '{title}'"));
                }
                Err(_) => notice = None,
            }
        }

        if refresh.has_changed().unwrap_or(false) {
            refresh.borrow_and_update();
            clips.request_refresh();
        }
        clips.poll().await;

        let level = frames.borrow().clone();
        let session = controller.session();
        let view = RecorderView {
            state: session.state(),
            title: session.title(),
            budget_remaining: session.budget_remaining(),
            progress: controller.progress(),
            clip_secs: session.finalized_audio().map(|audio| audio.duration_secs()),
            frame: &level,
            last_error: session.last_error(),
            notice: notice.as_deref(),
            clips: ClipsView {
                records: clips.records(),
                error: clips.error(),
                loading: clips.is_loading(),
                media_origin: &media_origin,
            },
        };
        tui.render(&view).map_err(|e| anyhow!("Render failed: {e}"))?;

        let command = tui
            .handle_input(controller.state(), clips.records().len(), frame_interval)
            .map_err(|e| {
                tracing::error!("Input handling error: {}", e);
                anyhow!("Input handling error: {e}")
            })?;

        match command {
            UiCommand::Continue => {}
            UiCommand::TitleEdited(title) => {
                controller.set_title(&title);
                notice = None;
            }
            UiCommand::Start(title) => {
                notice = controller.start(&title).err().map(|e| e.to_string());
            }
            UiCommand::TogglePause => {
                if !controller.pause() {
                    controller.resume();
                }
            }
            UiCommand::Stop => {
                notice = controller.stop().err().map(|e| e.to_string());
            }
            UiCommand::Cancel => {
                if controller.cancel() {
                    tui.reset_title();
                    notice = None;
                }
            }
            UiCommand::Submit => match controller.begin_submit() {
                Ok(clip) => {
                    notice = None;
                    upload = Some(tokio::spawn(upload_clip(Arc::clone(&collector), clip)));
                }
                Err(e) => notice = Some(e.to_string()),
            },
            UiCommand::Refresh => clips.request_refresh(),
            UiCommand::Play => {
                let url = tui
                    .selected_clip()
                    .and_then(|i| clips.records().get(i))
                    .and_then(|record| record.playback_url(&media_origin));
                notice = match url {
                    Some(url) => match super::play::spawn_player(&url) {
                        Ok(mut child) => {
                            tokio::task::spawn_blocking(move || child.wait());
                            Some(format!("Playing {url}"))
                        }
                        Err(e) => Some(e.to_string()),
                    },
                    None => Some("Selected clip has no audio".to_string()),
                };
            }
            UiCommand::Quit => break,
        }
    }

    if let Some(task) = upload.take() {
        tracing::warn!("Quitting with an upload in flight; aborting it");
        task.abort();
    }
    controller.cancel();

    tui.cleanup().map_err(|e| anyhow!("Cleanup failed: {e}"))?;
    tracing::info!("=== voxclip recorder exited ===");
    Ok(())
}

/// Joins the upload task if it has finished.
async fn take_finished(upload: &mut Option<UploadTask>) -> Option<Result<(), RecorderError>> {
    match upload.take() {
        Some(task) if task.is_finished() => Some(task.await.unwrap_or_else(|e| {
            Err(RecorderError::Upload(CollectorError::Network(format!(
                "upload task failed: {e}"
            ))))
        })),
        pending => {
            *upload = pending;
            None
        }
    }
}
