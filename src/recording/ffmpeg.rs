//! FFmpeg locator and upload transcoding.
//!
//! Finalized clips are WAV; the collector expects WebM/Opus by default, so the
//! clip is piped through ffmpeg before upload. The binary is looked up in the
//! standard installation locations before falling back to a PATH search.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::error::RecorderError;

/// Locates the ffmpeg binary on the system.
///
/// Checks the usual per-platform install locations first, then PATH via
/// `which`/`where`.
pub fn find_ffmpeg() -> Result<PathBuf, RecorderError> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &["/opt/homebrew/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/usr/bin/ffmpeg"]
    } else if cfg!(target_os = "linux") {
        &["/usr/bin/ffmpeg", "/usr/local/bin/ffmpeg", "/snap/bin/ffmpeg"]
    } else if cfg!(target_os = "windows") {
        &[
            "C:\\ffmpeg\\bin\\ffmpeg.exe",
            "C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe",
        ]
    } else {
        &[]
    };

    if let Some(path) = candidates.iter().map(PathBuf::from).find(|p| p.exists()) {
        tracing::debug!("Found ffmpeg at: {}", path.display());
        return Ok(path);
    }

    let search_cmd = if cfg!(target_os = "windows") { "where" } else { "which" };
    let output = Command::new(search_cmd)
        .arg("ffmpeg")
        .output()
        .map_err(|e| RecorderError::Encoding(format!("failed to search PATH for ffmpeg: {e}")))?;

    let path_str = String::from_utf8_lossy(&output.stdout);
    let first = path_str.lines().next().unwrap_or("").trim();
    if output.status.success() && !first.is_empty() {
        tracing::debug!("Found ffmpeg in PATH at: {}", first);
        return Ok(PathBuf::from(first));
    }

    Err(RecorderError::Encoding(
        "ffmpeg not found. Install ffmpeg or set recording.upload_format = \"wav\"".to_string(),
    ))
}

/// Transcodes a WAV buffer to mono WebM/Opus through ffmpeg's stdin/stdout.
pub fn wav_to_webm(wav: &[u8]) -> Result<Vec<u8>, RecorderError> {
    let ffmpeg_path = find_ffmpeg()?;

    let mut child = Command::new(&ffmpeg_path)
        .args(["-loglevel", "error", "-f", "wav", "-i", "pipe:0"])
        .args(["-acodec", "libopus", "-b:a", "48k", "-ac", "1"])
        .args(["-f", "webm", "pipe:1"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RecorderError::Encoding(format!("failed to run ffmpeg: {e}")))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| RecorderError::Encoding("ffmpeg stdin unavailable".to_string()))?;
    let input = wav.to_vec();
    let writer = std::thread::spawn(move || stdin.write_all(&input));

    let output = child
        .wait_with_output()
        .map_err(|e| RecorderError::Encoding(format!("ffmpeg did not finish: {e}")))?;

    match writer.join() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("ffmpeg closed stdin early: {}", e),
        Err(_) => tracing::debug!("ffmpeg stdin writer panicked"),
    }

    if !output.status.success() {
        let error_msg = String::from_utf8_lossy(&output.stderr);
        tracing::error!("ffmpeg transcoding failed: {}", error_msg);
        return Err(RecorderError::Encoding(error_msg.trim().to_string()));
    }

    tracing::debug!("Transcoded {} WAV bytes to {} WebM bytes", wav.len(), output.stdout.len());
    Ok(output.stdout)
}
