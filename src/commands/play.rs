//! Play an uploaded clip with the system audio player.

use anyhow::anyhow;
use std::process::{Child, Command, Stdio};

use crate::collector::{AudioRecord, Collector, HttpCollector};
use crate::config::VoxclipConfig;

/// Streams clip `index` (1 = first clip in `voxclip list`) from the collector.
///
/// # Errors
/// - If the clip list cannot be fetched
/// - If the index is out of range or the clip has no audio
/// - If no audio player is available
pub async fn handle_play(config: &VoxclipConfig, index: Option<usize>) -> Result<(), anyhow::Error> {
    tracing::info!("=== voxclip play ===");

    let collector = HttpCollector::new(&config.server)?;
    let records = collector.list().await?;
    let index = index.unwrap_or(1);
    let url = resolve_playback(&records, index, config.server.media_origin())?;

    tracing::info!("Playing clip #{} from {}", index, url);
    println!("Playing {url}");

    spawn_player(&url)?
        .wait()
        .map_err(|e| anyhow!("Audio player error: {e}"))?;

    tracing::info!("Playback finished for clip #{}", index);
    Ok(())
}

/// Picks clip `index` (1-based) and resolves its playback URL.
fn resolve_playback(records: &[AudioRecord], index: usize, media_origin: &str) -> anyhow::Result<String> {
    if records.is_empty() {
        return Err(anyhow!("No clips uploaded yet"));
    }
    let record = index
        .checked_sub(1)
        .and_then(|i| records.get(i))
        .ok_or_else(|| anyhow!("Clip index out of range. Available clips: 1-{}", records.len()))?;

    record
        .playback_url(media_origin)
        .ok_or_else(|| anyhow!("Clip '{}' has no audio file", record.title))
}

/// Starts a player for `url` without waiting for it.
///
/// Player output is discarded so it cannot draw over the recorder screen.
///
/// # Errors
/// - If no audio player could be started
pub fn spawn_player(url: &str) -> anyhow::Result<Child> {
    #[cfg(target_os = "macos")]
    let players: &[(&str, &[&str])] = &[("open", &[])];

    #[cfg(target_os = "linux")]
    let players: &[(&str, &[&str])] = &[
        ("xdg-open", &[]),
        ("mpv", &["--no-video"]),
        ("ffplay", &["-nodisp", "-autoexit", "-loglevel", "quiet"]),
        ("vlc", &["--intf", "dummy", "--play-and-exit"]),
    ];

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    let players: &[(&str, &[&str])] = &[("cmd", &["/C", "start", ""])];

    for (player, args) in players {
        let spawned = Command::new(player)
            .args(*args)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => {
                tracing::debug!("Started {} for {}", player, url);
                return Ok(child);
            }
            Err(e) => tracing::debug!("Could not start {}: {}", player, e),
        }
    }

    Err(anyhow!("No audio player found. Install mpv, ffplay, or vlc"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, file_path: Option<&str>, url: Option<&str>) -> AudioRecord {
        AudioRecord {
            id: title.to_string(),
            title: title.to_string(),
            file_path: file_path.map(str::to_string),
            url: url.map(str::to_string),
            created_at: None,
        }
    }

    #[test]
    fn resolves_by_one_based_index() {
        let records = vec![
            record("a", Some("uploads/a.webm"), None),
            record("b", None, Some("https://cdn.example.com/b.webm")),
        ];
        assert_eq!(
            resolve_playback(&records, 1, "http://localhost:5000").unwrap(),
            "http://localhost:5000/uploads/a.webm"
        );
        assert_eq!(
            resolve_playback(&records, 2, "http://localhost:5000").unwrap(),
            "https://cdn.example.com/b.webm"
        );
    }

    #[test]
    fn rejects_bad_index_and_missing_audio() {
        let records = vec![record("silent", None, None)];

        let err = resolve_playback(&records, 0, "http://x").unwrap_err();
        assert!(err.to_string().contains("1-1"));
        assert!(resolve_playback(&records, 2, "http://x").is_err());

        let err = resolve_playback(&records, 1, "http://x").unwrap_err();
        assert!(err.to_string().contains("no audio"));

        assert!(resolve_playback(&[], 1, "http://x").is_err());
    }
}
