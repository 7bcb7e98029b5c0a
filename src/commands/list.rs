//! Print the clips held by the collector.

use chrono::Local;

use crate::collector::{AudioRecord, Collector, HttpCollector};
use crate::config::VoxclipConfig;

/// Fetches the clip collection and prints it, or dumps it as JSON.
///
/// # Errors
/// - If the collector cannot be reached or returns an error
pub async fn handle_list(config: &VoxclipConfig, json: bool) -> Result<(), anyhow::Error> {
    let collector = HttpCollector::new(&config.server)?;
    tracing::info!("Listing clips from {}", collector.list_url());

    let records = collector.list().await?;
    tracing::info!("Fetched {} clips", records.len());

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No clips uploaded yet.");
        return Ok(());
    }

    println!();
    for line in format_records(&records, config.server.media_origin()) {
        println!("{line}");
    }
    Ok(())
}

fn format_records(records: &[AudioRecord], media_origin: &str) -> Vec<String> {
    let mut lines = Vec::with_capacity(records.len() * 3);
    for (i, record) in records.iter().enumerate() {
        let title = if record.title.is_empty() { "(untitled)" } else { &record.title };
        lines.push(format!("  {:>3}  {}", i + 1, title));
        lines.push(format!(
            "       {}",
            record
                .playback_url(media_origin)
                .unwrap_or_else(|| "(no audio)".to_string())
        ));
        if let Some(created_at) = record.created_at {
            lines.push(format!(
                "       {}",
                created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            ));
        }
        lines.push(String::new());
    }
    lines
}
