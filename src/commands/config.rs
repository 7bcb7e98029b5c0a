//! Configuration file command.
//!
//! Opens voxclip.toml in the user's editor, or prints the effective settings.

use std::process::Command;

use crate::config::{config_path, VoxclipConfig};

/// Opens the config file in an editor, creating it with defaults first.
///
/// With `show`, prints the effective configuration (including a `--base-url`
/// or `VOXCLIP_BASE_URL` override) instead.
///
/// # Errors
/// - If the config file cannot be created or parsed
/// - If no editor can be found or executed
pub fn handle_config(show: bool, base_url: Option<String>) -> anyhow::Result<()> {
    let config_path = config_path()?;

    if show {
        let config = VoxclipConfig::load()?.with_base_url(base_url)?;
        println!("# {}", config_path.display());
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    if !config_path.exists() {
        VoxclipConfig::default().save_to(&config_path)?;
    }
    tracing::info!("Opening config file: {}", config_path.display());

    let editor = find_editor()?;
    tracing::debug!("Using editor: {}", editor);

    let status = Command::new(&editor).arg(&config_path).status().map_err(|e| {
        anyhow::anyhow!("Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible.")
    })?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    match VoxclipConfig::load_from(&config_path) {
        Ok(_) => tracing::info!("Config file edited successfully"),
        Err(e) => {
            tracing::warn!("Edited config is invalid: {}", e);
            eprintln!("Warning: {e}");
        }
    }
    Ok(())
}

/// Tries $EDITOR, then nano, then vi.
fn find_editor() -> anyhow::Result<String> {
    if let Some(editor) = std::env::var("EDITOR").ok().filter(|e| !e.is_empty()) {
        return Ok(editor);
    }

    ["nano", "vi"]
        .into_iter()
        .find(|editor| is_editor_available(editor))
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("No editor found. Please set the $EDITOR environment variable."))
}

fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
