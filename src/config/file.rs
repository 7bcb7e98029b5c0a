//! Configuration file management for voxclip.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory and written with defaults
//! on first run.

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Container format clips are uploaded in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UploadFormat {
    /// Opus in a WebM container, transcoded with ffmpeg
    #[default]
    Webm,
    /// The finalized WAV buffer, uploaded untouched
    Wav,
}

impl UploadFormat {
    /// File name used for the multipart `audio` part.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Webm => "recording.webm",
            Self::Wav => "recording.wav",
        }
    }

    /// MIME type of the multipart `audio` part.
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Webm => "audio/webm",
            Self::Wav => "audio/wav",
        }
    }

    /// Whether the finalized WAV buffer has to go through ffmpeg first.
    pub fn needs_transcode(&self) -> bool {
        matches!(self, Self::Webm)
    }
}

impl std::fmt::Display for UploadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Webm => write!(f, "webm"),
            Self::Wav => write!(f, "wav"),
        }
    }
}

/// Audio input configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `voxclip list-devices`
    /// - device name from `voxclip list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Preferred sample rate in Hz (the device rate wins when they differ)
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
        }
    }
}

/// Recording session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Countdown length; the recording stops on its own when it runs out
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u32,
    /// Format the clip is uploaded in: "webm" or "wav"
    #[serde(default)]
    pub upload_format: UploadFormat,
    /// Level bar refresh rate
    #[serde(default = "default_visualizer_fps")]
    pub visualizer_fps: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_duration_secs: default_max_duration_secs(),
            upload_format: UploadFormat::default(),
            visualizer_fps: default_visualizer_fps(),
        }
    }
}

/// Clip collector endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Collector origin, e.g. "https://clips.example.com"
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path clips are POSTed to
    #[serde(default = "default_collection_path")]
    pub upload_path: String,
    /// Path the clip collection is fetched from
    #[serde(default = "default_collection_path")]
    pub list_path: String,
    /// Origin relative `filePath` entries are resolved against (defaults to base_url)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_origin: Option<String>,
    /// Request timeout for uploads and list fetches
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            upload_path: default_collection_path(),
            list_path: default_collection_path(),
            media_origin: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Origin used for relative playback paths.
    pub fn media_origin(&self) -> &str {
        self.media_origin.as_deref().unwrap_or(&self.base_url)
    }
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    48000
}

fn default_max_duration_secs() -> u32 {
    30
}

fn default_visualizer_fps() -> u32 {
    60
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_collection_path() -> String {
    "/".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoxclipConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl VoxclipConfig {
    /// Loads configuration from the user's config directory, writing a default
    /// file first if none exists.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read or written
    /// - If the TOML is malformed or a value is out of range
    pub fn load() -> anyhow::Result<Self> {
        let config_path = config_path()?;
        if !config_path.exists() {
            tracing::info!("No config file found, writing defaults to {}", config_path.display());
            Self::default().save_to(&config_path)?;
        }
        Self::load_from(&config_path)
    }

    /// Loads and validates configuration from an explicit path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let config_content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read {}: {e}", path.display()))?;
        let config: VoxclipConfig = toml::from_str(&config_content)
            .map_err(|e| anyhow!("Failed to parse {}: {e}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes configuration to an explicit path.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let config_content = toml::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }

    /// Replaces the collector base URL, e.g. from `--base-url` or `VOXCLIP_BASE_URL`.
    pub fn with_base_url(mut self, base_url: Option<String>) -> anyhow::Result<Self> {
        if let Some(base_url) = base_url {
            tracing::debug!("Collector base URL overridden: {}", base_url);
            self.server.base_url = base_url;
            self.validate()?;
        }
        Ok(self)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.recording.max_duration_secs == 0 {
            return Err(anyhow!("recording.max_duration_secs must be at least 1"));
        }
        if !(1..=240).contains(&self.recording.visualizer_fps) {
            return Err(anyhow!("recording.visualizer_fps must be between 1 and 240"));
        }
        reqwest::Url::parse(&self.server.base_url)
            .map_err(|e| anyhow!("server.base_url '{}' is not a valid URL: {e}", self.server.base_url))?;
        if let Some(origin) = &self.server.media_origin {
            reqwest::Url::parse(origin)
                .map_err(|e| anyhow!("server.media_origin '{origin}' is not a valid URL: {e}"))?;
        }
        Ok(())
    }
}

/// Retrieves the path to the config file.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn config_path() -> anyhow::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not determine home directory"))?;
    Ok(home.join(".config").join("voxclip").join("voxclip.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: VoxclipConfig = toml::from_str("").unwrap();
        assert_eq!(config.audio.device, "default");
        assert_eq!(config.recording.max_duration_secs, 30);
        assert_eq!(config.recording.upload_format, UploadFormat::Webm);
        assert_eq!(config.server.upload_path, "/");
        assert_eq!(config.server.media_origin(), "http://localhost:5000");
        config.validate().unwrap();
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: VoxclipConfig = toml::from_str(
            r#"
            [recording]
            max_duration_secs = 10
            upload_format = "wav"

            [server]
            base_url = "https://clips.example.com"
            list_path = "/api/audio"
            media_origin = "https://cdn.example.com"
            "#,
        )
        .unwrap();

        assert_eq!(config.recording.max_duration_secs, 10);
        assert_eq!(config.recording.visualizer_fps, 60);
        assert_eq!(config.recording.upload_format, UploadFormat::Wav);
        assert_eq!(config.server.upload_path, "/");
        assert_eq!(config.server.list_path, "/api/audio");
        assert_eq!(config.server.media_origin(), "https://cdn.example.com");
    }

    #[test]
    fn zero_duration_is_rejected() {
        let mut config = VoxclipConfig::default();
        config.recording.max_duration_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn base_url_override_is_validated() {
        let config = VoxclipConfig::default()
            .with_base_url(Some("https://override.example.com".to_string()))
            .unwrap();
        assert_eq!(config.server.base_url, "https://override.example.com");

        assert!(VoxclipConfig::default()
            .with_base_url(Some("not a url".to_string()))
            .is_err());
    }

    #[test]
    fn save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("voxclip.toml");

        let mut config = VoxclipConfig::default();
        config.audio.device = "2".to_string();
        config.save_to(&path).unwrap();

        let loaded = VoxclipConfig::load_from(&path).unwrap();
        assert_eq!(loaded.audio.device, "2");
        assert_eq!(loaded.server.timeout_secs, 60);
    }

    #[test]
    fn upload_format_part_names() {
        assert_eq!(UploadFormat::Webm.file_name(), "recording.webm");
        assert_eq!(UploadFormat::Webm.mime(), "audio/webm");
        assert!(UploadFormat::Webm.needs_transcode());
        assert!(!UploadFormat::Wav.needs_transcode());
    }
}
