//! Configuration management for voxclip.
//!
//! Loads and saves the TOML configuration file that holds the input device,
//! recording limits and the clip collector endpoints.

pub mod file;

pub use file::{config_path, RecordingConfig, ServerConfig, UploadFormat, VoxclipConfig};
