//! Command handlers for voxclip.
//!
//! # Commands
//! - `record`: Interactive recorder with upload (default)
//! - `list`: Print the clips held by the collector
//! - `play`: Play an uploaded clip with the system audio player
//! - `config`: Open or print the configuration file
//! - `list_devices`: List available audio input devices
//! - `logs`: Display recent log entries

pub mod config;
pub mod list;
pub mod list_devices;
pub mod logs;
pub mod play;
pub mod record;

pub use config::handle_config;
pub use list::handle_list;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use play::handle_play;
pub use record::handle_record;
