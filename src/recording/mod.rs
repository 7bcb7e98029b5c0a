//! Clip recording.
//!
//! Audio capture, the recorder state machine with its countdown and level
//! visualizer, clip encoding, and the terminal screen driving it all.

pub mod audio;
pub mod controller;
pub mod countdown;
pub mod encoder;
pub mod error;
pub mod ffmpeg;
pub mod session;
pub mod ui;
pub mod visualizer;

pub use audio::CpalSource;
pub use controller::{upload_clip, ControllerSettings, RecorderController};
pub use error::RecorderError;
pub use session::RecordingState;
pub use ui::{ClipsView, RecorderTui, RecorderView, UiCommand};
