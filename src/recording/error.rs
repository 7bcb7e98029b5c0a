//! Recorder error types

use thiserror::Error;

use super::session::RecordingState;
use crate::collector::CollectorError;

/// Errors surfaced by the recorder controller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecorderError {
    #[error("A title is required")]
    EmptyTitle,

    #[error("Cannot {action} while {state}")]
    InvalidState {
        state: RecordingState,
        action: &'static str,
    },

    #[error("No usable audio input: {0}")]
    DeviceUnavailable(String),

    #[error("Nothing to submit: stop a recording with a title first")]
    NothingToSubmit,

    #[error("Audio encoding failed: {0}")]
    Encoding(String),

    #[error("Upload failed: {0}")]
    Upload(#[from] CollectorError),
}
