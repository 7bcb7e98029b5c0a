//! Recording session state.

use std::fmt;

use super::encoder::FinalizedAudio;

/// Recorder lifecycle states.
///
/// ```text
///   Idle -> Recording (start)
///   Recording <-> Paused (pause / resume)
///   Recording | Paused -> Stopped (stop, countdown expiry)
///   Stopped | UploadFailed -> Uploading (submit)
///   Uploading -> Idle (upload ok) | UploadFailed (upload error)
///   Recording | Paused | Stopped | UploadFailed -> Idle (cancel)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Recording,
    Paused,
    Stopped,
    Uploading,
    UploadFailed,
}

impl RecordingState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Uploading => "uploading",
            Self::UploadFailed => "upload failed",
        }
    }

    /// Whether the input device is held in this state.
    pub const fn is_live(&self) -> bool {
        matches!(self, Self::Recording | Self::Paused)
    }

    /// Whether a finalized clip is waiting to be submitted.
    pub const fn has_clip(&self) -> bool {
        matches!(self, Self::Stopped | Self::Uploading | Self::UploadFailed)
    }

    /// Whether the title can be edited: before recording, or once a clip is
    /// waiting to be submitted.
    pub const fn title_editable(&self) -> bool {
        matches!(self, Self::Idle | Self::Stopped | Self::UploadFailed)
    }
}

impl fmt::Display for RecordingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record-to-submit attempt.
#[derive(Debug, Clone)]
pub struct RecordingSession {
    pub(super) title: String,
    pub(super) state: RecordingState,
    pub(super) budget_remaining: u32,
    pub(super) captured_chunks: Vec<Vec<u8>>,
    pub(super) finalized_audio: Option<FinalizedAudio>,
    pub(super) last_error: Option<String>,
}

impl RecordingSession {
    pub fn new(max_duration: u32) -> Self {
        Self {
            title: String::new(),
            state: RecordingState::Idle,
            budget_remaining: max_duration,
            captured_chunks: Vec::new(),
            finalized_audio: None,
            last_error: None,
        }
    }

    /// Back to an empty idle session.
    pub(super) fn reset(&mut self, max_duration: u32) {
        *self = Self::new(max_duration);
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn budget_remaining(&self) -> u32 {
        self.budget_remaining
    }

    pub fn captured_chunks(&self) -> &[Vec<u8>] {
        &self.captured_chunks
    }

    pub fn finalized_audio(&self) -> Option<&FinalizedAudio> {
        self.finalized_audio.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
