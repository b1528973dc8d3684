//! Daemon lifecycle states and status snapshots
//!
//! voxputd reports its state as loosely-typed strings. They are parsed here,
//! once, into a closed enum so nothing downstream ever sees a raw string.

use serde::{Deserialize, Serialize};

/// The four lifecycle states reported by the daemon
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Not recording; the last transcript (if any) is available
    #[default]
    Idle,
    /// Capturing audio
    Recording,
    /// Audio captured, waiting on the transcription provider
    Transcribing,
    /// The last recording or transcription failed
    Error,
}

impl LifecycleState {
    /// Parse a wire state string.
    ///
    /// Unrecognized values are treated as `Idle`; the daemon may grow new
    /// states and the indicator must keep working when it does.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "idle" => Self::Idle,
            "recording" => Self::Recording,
            "transcribing" => Self::Transcribing,
            "error" => Self::Error,
            other => {
                tracing::debug!(state = other, "unrecognized daemon state, treating as idle");
                Self::Idle
            }
        }
    }

    /// The wire spelling of this state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Transcribing => "transcribing",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of the daemon's state, from a signal or a poll reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: LifecycleState,
    /// Completed transcript; `None` when the daemon sent an empty string
    pub transcript: Option<String>,
    /// Last daemon-side error message; only `GetStatus` carries one
    pub error: Option<String>,
}

impl StatusSnapshot {
    /// Build a snapshot from the `StateChanged(state, transcript)` signal
    pub fn from_signal(state: &str, transcript: &str) -> Self {
        Self {
            state: LifecycleState::from_wire(state),
            transcript: non_empty(transcript),
            error: None,
        }
    }

    /// Build a snapshot from the `GetStatus() -> (state, transcript, error)` reply
    pub fn from_status(state: &str, transcript: &str, error: &str) -> Self {
        Self {
            state: LifecycleState::from_wire(state),
            transcript: non_empty(transcript),
            error: non_empty(error),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}
