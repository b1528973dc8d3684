//! Events published by the reconciler
//!
//! Every reconciliation produces a `StateChanged`; completions and failures
//! are derived from it and are the only triggers for user notifications.

use serde::{Deserialize, Serialize};

use crate::state::LifecycleState;

/// Events emitted by the reconciler to its consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerEvent {
    /// A snapshot (or a presence loss) was reconciled
    StateChanged {
        /// State before reconciliation
        old: LifecycleState,
        /// State after reconciliation
        new: LifecycleState,
        /// Retained transcript after reconciliation
        transcript: Option<String>,
        /// Retained daemon error after reconciliation
        last_error: Option<String>,
    },

    /// The daemon returned to idle with a freshly completed transcript
    Completion {
        transcript: String,
    },

    /// The daemon reported a failed recording or transcription
    Failure,
}

impl std::fmt::Display for ControllerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerEvent::StateChanged { old, new, .. } => {
                write!(f, "STATE_CHANGED ({} -> {})", old, new)
            }
            ControllerEvent::Completion { transcript } => {
                write!(f, "COMPLETION ({} chars)", transcript.chars().count())
            }
            ControllerEvent::Failure => write!(f, "FAILURE"),
        }
    }
}
