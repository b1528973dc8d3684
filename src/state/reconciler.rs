//! State reconciliation
//!
//! The reconciler is the only writer of the local lifecycle state and the
//! retained transcript. Signals, poll replies and presence losses all funnel
//! through it, and each one is followed by a `StateChanged` event.

use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::events::ControllerEvent;

use super::lifecycle::{LifecycleState, StatusSnapshot};

/// Where a snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// A `StateChanged` signal pushed by the daemon
    Signal,
    /// A `GetStatus` reply
    Poll,
}

/// Local mirror of the daemon's state
pub struct Reconciler {
    state: LifecycleState,
    /// Most recent non-empty transcript, kept across transitions
    transcript: Option<String>,
    /// Most recent non-empty daemon error, kept across transitions
    last_error: Option<String>,
    event_tx: broadcast::Sender<ControllerEvent>,
}

impl Reconciler {
    /// Create a reconciler in the Idle state with nothing retained
    pub fn new(event_tx: broadcast::Sender<ControllerEvent>) -> Self {
        Self {
            state: LifecycleState::Idle,
            transcript: None,
            last_error: None,
            event_tx,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[cfg(test)]
    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    #[cfg(test)]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Apply a snapshot, most recent wins.
    ///
    /// Poll replies and signals update state identically. Only signals raise
    /// completion/failure events: a poll reports what the daemon retained, not
    /// something that just happened.
    pub fn apply(&mut self, snapshot: StatusSnapshot, origin: Origin) {
        let old = self.state;
        let StatusSnapshot {
            state,
            transcript,
            error,
        } = snapshot;

        if let Some(text) = &transcript {
            self.transcript = Some(text.clone());
        }
        if let Some(error) = error {
            debug!(%error, "daemon reported last error");
            self.last_error = Some(error);
        }
        self.state = state;

        info!(
            from = %old,
            to = %state,
            ?origin,
            has_transcript = transcript.is_some(),
            "reconciled daemon state"
        );
        self.publish(old);

        if origin != Origin::Signal {
            return;
        }
        match (state, transcript) {
            (LifecycleState::Idle, Some(transcript)) => {
                self.emit(ControllerEvent::Completion { transcript });
            }
            (LifecycleState::Error, _) => self.emit(ControllerEvent::Failure),
            _ => {}
        }
    }

    /// The daemon left the bus: force Idle and keep the transcript
    pub fn service_vanished(&mut self) {
        let old = self.state;
        self.state = LifecycleState::Idle;
        info!(from = %old, "daemon vanished, forcing idle");
        self.publish(old);
    }

    fn publish(&self, old: LifecycleState) {
        self.emit(ControllerEvent::StateChanged {
            old,
            new: self.state,
            transcript: self.transcript.clone(),
            last_error: self.last_error.clone(),
        });
    }

    fn emit(&self, event: ControllerEvent) {
        debug!(%event, "emitting controller event");
        let _ = self.event_tx.send(event);
    }
}
