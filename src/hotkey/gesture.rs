//! Hold-to-record gesture
//!
//! A gesture session opens on the first shortcut press and closes on the
//! next key release. Key-repeat presses while the session is open are
//! dropped by the session-presence check alone; no timer is involved.

use std::time::Instant;

use tracing::{debug, info};

/// Handle of a registered release listener
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseToken(pub u64);

/// Registration point for "any key released" events
pub trait ReleaseHooks {
    /// Start delivering key releases
    fn connect_release(&mut self) -> ReleaseToken;

    /// Stop delivering key releases for `token`
    fn disconnect_release(&mut self, token: ReleaseToken);
}

/// Where the gesture currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Released,
    Held,
}

/// Command the gesture asks the dispatcher to issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureCommand {
    Start,
    Stop,
}

#[derive(Debug)]
struct GestureSession {
    opened_at: Instant,
    release: ReleaseToken,
}

/// Debounces shortcut presses into one start and one stop per gesture
#[derive(Debug, Default)]
pub struct GestureController {
    session: Option<GestureSession>,
}

impl GestureController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GesturePhase {
        if self.session.is_some() {
            GesturePhase::Held
        } else {
            GesturePhase::Released
        }
    }

    /// Shortcut key-down, including key-repeat.
    ///
    /// Only a physical press opens a session; repeats never do.
    pub fn on_shortcut_pressed(
        &mut self,
        repeat: bool,
        hooks: &mut impl ReleaseHooks,
    ) -> Option<GestureCommand> {
        if self.session.is_some() {
            debug!(repeat, "shortcut pressed while held (ignored)");
            return None;
        }
        if repeat {
            debug!("key-repeat without a session (ignored)");
            return None;
        }

        let release = hooks.connect_release();
        self.session = Some(GestureSession {
            opened_at: Instant::now(),
            release,
        });
        info!("gesture started: Released → Held");
        Some(GestureCommand::Start)
    }

    /// Any key released
    pub fn on_key_released(&mut self, hooks: &mut impl ReleaseHooks) -> Option<GestureCommand> {
        let Some(session) = self.session.take() else {
            debug!("key released while not held (ignored)");
            return None;
        };

        hooks.disconnect_release(session.release);
        info!(
            held_ms = session.opened_at.elapsed().as_millis() as u64,
            "gesture ended: Held → Released"
        );
        Some(GestureCommand::Stop)
    }

    /// Drop any open session without asking for a stop
    pub fn teardown(&mut self, hooks: &mut impl ReleaseHooks) {
        if let Some(session) = self.session.take() {
            hooks.disconnect_release(session.release);
            info!("discarded open gesture on teardown");
        }
    }
}
