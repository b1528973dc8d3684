//! Controller core
//!
//! Owns the connection, the reconciler and the gesture, and is driven one
//! event at a time from the main loop. Everything runs on one thread, so
//! none of this state needs locking.

mod dispatch;

use tracing::{debug, info, warn};

use crate::bus::{BusEvent, ConnectError, ConnectionHandle, Reply, RpcError, Ticket, Token};
use crate::config::ShortcutMode;
use crate::hotkey::{GestureCommand, GestureController, KeyEvent, ReleaseHooks};
use crate::state::{LifecycleState, Origin, Reconciler};

pub use dispatch::Dispatcher;

/// Keeps the local mirror in sync with the daemon and drives it from keys
pub struct Controller<H: ReleaseHooks> {
    mode: ShortcutMode,
    connection: Option<ConnectionHandle>,
    reconciler: Reconciler,
    gesture: GestureController,
    hooks: H,
    enabled: bool,
}

impl<H: ReleaseHooks> Controller<H> {
    /// Create an enabled controller with no connection yet
    pub fn new(mode: ShortcutMode, reconciler: Reconciler, hooks: H) -> Self {
        Self {
            mode,
            connection: None,
            reconciler,
            gesture: GestureController::new(),
            hooks,
            enabled: true,
        }
    }

    /// Take ownership of a fresh connection and poll the daemon.
    ///
    /// With `auto_start` the poll may start the daemon through bus
    /// activation.
    pub fn attach(&mut self, connection: ConnectionHandle, auto_start: bool) {
        if !self.enabled {
            debug!("controller torn down, dropping new connection");
            return;
        }
        info!(
            generation = connection.generation(),
            auto_start,
            "attaching daemon connection"
        );
        if let Some(mut previous) = self.connection.replace(connection) {
            previous.close();
        }

        let dispatcher = self.dispatcher();
        let result = if auto_start {
            dispatcher.ensure_daemon_running()
        } else {
            dispatcher.refresh()
        };
        report("refresh", result);
    }

    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(ConnectionHandle::is_open)
    }

    pub fn state(&self) -> LifecycleState {
        self.reconciler.state()
    }

    #[cfg(test)]
    pub fn transcript(&self) -> Option<&str> {
        self.reconciler.transcript()
    }

    #[cfg(test)]
    pub fn gesture_phase(&self) -> crate::hotkey::GesturePhase {
        self.gesture.phase()
    }

    /// Command entry point for the shortcut and manual triggers
    pub fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher::new(self.connection.as_ref())
    }

    /// Apply one event from the transport
    pub fn handle_bus_event(&mut self, event: BusEvent) {
        match event {
            BusEvent::StateChanged { token, snapshot } => {
                if self.owns(token, "StateChanged") {
                    self.reconciler.apply(snapshot, Origin::Signal);
                }
            }
            BusEvent::Appeared { token } => {
                if self.owns(token, "appeared") {
                    info!("daemon appeared, refreshing status");
                    report("refresh", self.dispatcher().refresh());
                }
            }
            BusEvent::Vanished { token } => {
                if self.owns(token, "vanished") {
                    if let Some(connection) = self.connection.as_mut() {
                        connection.invalidate();
                    }
                    self.reconciler.service_vanished();
                }
            }
            BusEvent::Reply { ticket, result } => self.complete(ticket, result),
        }
    }

    /// Apply one event from the key listener
    pub fn handle_key_event(&mut self, event: KeyEvent) {
        if !self.enabled {
            debug!(?event, "controller torn down, ignoring key event");
            return;
        }

        let command = match (self.mode, event) {
            (ShortcutMode::Hold, KeyEvent::ShortcutPressed { repeat }) => {
                self.gesture.on_shortcut_pressed(repeat, &mut self.hooks)
            }
            (ShortcutMode::Hold, KeyEvent::Released) => {
                self.gesture.on_key_released(&mut self.hooks)
            }
            (ShortcutMode::Toggle, KeyEvent::ShortcutPressed { repeat: false }) => {
                report("toggle", self.dispatcher().toggle());
                None
            }
            (ShortcutMode::Toggle, _) => None,
        };

        match command {
            Some(GestureCommand::Start) => {
                report("start_recording", self.dispatcher().start_recording());
            }
            Some(GestureCommand::Stop) => {
                report("stop_recording", self.dispatcher().stop_recording());
            }
            None => {}
        }
        debug!(?event, phase = ?self.gesture.phase(), "key event handled");
    }

    /// Unregister everything; nothing registered before runs afterwards.
    ///
    /// The release listener goes first, then the connection closes its
    /// presence watch and signal subscription.
    pub fn teardown(&mut self) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        self.gesture.teardown(&mut self.hooks);
        if let Some(mut connection) = self.connection.take() {
            connection.close();
        }
        info!("controller torn down");
    }

    fn owns(&self, token: Token, what: &str) -> bool {
        let owned = self
            .connection
            .as_ref()
            .is_some_and(|connection| connection.owns(token));
        if !owned {
            debug!(?token, event = what, "dropping event from unregistered source");
        }
        owned
    }

    /// Completion path for every call issued through the dispatcher
    fn complete(&mut self, ticket: Ticket, result: Result<Reply, RpcError>) {
        let current = self
            .connection
            .as_ref()
            .is_some_and(|connection| connection.is_current(&ticket));
        if !current {
            debug!(
                method = %ticket.method,
                generation = ticket.generation,
                "discarding stale reply"
            );
            return;
        }

        match result {
            Ok(Reply::Status(snapshot)) => self.reconciler.apply(snapshot, Origin::Poll),
            Ok(Reply::Done) => debug!(method = %ticket.method, "daemon call completed"),
            Err(RpcError::ServiceAbsent { method }) => {
                debug!(%method, "daemon not running, staying idle");
            }
            Err(e) => warn!(error = %e, "daemon call failed"),
        }
    }
}

fn report(command: &str, result: Result<Ticket, ConnectError>) {
    if let Err(e) = result {
        warn!(command, error = %e, "command not sent");
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use tokio::sync::broadcast;

    use super::*;
    use crate::bus::testing::{FakeLog, FakeTransport};
    use crate::bus::Method;
    use crate::events::ControllerEvent;
    use crate::hotkey::{GesturePhase, RecordingHooks};
    use crate::state::StatusSnapshot;

    struct Harness {
        controller: Controller<RecordingHooks>,
        log: Rc<RefCell<FakeLog>>,
        events: broadcast::Receiver<ControllerEvent>,
        signal: Token,
        presence: Token,
    }

    impl Harness {
        fn new(mode: ShortcutMode) -> Self {
            let (tx, events) = broadcast::channel(64);
            let mut controller =
                Controller::new(mode, Reconciler::new(tx), RecordingHooks::default());
            let (transport, log) = FakeTransport::new();
            controller.attach(ConnectionHandle::open(Box::new(transport)), false);
            let signal = log.borrow().subscribed[0];
            let presence = log.borrow().watched[0];
            Self {
                controller,
                log,
                events,
                signal,
                presence,
            }
        }

        fn signal(&mut self, state: &str, transcript: &str) {
            self.controller.handle_bus_event(BusEvent::StateChanged {
                token: self.signal,
                snapshot: StatusSnapshot::from_signal(state, transcript),
            });
        }

        fn reply_status(&mut self, ticket: Ticket, state: &str, transcript: &str, error: &str) {
            self.controller.handle_bus_event(BusEvent::Reply {
                ticket,
                result: Ok(Reply::Status(StatusSnapshot::from_status(
                    state, transcript, error,
                ))),
            });
        }

        fn last_call(&self) -> Ticket {
            self.log.borrow().last_call().unwrap()
        }

        fn count(&self, method: Method) -> usize {
            self.log.borrow().count(method)
        }

        fn drain(&mut self) -> Vec<ControllerEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn completions(events: &[ControllerEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|event| match event {
                ControllerEvent::Completion { transcript } => Some(transcript.clone()),
                _ => None,
            })
            .collect()
    }

    fn failures(events: &[ControllerEvent]) -> usize {
        events
            .iter()
            .filter(|event| matches!(event, ControllerEvent::Failure))
            .count()
    }

    #[test]
    fn test_attach_polls_once() {
        let harness = Harness::new(ShortcutMode::Hold);
        assert_eq!(harness.count(Method::GetStatus), 1);
        assert!(!harness.last_call().activate);
        assert!(harness.controller.is_connected());
    }

    #[test]
    fn test_attach_with_auto_start_activates() {
        let (tx, _rx) = broadcast::channel(8);
        let mut controller = Controller::new(
            ShortcutMode::Hold,
            Reconciler::new(tx),
            RecordingHooks::default(),
        );
        let (transport, log) = FakeTransport::new();
        controller.attach(ConnectionHandle::open(Box::new(transport)), true);

        let log = log.borrow();
        assert_eq!(log.count(Method::GetStatus), 1);
        assert!(log.calls[0].activate);
    }

    #[test]
    fn test_service_absent_at_startup() {
        let (tx, _rx) = broadcast::channel(8);
        let controller = Controller::new(
            ShortcutMode::Hold,
            Reconciler::new(tx),
            RecordingHooks::default(),
        );
        assert!(matches!(
            controller.dispatcher().refresh(),
            Err(ConnectError::NotConnected)
        ));
        assert_eq!(controller.state(), LifecycleState::Idle);
        assert!(controller.transcript().is_none());
    }

    #[test]
    fn test_absent_reply_keeps_idle() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        let ticket = harness.last_call();
        harness.controller.handle_bus_event(BusEvent::Reply {
            ticket,
            result: Err(RpcError::ServiceAbsent {
                method: Method::GetStatus,
            }),
        });
        assert_eq!(harness.controller.state(), LifecycleState::Idle);
        assert!(harness.controller.transcript().is_none());
        assert!(harness.drain().is_empty());
    }

    #[test]
    fn test_signals_complete_transcription() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        harness.signal("recording", "");
        harness.signal("idle", "hello world");

        assert_eq!(harness.controller.state(), LifecycleState::Idle);
        assert_eq!(harness.controller.transcript(), Some("hello world"));
        assert_eq!(completions(&harness.drain()), vec!["hello world"]);
    }

    #[test]
    fn test_key_repeat_produces_single_start_and_stop() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        harness
            .controller
            .handle_key_event(KeyEvent::ShortcutPressed { repeat: false });
        for _ in 0..3 {
            harness
                .controller
                .handle_key_event(KeyEvent::ShortcutPressed { repeat: true });
        }
        assert_eq!(harness.controller.gesture_phase(), GesturePhase::Held);
        harness.controller.handle_key_event(KeyEvent::Released);
        harness.controller.handle_key_event(KeyEvent::Released);

        assert_eq!(harness.count(Method::StartRecording), 1);
        assert_eq!(harness.count(Method::StopRecording), 1);
        assert_eq!(harness.controller.gesture_phase(), GesturePhase::Released);
    }

    #[test]
    fn test_repeats_after_release_do_not_restart_recording() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        harness
            .controller
            .handle_key_event(KeyEvent::ShortcutPressed { repeat: false });
        harness.controller.handle_key_event(KeyEvent::Released);
        for _ in 0..3 {
            harness
                .controller
                .handle_key_event(KeyEvent::ShortcutPressed { repeat: true });
        }

        assert_eq!(harness.count(Method::StartRecording), 1);
        assert_eq!(harness.count(Method::StopRecording), 1);
        assert_eq!(harness.controller.gesture_phase(), GesturePhase::Released);
        assert!(!harness.controller.hooks.is_armed());
    }

    #[test]
    fn test_gesture_never_touches_state() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        harness.drain();
        harness
            .controller
            .handle_key_event(KeyEvent::ShortcutPressed { repeat: false });
        harness.controller.handle_key_event(KeyEvent::Released);

        assert_eq!(harness.controller.state(), LifecycleState::Idle);
        assert!(harness.drain().is_empty());
    }

    #[test]
    fn test_reappearance_poll_resets_stale_recording() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        harness.signal("recording", "");
        harness.drain();

        let presence = harness.presence;
        harness
            .controller
            .handle_bus_event(BusEvent::Appeared { token: presence });
        assert_eq!(harness.count(Method::GetStatus), 2);

        let poll = harness.last_call();
        harness.reply_status(poll, "idle", "", "");

        assert_eq!(harness.controller.state(), LifecycleState::Idle);
        let events = harness.drain();
        assert!(completions(&events).is_empty());
        assert_eq!(
            events,
            vec![ControllerEvent::StateChanged {
                old: LifecycleState::Recording,
                new: LifecycleState::Idle,
                transcript: None,
                last_error: None,
            }]
        );
    }

    #[test]
    fn test_error_signal_fails_once_and_keeps_transcript() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        harness.signal("idle", "before");
        harness.drain();

        harness.signal("error", "");
        assert_eq!(failures(&harness.drain()), 1);

        harness.signal("idle", "");
        assert_eq!(harness.controller.state(), LifecycleState::Idle);
        assert_eq!(harness.controller.transcript(), Some("before"));
        assert_eq!(failures(&harness.drain()), 0);
    }

    #[test]
    fn test_vanished_forces_idle_and_discards_in_flight_poll() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        harness.signal("idle", "kept");
        harness.signal("transcribing", "");
        let in_flight = harness.last_call();

        let presence = harness.presence;
        harness
            .controller
            .handle_bus_event(BusEvent::Vanished { token: presence });
        assert_eq!(harness.controller.state(), LifecycleState::Idle);
        assert_eq!(harness.controller.transcript(), Some("kept"));
        harness.drain();

        harness.reply_status(in_flight, "recording", "late", "");
        assert_eq!(harness.controller.state(), LifecycleState::Idle);
        assert_eq!(harness.controller.transcript(), Some("kept"));
        assert!(harness.drain().is_empty());
    }

    #[test]
    fn test_replies_after_reappearance_apply() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        let presence = harness.presence;
        harness
            .controller
            .handle_bus_event(BusEvent::Vanished { token: presence });
        harness
            .controller
            .handle_bus_event(BusEvent::Appeared { token: presence });

        let poll = harness.last_call();
        harness.reply_status(poll, "transcribing", "", "");
        assert_eq!(harness.controller.state(), LifecycleState::Transcribing);
    }

    #[test]
    fn test_events_from_foreign_tokens_are_dropped() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        harness.drain();
        harness.controller.handle_bus_event(BusEvent::StateChanged {
            token: Token::next(),
            snapshot: StatusSnapshot::from_signal("recording", ""),
        });
        harness
            .controller
            .handle_bus_event(BusEvent::Vanished { token: Token::next() });
        assert_eq!(harness.controller.state(), LifecycleState::Idle);
        assert!(harness.drain().is_empty());
    }

    #[test]
    fn test_no_callbacks_after_teardown() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        harness.signal("idle", "final");
        let outstanding = harness.last_call();
        harness.controller.teardown();
        harness.drain();

        {
            let log = harness.log.borrow();
            assert_eq!(log.unregistered, vec![harness.presence, harness.signal]);
        }

        let (signal, presence) = (harness.signal, harness.presence);
        harness.controller.handle_bus_event(BusEvent::StateChanged {
            token: signal,
            snapshot: StatusSnapshot::from_signal("error", ""),
        });
        harness
            .controller
            .handle_bus_event(BusEvent::Vanished { token: presence });
        harness
            .controller
            .handle_bus_event(BusEvent::Appeared { token: presence });
        harness.reply_status(outstanding, "recording", "", "");

        assert!(harness.drain().is_empty());
        assert_eq!(harness.controller.transcript(), Some("final"));
        assert_eq!(harness.count(Method::GetStatus), 1);
        assert!(!harness.controller.is_connected());
    }

    #[test]
    fn test_teardown_while_held_sends_no_stop() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        harness
            .controller
            .handle_key_event(KeyEvent::ShortcutPressed { repeat: false });
        harness.controller.teardown();
        harness.controller.handle_key_event(KeyEvent::Released);
        harness
            .controller
            .handle_key_event(KeyEvent::ShortcutPressed { repeat: false });

        assert_eq!(harness.count(Method::StartRecording), 1);
        assert_eq!(harness.count(Method::StopRecording), 0);
        assert!(!harness.controller.hooks.is_armed());
    }

    #[test]
    fn test_toggle_mode_ignores_repeats_and_releases() {
        let mut harness = Harness::new(ShortcutMode::Toggle);
        harness
            .controller
            .handle_key_event(KeyEvent::ShortcutPressed { repeat: false });
        harness
            .controller
            .handle_key_event(KeyEvent::ShortcutPressed { repeat: true });
        harness.controller.handle_key_event(KeyEvent::Released);
        harness
            .controller
            .handle_key_event(KeyEvent::ShortcutPressed { repeat: false });

        assert_eq!(harness.count(Method::Toggle), 2);
        assert_eq!(harness.count(Method::StartRecording), 0);
        assert_eq!(harness.count(Method::StopRecording), 0);
    }

    #[test]
    fn test_call_failure_leaves_state_alone() {
        let mut harness = Harness::new(ShortcutMode::Hold);
        harness.signal("recording", "");
        harness
            .controller
            .handle_key_event(KeyEvent::ShortcutPressed { repeat: false });
        let ticket = harness.last_call();
        harness.drain();

        harness.controller.handle_bus_event(BusEvent::Reply {
            ticket,
            result: Err(RpcError::Failed {
                method: Method::StartRecording,
                reason: "timeout".into(),
            }),
        });
        assert_eq!(harness.controller.state(), LifecycleState::Recording);
        assert!(harness.drain().is_empty());
    }
}
