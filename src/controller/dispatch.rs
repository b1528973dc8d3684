//! Command dispatch
//!
//! Each command issues exactly one daemon call. Outcomes come back later as
//! replies; a command never changes the lifecycle state itself.

use crate::bus::{ConnectError, ConnectionHandle, Method, Ticket};

/// Routes commands to the current connection, if any
pub struct Dispatcher<'a> {
    connection: Option<&'a ConnectionHandle>,
}

impl<'a> Dispatcher<'a> {
    pub fn new(connection: Option<&'a ConnectionHandle>) -> Self {
        Self { connection }
    }

    pub fn toggle(&self) -> Result<Ticket, ConnectError> {
        self.issue(Method::Toggle, true)
    }

    pub fn start_recording(&self) -> Result<Ticket, ConnectError> {
        self.issue(Method::StartRecording, true)
    }

    pub fn stop_recording(&self) -> Result<Ticket, ConnectError> {
        self.issue(Method::StopRecording, true)
    }

    /// Poll the daemon's status without starting it
    pub fn refresh(&self) -> Result<Ticket, ConnectError> {
        self.issue(Method::GetStatus, false)
    }

    /// Poll the daemon's status, letting the bus start it if needed
    pub fn ensure_daemon_running(&self) -> Result<Ticket, ConnectError> {
        self.issue(Method::GetStatus, true)
    }

    fn issue(&self, method: Method, activate: bool) -> Result<Ticket, ConnectError> {
        self.connection
            .and_then(|connection| connection.call(method, activate))
            .ok_or(ConnectError::NotConnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::FakeTransport;

    #[test]
    fn test_each_command_issues_one_call() {
        let (transport, log) = FakeTransport::new();
        let connection = ConnectionHandle::open(Box::new(transport));
        let dispatcher = Dispatcher::new(Some(&connection));

        dispatcher.toggle().unwrap();
        dispatcher.start_recording().unwrap();
        dispatcher.stop_recording().unwrap();
        dispatcher.refresh().unwrap();

        let log = log.borrow();
        let methods: Vec<Method> = log.calls.iter().map(|t| t.method).collect();
        assert_eq!(
            methods,
            vec![
                Method::Toggle,
                Method::StartRecording,
                Method::StopRecording,
                Method::GetStatus
            ]
        );
        assert!(log
            .calls
            .iter()
            .all(|t| t.generation == connection.generation()));
    }

    #[test]
    fn test_refresh_does_not_activate() {
        let (transport, log) = FakeTransport::new();
        let connection = ConnectionHandle::open(Box::new(transport));
        let dispatcher = Dispatcher::new(Some(&connection));

        assert!(!dispatcher.refresh().unwrap().activate);
        assert!(dispatcher.ensure_daemon_running().unwrap().activate);
        assert_eq!(log.borrow().count(Method::GetStatus), 2);
    }

    #[test]
    fn test_without_connection() {
        let dispatcher = Dispatcher::new(None);
        assert!(matches!(dispatcher.refresh(), Err(ConnectError::NotConnected)));
        assert!(matches!(dispatcher.toggle(), Err(ConnectError::NotConnected)));
    }
}
