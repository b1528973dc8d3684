//! Owned connection to the daemon
//!
//! `ConnectionHandle` holds the transport together with the signal
//! subscription and presence watch registered on it. Closing it (explicitly
//! or on drop) unregisters both in reverse order before the transport goes
//! away.

use tracing::{debug, info};

use super::transport::{next_generation, Method, Ticket, Token, Transport};

/// A live binding plus its registrations
pub struct ConnectionHandle {
    transport: Option<Box<dyn Transport>>,
    generation: u64,
    signal: Token,
    presence: Token,
}

impl ConnectionHandle {
    /// Register the `StateChanged` subscription, then the presence watch
    pub fn open(mut transport: Box<dyn Transport>) -> Self {
        let signal = Token::next();
        transport.subscribe_state_changed(signal);
        let presence = Token::next();
        transport.watch_presence(presence);

        let generation = next_generation();
        info!(generation, ?signal, ?presence, "daemon connection opened");

        Self {
            transport: Some(transport),
            generation,
            signal,
            presence,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Whether events tagged with `token` belong to this open connection
    pub fn owns(&self, token: Token) -> bool {
        self.is_open() && (token == self.signal || token == self.presence)
    }

    /// Whether a reply to `ticket` still means something
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.is_open() && ticket.generation == self.generation
    }

    /// Issue `method` under the current generation
    pub fn call(&self, method: Method, activate: bool) -> Option<Ticket> {
        let transport = self.transport.as_ref()?;
        let ticket = Ticket {
            method,
            generation: self.generation,
            activate,
        };
        debug!(%method, generation = ticket.generation, activate, "issuing daemon call");
        transport.call(ticket);
        Some(ticket)
    }

    /// The daemon instance went away: replies to calls issued so far are stale
    pub fn invalidate(&mut self) {
        let previous = self.generation;
        self.generation = next_generation();
        debug!(previous, current = self.generation, "connection generation invalidated");
    }

    /// Unregister everything and release the transport. Idempotent.
    pub fn close(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            return;
        };
        transport.unregister(self.presence);
        transport.unregister(self.signal);
        drop(transport);
        info!(generation = self.generation, "daemon connection closed");
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.close();
    }
}
