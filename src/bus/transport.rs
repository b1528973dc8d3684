//! Transport contract between the controller and the daemon
//!
//! A transport never blocks its caller. Calls, signals and presence changes
//! all come back later as `BusEvent`s on the controller's event channel, so
//! the controller stays the only code that mutates its own state.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::state::StatusSnapshot;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Identifies one signal subscription or presence watch.
///
/// Tokens are unique for the lifetime of the process, so events from a
/// torn-down registration can never be mistaken for a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Token(u64);

impl Token {
    pub fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Allocate a connection generation, monotonically increasing across
/// connections and presence losses.
pub fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

/// Daemon methods the controller can invoke
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    StartRecording,
    StopRecording,
    Toggle,
    GetStatus,
}

impl Method {
    /// D-Bus member name
    pub fn member(&self) -> &'static str {
        match self {
            Method::StartRecording => "StartRecording",
            Method::StopRecording => "StopRecording",
            Method::Toggle => "Toggle",
            Method::GetStatus => "GetStatus",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.member())
    }
}

/// Tag attached to an outstanding call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub method: Method,
    /// Connection generation the call was issued under
    pub generation: u64,
    /// Whether the call may start the daemon through bus activation
    pub activate: bool,
}

/// Successful call outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A zero-result method returned
    Done,
    /// `GetStatus` returned
    Status(StatusSnapshot),
}

/// Everything a transport reports back to the controller
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// `StateChanged` signal received on subscription `token`
    StateChanged { token: Token, snapshot: StatusSnapshot },
    /// The daemon's bus name gained an owner
    Appeared { token: Token },
    /// The daemon's bus name lost its owner
    Vanished { token: Token },
    /// An outstanding call finished
    Reply {
        ticket: Ticket,
        result: Result<Reply, RpcError>,
    },
}

/// Non-blocking binding to the daemon
pub trait Transport {
    /// Issue `ticket.method`; the outcome arrives as `BusEvent::Reply`
    fn call(&self, ticket: Ticket);

    /// Start forwarding `StateChanged` signals tagged with `token`
    fn subscribe_state_changed(&mut self, token: Token);

    /// Start reporting presence changes tagged with `token`.
    ///
    /// Must report `Appeared` right away when the daemon is already running.
    fn watch_presence(&mut self, token: Token);

    /// Stop a subscription or watch; nothing tagged with `token` is sent afterwards
    fn unregister(&mut self, token: Token);
}

/// Failure to establish or use the binding
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectError {
    #[error("not connected to the daemon")]
    NotConnected,

    #[error("failed to connect to the session bus: {0}")]
    SessionBus(String),

    #[error("failed to bind {bus_name} at {object_path}: {reason}")]
    Proxy {
        bus_name: String,
        object_path: String,
        reason: String,
    },
}

/// Failure of a single call
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    #[error("{method}: daemon is not on the bus")]
    ServiceAbsent { method: Method },

    #[error("{method} failed: {reason}")]
    Failed { method: Method, reason: String },
}
