//! Session bus binding to voxputd

mod connection;
mod dbus;
mod protocol;
mod transport;

#[cfg(test)]
pub mod testing;

pub use connection::ConnectionHandle;
pub use dbus::connect;
pub use protocol::{BUS_NAME, OBJECT_PATH};
pub use transport::{BusEvent, ConnectError, Method, Reply, RpcError, Ticket, Token};
