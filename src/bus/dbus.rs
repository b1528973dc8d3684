//! zbus-backed transport
//!
//! Every call, the signal subscription and the presence watch run as tasks
//! on the current-thread runtime and report back through the controller's
//! event channel.

use std::collections::HashMap;

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::names::BusName;
use zbus::proxy::CacheProperties;
use zbus::{fdo, Connection};

use crate::config::DaemonConfig;
use crate::state::StatusSnapshot;

use super::connection::ConnectionHandle;
use super::protocol::{VoxputDaemonProxy, INTERFACE};
use super::transport::{BusEvent, ConnectError, Method, Reply, RpcError, Ticket, Token, Transport};

/// D-Bus errors meaning nobody owns the daemon's name
const ABSENT_ERRORS: &[&str] = &[
    "org.freedesktop.DBus.Error.ServiceUnknown",
    "org.freedesktop.DBus.Error.NameHasNoOwner",
];

/// Connect to the session bus and bind the daemon's object.
///
/// The daemon does not have to be running; presence is reported later by the
/// watch this registers.
pub async fn connect(
    config: &DaemonConfig,
    events: mpsc::UnboundedSender<BusEvent>,
) -> Result<ConnectionHandle, ConnectError> {
    let connection = Connection::session()
        .await
        .map_err(|e| ConnectError::SessionBus(e.to_string()))?;

    let proxy_error = |e: zbus::Error| ConnectError::Proxy {
        bus_name: config.bus_name.clone(),
        object_path: config.object_path.clone(),
        reason: e.to_string(),
    };

    let proxy = VoxputDaemonProxy::builder(&connection)
        .destination(config.bus_name.clone())
        .map_err(proxy_error)?
        .path(config.object_path.clone())
        .map_err(proxy_error)?
        .cache_properties(CacheProperties::No)
        .build()
        .await
        .map_err(proxy_error)?;

    info!(
        bus_name = %config.bus_name,
        object_path = %config.object_path,
        interface = INTERFACE,
        "bound voxputd proxy"
    );

    let transport = DbusTransport {
        connection,
        proxy,
        bus_name: config.bus_name.clone(),
        events,
        tasks: HashMap::new(),
    };
    Ok(ConnectionHandle::open(Box::new(transport)))
}

/// Transport over a session bus connection
pub struct DbusTransport {
    connection: Connection,
    proxy: VoxputDaemonProxy<'static>,
    bus_name: String,
    events: mpsc::UnboundedSender<BusEvent>,
    /// Forwarding tasks per registration
    tasks: HashMap<Token, JoinHandle<()>>,
}

impl Transport for DbusTransport {
    fn call(&self, ticket: Ticket) {
        let proxy = self.proxy.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let result = invoke(&proxy, ticket).await;
            if events.send(BusEvent::Reply { ticket, result }).is_err() {
                debug!(method = %ticket.method, "controller gone, dropping reply");
            }
        });
    }

    fn subscribe_state_changed(&mut self, token: Token) {
        let proxy = self.proxy.clone();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = forward_state_changed(proxy, token, events).await {
                warn!(error = %e, "StateChanged subscription ended");
            }
        });
        self.tasks.insert(token, task);
    }

    fn watch_presence(&mut self, token: Token) {
        let connection = self.connection.clone();
        let bus_name = self.bus_name.clone();
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = watch_name(connection, bus_name, token, events).await {
                warn!(error = %e, "presence watch ended");
            }
        });
        self.tasks.insert(token, task);
    }

    fn unregister(&mut self, token: Token) {
        if let Some(task) = self.tasks.remove(&token) {
            task.abort();
            debug!(?token, "registration removed");
        }
    }
}

impl Drop for DbusTransport {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

async fn invoke(proxy: &VoxputDaemonProxy<'static>, ticket: Ticket) -> Result<Reply, RpcError> {
    let outcome = match ticket.method {
        Method::StartRecording => proxy.start_recording().await.map(|()| Reply::Done),
        Method::StopRecording => proxy.stop_recording().await.map(|()| Reply::Done),
        Method::Toggle => proxy.toggle().await.map(|()| Reply::Done),
        Method::GetStatus => {
            let status = if ticket.activate {
                proxy.get_status().await
            } else {
                proxy.poll_status().await
            };
            status.map(|(state, transcript, error)| {
                Reply::Status(StatusSnapshot::from_status(&state, &transcript, &error))
            })
        }
    };
    outcome.map_err(|e| rpc_error(ticket.method, e))
}

fn rpc_error(method: Method, error: zbus::Error) -> RpcError {
    let absent = match &error {
        zbus::Error::MethodError(name, _, _) => ABSENT_ERRORS.contains(&name.as_str()),
        zbus::Error::FDO(e) => matches!(
            **e,
            fdo::Error::ServiceUnknown(_) | fdo::Error::NameHasNoOwner(_)
        ),
        _ => false,
    };
    if absent {
        RpcError::ServiceAbsent { method }
    } else {
        RpcError::Failed {
            method,
            reason: error.to_string(),
        }
    }
}

async fn forward_state_changed(
    proxy: VoxputDaemonProxy<'static>,
    token: Token,
    events: mpsc::UnboundedSender<BusEvent>,
) -> zbus::Result<()> {
    let mut signals = proxy.receive_state_changed().await?;
    debug!(?token, "subscribed to StateChanged");

    while let Some(signal) = signals.next().await {
        let args = match signal.args() {
            Ok(args) => args,
            Err(e) => {
                warn!(error = %e, "malformed StateChanged signal");
                continue;
            }
        };
        let snapshot = StatusSnapshot::from_signal(args.state(), args.transcript());
        if events.send(BusEvent::StateChanged { token, snapshot }).is_err() {
            break;
        }
    }
    Ok(())
}

/// Report owner changes of `bus_name`, at most once per appearance and
/// disappearance.
async fn watch_name(
    connection: Connection,
    bus_name: String,
    token: Token,
    events: mpsc::UnboundedSender<BusEvent>,
) -> zbus::Result<()> {
    let dbus = fdo::DBusProxy::new(&connection).await?;
    // Subscribe before querying so an appearance in between is not lost.
    let mut changes = dbus
        .receive_name_owner_changed_with_args(&[(0, bus_name.as_str())])
        .await?;

    let mut present = dbus.name_has_owner(BusName::try_from(bus_name.as_str())?).await?;
    debug!(?token, present, "presence watch registered");
    if present && events.send(BusEvent::Appeared { token }).is_err() {
        return Ok(());
    }

    while let Some(change) = changes.next().await {
        let args = change.args()?;
        if present && args.old_owner().is_some() {
            present = false;
            info!(bus_name = %bus_name, "daemon vanished");
            if events.send(BusEvent::Vanished { token }).is_err() {
                break;
            }
        }
        if !present && args.new_owner().is_some() {
            present = true;
            info!(bus_name = %bus_name, "daemon appeared");
            if events.send(BusEvent::Appeared { token }).is_err() {
                break;
            }
        }
    }
    Ok(())
}
