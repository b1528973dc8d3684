//! voxput-indicator: session controller for the voxputd dictation daemon
//!
//! Runs alongside the desktop session and provides:
//! - A local mirror of the daemon's lifecycle, fed by signals and polls
//! - Hold-to-record (or toggle) global shortcut via evdev
//! - Desktop notifications for finished and failed transcriptions
//!
//! The daemon may come and go; the controller follows its presence on the
//! session bus and shows Idle while it is absent.

mod bus;
mod config;
mod controller;
mod events;
mod hotkey;
mod indicator;
mod lifecycle;
mod notify;
mod state;

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::bus::BusEvent;
use crate::config::Config;
use crate::controller::Controller;
use crate::events::ControllerEvent;
use crate::hotkey::{HotkeyListener, KeyEvent};
use crate::indicator::IndicatorView;
use crate::lifecycle::ShutdownSignal;
use crate::notify::{DesktopSink, Notifier};
use crate::state::Reconciler;

/// How often to retry while the session bus cannot be reached
const RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "voxput-indicator starting"
    );

    let config = Config::load()?;
    let shortcut = config.shortcut()?;
    info!(
        bus_name = %config.daemon.bus_name,
        %shortcut,
        mode = ?config.shortcut.mode,
        "configuration loaded"
    );

    let mut shutdown = ShutdownSignal::new().context("failed to register signal handlers")?;

    // Transport -> controller
    let (bus_tx, mut bus_rx) = mpsc::unbounded_channel::<BusEvent>();
    // Key listener -> controller
    let (key_tx, mut key_rx) = mpsc::channel::<KeyEvent>(32);
    // Reconciler -> indicator and notifications
    let (event_tx, mut presenter_rx) = broadcast::channel::<ControllerEvent>(64);

    let mut listener = HotkeyListener::new(shortcut, key_tx);
    let mut controller = Controller::new(
        config.shortcut.mode,
        Reconciler::new(event_tx),
        listener.release_gate(),
    );
    let notifier = Notifier::new(config.notifications.clone(), DesktopSink);

    match listener.start() {
        Ok(keyboards) => info!(keyboards, "hotkey listener started"),
        Err(e) => {
            error!(error = %e, "failed to start hotkey listener");
            warn!("continuing without shortcut support - check access to /dev/input");
        }
    }

    let mut reconnect = tokio::time::interval(RECONNECT_INTERVAL);
    reconnect.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("controller initialized, entering main loop");

    let reason = loop {
        tokio::select! {
            _ = reconnect.tick(), if !controller.is_connected() => {
                match bus::connect(&config.daemon, bus_tx.clone()).await {
                    Ok(connection) => controller.attach(connection, config.daemon.auto_start),
                    Err(e) => warn!(
                        error = %e,
                        retry_secs = RECONNECT_INTERVAL.as_secs(),
                        "cannot reach voxputd, showing idle"
                    ),
                }
            }

            Some(event) = bus_rx.recv() => controller.handle_bus_event(event),

            Some(event) = key_rx.recv() => controller.handle_key_event(event),

            received = presenter_rx.recv() => match received {
                Ok(event) => present(&event, &notifier),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "controller event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break None,
            },

            reason = shutdown.wait() => break Some(reason),
        }
    };

    info!(?reason, "shutting down...");

    // Reverse order of registration: release gate, presence, signal, shortcut
    controller.teardown();
    listener.stop();

    info!(last_state = %controller.state(), "voxput-indicator stopped");

    Ok(())
}

/// Render state changes and raise notifications
fn present(event: &ControllerEvent, notifier: &Notifier<DesktopSink>) {
    if let ControllerEvent::StateChanged {
        new,
        transcript,
        last_error,
        ..
    } = event
    {
        let view = IndicatorView::new(*new, transcript.as_deref(), last_error.as_deref());
        info!(
            status = view.status,
            icon = view.icon_name,
            style = view.style_class,
            action = view.toggle_label,
            transcript = view.transcript_row.as_deref().unwrap_or(""),
            error = view.error_row.as_deref().unwrap_or(""),
            "indicator updated"
        );
    }
    notifier.handle(event);
}
