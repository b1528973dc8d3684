//! Global key listener using Linux evdev
//!
//! Reads every keyboard under `/dev/input`, tracks held modifiers across
//! devices and turns raw key events into shortcut presses and (while a
//! gesture is open) key releases.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use evdev::{Device, EventType, InputEventKind, Key};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::gesture::{ReleaseHooks, ReleaseToken};
use super::keys::{is_modifier, ModifierState, Shortcut};

const INPUT_DIR: &str = "/dev/input";

/// Events sent from the key listener to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// The bound shortcut went down; `repeat` for autorepeat events
    ShortcutPressed { repeat: bool },
    /// Some key was released while the release listener was connected
    Released,
}

/// Switch deciding whether key releases reach the controller.
///
/// Cloned into the controller as its `ReleaseHooks`; the listener checks it
/// for every release.
#[derive(Debug, Clone, Default)]
pub struct ReleaseGate {
    armed: Arc<AtomicBool>,
    next_token: Arc<AtomicU64>,
}

impl ReleaseGate {
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}

impl ReleaseHooks for ReleaseGate {
    fn connect_release(&mut self) -> ReleaseToken {
        self.armed.store(true, Ordering::SeqCst);
        let token = ReleaseToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        debug!(?token, "release listener connected");
        token
    }

    fn disconnect_release(&mut self, token: ReleaseToken) {
        self.armed.store(false, Ordering::SeqCst);
        debug!(?token, "release listener disconnected");
    }
}

/// Turns raw `(key, value)` pairs into `KeyEvent`s
#[derive(Debug)]
pub struct KeyTracker {
    shortcut: Shortcut,
    held_modifiers: HashSet<u16>,
    /// A shortcut press was forwarded and its release has not been yet
    awaiting_release: bool,
}

impl KeyTracker {
    pub fn new(shortcut: Shortcut) -> Self {
        Self {
            shortcut,
            held_modifiers: HashSet::new(),
            awaiting_release: false,
        }
    }

    /// Feed one evdev key event; `value` is 0 (up), 1 (down) or 2 (repeat).
    ///
    /// The first release after a forwarded shortcut press is always
    /// forwarded, even if the controller has not armed the gate yet.
    pub fn observe(&mut self, key: Key, value: i32, release_armed: bool) -> Option<KeyEvent> {
        match value {
            1 | 2 => {
                if is_modifier(key) {
                    self.held_modifiers.insert(key.code());
                    return None;
                }
                let modifiers = ModifierState::from_held(&self.held_modifiers);
                if !self.shortcut.matches(key, modifiers) {
                    return None;
                }
                let repeat = value == 2;
                if !repeat {
                    self.awaiting_release = true;
                }
                Some(KeyEvent::ShortcutPressed { repeat })
            }
            0 => {
                if is_modifier(key) {
                    self.held_modifiers.remove(&key.code());
                }
                let pending = std::mem::take(&mut self.awaiting_release);
                (release_armed || pending).then_some(KeyEvent::Released)
            }
            _ => None,
        }
    }
}

/// Global key listener feeding the controller
pub struct HotkeyListener {
    shortcut: Shortcut,
    event_tx: mpsc::Sender<KeyEvent>,
    gate: ReleaseGate,
    running: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
}

impl HotkeyListener {
    /// Create a new key listener for `shortcut`
    pub fn new(shortcut: Shortcut, event_tx: mpsc::Sender<KeyEvent>) -> Self {
        Self {
            shortcut,
            event_tx,
            gate: ReleaseGate::default(),
            running: Arc::new(AtomicBool::new(false)),
            tasks: Vec::new(),
        }
    }

    /// The gate the controller arms while a gesture is open
    pub fn release_gate(&self) -> ReleaseGate {
        self.gate.clone()
    }

    /// Start reading keyboards; returns how many were found
    pub fn start(&mut self) -> Result<usize, HotkeyError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let devices = match find_keyboards() {
            Ok(devices) if !devices.is_empty() => devices,
            Ok(_) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(HotkeyError::NoKeyboards);
            }
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<(Key, i32)>();
        for path in &devices {
            let path = path.clone();
            let tx = raw_tx.clone();
            self.tasks.push(tokio::spawn(async move {
                if let Err(e) = read_device(&path, tx).await {
                    warn!(?path, error = %e, "keyboard reader ended");
                }
            }));
        }
        drop(raw_tx);

        let tracker = KeyTracker::new(self.shortcut.clone());
        let gate = self.gate.clone();
        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);
        self.tasks.push(tokio::spawn(async move {
            run_tracker(tracker, raw_rx, gate, event_tx).await;
            running.store(false, Ordering::SeqCst);
            info!("key listener stopped");
        }));

        info!(shortcut = %self.shortcut, keyboards = devices.len(), "key listener started");
        Ok(devices.len())
    }

    /// Stop all readers
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the listener is currently running
    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Errors that can occur in the key listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("key listener is already running")]
    AlreadyRunning,

    #[error("cannot read /dev/input: {0} - add the user to the 'input' group")]
    InputDirectory(std::io::Error),

    #[error("no readable keyboard devices in /dev/input")]
    NoKeyboards,
}

async fn run_tracker(
    mut tracker: KeyTracker,
    mut raw_rx: mpsc::UnboundedReceiver<(Key, i32)>,
    gate: ReleaseGate,
    event_tx: mpsc::Sender<KeyEvent>,
) {
    while let Some((key, value)) = raw_rx.recv().await {
        let Some(event) = tracker.observe(key, value, gate.is_armed()) else {
            continue;
        };
        debug!(?event, "key event");
        if event_tx.send(event).await.is_err() {
            warn!("failed to send key event - channel closed?");
            break;
        }
    }
}

fn find_keyboards() -> Result<Vec<PathBuf>, HotkeyError> {
    let entries = std::fs::read_dir(INPUT_DIR).map_err(HotkeyError::InputDirectory)?;
    let mut keyboards = Vec::new();

    for entry in entries.flatten() {
        let path = entry.path();
        let is_event_node = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("event"));
        if !is_event_node {
            continue;
        }

        match Device::open(&path) {
            Ok(device) => {
                let is_keyboard = device.supported_events().contains(EventType::KEY)
                    && device.supported_keys().is_some_and(|keys| {
                        keys.contains(Key::KEY_A)
                            && keys.contains(Key::KEY_Z)
                            && keys.contains(Key::KEY_SPACE)
                    });
                if is_keyboard {
                    debug!(?path, name = device.name().unwrap_or("unknown"), "found keyboard");
                    keyboards.push(path);
                }
            }
            Err(e) => debug!(?path, error = %e, "cannot open input device"),
        }
    }

    Ok(keyboards)
}

async fn read_device(
    path: &Path,
    tx: mpsc::UnboundedSender<(Key, i32)>,
) -> std::io::Result<()> {
    let mut stream = Device::open(path)?.into_event_stream()?;
    loop {
        let event = stream.next_event().await?;
        if let InputEventKind::Key(key) = event.kind() {
            if tx.send((key, event.value())).is_err() {
                return Ok(());
            }
        }
    }
}
