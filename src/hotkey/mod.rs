//! Hotkey module for the global recording shortcut
//!
//! Uses Linux evdev to watch the bound shortcut and key releases, and turns
//! them into gesture commands.

mod gesture;
mod keys;
mod listener;

pub use gesture::{GestureCommand, GestureController, ReleaseHooks};
pub use keys::Shortcut;
pub use listener::{HotkeyListener, KeyEvent};

#[cfg(test)]
pub(crate) use gesture::{tests::RecordingHooks, GesturePhase};
