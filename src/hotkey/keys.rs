//! Modifier tracking and accelerator parsing
//!
//! Shortcuts use the GTK accelerator syntax (`<Super><Alt>r`) and are
//! resolved to evdev key codes.

use std::collections::HashSet;
use std::str::FromStr;

use evdev::Key;

/// Tracks which modifier keys are currently pressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    /// Either Control key is held
    pub control: bool,
    /// Either Alt key is held
    pub alt: bool,
    /// Either Shift key is held
    pub shift: bool,
    /// Either Super/Meta key is held
    pub logo: bool,
}

impl ModifierState {
    /// Compute the modifier state from the set of held modifier key codes
    pub fn from_held(held: &HashSet<u16>) -> Self {
        let any = |keys: [Key; 2]| keys.iter().any(|k| held.contains(&k.code()));
        Self {
            control: any([Key::KEY_LEFTCTRL, Key::KEY_RIGHTCTRL]),
            alt: any([Key::KEY_LEFTALT, Key::KEY_RIGHTALT]),
            shift: any([Key::KEY_LEFTSHIFT, Key::KEY_RIGHTSHIFT]),
            logo: any([Key::KEY_LEFTMETA, Key::KEY_RIGHTMETA]),
        }
    }
}

/// Whether `key` is one of the tracked modifier keys
pub fn is_modifier(key: Key) -> bool {
    matches!(
        key,
        Key::KEY_LEFTCTRL
            | Key::KEY_RIGHTCTRL
            | Key::KEY_LEFTALT
            | Key::KEY_RIGHTALT
            | Key::KEY_LEFTSHIFT
            | Key::KEY_RIGHTSHIFT
            | Key::KEY_LEFTMETA
            | Key::KEY_RIGHTMETA
    )
}

/// A key combination bound to the recording gesture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub modifiers: ModifierState,
    pub key: Key,
    accelerator: String,
}

impl Shortcut {
    /// Whether pressing `key` with `modifiers` held triggers this shortcut
    pub fn matches(&self, key: Key, modifiers: ModifierState) -> bool {
        key == self.key && modifiers == self.modifiers
    }
}

impl std::fmt::Display for Shortcut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.accelerator)
    }
}

/// Accelerator parse failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShortcutError {
    #[error("unknown modifier <{0}>")]
    UnknownModifier(String),

    #[error("unterminated modifier in {0:?}")]
    Unterminated(String),

    #[error("missing key in {0:?}")]
    MissingKey(String),

    #[error("unsupported key {0:?}")]
    UnknownKey(String),
}

impl FromStr for Shortcut {
    type Err = ShortcutError;

    fn from_str(accelerator: &str) -> Result<Self, Self::Err> {
        let mut modifiers = ModifierState::default();
        let mut rest = accelerator.trim();

        while let Some(tail) = rest.strip_prefix('<') {
            let end = tail
                .find('>')
                .ok_or_else(|| ShortcutError::Unterminated(accelerator.to_string()))?;
            match tail[..end].to_ascii_lowercase().as_str() {
                "control" | "ctrl" | "primary" => modifiers.control = true,
                "alt" | "mod1" => modifiers.alt = true,
                "shift" => modifiers.shift = true,
                "super" | "meta" | "mod4" => modifiers.logo = true,
                other => return Err(ShortcutError::UnknownModifier(other.to_string())),
            }
            rest = &tail[end + 1..];
        }

        if rest.is_empty() {
            return Err(ShortcutError::MissingKey(accelerator.to_string()));
        }
        let key = key_from_name(rest).ok_or_else(|| ShortcutError::UnknownKey(rest.to_string()))?;

        Ok(Self {
            modifiers,
            key,
            accelerator: accelerator.trim().to_string(),
        })
    }
}

#[rustfmt::skip]
const LETTERS: [Key; 26] = [
    Key::KEY_A, Key::KEY_B, Key::KEY_C, Key::KEY_D, Key::KEY_E, Key::KEY_F, Key::KEY_G,
    Key::KEY_H, Key::KEY_I, Key::KEY_J, Key::KEY_K, Key::KEY_L, Key::KEY_M, Key::KEY_N,
    Key::KEY_O, Key::KEY_P, Key::KEY_Q, Key::KEY_R, Key::KEY_S, Key::KEY_T, Key::KEY_U,
    Key::KEY_V, Key::KEY_W, Key::KEY_X, Key::KEY_Y, Key::KEY_Z,
];

#[rustfmt::skip]
const DIGITS: [Key; 10] = [
    Key::KEY_0, Key::KEY_1, Key::KEY_2, Key::KEY_3, Key::KEY_4,
    Key::KEY_5, Key::KEY_6, Key::KEY_7, Key::KEY_8, Key::KEY_9,
];

#[rustfmt::skip]
const FUNCTION_KEYS: [Key; 12] = [
    Key::KEY_F1, Key::KEY_F2, Key::KEY_F3, Key::KEY_F4, Key::KEY_F5, Key::KEY_F6,
    Key::KEY_F7, Key::KEY_F8, Key::KEY_F9, Key::KEY_F10, Key::KEY_F11, Key::KEY_F12,
];

/// Resolve a GDK key name to an evdev key
fn key_from_name(name: &str) -> Option<Key> {
    let lower = name.to_ascii_lowercase();
    let mut chars = lower.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return match c {
            'a'..='z' => Some(LETTERS[(c as u8 - b'a') as usize]),
            '0'..='9' => Some(DIGITS[(c as u8 - b'0') as usize]),
            _ => None,
        };
    }

    if let Some(n) = lower.strip_prefix('f').and_then(|n| n.parse::<usize>().ok()) {
        return (1..=FUNCTION_KEYS.len())
            .contains(&n)
            .then(|| FUNCTION_KEYS[n - 1]);
    }

    match lower.as_str() {
        "space" => Some(Key::KEY_SPACE),
        "return" | "enter" => Some(Key::KEY_ENTER),
        "escape" => Some(Key::KEY_ESC),
        "tab" => Some(Key::KEY_TAB),
        "grave" => Some(Key::KEY_GRAVE),
        "backspace" => Some(Key::KEY_BACKSPACE),
        "insert" => Some(Key::KEY_INSERT),
        "pause" => Some(Key::KEY_PAUSE),
        _ => None,
    }
}
