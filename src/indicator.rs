//! Indicator view model
//!
//! What a panel indicator shows for a given `(state, transcript)`; the
//! widgets themselves live elsewhere.

use crate::state::LifecycleState;

/// Transcript previews longer than this are cut and end in an ellipsis
const TRANSCRIPT_PREVIEW_CHARS: usize = 80;

/// Presentation of one reconciled state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndicatorView {
    pub status: &'static str,
    pub icon_name: &'static str,
    pub style_class: &'static str,
    pub toggle_label: &'static str,
    /// Shown only while idle with a retained transcript
    pub transcript_row: Option<String>,
    /// Daemon's last error, shown only in the error state
    pub error_row: Option<String>,
}

impl IndicatorView {
    pub fn new(state: LifecycleState, transcript: Option<&str>, last_error: Option<&str>) -> Self {
        let (status, icon_name, style_class) = match state {
            LifecycleState::Idle => (
                "Idle",
                "audio-input-microphone-muted-symbolic",
                "voxput-idle",
            ),
            LifecycleState::Recording => (
                "Recording…",
                "audio-input-microphone-symbolic",
                "voxput-recording",
            ),
            LifecycleState::Transcribing => (
                "Transcribing…",
                "emblem-synchronizing-symbolic",
                "voxput-transcribing",
            ),
            LifecycleState::Error => ("Error", "dialog-error-symbolic", "voxput-error"),
        };

        let toggle_label = if state == LifecycleState::Recording {
            "Stop Recording"
        } else {
            "Start Recording"
        };

        let transcript_row = match (state, transcript) {
            (LifecycleState::Idle, Some(text)) if !text.is_empty() => Some(preview(text)),
            _ => None,
        };
        let error_row = match (state, last_error) {
            (LifecycleState::Error, Some(error)) if !error.is_empty() => Some(preview(error)),
            _ => None,
        };

        Self {
            status,
            icon_name,
            style_class,
            toggle_label,
            transcript_row,
            error_row,
        }
    }
}

fn preview(text: &str) -> String {
    if text.chars().count() <= TRANSCRIPT_PREVIEW_CHARS {
        return text.to_string();
    }
    let mut short: String = text.chars().take(TRANSCRIPT_PREVIEW_CHARS).collect();
    short.push('…');
    short
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_shows_transcript() {
        let view = IndicatorView::new(LifecycleState::Idle, Some("hello world"), None);
        assert_eq!(view.status, "Idle");
        assert_eq!(view.toggle_label, "Start Recording");
        assert_eq!(view.transcript_row.as_deref(), Some("hello world"));
    }

    #[test]
    fn test_busy_states_hide_transcript() {
        for state in [
            LifecycleState::Recording,
            LifecycleState::Transcribing,
            LifecycleState::Error,
        ] {
            let view = IndicatorView::new(state, Some("retained"), None);
            assert!(view.transcript_row.is_none(), "{state} should hide transcript");
        }
    }

    #[test]
    fn test_error_row_only_in_error_state() {
        let view = IndicatorView::new(LifecycleState::Error, None, Some("mic unplugged"));
        assert_eq!(view.status, "Error");
        assert_eq!(view.error_row.as_deref(), Some("mic unplugged"));

        let view = IndicatorView::new(LifecycleState::Idle, None, Some("mic unplugged"));
        assert!(view.error_row.is_none());
    }

    #[test]
    fn test_recording_offers_stop() {
        let view = IndicatorView::new(LifecycleState::Recording, None, None);
        assert_eq!(view.status, "Recording…");
        assert_eq!(view.icon_name, "audio-input-microphone-symbolic");
        assert_eq!(view.style_class, "voxput-recording");
        assert_eq!(view.toggle_label, "Stop Recording");
    }

    #[test]
    fn test_long_transcript_is_truncated() {
        let text = "é".repeat(100);
        let view = IndicatorView::new(LifecycleState::Idle, Some(&text), None);
        let row = view.transcript_row.unwrap();
        assert_eq!(row.chars().count(), TRANSCRIPT_PREVIEW_CHARS + 1);
        assert!(row.ends_with('…'));
    }

    #[test]
    fn test_exact_length_is_not_truncated() {
        let text = "a".repeat(TRANSCRIPT_PREVIEW_CHARS);
        let view = IndicatorView::new(LifecycleState::Idle, Some(&text), None);
        assert_eq!(view.transcript_row, Some(text));
    }
}
