//! Desktop notifications for completions and failures

use tracing::{debug, warn};

use crate::config::NotificationConfig;
use crate::events::ControllerEvent;

const APP_NAME: &str = "Voxput";
const ICON: &str = "audio-input-microphone-symbolic";

/// A notification ready to be shown
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopNotification {
    pub summary: String,
    pub body: String,
}

/// Where notifications end up
pub trait NotificationSink {
    fn show(&self, notification: DesktopNotification);
}

/// Sends notifications to the freedesktop notification service
pub struct DesktopSink;

impl NotificationSink for DesktopSink {
    fn show(&self, notification: DesktopNotification) {
        // The notification client blocks on its own bus round-trip.
        tokio::task::spawn_blocking(move || {
            let shown = notify_rust::Notification::new()
                .appname(APP_NAME)
                .icon(ICON)
                .summary(&notification.summary)
                .body(&notification.body)
                .show();
            if let Err(e) = shown {
                warn!(error = %e, "failed to show notification");
            }
        });
    }
}

/// Turns controller events into desktop notifications
pub struct Notifier<S: NotificationSink> {
    config: NotificationConfig,
    sink: S,
}

impl<S: NotificationSink> Notifier<S> {
    pub fn new(config: NotificationConfig, sink: S) -> Self {
        Self { config, sink }
    }

    pub fn handle(&self, event: &ControllerEvent) {
        if let Some(notification) = self.notification_for(event) {
            debug!(summary = %notification.summary, "showing notification");
            self.sink.show(notification);
        }
    }

    fn notification_for(&self, event: &ControllerEvent) -> Option<DesktopNotification> {
        match event {
            ControllerEvent::Completion { transcript } if self.config.show_transcript => {
                Some(DesktopNotification {
                    summary: "Transcription complete".to_string(),
                    body: transcript.clone(),
                })
            }
            ControllerEvent::Failure => Some(DesktopNotification {
                summary: "Voxput error".to_string(),
                body: "Recording or transcription failed.".to_string(),
            }),
            _ => None,
        }
    }
}
