//! User-facing notifications: one-line heads-up messages and toasts.

use std::io::Write;

use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Failure,
}

impl Severity {
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Info => "·",
            Severity::Success => "✓",
            Severity::Failure => "✗",
        }
    }
}

/// How the current command was started.  Routine play/pause/stop feedback is
/// only shown for explicit user launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    UserInitiated,
    Background,
}

impl Launch {
    pub fn from_background_flag(background: bool) -> Self {
        if background {
            Launch::Background
        } else {
            Launch::UserInitiated
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Launch::UserInitiated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    /// Heads-up display rather than a toast.
    pub hud: bool,
}

pub trait Notifier {
    fn notify(&self, notification: Notification);

    fn hud(&self, message: &str) {
        self.notify(Notification {
            message: message.to_string(),
            severity: Severity::Info,
            hud: true,
        });
    }

    fn toast(&self, message: &str, severity: Severity) {
        self.notify(Notification {
            message: message.to_string(),
            severity,
            hud: false,
        });
    }
}

/// Prints to the terminal: failures on stderr, everything else on stdout.
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, n: Notification) {
        info!("notify: {:?} {}", n.severity, n.message);
        let line = if n.hud {
            n.message
        } else {
            format!("{} {}", n.severity.icon(), n.message)
        };
        if n.severity == Severity::Failure {
            let _ = writeln!(std::io::stderr(), "{}", line);
        } else {
            let _ = writeln!(std::io::stdout(), "{}", line);
        }
    }
}

/// Forwards notifications into the terminal UI's toast queue.
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, n: Notification) {
        info!("notify: {:?} {}", n.severity, n.message);
        let _ = self.tx.send(n);
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct RecordingNotifier {
    seen: std::sync::Mutex<Vec<Notification>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|n| n.message.clone())
            .collect()
    }

    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_flag() {
        assert!(Launch::from_background_flag(false).is_user());
        assert!(!Launch::from_background_flag(true).is_user());
    }

    #[test]
    fn test_channel_notifier_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier = ChannelNotifier::new(tx);
        notifier.hud("Now streaming Radio-T live");
        notifier.toast("Failed to stream episode", Severity::Failure);

        let first = rx.try_recv().unwrap();
        assert!(first.hud);
        assert_eq!(first.severity, Severity::Info);
        let second = rx.try_recv().unwrap();
        assert!(!second.hud);
        assert_eq!(second.severity, Severity::Failure);
        assert_eq!(second.message, "Failed to stream episode");
    }
}
