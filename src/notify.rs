//! User-facing notifications (the "toasts")
//!
//! Flows never print directly; they hand a [`Notification`] to whatever
//! [`Notifier`] the session was built with.

use console::style;
use tracing::{info, warn};

/// Delimiter after which provider errors carry call-stack context
pub const CALL_CONTEXT_DELIMITER: &str = "Contract Call:";

/// Fallback body when an error carries no message of its own
pub const GENERIC_FAILURE: &str = "Failed to submit transaction. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

impl Notification {
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: Variant::Default,
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            variant: Variant::Destructive,
        }
    }

    pub fn is_error(&self) -> bool {
        self.variant == Variant::Destructive
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Prints notifications to the terminal and mirrors them to the log
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, n: Notification) {
        match n.variant {
            Variant::Default => {
                info!(title = %n.title, "{}", n.description);
                println!("{} {} {}", style("●").green(), style(&n.title).bold(), n.description);
            }
            Variant::Destructive => {
                warn!(title = %n.title, "{}", n.description);
                println!("{} {} {}", style("✗").red(), style(&n.title).red().bold(), n.description);
            }
        }
    }
}

/// Strip verbose call context from a provider error message.
///
/// Returns [`GENERIC_FAILURE`] when nothing is left.
pub fn truncate_error_message(message: &str) -> String {
    let head = message
        .split(CALL_CONTEXT_DELIMITER)
        .next()
        .unwrap_or_default()
        .trim();

    if head.is_empty() {
        GENERIC_FAILURE.to_string()
    } else {
        head.to_string()
    }
}
