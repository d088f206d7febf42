//! Per-invocation context handed to tool handlers.
//!
//! Handlers report progress through [`CallContext::notify`]. Notifications are
//! queued on an unbounded channel owned by the session, so everything a
//! handler emits is enqueued before its return value is observed and the
//! session can flush them ahead of the terminal response.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::trace;

/// Severity of a notification event, ordered from least to most severe.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Detailed debugging output.
    Debug,
    /// Informational progress.
    #[default]
    Info,
    /// Normal but significant events.
    Notice,
    /// Something unexpected but recoverable.
    Warning,
    /// An operation failed.
    Error,
    /// A component is unusable.
    Critical,
    /// Action must be taken immediately.
    Alert,
    /// The system is unusable.
    Emergency,
}

impl LogLevel {
    /// Returns the lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
            Self::Alert => "alert",
            Self::Emergency => "emergency",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "notice" => Ok(Self::Notice),
            "warning" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            "alert" => Ok(Self::Alert),
            "emergency" => Ok(Self::Emergency),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

/// Asynchronous, non-terminal event emitted while a call is running.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Event severity.
    pub level: LogLevel,
    /// Name of the emitting tool.
    pub logger: String,
    /// Arbitrary structured payload.
    pub data: Value,
}

/// Sending half used by handlers to emit notifications.
///
/// A disabled notifier silently drops everything; sessions that did not
/// negotiate notification support hand out disabled notifiers.
#[derive(Clone, Debug, Default)]
pub struct Notifier {
    sink: Option<UnboundedSender<Notification>>,
    min_level: LogLevel,
}

impl Notifier {
    /// Creates a notifier forwarding events at or above `min_level`.
    #[must_use]
    pub fn new(sink: UnboundedSender<Notification>, min_level: LogLevel) -> Self {
        Self {
            sink: Some(sink),
            min_level,
        }
    }

    /// Creates a notifier that drops all events.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Returns `true` when events can reach a session.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    /// Queues a notification. Returns `false` when it was filtered or dropped.
    pub fn send(&self, notification: Notification) -> bool {
        let Some(sink) = &self.sink else {
            return false;
        };
        if notification.level < self.min_level {
            return false;
        }
        if sink.send(notification).is_err() {
            trace!("notification dropped: session gone");
            return false;
        }
        true
    }
}

/// Context passed to a tool handler for a single invocation.
#[derive(Clone, Debug)]
pub struct CallContext {
    tool: String,
    notifier: Notifier,
}

impl CallContext {
    /// Creates a context for the named tool.
    #[must_use]
    pub fn new(tool: impl Into<String>, notifier: Notifier) -> Self {
        Self {
            tool: tool.into(),
            notifier,
        }
    }

    /// Creates a context whose notifications go nowhere.
    #[must_use]
    pub fn detached(tool: impl Into<String>) -> Self {
        Self::new(tool, Notifier::disabled())
    }

    /// Returns the name of the tool being invoked.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Emits a notification attributed to the current tool.
    pub fn notify(&self, level: LogLevel, data: impl Into<Value>) -> bool {
        self.notifier.send(Notification {
            level,
            logger: self.tool.clone(),
            data: data.into(),
        })
    }

    /// Emits an `info` notification.
    pub fn info(&self, message: impl Into<String>) -> bool {
        self.notify(LogLevel::Info, Value::String(message.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn filters_below_min_level() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = CallContext::new("ping", Notifier::new(tx, LogLevel::Warning));

        assert!(!ctx.info("ignored"));
        assert!(ctx.notify(LogLevel::Error, "kept"));

        let received = rx.try_recv().unwrap();
        assert_eq!(received.level, LogLevel::Error);
        assert_eq!(received.logger, "ping");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn disabled_notifier_drops_everything() {
        let ctx = CallContext::detached("ping");
        assert!(!ctx.notify(LogLevel::Emergency, "nobody listening"));
    }

    #[test]
    fn parses_levels() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert!("loud".parse::<LogLevel>().is_err());
        assert!(LogLevel::Debug < LogLevel::Emergency);
    }
}
