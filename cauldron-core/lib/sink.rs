//! Output messages and the ordered sink that collects them.
//!
//! The sink is the single source of truth for what the learner sees in the terminal panel.
//! Messages are appended in the order they are produced and are never edited afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The category of an output message, used by the display to pick a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// `console.log` output.
    Log,

    /// `console.error` output and every caught failure.
    Error,

    /// `console.warn` output.
    Warn,

    /// `console.info` output and host notices such as cancellation.
    Info,

    /// The value returned by a submission, or a host success notice.
    Success,
}

/// One line of output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputMessage {
    /// The rendered text.
    pub text: String,

    /// The message category.
    pub kind: MessageKind,

    /// Creation time in Unix milliseconds.
    pub timestamp: i64,
}

/// An append-only, ordered log of output messages.
///
/// Every [`clear`](OutputSink::clear) starts a new epoch, so followers holding an
/// [`OutputCursor`] from before the reset can tell that their position no longer applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputSink {
    messages: Vec<OutputMessage>,
    epoch: u64,
}

/// A follower's position in an [`OutputSink`].
///
/// The default cursor points at the start of the first epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct OutputCursor {
    epoch: u64,
    offset: usize,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl MessageKind {
    /// Get the string representation of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Success => "success",
        }
    }

    /// Parses the console method name used by the script harness.
    pub fn from_console_method(method: &str) -> Option<Self> {
        match method {
            "log" => Some(Self::Log),
            "error" => Some(Self::Error),
            "warn" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "success" => Some(Self::Success),
            _ => None,
        }
    }
}

impl OutputMessage {
    /// Creates a message stamped with the current time.
    pub fn new(kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Creates a `log` message.
    pub fn log(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Log, text)
    }

    /// Creates an `error` message.
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Error, text)
    }

    /// Creates an `info` message.
    pub fn info(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Info, text)
    }

    /// Creates a `success` message.
    pub fn success(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Success, text)
    }
}

impl OutputSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message at the end of the log.
    pub fn push(&mut self, message: OutputMessage) {
        self.messages.push(message);
    }

    /// Drops every message and starts a new epoch.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.epoch += 1;
    }

    /// Number of messages currently held.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the sink holds no messages.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// All messages in display order.
    pub fn as_slice(&self) -> &[OutputMessage] {
        &self.messages
    }

    /// Iterates the messages in display order.
    pub fn iter(&self) -> impl Iterator<Item = &OutputMessage> {
        self.messages.iter()
    }

    /// A cursor positioned after the last message.
    pub fn cursor(&self) -> OutputCursor {
        OutputCursor {
            epoch: self.epoch,
            offset: self.messages.len(),
        }
    }

    /// Messages appended after `cursor`.
    ///
    /// If the sink was cleared since the cursor was taken, the whole log is returned.
    pub fn since(&self, cursor: OutputCursor) -> &[OutputMessage] {
        if cursor.epoch != self.epoch {
            return &self.messages;
        }

        self.messages.get(cursor.offset..).unwrap_or(&self.messages)
    }

    /// The plain text of the log, one message per line, as copied from the terminal panel.
    pub fn transcript(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'a> IntoIterator for &'a OutputSink {
    type Item = &'a OutputMessage;
    type IntoIter = std::slice::Iter<'a, OutputMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_preserves_append_order() {
        let mut sink = OutputSink::new();
        sink.push(OutputMessage::log("one"));
        sink.push(OutputMessage::error("two"));
        sink.push(OutputMessage::success("three"));

        let texts: Vec<_> = sink.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(sink.as_slice()[1].kind, MessageKind::Error);
    }

    #[test]
    fn test_sink_clear_resets_to_empty() {
        let mut sink = OutputSink::new();
        sink.push(OutputMessage::log("x"));
        sink.clear();
        assert!(sink.is_empty());
        assert_eq!(sink.len(), 0);
    }

    fn texts(messages: &[OutputMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.text.as_str()).collect()
    }

    #[test]
    fn test_since_returns_tail() {
        let mut sink = OutputSink::new();
        sink.push(OutputMessage::log("a"));
        let cursor = sink.cursor();
        sink.push(OutputMessage::log("b"));

        assert_eq!(texts(sink.since(cursor)), vec!["b"]);
        assert!(sink.since(sink.cursor()).is_empty());
        assert_eq!(texts(sink.since(OutputCursor::default())), vec!["a", "b"]);
    }

    #[test]
    fn test_since_after_reset_returns_whole_new_log() {
        let mut sink = OutputSink::new();
        sink.push(OutputMessage::log("a"));
        sink.push(OutputMessage::log("b"));
        let cursor = sink.cursor();

        // The new log outgrows the stale offset.
        sink.clear();
        sink.push(OutputMessage::log("c"));
        sink.push(OutputMessage::log("d"));
        sink.push(OutputMessage::log("e"));

        assert_eq!(texts(sink.since(cursor)), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_transcript_joins_lines() {
        let mut sink = OutputSink::new();
        sink.push(OutputMessage::log("hola"));
        sink.push(OutputMessage::info("mundo"));
        assert_eq!(sink.transcript(), "hola\nmundo");
    }

    #[test]
    fn test_message_kind_serializes_lowercase() {
        let message = OutputMessage {
            text: "→ 3".to_string(),
            kind: MessageKind::Success,
            timestamp: 42,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["kind"], "success");
        assert_eq!(json["timestamp"], 42);
        assert_eq!(MessageKind::from_console_method("warn"), Some(MessageKind::Warn));
        assert_eq!(MessageKind::from_console_method("debug"), None);
    }
}
