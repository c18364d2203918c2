use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity attached to every message the engine reports.
///
/// Ordered so that `Info < Warning < Fatal`; the highest severity of a
/// [`MessageLog`] is simply the maximum over its entries.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// One message produced while the engine handled a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineMessage {
    pub severity: Severity,
    /// Engine-side origin of the message (routine or subsystem name)
    pub tag: String,
    pub message: String,
}

impl EngineMessage {
    pub fn new(severity: Severity, tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            tag: tag.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for EngineMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.tag, self.message)
    }
}

/// Ordered message list with a running "highest severity seen".
#[derive(Clone, Debug, Default)]
pub struct MessageLog {
    entries: Vec<EngineMessage>,
    highest: Option<Severity>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: EngineMessage) {
        self.highest = self.highest.max(Some(message.severity));
        self.entries.push(message);
    }

    /// Highest severity over all entries, `None` when empty.
    pub fn highest(&self) -> Option<Severity> {
        self.highest
    }

    pub fn is_fatal(&self) -> bool {
        self.highest == Some(Severity::Fatal)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[EngineMessage] {
        &self.entries
    }
}
