use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Why an event was raised.
///
/// Both kinds are reconciled the same way; the kind only shows up in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The node appeared in the feed (initial list or watch add)
    Created,
    /// The node changed and does not carry the target label
    Updated,
}

impl EventKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Updated => "updated",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Queue-resident record: "something worth reconciling happened to `key`".
///
/// Equality and hashing only look at `key`. The work queue relies on this to
/// collapse a `Created` and an `Updated` event for the same node into one
/// pending item, to keep a node from being processed by two workers at once,
/// and to count retries per node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub key: String,
    pub kind: EventKind,
}

impl Event {
    pub fn new(key: impl Into<String>, kind: EventKind) -> Self {
        Self {
            key: key.into(),
            kind,
        }
    }

    pub fn created(key: impl Into<String>) -> Self {
        Self::new(key, EventKind::Created)
    }

    pub fn updated(key: impl Into<String>) -> Self {
        Self::new(key, EventKind::Updated)
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Event {}

impl Hash for Event {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.key, self.kind)
    }
}
