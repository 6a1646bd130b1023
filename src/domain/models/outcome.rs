use serde::{Deserialize, Serialize};

/// Classification of one processed event. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum ReconcileOutcome {
    /// OS does not match, or the label is already in place
    NoActionNeeded,
    /// The label patch was applied
    Labeled,
    /// Processing failed; the reason is the rendered error
    Failed(String),
}

impl ReconcileOutcome {
    /// Classify a reconcile result, rendering the error chain on failure.
    pub fn from_result<E: std::fmt::Display>(result: &Result<Self, E>) -> Self {
        match result {
            Ok(outcome) => outcome.clone(),
            Err(err) => Self::Failed(format!("{err:#}")),
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            Self::NoActionNeeded | Self::Labeled => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoActionNeeded => "no_action_needed",
            Self::Labeled => "labeled",
            Self::Failed(_) => "failed",
        }
    }
}
