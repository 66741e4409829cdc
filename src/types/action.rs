//! Check outcomes and the per-check report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Text returned to callers when no action could be generated
pub const INDETERMINATE_SENTINEL: &str = "Action cannot be generated.";

/// Outcome of a transaction check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    /// Probability below threshold
    Allow,
    /// Probability at or above threshold
    Lock,
    /// Validation or scoring failed
    Indeterminate,
}

impl Action {
    /// Classify a probability against a threshold
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            Action::Lock
        } else {
            Action::Allow
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Allow => f.write_str("ALLOW"),
            Action::Lock => f.write_str("LOCK"),
            Action::Indeterminate => f.write_str(INDETERMINATE_SENTINEL),
        }
    }
}

/// A decided check: the action and the probability behind it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub probability: f64,
    pub threshold: f64,
}

/// Audit record for one call to the evaluator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    /// Unique check identifier
    pub check_id: String,

    /// Transaction id as supplied by the caller
    pub transaction_id: String,

    pub action: Action,

    /// Model probability, when scoring got that far
    pub probability: Option<f64>,

    /// Threshold in force for this check
    pub threshold: f64,

    /// Diagnostic for indeterminate outcomes
    pub error: Option<String>,

    pub checked_at: DateTime<Utc>,
}

impl CheckReport {
    pub fn new(transaction_id: String, action: Action, threshold: f64) -> Self {
        Self {
            check_id: uuid::Uuid::new_v4().to_string(),
            transaction_id,
            action,
            probability: None,
            threshold,
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = Some(probability);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_from_probability() {
        assert_eq!(Action::from_probability(0.8, 0.5), Action::Lock);
        assert_eq!(Action::from_probability(0.5, 0.5), Action::Lock);
        assert_eq!(Action::from_probability(0.3, 0.5), Action::Allow);
        assert_eq!(Action::from_probability(0.0, 0.0), Action::Lock);
        assert_eq!(Action::from_probability(0.99, 1.0), Action::Allow);
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::Allow.to_string(), "ALLOW");
        assert_eq!(Action::Lock.to_string(), "LOCK");
        assert_eq!(Action::Indeterminate.to_string(), INDETERMINATE_SENTINEL);
    }

    #[test]
    fn test_report_serialization() {
        let report = CheckReport::new("T1".to_string(), Action::Lock, 0.5).with_probability(0.8);

        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"LOCK\""));

        let deserialized: CheckReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.check_id, deserialized.check_id);
        assert_eq!(deserialized.action, Action::Lock);
        assert_eq!(deserialized.probability, Some(0.8));
        assert!(deserialized.error.is_none());
    }
}
