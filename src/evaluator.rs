//! Transaction evaluation: lookup, feature extraction, scoring and the
//! threshold decision.
//!
//! Every failure along the way is folded into [`Action::Indeterminate`];
//! the checking entry points never return an error or panic to the caller.

use crate::error::EvaluationError;
use crate::feature_extractor::FeatureExtractor;
use crate::patrol::Patrol;
use crate::types::{Action, CheckReport, Decision, ID_COLUMN};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, warn};

/// Read-only view of a [`Patrol`] that checks transactions against it
pub struct TransactionEvaluator<'a> {
    patrol: &'a Patrol,
}

impl<'a> TransactionEvaluator<'a> {
    pub fn new(patrol: &'a Patrol) -> Self {
        Self { patrol }
    }

    /// Return `Lock` when the transaction's fraud probability is at or above
    /// the threshold, `Allow` when below, and `Indeterminate` when no
    /// decision can be made.
    ///
    /// Each call is independent of every previous call.
    pub fn check_transaction(&self, transaction_id: &str) -> Action {
        self.check_with_report(transaction_id).action
    }

    /// As [`check_transaction`](Self::check_transaction), returning the full
    /// check record. Emits exactly one completion event per call.
    pub fn check_with_report(&self, transaction_id: &str) -> CheckReport {
        let threshold = self.patrol.threshold();

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| self.evaluate(transaction_id)))
        {
            Ok(result) => result,
            Err(payload) => Err(EvaluationError::ScoringPanicked(panic_message(payload.as_ref()))),
        };

        let report = match outcome {
            Ok(decision) => CheckReport::new(transaction_id.to_string(), decision.action, threshold)
                .with_probability(decision.probability),
            Err(e) => {
                warn!(transaction_id = %transaction_id, error = %e, "Transaction check failed");
                CheckReport::new(
                    transaction_id.to_string(),
                    Action::Indeterminate,
                    threshold,
                )
                .with_error(e.to_string())
            }
        };

        info!(
            transaction_id = %transaction_id,
            outcome = %report.action,
            "Check for transaction completed"
        );
        report
    }

    /// Run the check without folding failures
    pub fn evaluate(&self, transaction_id: &str) -> Result<Decision, EvaluationError> {
        let data = self.patrol.data().ok_or(EvaluationError::DataNotLoaded)?;
        let model = self.patrol.model().ok_or(EvaluationError::ModelNotLoaded)?;
        let id_column = data
            .column_index(ID_COLUMN)
            .ok_or_else(|| EvaluationError::MissingIdColumn {
                column: ID_COLUMN.to_string(),
            })?;

        // Existence is checked by substring containment, extraction by exact
        // equality. An id that only occurs inside longer ids passes the first
        // check and fails the second.
        let partial = data.count_ids_containing(id_column, transaction_id);
        if partial == 0 {
            return Err(EvaluationError::TransactionNotFound {
                id: transaction_id.to_string(),
            });
        }

        let rows = data.rows_with_id(id_column, transaction_id);
        let row_index = match rows.as_slice() {
            [index] => *index,
            [] => {
                return Err(EvaluationError::PartialIdMatch {
                    id: transaction_id.to_string(),
                    matches: partial,
                })
            }
            _ => {
                return Err(EvaluationError::DuplicateTransaction {
                    id: transaction_id.to_string(),
                    count: rows.len(),
                })
            }
        };

        let features = FeatureExtractor::new(self.patrol.feature_list()).extract(data, row_index)?;

        let probability = model
            .score_probability(&features)
            .map_err(|e| EvaluationError::Scoring(format!("{:#}", e)))?;

        if !(0.0..=1.0).contains(&probability) {
            return Err(EvaluationError::ProbabilityOutOfRange(probability));
        }

        let threshold = self.patrol.threshold();
        let action = Action::from_probability(probability, threshold);

        debug!(
            transaction_id = %transaction_id,
            model = %model.name(),
            probability = probability,
            threshold = threshold,
            "Transaction scored"
        );

        Ok(Decision {
            action,
            probability,
            threshold,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
