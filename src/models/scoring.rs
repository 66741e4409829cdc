//! The scoring capability consumed by the patrol

use crate::feature_extractor::FeatureRow;
use anyhow::Result;

/// A model that turns a feature row into a fraud probability.
///
/// The patrol treats implementations as opaque: it only checks at load time
/// that the model exposes a probability output, then calls
/// [`ScoringModel::score_probability`] once per check.
pub trait ScoringModel: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Whether this model produces class probabilities.
    ///
    /// Models reporting `false` are rejected by `Patrol::set_model`.
    fn has_probability_output(&self) -> bool {
        true
    }

    /// Probability of the positive (fraud) class, expected in [0, 1]
    fn score_probability(&self, row: &FeatureRow) -> Result<f64>;
}
