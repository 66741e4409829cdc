//! Transaction Patrol
//!
//! A decision gate for single financial transactions: look the transaction
//! up in a pre-loaded table, score its features with a fraud model and
//! return `LOCK` when the probability reaches the threshold, `ALLOW` when it
//! does not, or an indeterminate outcome when no decision can be made.

pub mod config;
pub mod error;
pub mod evaluator;
pub mod feature_extractor;
pub mod models;
pub mod patrol;
pub mod types;

pub use config::AppConfig;
pub use error::{ConfigError, EvaluationError};
pub use evaluator::TransactionEvaluator;
pub use feature_extractor::{FeatureExtractor, FeatureRow};
pub use models::{ModelLoader, ScoringModel};
pub use patrol::{Patrol, PatrolBuilder, SharedPatrol};
pub use types::{Action, CheckReport, Decision, TransactionTable};
