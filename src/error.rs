//! Error types for configuring the patrol and evaluating transactions

use thiserror::Error;

/// Errors raised synchronously by the configuration setters.
///
/// These are setup mistakes: the caller must not go on to evaluate
/// transactions against a store that failed to configure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("the loaded model does not expose a probability output and cannot be used: {reason}")]
    InvalidModel { reason: String },

    #[error("failed to load model from {path}: {message}")]
    ModelLoad { path: String, message: String },

    #[error("unsupported model format for {path} (expected .onnx or .json)")]
    UnsupportedModelFormat { path: String },

    #[error("a table containing tr_id and all corresponding variables must be provided")]
    MissingData,

    #[error("transaction data must be a table: {reason}")]
    InvalidDataType { reason: String },

    #[error("failed to load transaction data from {path}: {message}")]
    DataLoad { path: String, message: String },

    #[error("the provided data does not include all required features, missing: {missing:?}")]
    MissingFeatures { missing: Vec<String> },

    #[error("data has not been loaded, call set_data before setting the feature list")]
    DataNotLoaded,

    #[error("threshold must be a finite real number, got {value}")]
    InvalidThresholdType { value: String },

    #[error("threshold must be between 0 and 1, got {value}")]
    ThresholdRange { value: f64 },
}

/// Errors raised while evaluating a single transaction.
///
/// None of these escape `check_transaction`; they are folded into
/// [`Action::Indeterminate`](crate::types::Action::Indeterminate).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("data has not been loaded, load the table containing the transaction with set_data")]
    DataNotLoaded,

    #[error("no scoring model has been loaded")]
    ModelNotLoaded,

    #[error("the loaded data has no {column} column")]
    MissingIdColumn { column: String },

    #[error("transaction id {id} not found in data")]
    TransactionNotFound { id: String },

    #[error("transaction id {id} only partially matches {matches} id(s) in data")]
    PartialIdMatch { id: String, matches: usize },

    #[error("multiple transactions ({count}) found for transaction id {id}")]
    DuplicateTransaction { id: String, count: usize },

    #[error("mismatch on number of features, got: {got}, expected: {expected}")]
    FeatureCountMismatch { got: usize, expected: usize },

    #[error("feature {feature} is not numeric")]
    NonNumericFeature { feature: String },

    #[error("scoring failed: {0}")]
    Scoring(String),

    #[error("scoring panicked: {0}")]
    ScoringPanicked(String),

    #[error("model returned probability {0} outside [0, 1]")]
    ProbabilityOutOfRange(f64),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
