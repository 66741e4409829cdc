//! The patrol: a validated configuration of model, data, feature list and
//! threshold.
//!
//! Each setter validates its input against whatever else is already loaded
//! and either commits the new value or returns a [`ConfigError`]. The one
//! exception is [`Patrol::set_feature_list`], which installs the list before
//! checking it, so a failed call leaves the rejected list in place.

use crate::error::{ConfigError, ConfigResult};
use crate::evaluator::TransactionEvaluator;
use crate::feature_extractor::DEFAULT_FEATURES;
use crate::models::loader::ModelLoader;
use crate::models::scoring::ScoringModel;
use crate::types::{Action, CheckReport, TransactionTable};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info};

/// Model artifact used when the caller names none
pub const DEFAULT_MODEL_PATH: &str = "models/hypertuned_xgb_model.onnx";

/// Optimal decision threshold of the default model
pub const DEFAULT_THRESHOLD: f64 = 0.2810381;

/// Feature list used when the caller names none
pub fn default_feature_list() -> Vec<String> {
    DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect()
}

/// Parse caller-supplied threshold text
pub fn parse_threshold(raw: &str) -> ConfigResult<f64> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidThresholdType {
            value: raw.to_string(),
        })
}

/// Configuration store read by the evaluator
#[derive(Clone)]
pub struct Patrol {
    model: Option<Arc<dyn ScoringModel>>,
    data: Option<Arc<TransactionTable>>,
    feature_list: Vec<String>,
    threshold: f64,
}

impl Patrol {
    /// A store with nothing loaded yet, to be populated through the setters
    pub fn empty() -> Self {
        Self {
            model: None,
            data: None,
            feature_list: Vec::new(),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn builder() -> PatrolBuilder {
        PatrolBuilder::default()
    }

    /// Install a scoring model.
    ///
    /// Rejects models without a probability output.
    pub fn set_model(&mut self, model: Arc<dyn ScoringModel>) -> ConfigResult<()> {
        if !model.has_probability_output() {
            return Err(ConfigError::InvalidModel {
                reason: format!("model {} has no probability output", model.name()),
            });
        }

        debug!(model = %model.name(), "Model set");
        self.model = Some(model);
        Ok(())
    }

    /// Load a model artifact from disk and install it
    pub fn set_model_path<P: AsRef<Path>>(&mut self, path: P) -> ConfigResult<()> {
        let model = ModelLoader::new().load(path.as_ref())?;
        self.set_model(model)
    }

    /// Install the transaction table
    pub fn set_data(&mut self, data: Option<TransactionTable>) -> ConfigResult<()> {
        let data = data.ok_or(ConfigError::MissingData)?;
        data.validate()?;

        debug!(
            rows = data.row_count(),
            columns = data.columns().len(),
            "Data set"
        );
        self.data = Some(Arc::new(data));
        Ok(())
    }

    /// Install a table given as JSON records or a JSON column map
    pub fn set_data_json(&mut self, data: Value) -> ConfigResult<()> {
        if data.is_null() {
            return self.set_data(None);
        }
        let table = TransactionTable::from_json(&data)?;
        self.set_data(Some(table))
    }

    /// Install the feature list, then check every name is a column of the
    /// current table.
    ///
    /// The list stays installed even when the check fails.
    pub fn set_feature_list<I, S>(&mut self, names: I) -> ConfigResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_list = names.into_iter().map(Into::into).collect();

        let data = self.data.as_ref().ok_or(ConfigError::DataNotLoaded)?;
        let missing: Vec<String> = self
            .feature_list
            .iter()
            .filter(|f| !data.has_column(f))
            .cloned()
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::MissingFeatures { missing });
        }

        debug!(features = ?self.feature_list, "Feature list set");
        Ok(())
    }

    /// Set the decision threshold; must be a finite value in [0, 1]
    pub fn set_threshold(&mut self, threshold: f64) -> ConfigResult<()> {
        if !threshold.is_finite() {
            return Err(ConfigError::InvalidThresholdType {
                value: threshold.to_string(),
            });
        }

        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::ThresholdRange { value: threshold });
        }

        debug!(threshold = threshold, "Threshold set");
        self.threshold = threshold;
        Ok(())
    }

    pub fn model(&self) -> Option<&Arc<dyn ScoringModel>> {
        self.model.as_ref()
    }

    pub fn data(&self) -> Option<&TransactionTable> {
        self.data.as_deref()
    }

    pub fn feature_list(&self) -> &[String] {
        &self.feature_list
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn evaluator(&self) -> TransactionEvaluator<'_> {
        TransactionEvaluator::new(self)
    }

    /// Check one transaction; see [`TransactionEvaluator::check_transaction`]
    pub fn check_transaction(&self, transaction_id: &str) -> Action {
        self.evaluator().check_transaction(transaction_id)
    }

    pub fn check_with_report(&self, transaction_id: &str) -> CheckReport {
        self.evaluator().check_with_report(transaction_id)
    }
}

impl Default for Patrol {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Patrol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patrol")
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .field("rows", &self.data.as_ref().map(|d| d.row_count()))
            .field("feature_list", &self.feature_list)
            .field("threshold", &self.threshold)
            .finish()
    }
}

enum ModelSource {
    Path(PathBuf),
    Loaded(Arc<dyn ScoringModel>),
}

/// Staged construction of a [`Patrol`].
///
/// `build` applies the setters in the order model, data, feature list,
/// threshold, filling anything not given with the defaults. Data has no
/// default, so building without it fails with [`ConfigError::MissingData`].
pub struct PatrolBuilder {
    model: ModelSource,
    data: Option<TransactionTable>,
    feature_list: Vec<String>,
    threshold: f64,
}

impl Default for PatrolBuilder {
    fn default() -> Self {
        Self {
            model: ModelSource::Path(PathBuf::from(DEFAULT_MODEL_PATH)),
            data: None,
            feature_list: default_feature_list(),
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl PatrolBuilder {
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.model = ModelSource::Path(path.into());
        self
    }

    pub fn model(mut self, model: Arc<dyn ScoringModel>) -> Self {
        self.model = ModelSource::Loaded(model);
        self
    }

    pub fn data(mut self, data: TransactionTable) -> Self {
        self.data = Some(data);
        self
    }

    pub fn feature_list<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feature_list = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn build(self) -> ConfigResult<Patrol> {
        let mut patrol = Patrol::empty();

        match self.model {
            ModelSource::Path(path) => patrol.set_model_path(path)?,
            ModelSource::Loaded(model) => patrol.set_model(model)?,
        }
        patrol.set_data(self.data)?;
        patrol.set_feature_list(self.feature_list)?;
        patrol.set_threshold(self.threshold)?;

        info!(
            model = ?patrol.model().map(|m| m.name().to_string()),
            rows = patrol.data().map(TransactionTable::row_count).unwrap_or(0),
            features = patrol.feature_list().len(),
            threshold = patrol.threshold(),
            "Patrol configured"
        );
        Ok(patrol)
    }
}

/// A patrol shared between threads.
///
/// Readers take an immutable snapshot and evaluate against it. Writers are
/// serialised, apply a setter to a copy of the current snapshot, and
/// publish the copy only if the setter succeeded; a failed update leaves
/// the published snapshot untouched.
pub struct SharedPatrol {
    current: RwLock<Arc<Patrol>>,
    writer: Mutex<()>,
}

impl SharedPatrol {
    pub fn new(patrol: Patrol) -> Self {
        Self {
            current: RwLock::new(Arc::new(patrol)),
            writer: Mutex::new(()),
        }
    }

    /// The currently published configuration
    pub fn snapshot(&self) -> Arc<Patrol> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Apply `change` to a copy of the current configuration and publish it
    pub fn update<F>(&self, change: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Patrol) -> ConfigResult<()>,
    {
        let _writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut next = Patrol::clone(&self.snapshot());
        change(&mut next)?;

        let mut current = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Arc::new(next);
        Ok(())
    }

    pub fn check_transaction(&self, transaction_id: &str) -> Action {
        self.snapshot().check_transaction(transaction_id)
    }

    pub fn check_with_report(&self, transaction_id: &str) -> CheckReport {
        self.snapshot().check_with_report(transaction_id)
    }
}
