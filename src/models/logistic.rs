//! Logistic-regression scoring model stored as a JSON artifact

use crate::feature_extractor::FeatureRow;
use crate::models::scoring::ScoringModel;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogisticWeights {
    pub weights: Vec<f64>,
    pub bias: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_version: String,
    pub training_date: String,
    /// Feature names, in the order the weights expect them
    pub features: Vec<String>,
}

/// On-disk form of a logistic model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    pub model: LogisticWeights,
}

/// Logistic regression over named features
#[derive(Clone, Debug)]
pub struct LogisticModel {
    name: String,
    metadata: ModelMetadata,
    weights: LogisticWeights,
}

impl LogisticModel {
    pub fn from_artifact(name: &str, artifact: ModelArtifact) -> Self {
        Self {
            name: name.to_string(),
            metadata: artifact.metadata,
            weights: artifact.model,
        }
    }

    pub fn load<P: AsRef<Path>>(path: P, name: &str) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model artifact {:?}", path))?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse model artifact {:?}", path))?;
        Ok(Self::from_artifact(name, artifact))
    }

    pub fn feature_count(&self) -> usize {
        self.weights.weights.len()
    }

    pub fn predict_probability(&self, features: &[f64]) -> f64 {
        debug_assert_eq!(features.len(), self.feature_count());
        sigmoid(dot(&self.weights.weights, features) + self.weights.bias)
    }
}

impl ScoringModel for LogisticModel {
    fn name(&self) -> &str {
        &self.name
    }

    /// Usable only when there is one weight per named feature
    fn has_probability_output(&self) -> bool {
        self.feature_count() > 0 && self.feature_count() == self.metadata.features.len()
    }

    fn score_probability(&self, row: &FeatureRow) -> Result<f64> {
        if row.names() != self.metadata.features.as_slice() {
            bail!(
                "model {} expects features {:?}, got {:?}",
                self.name,
                self.metadata.features,
                row.names()
            );
        }

        let features = row.to_f64()?;
        if let Some(pos) = features.iter().position(|v| !v.is_finite()) {
            bail!("feature {} has no value", row.names()[pos]);
        }

        Ok(self.predict_probability(&features))
    }
}

pub fn sigmoid(value: f64) -> f64 {
    if value >= 0.0 {
        let z = (-value).exp();
        1.0 / (1.0 + z)
    } else {
        let z = value.exp();
        z / (1.0 + z)
    }
}

fn dot(weights: &[f64], features: &[f64]) -> f64 {
    weights
        .iter()
        .zip(features.iter())
        .map(|(w, f)| w * f)
        .sum()
}
