//! ONNX Runtime scoring model

use crate::feature_extractor::FeatureRow;
use crate::models::scoring::ScoringModel;
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::{Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A classifier exported to ONNX, e.g. a gradient-boosted tree model
pub struct OnnxModel {
    name: String,
    /// `Session::run` needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    /// Output carrying class probabilities, if the graph has one
    probability_output: Option<String>,
}

impl OnnxModel {
    pub fn new(name: &str, session: Session) -> Self {
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        // Classifier exports carry a label output plus a probability output;
        // a graph with only a label cannot be scored.
        let probability_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.iter().find(|o| !o.name.contains("label")))
            .map(|o| o.name.clone());

        debug!(
            model = %name,
            input = %input_name,
            output = ?probability_output,
            "ONNX graph inspected"
        );

        Self {
            name: name.to_string(),
            session: Mutex::new(session),
            input_name,
            probability_output,
        }
    }

    /// Extract fraud probability from model output.
    /// Handles both tensor outputs (XGBoost, RandomForest) and seq(map)
    /// outputs (CatBoost, LightGBM).
    fn extract_probability(&self, outputs: &SessionOutputs, output_name: &str) -> Result<f64> {
        let output = outputs
            .get(output_name)
            .with_context(|| format!("output {} missing from session results", output_name))?;
        let dtype = output.dtype();

        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            let prob = fraud_prob_from_tensor(&dims, data)?;
            debug!(model = %self.name, prob = prob, "Extracted from tensor");
            return Ok(prob);
        }

        if DynSequenceValueType::can_downcast(&dtype) {
            return self.extract_from_sequence_map(output);
        }

        anyhow::bail!("output {} is neither a tensor nor seq(map)", output_name)
    }

    /// Probability from seq(map(int64, float)), used by CatBoost and
    /// LightGBM exports
    fn extract_from_sequence_map(&self, output: &DynValue) -> Result<f64> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;

        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
        let map_value = maps
            .first()
            .ok_or_else(|| anyhow::anyhow!("Empty sequence"))?;

        // Batch size is always 1
        let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;

        if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 1) {
            debug!(model = %self.name, prob = *prob, "Extracted from seq(map)");
            return Ok(*prob as f64);
        }

        if let Some((_, prob)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 0) {
            return Ok(1.0 - *prob as f64);
        }

        Err(anyhow::anyhow!("No probability found in map"))
    }
}

impl ScoringModel for OnnxModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_probability_output(&self) -> bool {
        self.probability_output.is_some()
    }

    fn score_probability(&self, row: &FeatureRow) -> Result<f64> {
        let output_name = self
            .probability_output
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("model {} has no probability output", self.name))?;

        let features = row.to_f32()?;

        // Shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, features)).context("Failed to create input tensor")?;

        let mut session = lock_session(&self.session);

        let outputs = session.run(ort::inputs![&self.input_name => input_tensor])?;

        self.extract_probability(&outputs, output_name)
    }
}

/// A panic during an earlier run leaves the session usable
fn lock_session<T>(session: &Mutex<T>) -> MutexGuard<'_, T> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fraud class probability from a `[batch, classes]` or `[classes]` tensor
fn fraud_prob_from_tensor(dims: &[i64], data: &[f32]) -> Result<f64> {
    let classes = dims.last().copied().unwrap_or(0);
    let prob = match classes {
        c if c >= 2 => data.get(1),
        1 => data.first(),
        _ => None,
    };

    prob.map(|&p| p as f64)
        .ok_or_else(|| anyhow::anyhow!("unexpected probability tensor shape {:?}", dims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    #[test]
    fn test_poisoned_session_lock_recovers() {
        let session = Mutex::new(7_i32);
        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            let _guard = session.lock().unwrap();
            panic!("run failed");
        }));
        assert!(session.is_poisoned());

        *lock_session(&session) += 1;
        assert_eq!(*lock_session(&session), 8);
    }

    #[test]
    fn test_two_class_tensor_takes_fraud_column() {
        let prob = fraud_prob_from_tensor(&[1, 2], &[0.3, 0.7]).unwrap();
        assert!((prob - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_single_column_tensor() {
        let prob = fraud_prob_from_tensor(&[1, 1], &[0.4]).unwrap();
        assert!((prob - 0.4).abs() < 1e-6);

        let prob = fraud_prob_from_tensor(&[2], &[0.9, 0.1]).unwrap();
        assert!((prob - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_empty_tensor_is_an_error() {
        assert!(fraud_prob_from_tensor(&[1, 0], &[]).is_err());
        assert!(fraud_prob_from_tensor(&[1, 2], &[0.5]).is_err());
    }
}
