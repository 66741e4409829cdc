//! Model artifact loader

use crate::error::ConfigError;
use crate::models::logistic::LogisticModel;
use crate::models::onnx::OnnxModel;
use crate::models::scoring::ScoringModel;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::{Arc, Once};
use tracing::info;

static ORT_INIT: Once = Once::new();

/// Loads scoring models from disk, choosing the backend by file extension:
/// `.onnx` through ONNX Runtime, `.json` as a logistic-regression artifact.
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    pub fn new() -> Self {
        Self::with_threads(1)
    }

    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load the model at `path`.
    ///
    /// The returned model has not been capability-checked yet; that is
    /// `Patrol::set_model`'s job.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Arc<dyn ScoringModel>, ConfigError> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let loaded: Result<Arc<dyn ScoringModel>> = match extension.as_deref() {
            Some("onnx") => self
                .load_onnx(path, &name)
                .map(|m| Arc::new(m) as Arc<dyn ScoringModel>),
            Some("json") => LogisticModel::load(path, &name)
                .map(|m| Arc::new(m) as Arc<dyn ScoringModel>),
            _ => {
                return Err(ConfigError::UnsupportedModelFormat {
                    path: path.display().to_string(),
                })
            }
        };

        loaded.map_err(|e| ConfigError::ModelLoad {
            path: path.display().to_string(),
            message: format!("{:#}", e),
        })
    }

    fn load_onnx(&self, path: &Path, name: &str) -> Result<OnnxModel> {
        init_runtime()?;

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let model = OnnxModel::new(name, session);
        info!(model = %name, "Model loaded successfully");
        Ok(model)
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn init_runtime() -> Result<()> {
    let mut result = Ok(());
    ORT_INIT.call_once(|| {
        result = ort::init()
            .commit()
            .map(|_| info!("ONNX Runtime initialized"))
            .map_err(anyhow::Error::from);
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_unknown_extension_rejected() {
        let err = ModelLoader::new().load("model.pkl").err().unwrap();
        assert_eq!(
            err,
            ConfigError::UnsupportedModelFormat {
                path: "model.pkl".to_string()
            }
        );
    }

    #[test]
    fn test_missing_file_is_load_error() {
        let err = ModelLoader::new()
            .load("/nonexistent/model.json")
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::ModelLoad { .. }));
    }

    #[test]
    fn test_load_logistic_artifact() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"metadata": {{"model_version": "1", "training_date": "2024-01-01", "features": ["amount"]}},
                "model": {{"weights": [0.5], "bias": -1.0}}}}"#
        )
        .unwrap();

        let model = ModelLoader::new().load(file.path()).unwrap();
        assert!(model.has_probability_output());
    }
}
