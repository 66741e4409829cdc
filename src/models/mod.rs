//! Scoring models

pub mod loader;
pub mod logistic;
pub mod onnx;
pub mod scoring;

pub use loader::ModelLoader;
pub use logistic::LogisticModel;
pub use onnx::OnnxModel;
pub use scoring::ScoringModel;
