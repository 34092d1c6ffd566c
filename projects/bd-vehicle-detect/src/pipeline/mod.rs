// Per-frame detection pipeline

pub mod annotate;
pub mod crop;
pub mod detection;
pub mod labels;
pub mod predictor;
pub mod types;
