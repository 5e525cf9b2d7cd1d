mod annotate;
mod labels;
mod model_service;
mod ort_service;
mod runner;

pub mod config;
pub mod report;
pub mod telemetry;

pub use runner::run_detection;
