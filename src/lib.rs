//! Library exports for the glyphset dataset pipeline and benchmarks.
/// Platform directory helpers.
pub mod app_dirs;
/// Pipeline configuration and dataset constants.
pub mod config;
mod http_client;
/// Logging setup.
pub mod logging;
/// Linear classifiers and evaluation metrics.
pub mod ml;
/// Dataset preparation stages.
pub mod pipeline;
