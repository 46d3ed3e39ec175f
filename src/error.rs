// ============================================================
// Error Taxonomy
// ============================================================
// One error enum per concern. Lower layers return these typed
// errors; the application and CLI layers wrap them in anyhow
// with context before they reach the user.

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::shape::{FeatureShape, ImageShape};

// ─── Data Source ──────────────────────────────────────────────────────────────
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("data directory '{}' does not exist", .0.display())]
    MissingDirectory(PathBuf),

    #[error("'{}' is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("data directory '{}' contains no class subdirectories", .0.display())]
    NoClasses(PathBuf),

    #[error("class directory '{}' contains no image files", .0.display())]
    EmptyClass(PathBuf),

    #[error("cannot decode image '{}': {reason}", .path.display())]
    Undecodable { path: PathBuf, reason: String },

    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    #[error("images can be loaded with 1, 3 or 4 channels, not {0}")]
    UnsupportedChannels(usize),

    #[error("io error while reading '{}': {source}", .path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ─── Model Definition ─────────────────────────────────────────────────────────
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("layer {index} ({layer}) cannot accept input of shape {input}: {reason}")]
    ShapeMismatch {
        index:  usize,
        layer:  String,
        input:  FeatureShape,
        reason: String,
    },

    #[error("layer {index}: dropout rate {rate} is outside [0, 1)")]
    InvalidDropout { index: usize, rate: f64 },

    #[error("layer {index}: {what} must be at least 1")]
    ZeroSized { index: usize, what: &'static str },

    #[error("the final layer must be a softmax activation")]
    MissingSoftmaxHead,

    #[error("model produces {produced} outputs but {expected} classes were requested")]
    ClassCountMismatch { produced: usize, expected: usize },

    #[error("architecture has no layers")]
    Empty,
}

// ─── Training ─────────────────────────────────────────────────────────────────
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("training diverged: non-finite loss at epoch {epoch}, batch {batch}")]
    Diverged { epoch: usize, batch: usize },

    #[error("training and validation classes differ: {train:?} vs {valid:?}")]
    ClassMismatch { train: Vec<String>, valid: Vec<String> },

    #[error("model expects {expected} classes but the data source has {found}")]
    ClassCount { expected: usize, found: usize },

    #[error("model expects {expected} images but the data source produces {found}")]
    InputShape { expected: ImageShape, found: ImageShape },

    #[error("the {0} data source yielded no batches")]
    EmptySource(&'static str),

    #[error("cannot report epoch {epoch}: {reason:#}")]
    Report { epoch: usize, reason: anyhow::Error },

    #[error(transparent)]
    Data(#[from] DataSourceError),
}

// ─── Inference ────────────────────────────────────────────────────────────────
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Data(#[from] DataSourceError),

    #[error("cannot read model output: {0}")]
    Output(String),
}

// ─── Persistence ──────────────────────────────────────────────────────────────
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("parent directory of '{}' does not exist", .0.display())]
    MissingParent(PathBuf),

    #[error("cannot write '{}': {source}", .path.display())]
    Write {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read '{}': {source}", .path.display())]
    Read {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record error for '{}': {reason}", .path.display())]
    Record { path: PathBuf, reason: String },

    #[error("invalid architecture description in '{}': {reason}", .path.display())]
    Architecture { path: PathBuf, reason: String },
}

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },

    #[error("{field} = {value} is outside [0, 1)")]
    Rate { field: &'static str, value: f64 },

    #[error("{field} must be a positive finite number, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("cannot read config '{}': {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },
}
