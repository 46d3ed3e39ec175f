// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing what the pipeline
// works with. Nothing here touches burn, the file system or
// image decoding, so everything is testable without a backend.

// Per-sample tensor shapes (image in, feature maps between layers)
pub mod shape;

// Epoch records and the run they accumulate into
pub mod run;

// Train/eval mode and the cooperative stop flag
pub mod control;

// Core abstractions (traits) that other layers implement
pub mod traits;
