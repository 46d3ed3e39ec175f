// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that touches Burn modules, tensors-as-math and
// optimizers lives here.
//
//   layer.rs        — one layer specification and its shape rule
//   architecture.rs — the validated layer list + default stack
//   model.rs        — parameters and the forward pass
//   loss.rs         — the three selectable losses
//   optimizer.rs    — optimizer choice and learning-rate decay
//   trainer.rs      — the train / validate epoch loop
//   inferencer.rs   — classify image files with a saved model

/// Layer variants and their output-shape rules
pub mod layer;

/// Validated layer stack and its textual description
pub mod architecture;

/// Conv/dense parameter sets and the forward pass
pub mod model;

/// Categorical / binary cross-entropy and mean squared error
pub mod loss;

/// RMSProp / Adam / SGD selection with time-based decay
pub mod optimizer;

/// Full training loop with validation
pub mod trainer;

/// Inference engine: loads a model file and classifies images
pub mod inferencer;
