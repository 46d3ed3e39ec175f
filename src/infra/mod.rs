// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns that don't belong in any one layer:
//
//   persistence.rs — model / weights / architecture files,
//                    written atomically through a temp file
//
//   metrics.rs     — per-epoch reporting: the stdout summary
//                    line and the optional CSV log

/// Saving and loading model artifacts
pub mod persistence;

/// Console and CSV epoch sinks
pub mod metrics;
