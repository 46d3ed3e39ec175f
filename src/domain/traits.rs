// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The trainer reports each finished epoch to an EpochSink. It
// does not know whether the line goes to stdout, a CSV file, or
// both; the application layer decides which sinks to attach.

use anyhow::Result;

use crate::domain::run::EpochRecord;

// ─── EpochSink ────────────────────────────────────────────────────────────────
/// Anything that wants to hear about finished epochs.
///
/// Implementations:
///   - ConsoleReporter → one summary line per epoch on stdout
///   - MetricsLogger   → one CSV row per epoch
pub trait EpochSink {
    /// Called once per completed epoch, in order.
    /// `total_epochs` is the planned epoch count of the run.
    fn on_epoch(&mut self, record: &EpochRecord, total_epochs: usize) -> Result<()>;
}

/// Fans one record out to several sinks.
impl<S: EpochSink + ?Sized> EpochSink for Vec<Box<S>> {
    fn on_epoch(&mut self, record: &EpochRecord, total_epochs: usize) -> Result<()> {
        for sink in self.iter_mut() {
            sink.on_epoch(record, total_epochs)?;
        }
        Ok(())
    }
}

/// A sink that drops every record.
pub struct NullSink;

impl EpochSink for NullSink {
    fn on_epoch(&mut self, _record: &EpochRecord, _total_epochs: usize) -> Result<()> {
        Ok(())
    }
}
