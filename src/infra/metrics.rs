// ============================================================
// Layer 6 — Epoch Reporting
// ============================================================
// The two EpochSinks the CLI attaches to a training run.
//
// ConsoleReporter prints one summary line per epoch to stdout:
//
//   Epoch   3/10 | loss=0.6931 acc=51.2% | val_loss=0.6840 val_acc=55.0%
//
// MetricsLogger appends one CSV row per epoch:
//
//   epoch,train_loss,train_accuracy,valid_loss,valid_accuracy
//   1,2.301200,0.104000,2.297800,0.112000
//   2,2.190400,0.187000,2.154300,0.201000
//
// An existing CSV is appended to, so several runs can share
// one file; the header is written only when the file is new.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::{run::EpochRecord, traits::EpochSink};

const CSV_HEADER: &str = "epoch,train_loss,train_accuracy,valid_loss,valid_accuracy";

/// The per-epoch summary line.
pub fn format_epoch(record: &EpochRecord, total_epochs: usize) -> String {
    format!(
        "Epoch {:>3}/{} | loss={:.4} acc={:.1}% | val_loss={:.4} val_acc={:.1}%",
        record.epoch,
        total_epochs,
        record.train_loss,
        record.train_accuracy * 100.0,
        record.valid_loss,
        record.valid_accuracy * 100.0,
    )
}

// ─── ConsoleReporter ──────────────────────────────────────────────────────────
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl EpochSink for ConsoleReporter {
    fn on_epoch(&mut self, record: &EpochRecord, total_epochs: usize) -> Result<()> {
        println!("{}", format_epoch(record, total_epochs));
        Ok(())
    }
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────
/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Open (or create) the CSV at `csv_path`, creating parent directories as needed.
    pub fn new(csv_path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = csv_path.into();

        if let Some(dir) = csv_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create metrics directory '{}'", dir.display()))?;
        }

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create metrics CSV '{}'", csv_path.display()))?;
            writeln!(f, "{CSV_HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch as a new row.
    pub fn log(&self, m: &EpochRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open metrics CSV '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train_loss,
            m.train_accuracy,
            m.valid_loss,
            m.valid_accuracy,
        )?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, valid_loss={:.4}",
            m.epoch,
            m.train_loss,
            m.valid_loss,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

impl EpochSink for MetricsLogger {
    fn on_epoch(&mut self, record: &EpochRecord, _total_epochs: usize) -> Result<()> {
        self.log(record)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss:     0.69314,
            train_accuracy: 0.512,
            valid_loss:     0.684,
            valid_accuracy: 0.55,
        }
    }

    #[test]
    fn test_epoch_line_format() {
        assert_eq!(
            format_epoch(&record(3), 10),
            "Epoch   3/10 | loss=0.6931 acc=51.2% | val_loss=0.6840 val_acc=55.0%"
        );
    }

    #[test]
    fn test_csv_rows_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("metrics.csv");

        let mut logger = MetricsLogger::new(&path).unwrap();
        logger.on_epoch(&record(1), 2).unwrap();
        logger.on_epoch(&record(2), 2).unwrap();

        // A second logger on the same file keeps the existing rows
        MetricsLogger::new(&path).unwrap().log(&record(3)).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "1,0.693140,0.512000,0.684000,0.550000");
        assert!(lines[3].starts_with("3,"));
    }
}
