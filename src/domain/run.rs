// ============================================================
// Layer 3 — Training Run Record
// ============================================================
// The ephemeral history of one call to the trainer: one entry
// per completed epoch. Entries are only appended once both the
// training and the validation pass of an epoch have finished,
// so a run interrupted mid-epoch never holds a half entry.

use serde::{Deserialize, Serialize};

/// Loss/accuracy summary of one finished epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// Epoch number, starting at 1
    pub epoch: usize,

    /// Sample-weighted mean loss over the training pass
    pub train_loss: f64,

    /// Fraction of training samples classified correctly, in [0, 1]
    pub train_accuracy: f64,

    /// Mean loss over the validation pass (evaluation mode)
    pub valid_loss: f64,

    /// Fraction of validation samples classified correctly, in [0, 1]
    pub valid_accuracy: f64,
}

impl EpochRecord {
    /// True when every metric is a finite number.
    pub fn is_finite(&self) -> bool {
        self.train_loss.is_finite()
            && self.train_accuracy.is_finite()
            && self.valid_loss.is_finite()
            && self.valid_accuracy.is_finite()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub epochs: Vec<EpochRecord>,

    /// Batches whose loss was NaN or infinite (their update was skipped)
    pub diverged_batches: usize,

    /// Set when a stop request ended the run before the planned epoch count
    pub stopped_early: bool,
}

impl TrainingRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: EpochRecord) {
        self.epochs.push(record);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last(&self) -> Option<&EpochRecord> {
        self.epochs.last()
    }

    /// The epoch with the lowest validation loss, if any.
    pub fn best(&self) -> Option<&EpochRecord> {
        self.epochs
            .iter()
            .filter(|e| e.valid_loss.is_finite())
            .min_by(|a, b| a.valid_loss.total_cmp(&b.valid_loss))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize, valid_loss: f64) -> EpochRecord {
        EpochRecord {
            epoch,
            train_loss: 1.0,
            train_accuracy: 0.5,
            valid_loss,
            valid_accuracy: 0.5,
        }
    }

    #[test]
    fn test_best_skips_non_finite() {
        let mut run = TrainingRun::new();
        run.push(record(1, 0.9));
        run.push(record(2, f64::NAN));
        run.push(record(3, 0.4));
        run.push(record(4, 0.6));

        assert_eq!(run.len(), 4);
        assert_eq!(run.best().map(|e| e.epoch), Some(3));
        assert!(!run.epochs[1].is_finite());
    }

    #[test]
    fn test_empty_run() {
        let run = TrainingRun::new();
        assert!(run.is_empty());
        assert!(run.best().is_none());
        assert!(run.last().is_none());
    }
}
