// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Train + validation loop over two DataSources.
//
//   - Training runs on an AutodiffBackend; gradients come from
//     loss.backward() and the optimizer steps on Parameters<B>
//   - model.valid() hands back the same weights on the inner
//     backend, so the validation pass records no autodiff graph
//   - argmax(1) returns [batch, 1], flattened before .equal()
//
// A batch whose loss is NaN or infinite gets no update. It is
// logged, counted in the run, and either skipped or turned into
// TrainError::Diverged when abort_on_divergence is set.
//
// The StopSignal is polled between batches. A stop ends the run
// without recording the interrupted epoch; the model returned
// holds the parameters after the last completed update.

use burn::{
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::source::DataSource;
use crate::domain::{
    control::{Mode, StopSignal},
    run::{EpochRecord, TrainingRun},
    traits::EpochSink,
};
use crate::error::TrainError;
use crate::ml::{
    loss::LossKind,
    model::{Model, Parameters},
    optimizer::OptimizerConfig,
};

#[derive(Debug, Clone, PartialEq)]
pub struct TrainOptions {
    pub epochs:              usize,
    pub loss:                LossKind,
    pub optimizer:           OptimizerConfig,
    pub abort_on_divergence: bool,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            epochs:              10,
            loss:                LossKind::default(),
            optimizer:           OptimizerConfig::default(),
            abort_on_divergence: false,
        }
    }
}

/// Running totals for one pass over a data source.
#[derive(Debug, Default, Clone, Copy)]
struct PassTotals {
    loss_sum: f64,
    correct:  usize,
    samples:  usize,
    batches:  usize,
}

impl PassTotals {
    fn add(&mut self, batch_loss: f64, correct: usize, batch_size: usize) {
        // Batch losses are means, weight them by batch size
        self.loss_sum += batch_loss * batch_size as f64;
        self.correct  += correct;
        self.samples  += batch_size;
        self.batches  += 1;
    }

    fn mean_loss(&self) -> f64 {
        if self.samples == 0 { f64::NAN } else { self.loss_sum / self.samples as f64 }
    }

    fn accuracy(&self) -> f64 {
        if self.samples == 0 { f64::NAN } else { self.correct as f64 / self.samples as f64 }
    }
}

pub fn train<B: AutodiffBackend>(
    model:        Model<B>,
    train_source: &DataSource<B>,
    valid_source: &DataSource<B::InnerBackend>,
    options:      &TrainOptions,
    stop:         &StopSignal,
    sink:         &mut dyn EpochSink,
) -> Result<(Model<B>, TrainingRun), TrainError> {
    check_sources(&model, train_source, valid_source)?;

    tracing::info!(
        "Training {} epochs: optimizer={}, lr={}, decay={}, loss={}, {} parameters",
        options.epochs,
        options.optimizer.name(),
        options.optimizer.base_learning_rate(),
        options.optimizer.decay(),
        options.loss,
        model.architecture().num_params()
    );

    match options.optimizer {
        OptimizerConfig::Rmsprop { rho, epsilon, momentum, .. } => {
            let optim = OptimizerConfig::rmsprop_config(rho, epsilon, momentum).init::<B, Parameters<B>>();
            fit(model, train_source, valid_source, options, stop, sink, optim)
        }
        OptimizerConfig::Adam { beta_1, beta_2, epsilon, .. } => {
            let optim = OptimizerConfig::adam_config(beta_1, beta_2, epsilon).init::<B, Parameters<B>>();
            fit(model, train_source, valid_source, options, stop, sink, optim)
        }
        OptimizerConfig::Sgd { momentum, .. } => {
            let optim = OptimizerConfig::sgd_config(momentum).init::<B, Parameters<B>>();
            fit(model, train_source, valid_source, options, stop, sink, optim)
        }
    }
}

fn check_sources<B: AutodiffBackend>(
    model:        &Model<B>,
    train_source: &DataSource<B>,
    valid_source: &DataSource<B::InnerBackend>,
) -> Result<(), TrainError> {
    if train_source.class_names() != valid_source.class_names() {
        return Err(TrainError::ClassMismatch {
            train: train_source.class_names().to_vec(),
            valid: valid_source.class_names().to_vec(),
        });
    }

    let expected = model.architecture().num_classes();
    if train_source.num_classes() != expected {
        return Err(TrainError::ClassCount { expected, found: train_source.num_classes() });
    }

    let expected = model.architecture().input_shape();
    for found in [train_source.image_shape(), valid_source.image_shape()] {
        if found != expected {
            return Err(TrainError::InputShape { expected, found });
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn fit<B, O>(
    mut model:    Model<B>,
    train_source: &DataSource<B>,
    valid_source: &DataSource<B::InnerBackend>,
    options:      &TrainOptions,
    stop:         &StopSignal,
    sink:         &mut dyn EpochSink,
    mut optim:    O,
) -> Result<(Model<B>, TrainingRun), TrainError>
where
    B: AutodiffBackend,
    O: Optimizer<Parameters<B>, B>,
{
    let mut run        = TrainingRun::new();
    let mut iterations = 0usize;

    'epochs: for epoch in 1..=options.epochs {
        // ── Training phase ────────────────────────────────────────────────────
        let mut totals = PassTotals::default();

        for (index, batch) in train_source.epoch().enumerate() {
            if stop.is_stopped() {
                tracing::warn!("Stop requested during epoch {}, discarding its partial results", epoch);
                run.stopped_early = true;
                break 'epochs;
            }

            let batch = batch?;
            let batch_size = batch.len();

            let logits = model.forward_logits(batch.images, Mode::Train);
            let loss = options.loss.forward(logits.clone(), batch.labels, batch.targets.clone());
            let loss_value: f64 = loss.clone().into_scalar().elem::<f64>();

            if !loss_value.is_finite() {
                run.diverged_batches += 1;
                tracing::warn!(
                    "Non-finite loss ({}) at epoch {}, batch {}; update skipped",
                    loss_value,
                    epoch,
                    index + 1
                );
                if options.abort_on_divergence {
                    return Err(TrainError::Diverged { epoch, batch: index + 1 });
                }
                continue;
            }

            totals.add(loss_value, count_correct(logits, batch.targets), batch_size);

            let lr    = options.optimizer.learning_rate(iterations);
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, model.params());
            model = model.map_params(|params| optim.step(lr, params, grads));
            iterations += 1;

            tracing::debug!("epoch {} batch {}: loss={:.4} lr={:.3e}", epoch, index + 1, loss_value, lr);
        }

        if totals.batches == 0 && run.diverged_batches == 0 {
            return Err(TrainError::EmptySource("training"));
        }
        if stop.is_stopped() {
            tracing::warn!("Stop requested after the training pass of epoch {}", epoch);
            run.stopped_early = true;
            break;
        }

        // ── Validation phase ──────────────────────────────────────────────────
        let valid = evaluate(&model.valid(), valid_source, options.loss)?;
        if valid.batches == 0 {
            return Err(TrainError::EmptySource("validation"));
        }

        let record = EpochRecord {
            epoch,
            train_loss:     totals.mean_loss(),
            train_accuracy: totals.accuracy(),
            valid_loss:     valid.mean_loss(),
            valid_accuracy: valid.accuracy(),
        };
        run.push(record);
        sink.on_epoch(&record, options.epochs)
            .map_err(|reason| TrainError::Report { epoch, reason })?;
    }

    tracing::info!(
        "Training finished: {} epochs recorded, {} diverged batches{}",
        run.len(),
        run.diverged_batches,
        if run.stopped_early { ", stopped early" } else { "" }
    );
    Ok((model, run))
}

/// One evaluation-mode pass with no parameter updates.
fn evaluate<B: Backend>(model: &Model<B>, source: &DataSource<B>, loss: LossKind) -> Result<PassTotals, TrainError> {
    let mut totals = PassTotals::default();

    for batch in source.epoch() {
        let batch = batch?;
        let batch_size = batch.len();

        let logits = model.forward_logits(batch.images, Mode::Eval);
        let batch_loss: f64 = loss
            .forward(logits.clone(), batch.labels, batch.targets.clone())
            .into_scalar()
            .elem::<f64>();

        totals.add(batch_loss, count_correct(logits, batch.targets), batch_size);
    }
    Ok(totals)
}

/// Samples whose highest score is at the target index.
fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    let correct: i64 = predicted.equal(targets).int().sum().into_scalar().elem::<i64>();
    correct as usize
}
