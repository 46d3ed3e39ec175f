// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration     (before any I/O)
//   Step 2: Seed the backend RNG           (init, dropout, shuffle)
//   Step 3: Open train / valid sources     (Layer 4 - data)
//   Step 4: Build the model                (Layer 5 - ml)
//   Step 5: Attach epoch sinks             (Layer 6 - infra)
//   Step 6: Run the training loop          (Layer 5 - ml)
//   Step 7: Save model, weights, architecture and config (Layer 6 - infra)

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use burn::{prelude::*, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};

use crate::data::source::DataSource;
use crate::domain::{
    control::StopSignal,
    run::TrainingRun,
    shape::ImageShape,
    traits::EpochSink,
};
use crate::error::ConfigError;
use crate::infra::{
    metrics::{ConsoleReporter, MetricsLogger},
    persistence::{save_architecture, save_json, save_model, save_weights},
};
use crate::ml::{
    architecture::StackConfig,
    loss::LossKind,
    model::Model,
    optimizer::OptimizerConfig,
    trainer::{train, TrainOptions},
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a training run needs. Serialisable so it can come
// from a JSON file and be written next to the artifacts it
// produced. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainConfig {
    pub train_dir:  PathBuf,
    pub valid_dir:  PathBuf,
    pub output_dir: PathBuf,

    pub input_shape: ImageShape,
    pub num_classes: usize,

    pub batch_size: usize,
    /// Falls back to `batch_size` when unset
    pub valid_batch_size: Option<usize>,
    pub epochs: usize,

    /// Filter count of each conv block
    pub conv_filters:  Vec<usize>,
    pub dense_units:   usize,
    pub conv_dropout:  f64,
    pub dense_dropout: f64,

    pub optimizer: OptimizerConfig,
    pub loss:      LossKind,

    /// Drives parameter init, dropout masks and shuffle order
    pub seed: u64,
    pub abort_on_divergence: bool,

    pub metrics_csv: Option<PathBuf>,

    // Artifact paths; default to fixed names inside output_dir
    pub model_path:        Option<PathBuf>,
    pub weights_path:      Option<PathBuf>,
    pub architecture_path: Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        let stack = StackConfig::new();
        Self {
            train_dir:         PathBuf::from("data/train"),
            valid_dir:         PathBuf::from("data/validation"),
            output_dir:        PathBuf::from("output"),
            input_shape:       ImageShape::default(),
            num_classes:       10,
            batch_size:        64,
            valid_batch_size:  None,
            epochs:            10,
            conv_filters:      stack.conv_filters,
            dense_units:       stack.dense_units,
            conv_dropout:      stack.conv_dropout,
            dense_dropout:     stack.dense_dropout,
            optimizer:         OptimizerConfig::default(),
            loss:              LossKind::default(),
            seed:              42,
            abort_on_divergence: false,
            metrics_csv:       None,
            model_path:        None,
            weights_path:      None,
            architecture_path: None,
        }
    }
}

/// Where the three model artifacts (and the effective config) end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model:        PathBuf,
    pub weights:      PathBuf,
    pub architecture: PathBuf,
    pub config:       PathBuf,
}

impl TrainConfig {
    /// Read a JSON config file. Unknown fields and unknown loss / optimizer names are errors.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let parse_err = |reason: String| ConfigError::Parse { path: path.into(), reason };

        let text = fs::read_to_string(path).map_err(|e| parse_err(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| parse_err(e.to_string()))
    }

    pub fn valid_batch_size(&self) -> usize {
        self.valid_batch_size.unwrap_or(self.batch_size)
    }

    pub fn stack(&self) -> StackConfig {
        StackConfig::new()
            .with_conv_filters(self.conv_filters.clone())
            .with_dense_units(self.dense_units)
            .with_conv_dropout(self.conv_dropout)
            .with_dense_dropout(self.dense_dropout)
    }

    pub fn train_options(&self) -> TrainOptions {
        TrainOptions {
            epochs:              self.epochs,
            loss:                self.loss,
            optimizer:           self.optimizer,
            abort_on_divergence: self.abort_on_divergence,
        }
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        let or_default = |custom: &Option<PathBuf>, name: &str| {
            custom.clone().unwrap_or_else(|| self.output_dir.join(name))
        };
        ArtifactPaths {
            model:        or_default(&self.model_path, "model.mpk"),
            weights:      or_default(&self.weights_path, "weights.mpk"),
            architecture: or_default(&self.architecture_path, "architecture.json"),
            config:       self.output_dir.join("train_config.json"),
        }
    }

    /// Reject values that would fail later, before any file is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("epochs", self.epochs),
            ("batch_size", self.batch_size),
            ("valid_batch_size", self.valid_batch_size()),
            ("num_classes", self.num_classes),
            ("input_shape.height", self.input_shape.height),
            ("input_shape.width", self.input_shape.width),
            ("input_shape.channels", self.input_shape.channels),
            ("dense_units", self.dense_units),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        if self.conv_filters.contains(&0) {
            return Err(ConfigError::Zero { field: "conv_filters" });
        }

        for (field, value) in [("conv_dropout", self.conv_dropout), ("dense_dropout", self.dense_dropout)] {
            if !(0.0..1.0).contains(&value) {
                return Err(ConfigError::Rate { field, value });
            }
        }

        self.optimizer.validate()
    }
}

/// What a finished training run hands back to the caller.
#[derive(Debug)]
pub struct TrainOutcome {
    pub run:       TrainingRun,
    pub artifacts: ArtifactPaths,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Execute the full training pipeline end to end on backend `B`.
    pub fn execute<B: AutodiffBackend>(&self, device: &B::Device, stop: &StopSignal) -> Result<TrainOutcome> {
        let cfg = &self.config;

        // ── Step 1: Validate ──────────────────────────────────────────────────
        cfg.validate().context("Invalid training configuration")?;

        // ── Step 2: Seed ──────────────────────────────────────────────────────
        B::seed(cfg.seed);
        tracing::info!("Backend seeded with {}", cfg.seed);

        // ── Step 3: Data sources ──────────────────────────────────────────────
        let train_source = DataSource::<B>::open(
            &cfg.train_dir,
            cfg.batch_size,
            cfg.input_shape,
            Some(cfg.seed),
            device,
        )
        .with_context(|| format!("Cannot open training data '{}'", cfg.train_dir.display()))?;

        let valid_source = DataSource::<B::InnerBackend>::open(
            &cfg.valid_dir,
            cfg.valid_batch_size(),
            cfg.input_shape,
            None,
            device,
        )
        .with_context(|| format!("Cannot open validation data '{}'", cfg.valid_dir.display()))?;

        tracing::info!(
            "Found {} training and {} validation images in {} classes",
            train_source.num_samples(),
            valid_source.num_samples(),
            train_source.num_classes()
        );

        // ── Step 4: Model ─────────────────────────────────────────────────────
        let model = Model::<B>::with_stack(cfg.input_shape, cfg.num_classes, &cfg.stack(), device)
            .context("Cannot build the model")?
            .with_class_names(train_source.class_names().to_vec());
        tracing::info!(
            "Model ready: {} layers, {} parameters",
            model.architecture().layers().len(),
            model.architecture().num_params()
        );

        // ── Step 5: Epoch sinks ───────────────────────────────────────────────
        let mut sinks: Vec<Box<dyn EpochSink>> = vec![Box::new(ConsoleReporter)];
        if let Some(csv) = &cfg.metrics_csv {
            sinks.push(Box::new(MetricsLogger::new(csv)?));
        }

        // ── Step 6: Train ─────────────────────────────────────────────────────
        let (model, run) = train(model, &train_source, &valid_source, &cfg.train_options(), stop, &mut sinks)
            .context("Training failed")?;

        // ── Step 7: Persist ───────────────────────────────────────────────────
        let artifacts = cfg.artifact_paths();
        fs::create_dir_all(&cfg.output_dir)
            .with_context(|| format!("Cannot create output directory '{}'", cfg.output_dir.display()))?;

        let model = model.valid();
        save_model(&model, &artifacts.model)?;
        save_weights(&model, &artifacts.weights)?;
        save_architecture(&model, &artifacts.architecture)?;
        save_json(cfg, &artifacts.config)?;

        if let Some(best) = run.best() {
            tracing::info!(
                "Best epoch {}: val_loss={:.4} val_acc={:.1}%",
                best.epoch,
                best.valid_loss,
                best.valid_accuracy * 100.0
            );
        }
        Ok(TrainOutcome { run, artifacts })
    }
}
