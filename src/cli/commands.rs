// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands, `train` and `predict`, and their
// flags.
//
// `train` starts from defaults, or from a JSON file given with
// --config, and every flag that is passed overrides the matching
// field. Flags left out keep the base value.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};

use crate::application::train_use_case::TrainConfig;
use crate::domain::shape::ImageShape;
use crate::ml::{loss::LossKind, optimizer::OptimizerConfig};

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a classifier on a directory-per-class image tree
    Train(TrainArgs),

    /// Classify image files with a saved model
    Predict(PredictArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerName {
    Rmsprop,
    Adam,
    Sgd,
}

/// All arguments for the `train` command.
#[derive(Args, Debug, Default)]
pub struct TrainArgs {
    /// JSON training configuration; flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Root of the training images, one subdirectory per class
    #[arg(long)]
    pub train_dir: Option<PathBuf>,

    /// Root of the validation images, same subdirectory names
    #[arg(long)]
    pub valid_dir: Option<PathBuf>,

    /// Directory for model.mpk, weights.mpk and architecture.json
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Image height after resizing
    #[arg(long)]
    pub height: Option<usize>,

    /// Image width after resizing
    #[arg(long)]
    pub width: Option<usize>,

    /// 1 (grayscale), 3 (RGB) or 4 (RGBA)
    #[arg(long)]
    pub channels: Option<usize>,

    #[arg(long)]
    pub num_classes: Option<usize>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Defaults to --batch-size
    #[arg(long)]
    pub valid_batch_size: Option<usize>,

    #[arg(long)]
    pub epochs: Option<usize>,

    /// Filter count per conv block, e.g. --conv-filters 32,64
    #[arg(long, value_delimiter = ',')]
    pub conv_filters: Option<Vec<usize>>,

    #[arg(long)]
    pub dense_units: Option<usize>,

    #[arg(long)]
    pub conv_dropout: Option<f64>,

    #[arg(long)]
    pub dense_dropout: Option<f64>,

    #[arg(long, value_enum)]
    pub optimizer: Option<OptimizerName>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Time-based decay: lr / (1 + decay * step)
    #[arg(long)]
    pub decay: Option<f64>,

    /// RMSProp / SGD momentum
    #[arg(long)]
    pub momentum: Option<f64>,

    /// categorical_crossentropy, binary_crossentropy or mean_squared_error
    #[arg(long)]
    pub loss: Option<LossKind>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Fail on the first NaN / infinite batch loss instead of skipping it
    #[arg(long)]
    pub abort_on_divergence: bool,

    /// Append one CSV row per epoch to this file
    #[arg(long)]
    pub metrics_csv: Option<PathBuf>,

    #[arg(long)]
    pub model_path: Option<PathBuf>,

    #[arg(long)]
    pub weights_path: Option<PathBuf>,

    #[arg(long)]
    pub architecture_path: Option<PathBuf>,
}

impl TrainArgs {
    /// Build the application-layer config. The application layer never sees clap types.
    pub fn into_config(self) -> Result<TrainConfig> {
        let base = match &self.config {
            Some(path) => TrainConfig::from_json_file(path)?,
            None => TrainConfig::default(),
        };
        Ok(self.apply(base))
    }

    /// Overlay every flag that was given onto `cfg`.
    pub fn apply(self, mut cfg: TrainConfig) -> TrainConfig {
        fn set<T>(field: &mut T, value: Option<T>) {
            if let Some(v) = value {
                *field = v;
            }
        }

        set(&mut cfg.train_dir, self.train_dir);
        set(&mut cfg.valid_dir, self.valid_dir);
        set(&mut cfg.output_dir, self.output_dir);

        let ImageShape { height, width, channels } = cfg.input_shape;
        cfg.input_shape = ImageShape::new(
            self.height.unwrap_or(height),
            self.width.unwrap_or(width),
            self.channels.unwrap_or(channels),
        );

        set(&mut cfg.num_classes, self.num_classes);
        set(&mut cfg.batch_size, self.batch_size);
        if self.valid_batch_size.is_some() {
            cfg.valid_batch_size = self.valid_batch_size;
        }
        set(&mut cfg.epochs, self.epochs);
        set(&mut cfg.conv_filters, self.conv_filters);
        set(&mut cfg.dense_units, self.dense_units);
        set(&mut cfg.conv_dropout, self.conv_dropout);
        set(&mut cfg.dense_dropout, self.dense_dropout);

        let mut optimizer = match self.optimizer {
            Some(name) if name != OptimizerName::of(&cfg.optimizer) => {
                let lr = cfg.optimizer.base_learning_rate();
                let decay = cfg.optimizer.decay();
                let fresh = match name {
                    OptimizerName::Rmsprop => OptimizerConfig::rmsprop(lr, decay),
                    OptimizerName::Adam => OptimizerConfig::adam(lr),
                    OptimizerName::Sgd => OptimizerConfig::sgd(lr, 0.0),
                };
                fresh.with_decay(decay)
            }
            _ => cfg.optimizer,
        };
        if let Some(lr) = self.learning_rate {
            optimizer = optimizer.with_learning_rate(lr);
        }
        if let Some(decay) = self.decay {
            optimizer = optimizer.with_decay(decay);
        }
        if let Some(momentum) = self.momentum {
            optimizer = optimizer.with_momentum(momentum);
        }
        cfg.optimizer = optimizer;

        set(&mut cfg.loss, self.loss);
        set(&mut cfg.seed, self.seed);
        cfg.abort_on_divergence |= self.abort_on_divergence;

        if self.metrics_csv.is_some() {
            cfg.metrics_csv = self.metrics_csv;
        }
        if self.model_path.is_some() {
            cfg.model_path = self.model_path;
        }
        if self.weights_path.is_some() {
            cfg.weights_path = self.weights_path;
        }
        if self.architecture_path.is_some() {
            cfg.architecture_path = self.architecture_path;
        }
        cfg
    }
}

impl OptimizerName {
    fn of(cfg: &OptimizerConfig) -> Self {
        match cfg {
            OptimizerConfig::Rmsprop { .. } => OptimizerName::Rmsprop,
            OptimizerConfig::Adam { .. } => OptimizerName::Adam,
            OptimizerConfig::Sgd { .. } => OptimizerName::Sgd,
        }
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Model file written by `train` (model.mpk)
    #[arg(long, default_value = "output/model.mpk")]
    pub model: PathBuf,

    /// Image files to classify
    #[arg(required = true)]
    pub images: Vec<PathBuf>,
}
