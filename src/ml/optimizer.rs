// ============================================================
// Layer 5 — Optimizer Selection
// ============================================================
// The update rules themselves are burn's. This file only holds
// the user-facing choice (name + hyperparameters) and the
// time-based learning-rate decay applied on top:
//
//   lr_t = lr / (1 + decay * t)      t = optimizer steps so far

use burn::optim::{momentum::MomentumConfig, AdamConfig, RmsPropConfig, SgdConfig};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum OptimizerConfig {
    /// Moving average of squared gradients; step scaled by its inverse square root
    Rmsprop {
        learning_rate: f64,
        #[serde(default)]
        decay: f64,
        #[serde(default = "default_rho")]
        rho: f64,
        #[serde(default = "default_epsilon")]
        epsilon: f64,
        #[serde(default)]
        momentum: f64,
    },
    Adam {
        learning_rate: f64,
        #[serde(default)]
        decay: f64,
        #[serde(default = "default_beta_1")]
        beta_1: f64,
        #[serde(default = "default_beta_2")]
        beta_2: f64,
        #[serde(default = "default_epsilon")]
        epsilon: f64,
    },
    Sgd {
        learning_rate: f64,
        #[serde(default)]
        decay: f64,
        #[serde(default)]
        momentum: f64,
    },
}

fn default_rho() -> f64 {
    0.9
}

fn default_epsilon() -> f64 {
    1e-7
}

fn default_beta_1() -> f64 {
    0.9
}

fn default_beta_2() -> f64 {
    0.999
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::rmsprop(1e-4, 1e-6)
    }
}

impl OptimizerConfig {
    pub fn rmsprop(learning_rate: f64, decay: f64) -> Self {
        OptimizerConfig::Rmsprop {
            learning_rate,
            decay,
            rho: default_rho(),
            epsilon: default_epsilon(),
            momentum: 0.0,
        }
    }

    pub fn adam(learning_rate: f64) -> Self {
        OptimizerConfig::Adam {
            learning_rate,
            decay: 0.0,
            beta_1: default_beta_1(),
            beta_2: default_beta_2(),
            epsilon: default_epsilon(),
        }
    }

    pub fn sgd(learning_rate: f64, momentum: f64) -> Self {
        OptimizerConfig::Sgd { learning_rate, decay: 0.0, momentum }
    }

    pub fn with_learning_rate(mut self, value: f64) -> Self {
        match &mut self {
            OptimizerConfig::Rmsprop { learning_rate, .. }
            | OptimizerConfig::Adam { learning_rate, .. }
            | OptimizerConfig::Sgd { learning_rate, .. } => *learning_rate = value,
        }
        self
    }

    pub fn with_decay(mut self, value: f64) -> Self {
        match &mut self {
            OptimizerConfig::Rmsprop { decay, .. }
            | OptimizerConfig::Adam { decay, .. }
            | OptimizerConfig::Sgd { decay, .. } => *decay = value,
        }
        self
    }

    /// Adam has no momentum term; it is returned unchanged.
    pub fn with_momentum(mut self, value: f64) -> Self {
        match &mut self {
            OptimizerConfig::Rmsprop { momentum, .. } | OptimizerConfig::Sgd { momentum, .. } => *momentum = value,
            OptimizerConfig::Adam { .. } => {}
        }
        self
    }

    pub fn name(&self) -> &'static str {
        match self {
            OptimizerConfig::Rmsprop { .. } => "rmsprop",
            OptimizerConfig::Adam { .. } => "adam",
            OptimizerConfig::Sgd { .. } => "sgd",
        }
    }

    pub fn base_learning_rate(&self) -> f64 {
        match *self {
            OptimizerConfig::Rmsprop { learning_rate, .. }
            | OptimizerConfig::Adam { learning_rate, .. }
            | OptimizerConfig::Sgd { learning_rate, .. } => learning_rate,
        }
    }

    pub fn decay(&self) -> f64 {
        match *self {
            OptimizerConfig::Rmsprop { decay, .. }
            | OptimizerConfig::Adam { decay, .. }
            | OptimizerConfig::Sgd { decay, .. } => decay,
        }
    }

    /// Learning rate for the step after `iterations` completed steps.
    pub fn learning_rate(&self, iterations: usize) -> f64 {
        self.base_learning_rate() / (1.0 + self.decay() * iterations as f64)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let lr = self.base_learning_rate();
        if !(lr.is_finite() && lr > 0.0) {
            return Err(ConfigError::NonPositive { field: "optimizer.learning_rate", value: lr });
        }
        let decay = self.decay();
        if !(decay.is_finite() && decay >= 0.0) {
            return Err(ConfigError::NonPositive { field: "optimizer.decay", value: decay });
        }
        match *self {
            OptimizerConfig::Rmsprop { rho, momentum, .. } => {
                unit_rate("optimizer.rho", rho)?;
                unit_rate("optimizer.momentum", momentum)
            }
            OptimizerConfig::Adam { beta_1, beta_2, .. } => {
                unit_rate("optimizer.beta_1", beta_1)?;
                unit_rate("optimizer.beta_2", beta_2)
            }
            OptimizerConfig::Sgd { momentum, .. } => unit_rate("optimizer.momentum", momentum),
        }
    }

    pub(crate) fn rmsprop_config(rho: f64, epsilon: f64, momentum: f64) -> RmsPropConfig {
        RmsPropConfig::new()
            .with_alpha(rho as f32)
            .with_epsilon(epsilon as f32)
            .with_momentum(momentum as f32)
    }

    pub(crate) fn adam_config(beta_1: f64, beta_2: f64, epsilon: f64) -> AdamConfig {
        AdamConfig::new()
            .with_beta_1(beta_1 as f32)
            .with_beta_2(beta_2 as f32)
            .with_epsilon(epsilon as f32)
    }

    pub(crate) fn sgd_config(momentum: f64) -> SgdConfig {
        let momentum = (momentum > 0.0).then(|| MomentumConfig::new().with_momentum(momentum));
        SgdConfig::new().with_momentum(momentum)
    }
}

fn unit_rate(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Rate { field, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_rmsprop() {
        let cfg = OptimizerConfig::default();
        assert_eq!(cfg.name(), "rmsprop");
        assert_eq!(cfg.base_learning_rate(), 1e-4);
        assert_eq!(cfg.decay(), 1e-6);
    }

    #[test]
    fn test_time_based_decay() {
        let cfg = OptimizerConfig::rmsprop(0.1, 0.5);
        assert_eq!(cfg.learning_rate(0), 0.1);
        assert!((cfg.learning_rate(2) - 0.05).abs() < 1e-12);

        let flat = OptimizerConfig::adam(0.01);
        assert_eq!(flat.learning_rate(1_000), 0.01);
    }

    #[test]
    fn test_overrides_keep_the_variant() {
        let cfg = OptimizerConfig::sgd(0.1, 0.0).with_learning_rate(0.5).with_decay(0.01).with_momentum(0.9);
        assert_eq!(cfg, OptimizerConfig::Sgd { learning_rate: 0.5, decay: 0.01, momentum: 0.9 });

        let adam = OptimizerConfig::adam(1e-3).with_momentum(0.9);
        assert_eq!(adam, OptimizerConfig::adam(1e-3));
    }

    #[test]
    fn test_validation() {
        assert!(OptimizerConfig::default().validate().is_ok());
        assert!(OptimizerConfig::rmsprop(0.0, 0.0).validate().is_err());
        assert!(OptimizerConfig::rmsprop(1e-3, -1.0).validate().is_err());
        assert!(OptimizerConfig::sgd(0.01, 1.0).validate().is_err());
    }

    #[test]
    fn test_json_defaults_fill_in() {
        let cfg: OptimizerConfig = serde_json::from_str(r#"{"name":"rmsprop","learning_rate":0.001}"#).unwrap();
        assert_eq!(
            cfg,
            OptimizerConfig::Rmsprop {
                learning_rate: 0.001,
                decay: 0.0,
                rho: 0.9,
                epsilon: 1e-7,
                momentum: 0.0
            }
        );
    }
}
