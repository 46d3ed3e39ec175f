// ============================================================
// Layer 5 — Loss Functions
// ============================================================
// Every loss takes the pre-softmax scores so the categorical
// case can use burn's fused log-softmax cross-entropy. The other
// two work on the softmax probabilities against one-hot labels.

use std::{fmt, str::FromStr};

use burn::{
    nn::loss::{CrossEntropyLossConfig, MseLoss, Reduction},
    prelude::*,
    tensor::activation,
};
use serde::{Deserialize, Serialize};

/// Probabilities are clamped into [EPSILON, 1 - EPSILON] before taking logs.
const EPSILON: f64 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LossKind {
    #[default]
    #[serde(rename = "categorical_crossentropy")]
    CategoricalCrossEntropy,
    #[serde(rename = "binary_crossentropy")]
    BinaryCrossEntropy,
    #[serde(rename = "mean_squared_error")]
    MeanSquaredError,
}

impl LossKind {
    pub fn name(&self) -> &'static str {
        match self {
            LossKind::CategoricalCrossEntropy => "categorical_crossentropy",
            LossKind::BinaryCrossEntropy => "binary_crossentropy",
            LossKind::MeanSquaredError => "mean_squared_error",
        }
    }

    /// Mean loss over the batch, as a one-element tensor.
    ///
    /// logits:  [batch, num_classes] pre-softmax scores
    /// labels:  [batch, num_classes] one-hot
    /// targets: [batch] class indices (same information as `labels`)
    pub fn forward<B: Backend>(
        &self,
        logits:  Tensor<B, 2>,
        labels:  Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) -> Tensor<B, 1> {
        match self {
            LossKind::CategoricalCrossEntropy => CrossEntropyLossConfig::new()
                .init(&logits.device())
                .forward(logits, targets),
            LossKind::BinaryCrossEntropy => {
                let probs = activation::softmax(logits, 1).clamp(EPSILON, 1.0 - EPSILON);
                let positive = labels.clone() * probs.clone().log();
                let negative = labels.ones_like().sub(labels) * probs.ones_like().sub(probs).log();
                (positive + negative).neg().mean()
            }
            LossKind::MeanSquaredError => {
                let probs = activation::softmax(logits, 1);
                MseLoss::new().forward(probs, labels, Reduction::Mean)
            }
        }
    }
}

impl fmt::Display for LossKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LossKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "categorical_crossentropy" | "cce" => Ok(LossKind::CategoricalCrossEntropy),
            "binary_crossentropy" | "bce" => Ok(LossKind::BinaryCrossEntropy),
            "mean_squared_error" | "mse" => Ok(LossKind::MeanSquaredError),
            other => Err(format!(
                "unknown loss '{other}' (expected categorical_crossentropy, binary_crossentropy or mean_squared_error)"
            )),
        }
    }
}
