// ============================================================
// Layer 2 — Predict Use Case
// ============================================================
// Loads a saved model file once and classifies image files with
// it. Everything the model needs (architecture, class names,
// weights) comes from that single file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burn::prelude::*;

use crate::ml::inferencer::{Inferencer, Prediction};

pub struct PredictUseCase<B: Backend> {
    inferencer: Inferencer<B>,
}

impl<B: Backend> PredictUseCase<B> {
    pub fn new(model_path: impl AsRef<Path>, device: B::Device) -> Result<Self> {
        let model_path = model_path.as_ref();
        let inferencer = Inferencer::from_file(model_path, device)
            .with_context(|| format!("Cannot load model '{}'. Have you trained one?", model_path.display()))?;
        Ok(Self { inferencer })
    }

    pub fn class_names(&self) -> &[String] {
        self.inferencer.model().class_names()
    }

    pub fn predict(&self, images: &[PathBuf]) -> Result<Vec<Prediction>> {
        tracing::info!("Classifying {} images", images.len());
        let predictions = self.inferencer.classify(images).context("Cannot classify images")?;
        for p in &predictions {
            tracing::debug!("{} → {} ({:.4})", p.path.display(), p.class_name, p.probability);
        }
        Ok(predictions)
    }
}
