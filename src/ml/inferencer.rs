// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Loads a full model file and classifies image files with it.
// Images go through the same resize / channel conversion /
// divide-by-255 path as training batches, and the forward pass
// runs in evaluation mode.

use std::path::{Path, PathBuf};

use burn::prelude::*;

use crate::data::batcher::load_images;
use crate::error::{DataSourceError, InferenceError, PersistenceError};
use crate::infra::persistence::load_model;
use crate::ml::model::Model;

/// Images per forward pass.
const BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub path:        PathBuf,
    pub class_index: usize,
    pub class_name:  String,
    pub probability: f32,
}

pub struct Inferencer<B: Backend> {
    model:  Model<B>,
    device: B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(model: Model<B>, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Load a file written by `save_model`.
    pub fn from_file(path: impl AsRef<Path>, device: B::Device) -> Result<Self, PersistenceError> {
        let model = load_model::<B>(path, &device)?;
        Ok(Self::new(model, device))
    }

    pub fn model(&self) -> &Model<B> {
        &self.model
    }

    /// Name of class `index`, falling back to the index when the model carries no names.
    pub fn class_name(&self, index: usize) -> String {
        self.model
            .class_names()
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("class_{index}"))
    }

    /// Full probability distribution for each image, in input order.
    pub fn probabilities(&self, paths: &[PathBuf]) -> Result<Vec<Vec<f32>>, InferenceError> {
        let shape = self.model.architecture().input_shape();
        let num_classes = self.model.architecture().num_classes();
        let mut rows = Vec::with_capacity(paths.len());

        for chunk in paths.chunks(BATCH_SIZE) {
            let images = load_images::<B, _>(chunk, shape, &self.device).map_err(DataSourceError::from)?;

            let probs = self
                .model
                .predict(images)
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| InferenceError::Output(format!("{e:?}")))?;
            rows.extend(probs.chunks(num_classes).map(|row| row.to_vec()));
        }
        Ok(rows)
    }

    /// Most probable class for each image.
    pub fn classify(&self, paths: &[PathBuf]) -> Result<Vec<Prediction>, InferenceError> {
        let rows = self.probabilities(paths)?;

        let predictions = paths
            .iter()
            .zip(rows)
            .map(|(path, row)| {
                let (class_index, probability) = row
                    .iter()
                    .copied()
                    .enumerate()
                    .fold((0, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });
                Prediction {
                    path: path.clone(),
                    class_index,
                    class_name: self.class_name(class_index),
                    probability,
                }
            })
            .collect();
        Ok(predictions)
    }
}
