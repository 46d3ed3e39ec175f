// ============================================================
// Layer 5 — Architecture
// ============================================================
// The whole layer list, validated once. An Architecture value
// always describes a stack whose shapes line up end to end and
// whose last layer is a softmax over `num_classes` outputs;
// the forward pass relies on that.
//
// The default stack is the classic small CNN:
//
//   [Conv(f, same) → ReLU → Conv(f, valid) → ReLU → MaxPool → Dropout] per f
//   Flatten → Dense → ReLU → Dropout → Dense(num_classes) → Softmax

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::shape::{FeatureShape, ImageShape};
use crate::error::ModelError;
use crate::ml::layer::{ActivationKind, LayerSpec, Padding};

// ─── Stack Configuration ──────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct StackConfig {
    /// One conv block per entry; each entry is the block's filter count
    #[config(default = "vec![32, 64]")]
    pub conv_filters: Vec<usize>,
    #[config(default = 3)]
    pub kernel_size: usize,
    #[config(default = 2)]
    pub pool_size: usize,
    #[config(default = 512)]
    pub dense_units: usize,
    #[config(default = 0.25)]
    pub conv_dropout: f64,
    #[config(default = 0.5)]
    pub dense_dropout: f64,
}

impl StackConfig {
    /// Expand the config into the flat layer list.
    pub fn layers(&self, num_classes: usize) -> Vec<LayerSpec> {
        let relu = LayerSpec::activation(ActivationKind::Relu);
        let mut layers = Vec::with_capacity(self.conv_filters.len() * 6 + 7);

        for &filters in &self.conv_filters {
            layers.extend([
                LayerSpec::conv2d(filters, self.kernel_size, Padding::Same),
                relu,
                LayerSpec::conv2d(filters, self.kernel_size, Padding::Valid),
                relu,
                LayerSpec::max_pool2d(self.pool_size),
                LayerSpec::dropout(self.conv_dropout),
            ]);
        }

        layers.extend([
            LayerSpec::Flatten,
            LayerSpec::dense(self.dense_units),
            relu,
            LayerSpec::dropout(self.dense_dropout),
            LayerSpec::dense(num_classes),
            LayerSpec::activation(ActivationKind::Softmax),
        ]);
        layers
    }
}

// ─── Architecture ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct Architecture {
    input_shape: ImageShape,
    num_classes: usize,
    layers:      Vec<LayerSpec>,
    /// `shapes[i]` is the output shape of `layers[i]`
    shapes:      Vec<FeatureShape>,
}

impl Architecture {
    /// Validate `layers` against `input_shape` and `num_classes`.
    pub fn new(input_shape: ImageShape, num_classes: usize, layers: Vec<LayerSpec>) -> Result<Self, ModelError> {
        if layers.is_empty() {
            return Err(ModelError::Empty);
        }
        if num_classes == 0 {
            return Err(ModelError::ZeroSized { index: layers.len(), what: "num_classes" });
        }

        let mut shapes = Vec::with_capacity(layers.len());
        let mut shape = FeatureShape::from(input_shape);
        for (index, layer) in layers.iter().enumerate() {
            shape = layer.output_shape(index, shape)?;
            shapes.push(shape);
        }

        if !matches!(layers.last(), Some(LayerSpec::Activation { kind: ActivationKind::Softmax })) {
            return Err(ModelError::MissingSoftmaxHead);
        }
        if shape != FeatureShape::Flat(num_classes) {
            return Err(ModelError::ClassCountMismatch { produced: shape.volume(), expected: num_classes });
        }

        Ok(Self { input_shape, num_classes, layers, shapes })
    }

    /// The default stack for the given input and class count.
    pub fn standard(input_shape: ImageShape, num_classes: usize, stack: &StackConfig) -> Result<Self, ModelError> {
        Self::new(input_shape, num_classes, stack.layers(num_classes))
    }

    pub fn input_shape(&self) -> ImageShape {
        self.input_shape
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn output_shapes(&self) -> &[FeatureShape] {
        &self.shapes
    }

    /// Input shape seen by layer `index`.
    pub fn input_of(&self, index: usize) -> FeatureShape {
        match index {
            0 => self.input_shape.into(),
            i => self.shapes[i - 1],
        }
    }

    pub fn num_params(&self) -> usize {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, layer)| layer.num_params(self.input_of(i)))
            .sum()
    }

    pub fn describe(&self, class_names: &[String]) -> ArchitectureDescription {
        let layers = self
            .layers
            .iter()
            .enumerate()
            .map(|(i, layer)| LayerEntry {
                layer:        *layer,
                output_shape: self.shapes[i],
                params:       layer.num_params(self.input_of(i)),
            })
            .collect();

        ArchitectureDescription {
            input_shape:  self.input_shape,
            num_classes:  self.num_classes,
            class_names:  class_names.to_vec(),
            total_params: self.num_params(),
            layers,
        }
    }
}

// ─── Textual Description ──────────────────────────────────────────────────────
// What `save_architecture` writes. Parsing it back re-runs the
// shape validation and checks every declared output shape.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerEntry {
    pub layer:        LayerSpec,
    pub output_shape: FeatureShape,
    #[serde(default)]
    pub params:       usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureDescription {
    pub input_shape:  ImageShape,
    pub num_classes:  usize,
    #[serde(default)]
    pub class_names:  Vec<String>,
    #[serde(default)]
    pub total_params: usize,
    pub layers:       Vec<LayerEntry>,
}

impl ArchitectureDescription {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Rebuild the validated architecture this description declares.
    pub fn to_architecture(&self) -> Result<Architecture, ModelError> {
        let layers = self.layers.iter().map(|e| e.layer).collect();
        let arch = Architecture::new(self.input_shape, self.num_classes, layers)?;

        for (index, (entry, computed)) in self.layers.iter().zip(arch.output_shapes()).enumerate() {
            if entry.output_shape != *computed {
                return Err(ModelError::ShapeMismatch {
                    index,
                    layer:  entry.layer.to_string(),
                    input:  arch.input_of(index),
                    reason: format!("declared output {} but the layer produces {}", entry.output_shape, computed),
                });
            }
        }
        Ok(arch)
    }
}
