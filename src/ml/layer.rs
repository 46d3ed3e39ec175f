// ============================================================
// Layer 5 — Layer Specifications
// ============================================================
// A LayerSpec is one entry of the model's layer list. It knows
// how it transforms a per-sample shape and how many parameters
// it owns; the tensors themselves live in ml::model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::shape::FeatureShape;
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Padding {
    /// Zero-pad so the output keeps the input's height and width
    Same,
    /// No padding; the output shrinks by `kernel_size - 1`
    Valid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationKind {
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSpec {
    Conv2d { filters: usize, kernel_size: usize, padding: Padding },
    Activation { kind: ActivationKind },
    MaxPool2d { pool_size: usize },
    Dropout { rate: f64 },
    Flatten,
    Dense { units: usize },
}

impl LayerSpec {
    pub fn conv2d(filters: usize, kernel_size: usize, padding: Padding) -> Self {
        LayerSpec::Conv2d { filters, kernel_size, padding }
    }

    pub fn activation(kind: ActivationKind) -> Self {
        LayerSpec::Activation { kind }
    }

    pub fn max_pool2d(pool_size: usize) -> Self {
        LayerSpec::MaxPool2d { pool_size }
    }

    pub fn dropout(rate: f64) -> Self {
        LayerSpec::Dropout { rate }
    }

    pub fn dense(units: usize) -> Self {
        LayerSpec::Dense { units }
    }

    /// Conv2D and Dense carry learned weights; everything else is stateless.
    pub fn is_parameterized(&self) -> bool {
        matches!(self, LayerSpec::Conv2d { .. } | LayerSpec::Dense { .. })
    }

    /// Shape this layer produces for `input`, or why it cannot accept it.
    /// `index` is the layer's position, used only for error messages.
    pub fn output_shape(&self, index: usize, input: FeatureShape) -> Result<FeatureShape, ModelError> {
        let mismatch = |reason: String| ModelError::ShapeMismatch {
            index,
            layer: self.to_string(),
            input,
            reason,
        };

        match *self {
            LayerSpec::Conv2d { filters, kernel_size, padding } => {
                if filters == 0 {
                    return Err(ModelError::ZeroSized { index, what: "filters" });
                }
                if kernel_size == 0 {
                    return Err(ModelError::ZeroSized { index, what: "kernel_size" });
                }
                let FeatureShape::Spatial { height, width, .. } = input else {
                    return Err(mismatch("convolution needs a spatial feature map".into()));
                };
                match padding {
                    Padding::Same => {
                        // burn only supports `same` padding for odd kernels
                        if kernel_size % 2 == 0 {
                            return Err(mismatch(format!(
                                "same padding needs an odd kernel, got {kernel_size}"
                            )));
                        }
                        Ok(FeatureShape::Spatial { height, width, channels: filters })
                    }
                    Padding::Valid => {
                        if height < kernel_size || width < kernel_size {
                            return Err(mismatch(format!(
                                "kernel {kernel_size}x{kernel_size} is larger than the feature map"
                            )));
                        }
                        Ok(FeatureShape::Spatial {
                            height:   height - kernel_size + 1,
                            width:    width - kernel_size + 1,
                            channels: filters,
                        })
                    }
                }
            }
            LayerSpec::Activation { kind } => {
                if kind == ActivationKind::Softmax && !input.is_flat() {
                    return Err(mismatch("softmax needs a flat input".into()));
                }
                Ok(input)
            }
            LayerSpec::MaxPool2d { pool_size } => {
                if pool_size == 0 {
                    return Err(ModelError::ZeroSized { index, what: "pool_size" });
                }
                let FeatureShape::Spatial { height, width, channels } = input else {
                    return Err(mismatch("pooling needs a spatial feature map".into()));
                };
                if height < pool_size || width < pool_size {
                    return Err(mismatch(format!(
                        "pool window {pool_size}x{pool_size} is larger than the feature map"
                    )));
                }
                Ok(FeatureShape::Spatial {
                    height: height / pool_size,
                    width: width / pool_size,
                    channels,
                })
            }
            LayerSpec::Dropout { rate } => {
                if !(0.0..1.0).contains(&rate) {
                    return Err(ModelError::InvalidDropout { index, rate });
                }
                Ok(input)
            }
            LayerSpec::Flatten => Ok(FeatureShape::Flat(input.volume())),
            LayerSpec::Dense { units } => {
                if units == 0 {
                    return Err(ModelError::ZeroSized { index, what: "units" });
                }
                if !input.is_flat() {
                    return Err(mismatch("dense needs a flat input; add a Flatten layer first".into()));
                }
                Ok(FeatureShape::Flat(units))
            }
        }
    }

    /// Number of learned scalars for the given input shape.
    pub fn num_params(&self, input: FeatureShape) -> usize {
        match *self {
            LayerSpec::Conv2d { filters, kernel_size, .. } => {
                let in_channels = match input {
                    FeatureShape::Spatial { channels, .. } => channels,
                    FeatureShape::Flat(_) => 0,
                };
                kernel_size * kernel_size * in_channels * filters + filters
            }
            LayerSpec::Dense { units } => input.volume() * units + units,
            _ => 0,
        }
    }
}

impl fmt::Display for LayerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerSpec::Conv2d { filters, kernel_size, padding } => {
                let padding = match padding {
                    Padding::Same => "same",
                    Padding::Valid => "valid",
                };
                write!(f, "Conv2D({filters}, {kernel_size}, {padding})")
            }
            LayerSpec::Activation { kind } => write!(f, "Activation({kind:?})"),
            LayerSpec::MaxPool2d { pool_size } => write!(f, "MaxPool2D({pool_size})"),
            LayerSpec::Dropout { rate } => write!(f, "Dropout({rate})"),
            LayerSpec::Flatten => write!(f, "Flatten"),
            LayerSpec::Dense { units } => write!(f, "Dense({units})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spatial(height: usize, width: usize, channels: usize) -> FeatureShape {
        FeatureShape::Spatial { height, width, channels }
    }

    #[test]
    fn test_conv_same_keeps_spatial_size() {
        let out = LayerSpec::conv2d(32, 3, Padding::Same)
            .output_shape(0, spatial(160, 160, 3))
            .unwrap();
        assert_eq!(out, spatial(160, 160, 32));
    }

    #[test]
    fn test_conv_valid_shrinks() {
        let out = LayerSpec::conv2d(32, 3, Padding::Valid)
            .output_shape(0, spatial(160, 160, 32))
            .unwrap();
        assert_eq!(out, spatial(158, 158, 32));
    }

    #[test]
    fn test_pool_floors() {
        let out = LayerSpec::max_pool2d(2).output_shape(0, spatial(77, 77, 64)).unwrap();
        assert_eq!(out, spatial(38, 38, 64));
    }

    #[test]
    fn test_dense_before_flatten_is_a_mismatch() {
        let err = LayerSpec::dense(10).output_shape(4, spatial(8, 8, 3)).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { index: 4, .. }));
    }

    #[test]
    fn test_conv_after_flatten_is_a_mismatch() {
        let err = LayerSpec::conv2d(8, 3, Padding::Same)
            .output_shape(1, FeatureShape::Flat(10))
            .unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_pool_larger_than_map() {
        let err = LayerSpec::max_pool2d(4).output_shape(0, spatial(3, 3, 1)).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_dropout_rate_bounds() {
        let input = FeatureShape::Flat(4);
        assert!(LayerSpec::dropout(0.0).output_shape(0, input).is_ok());
        assert!(matches!(
            LayerSpec::dropout(1.0).output_shape(2, input),
            Err(ModelError::InvalidDropout { index: 2, .. })
        ));
        assert!(LayerSpec::dropout(-0.1).output_shape(0, input).is_err());
    }

    #[test]
    fn test_param_counts() {
        let conv = LayerSpec::conv2d(32, 3, Padding::Same);
        assert_eq!(conv.num_params(spatial(160, 160, 3)), 3 * 3 * 3 * 32 + 32);

        let dense = LayerSpec::dense(10);
        assert_eq!(dense.num_params(FeatureShape::Flat(512)), 512 * 10 + 10);

        assert_eq!(LayerSpec::Flatten.num_params(spatial(2, 2, 2)), 0);
    }

    #[test]
    fn test_serde_tagging() {
        let json = serde_json::to_string(&LayerSpec::conv2d(16, 5, Padding::Valid)).unwrap();
        assert_eq!(json, r#"{"type":"conv2d","filters":16,"kernel_size":5,"padding":"valid"}"#);

        let back: LayerSpec = serde_json::from_str(r#"{"type":"flatten"}"#).unwrap();
        assert_eq!(back, LayerSpec::Flatten);
    }
}
