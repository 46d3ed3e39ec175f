// ============================================================
// Layer 3 — Tensor Shapes
// ============================================================
// Shapes are described per sample (no batch dimension), in the
// height × width × channels order images are stored on disk.
// The ml layer converts to burn's [N, C, H, W] layout itself.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Shape of one input image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageShape {
    pub height:   usize,
    pub width:    usize,
    pub channels: usize,
}

impl ImageShape {
    pub const fn new(height: usize, width: usize, channels: usize) -> Self {
        Self { height, width, channels }
    }

    /// Number of scalar values in one image.
    pub fn volume(&self) -> usize {
        self.height * self.width * self.channels
    }
}

impl Default for ImageShape {
    fn default() -> Self {
        Self::new(160, 160, 3)
    }
}

impl From<ImageShape> for FeatureShape {
    fn from(s: ImageShape) -> Self {
        FeatureShape::Spatial {
            height:   s.height,
            width:    s.width,
            channels: s.channels,
        }
    }
}

impl fmt::Display for ImageShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.height, self.width, self.channels)
    }
}

/// Shape of the activations flowing between two layers.
///
/// Convolution and pooling layers work on `Spatial` feature maps;
/// `Flatten` turns a feature map into a `Flat` vector that dense
/// layers consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureShape {
    Spatial { height: usize, width: usize, channels: usize },
    Flat(usize),
}

impl FeatureShape {
    pub fn volume(&self) -> usize {
        match *self {
            FeatureShape::Spatial { height, width, channels } => height * width * channels,
            FeatureShape::Flat(n) => n,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, FeatureShape::Flat(_))
    }
}

impl fmt::Display for FeatureShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureShape::Spatial { height, width, channels } => {
                write!(f, "({height}, {width}, {channels})")
            }
            FeatureShape::Flat(n) => write!(f, "({n})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_image_shape() {
        let s = ImageShape::default();
        assert_eq!(s, ImageShape::new(160, 160, 3));
        assert_eq!(s.volume(), 160 * 160 * 3);
    }

    #[test]
    fn test_display() {
        let spatial: FeatureShape = ImageShape::new(4, 5, 3).into();
        assert_eq!(spatial.to_string(), "(4, 5, 3)");
        assert_eq!(FeatureShape::Flat(60).to_string(), "(60)");
        assert_eq!(spatial.volume(), FeatureShape::Flat(60).volume());
    }
}
