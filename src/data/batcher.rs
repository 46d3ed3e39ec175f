// ============================================================
// Layer 4 — Image Batcher
// ============================================================
// Implements Burn's Batcher trait: decodes a group of ImageItems
// and stacks them into tensors.
//
// Per image:
//   decode → resize to (height, width) → RGB / grayscale / RGBA
//   → u8 [H, W, C] → f32 / 255
//
// Then for the whole batch:
//   images  [N, H, W, C] → permute → [N, C, H, W]
//   targets [N]            class indices
//   labels  [N, classes]   one-hot
//
// A file that fails to decode here (the open-time probe only
// reads headers) turns the whole batch into a DecodeFailure,
// which the data source reports as a DataSourceError.

use std::path::{Path, PathBuf};

use burn::{data::dataloader::batcher::Batcher, prelude::*};
use image::{imageops::FilterType, DynamicImage};

use crate::data::folder::ImageItem;
use crate::domain::shape::ImageShape;
use crate::error::DataSourceError;

// ─── ImageBatch ───────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ImageBatch<B: Backend> {
    /// Pixel values in [0, 1] — shape: [batch_size, channels, height, width]
    pub images: Tensor<B, 4>,

    /// One-hot labels — shape: [batch_size, num_classes]
    pub labels: Tensor<B, 2>,

    /// Class indices — shape: [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> ImageBatch<B> {
    pub fn len(&self) -> usize {
        self.targets.dims()[0]
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    pub path:   PathBuf,
    pub reason: String,
}

impl From<DecodeFailure> for DataSourceError {
    fn from(f: DecodeFailure) -> Self {
        DataSourceError::Undecodable { path: f.path, reason: f.reason }
    }
}

pub type BatchResult<B> = Result<ImageBatch<B>, DecodeFailure>;

// ─── ImageBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ImageBatcher<B: Backend> {
    device:      B::Device,
    shape:       ImageShape,
    num_classes: usize,
}

impl<B: Backend> ImageBatcher<B> {
    pub fn new(device: B::Device, shape: ImageShape, num_classes: usize) -> Self {
        Self { device, shape, num_classes }
    }

    fn try_batch(&self, items: Vec<ImageItem>) -> BatchResult<B> {
        let batch_size = items.len();

        let paths: Vec<&Path> = items.iter().map(|item| item.path.as_path()).collect();
        let images = load_images::<B, _>(&paths, self.shape, &self.device)?;

        let targets: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let mut one_hot = vec![0.0f32; batch_size * self.num_classes];
        for (row, item) in items.iter().enumerate() {
            one_hot[row * self.num_classes + item.label] = 1.0;
        }

        let labels = Tensor::<B, 2>::from_data(
            TensorData::new(one_hot, [batch_size, self.num_classes]).convert::<B::FloatElem>(),
            &self.device,
        );
        let targets = Tensor::<B, 1, Int>::from_data(
            TensorData::new(targets, [batch_size]).convert::<B::IntElem>(),
            &self.device,
        );

        Ok(ImageBatch { images, labels, targets })
    }
}

impl<B: Backend> Batcher<ImageItem, BatchResult<B>> for ImageBatcher<B> {
    fn batch(&self, items: Vec<ImageItem>) -> BatchResult<B> {
        self.try_batch(items)
    }
}

/// Decode `paths` in order into one [N, C, H, W] tensor with values in [0, 1].
pub fn load_images<B: Backend, P: AsRef<Path>>(
    paths:  &[P],
    shape:  ImageShape,
    device: &B::Device,
) -> Result<Tensor<B, 4>, DecodeFailure> {
    let ImageShape { height, width, channels } = shape;

    let mut pixels: Vec<f32> = Vec::with_capacity(paths.len() * shape.volume());
    for path in paths {
        let raw = load_pixels(path.as_ref(), shape)?;
        pixels.extend(raw.into_iter().map(|p| p as f32 / 255.0));
    }

    let images = Tensor::<B, 4>::from_data(
        TensorData::new(pixels, [paths.len(), height, width, channels]).convert::<B::FloatElem>(),
        device,
    );
    Ok(images.permute([0, 3, 1, 2]))
}

/// Decode one file into `shape.height * shape.width * shape.channels` bytes, row-major HWC.
pub fn load_pixels(path: &Path, shape: ImageShape) -> Result<Vec<u8>, DecodeFailure> {
    let img = image::open(path).map_err(|e| DecodeFailure {
        path:   path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(to_pixels(img, shape))
}

/// Resize and convert an already decoded image.
pub fn to_pixels(img: DynamicImage, shape: ImageShape) -> Vec<u8> {
    let img = if img.width() as usize == shape.width && img.height() as usize == shape.height {
        img
    } else {
        img.resize_exact(shape.width as u32, shape.height as u32, FilterType::Triangle)
    };

    match shape.channels {
        1 => img.into_luma8().into_raw(),
        4 => img.into_rgba8().into_raw(),
        _ => img.into_rgb8().into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::write_image;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_batch_shapes_and_scaling() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        write_image(&a, 6, [255, 0, 51]);
        write_image(&b, 10, [0, 255, 0]);

        let batcher = ImageBatcher::<TestBackend>::new(Default::default(), ImageShape::new(4, 4, 3), 3);
        let batch = batcher
            .batch(vec![
                ImageItem { path: a, label: 2 },
                ImageItem { path: b, label: 0 },
            ])
            .unwrap();

        assert_eq!(batch.images.dims(), [2, 3, 4, 4]);
        assert_eq!(batch.labels.dims(), [2, 3]);
        assert_eq!(batch.len(), 2);

        let pixels = batch.images.into_data().to_vec::<f32>().unwrap();
        assert!(pixels.iter().all(|&p| (0.0..=1.0).contains(&p)));
        // First image, red channel plane is all 255 → 1.0; blue plane 51 → 0.2
        assert!((pixels[0] - 1.0).abs() < 1e-6);
        assert!((pixels[2 * 16] - 0.2).abs() < 1e-6);

        let labels = batch.labels.into_data().to_vec::<f32>().unwrap();
        assert_eq!(labels, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);

        let targets = batch.targets.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![2, 0]);
    }

    #[test]
    fn test_load_images_matches_batch_images() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        write_image(&a, 9, [30, 60, 90]);
        write_image(&b, 4, [200, 100, 0]);

        let shape = ImageShape::new(5, 5, 3);
        let batcher = ImageBatcher::<TestBackend>::new(Default::default(), shape, 2);
        let batch = batcher
            .batch(vec![
                ImageItem { path: a.clone(), label: 0 },
                ImageItem { path: b.clone(), label: 1 },
            ])
            .unwrap();

        let images = load_images::<TestBackend, _>(&[a, b], shape, &Default::default()).unwrap();
        assert_eq!(images.dims(), [2, 3, 5, 5]);
        images.into_data().assert_approx_eq(&batch.images.into_data(), 6);
    }

    #[test]
    fn test_grayscale_target() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        write_image(&a, 5, [10, 20, 30]);

        let pixels = load_pixels(&a, ImageShape::new(3, 3, 1)).unwrap();
        assert_eq!(pixels.len(), 9);
    }

    #[test]
    fn test_decode_failure_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"garbage").unwrap();

        let batcher = ImageBatcher::<TestBackend>::new(Default::default(), ImageShape::new(4, 4, 3), 2);
        let err = batcher.batch(vec![ImageItem { path: broken.clone(), label: 0 }]).unwrap_err();
        assert_eq!(err.path, broken);

        let err: DataSourceError = err.into();
        assert!(matches!(err, DataSourceError::Undecodable { .. }));
    }
}
