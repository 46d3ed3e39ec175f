// ============================================================
// Layer 4 — Data Source
// ============================================================
// Ties an ImageFolder to Burn's DataLoader. Each call to
// `epoch()` is one full pass over every sample:
//
//   shuffle = Some(seed) → order re-drawn at the start of every
//                          epoch from an RNG seeded once
//   shuffle = None       → discovery order, identical each epoch
//
// Batches are decoded lazily as the pass advances. The loader is
// built without worker threads so batch order depends only on
// the seed and the epoch number.

use std::{path::Path, sync::Arc};

use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};

use crate::data::{
    batcher::{BatchResult, ImageBatch, ImageBatcher},
    folder::ImageFolder,
};
use crate::domain::shape::ImageShape;
use crate::error::DataSourceError;

pub struct DataSource<B: Backend> {
    class_names: Vec<String>,
    num_samples: usize,
    batch_size:  usize,
    shape:       ImageShape,
    loader:      Arc<dyn DataLoader<BatchResult<B>>>,
}

impl<B: Backend> DataSource<B> {
    /// Scan `directory` and prepare batches of `batch_size` images resized to `target_size`.
    pub fn open(
        directory:   impl AsRef<Path>,
        batch_size:  usize,
        target_size: ImageShape,
        shuffle:     Option<u64>,
        device:      &B::Device,
    ) -> Result<Self, DataSourceError> {
        if batch_size == 0 {
            return Err(DataSourceError::ZeroBatchSize);
        }
        if !matches!(target_size.channels, 1 | 3 | 4) {
            return Err(DataSourceError::UnsupportedChannels(target_size.channels));
        }

        let folder = ImageFolder::open(directory)?;
        Ok(Self::from_folder(folder, batch_size, target_size, shuffle, device))
    }

    pub fn from_folder(
        folder:      ImageFolder,
        batch_size:  usize,
        target_size: ImageShape,
        shuffle:     Option<u64>,
        device:      &B::Device,
    ) -> Self {
        let class_names = folder.class_names().to_vec();
        let num_samples = folder.items().len();

        tracing::info!(
            "Data source '{}': {} images in {} classes, batch_size={}, shuffle={}",
            folder.root().display(),
            num_samples,
            class_names.len(),
            batch_size,
            shuffle.is_some()
        );
        for (name, count) in class_names.iter().zip(folder.class_counts()) {
            tracing::debug!("  class '{}': {} images", name, count);
        }

        let batcher = ImageBatcher::<B>::new(device.clone(), target_size, class_names.len());
        let builder = DataLoaderBuilder::new(batcher).batch_size(batch_size);
        let builder = match shuffle {
            Some(seed) => builder.shuffle(seed),
            None => builder,
        };

        Self {
            class_names,
            num_samples,
            batch_size,
            shape: target_size,
            loader: builder.build(folder),
        }
    }

    /// One full pass over the data.
    pub fn epoch(&self) -> impl Iterator<Item = Result<ImageBatch<B>, DataSourceError>> + '_ {
        self.loader.iter().map(|batch| batch.map_err(DataSourceError::from))
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn image_shape(&self) -> ImageShape {
        self.shape
    }

    /// Batches per epoch, counting a trailing short batch.
    pub fn num_batches(&self) -> usize {
        self.num_samples.div_ceil(self.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::write_tree;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn targets(batch: &ImageBatch<TestBackend>) -> Vec<i64> {
        batch.targets.clone().into_data().convert::<i64>().to_vec::<i64>().unwrap()
    }

    fn epoch_targets(source: &DataSource<TestBackend>) -> Vec<i64> {
        source.epoch().flat_map(|b| targets(&b.unwrap())).collect()
    }

    #[test]
    fn test_epoch_covers_every_file_with_short_last_batch() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a", 4), ("b", 3)], 6);

        let source =
            DataSource::<TestBackend>::open(dir.path(), 3, ImageShape::new(4, 4, 3), None, &Default::default())
                .unwrap();
        assert_eq!(source.num_samples(), 7);
        assert_eq!(source.num_batches(), 3);

        let sizes: Vec<usize> = source.epoch().map(|b| b.unwrap().len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(sizes.iter().sum::<usize>(), 7);
    }

    #[test]
    fn test_unshuffled_order_is_fixed_across_epochs() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a", 3), ("b", 3)], 4);

        let source =
            DataSource::<TestBackend>::open(dir.path(), 4, ImageShape::new(4, 4, 3), None, &Default::default())
                .unwrap();
        let first = epoch_targets(&source);
        assert_eq!(first, vec![0, 0, 0, 1, 1, 1]);
        assert_eq!(epoch_targets(&source), first);
    }

    #[test]
    fn test_shuffled_source_keeps_every_sample() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a", 5), ("b", 5), ("c", 5)], 4);

        let source =
            DataSource::<TestBackend>::open(dir.path(), 4, ImageShape::new(4, 4, 3), Some(7), &Default::default())
                .unwrap();

        let mut seen = Vec::new();
        let mut orders = Vec::new();
        for _ in 0..3 {
            let order = epoch_targets(&source);
            let mut sorted = order.clone();
            sorted.sort();
            seen.push(sorted);
            orders.push(order);
        }

        let expected: Vec<i64> = [0; 5].into_iter().chain([1; 5]).chain([2; 5]).collect();
        assert!(seen.iter().all(|s| *s == expected));
        // 15 samples, three epochs: identical orders every time would mean no reshuffle
        assert!(orders[0] != orders[1] || orders[1] != orders[2]);
    }

    #[test]
    fn test_empty_directory_fails_before_any_batch() {
        let dir = tempfile::tempdir().unwrap();
        let result = DataSource::<TestBackend>::open(dir.path(), 4, ImageShape::new(4, 4, 3), None, &Default::default());
        assert!(matches!(result, Err(DataSourceError::NoClasses(_))));
    }

    #[test]
    fn test_zero_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a", 1)], 4);
        let result = DataSource::<TestBackend>::open(dir.path(), 0, ImageShape::new(4, 4, 3), None, &Default::default());
        assert!(matches!(result, Err(DataSourceError::ZeroBatchSize)));
    }
}
