#![allow(dead_code)]

use std::{fs, path::Path};

use folder_cnn::{application::train_use_case::TrainConfig, domain::shape::ImageShape};
use image::{Rgb, RgbImage};

/// `root/<class>/img_000.png ...`, each class a distinct colour family.
pub fn write_tree(root: &Path, classes: &[(&str, usize)], size: u32) {
    for (c, (name, count)) in classes.iter().enumerate() {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        for i in 0..*count {
            let base = if c % 2 == 0 { [220, 40, 40] } else { [40, 40, 220] };
            let jitter = (i * 7) as u8;
            let rgb = [base[0] - jitter, base[1] + jitter, base[2] - jitter];
            RgbImage::from_pixel(size, size, Rgb(rgb))
                .save(dir.join(format!("img_{i:03}.png")))
                .unwrap();
        }
    }
}

/// Small, fast configuration over `root/train` and `root/valid`.
pub fn small_config(root: &Path, num_classes: usize) -> TrainConfig {
    TrainConfig {
        train_dir: root.join("train"),
        valid_dir: root.join("valid"),
        output_dir: root.join("out"),
        input_shape: ImageShape::new(16, 16, 3),
        num_classes,
        batch_size: 4,
        epochs: 1,
        conv_filters: vec![4],
        dense_units: 8,
        ..TrainConfig::default()
    }
}
