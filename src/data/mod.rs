// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a directory of image files and a batch of
// tensors the model can consume:
//
//   root/<class>/<file>
//       │
//       ▼
//   ImageFolder       → discovers classes and files, probes headers
//       │
//       ▼
//   ImageBatcher      → decodes, resizes, scales to [0, 1], one-hot
//       │
//       ▼
//   DataSource        → Burn DataLoader, one iterator per epoch

/// Directory-per-class discovery, implements Burn's Dataset trait
pub mod folder;

/// Implements Burn's Batcher trait to create image tensor batches
pub mod batcher;

/// Batch iteration over a folder, with optional per-epoch shuffling
pub mod source;

#[cfg(test)]
pub(crate) mod fixtures {
    use std::{fs, path::Path};

    use image::{Rgb, RgbImage};

    /// Solid-colour square PNG at `path`.
    pub fn write_image(path: &Path, size: u32, rgb: [u8; 3]) {
        RgbImage::from_pixel(size, size, Rgb(rgb)).save(path).unwrap();
    }

    /// `root/<class>/img_000.png ...` with `count` images per class.
    pub fn write_tree(root: &Path, classes: &[(&str, usize)], size: u32) {
        for (c, (name, count)) in classes.iter().enumerate() {
            let dir = root.join(name);
            fs::create_dir_all(&dir).unwrap();
            for i in 0..*count {
                let shade = ((c * 97 + i * 31) % 256) as u8;
                write_image(&dir.join(format!("img_{i:03}.png")), size, [shade, 255 - shade, (c * 60) as u8]);
            }
        }
    }
}
