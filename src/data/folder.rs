// ============================================================
// Layer 4 — Image Folder
// ============================================================
// Discovers samples in a directory-per-class tree:
//
//   root/
//     cat/  001.png 002.jpg ...
//     dog/  001.png ...
//
// Class index = position of the subdirectory name in sorted
// order, so two trees with the same subdirectory names always
// agree on the label mapping. Samples are listed class by class,
// file names ascending; this is the unshuffled epoch order.
//
// Every file's header is probed when the folder is opened, so a
// tree with an unreadable or unknown-format image is rejected up
// front rather than halfway through the first epoch.

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::data::dataset::Dataset;

use crate::error::DataSourceError;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];

/// One sample before decoding: where it lives and which class it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageItem {
    pub path:  PathBuf,
    pub label: usize,
}

#[derive(Debug, Clone)]
pub struct ImageFolder {
    root:        PathBuf,
    class_names: Vec<String>,
    items:       Vec<ImageItem>,
}

impl ImageFolder {
    /// Scan `root` and probe every image it contains.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, DataSourceError> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            return Err(DataSourceError::MissingDirectory(root));
        }
        if !root.is_dir() {
            return Err(DataSourceError::NotADirectory(root));
        }

        let mut class_dirs: Vec<(String, PathBuf)> = read_dir_sorted(&root)?
            .into_iter()
            .filter(|p| p.is_dir())
            .filter_map(|p| visible_name(&p).map(|name| (name, p)))
            .collect();
        class_dirs.sort_by(|a, b| a.0.cmp(&b.0));

        if class_dirs.is_empty() {
            return Err(DataSourceError::NoClasses(root));
        }

        let mut items = Vec::new();
        for (label, (_, dir)) in class_dirs.iter().enumerate() {
            let files: Vec<PathBuf> = read_dir_sorted(dir)?
                .into_iter()
                .filter(|p| p.is_file() && visible_name(p).is_some() && is_image(p))
                .collect();

            if files.is_empty() {
                return Err(DataSourceError::EmptyClass(dir.clone()));
            }

            for path in files {
                probe(&path)?;
                items.push(ImageItem { path, label });
            }
        }

        let class_names: Vec<String> = class_dirs.into_iter().map(|(name, _)| name).collect();
        tracing::debug!(
            "Scanned '{}': {} classes, {} images",
            root.display(),
            class_names.len(),
            items.len()
        );

        Ok(Self { root, class_names, items })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    /// Number of samples per class, indexed by label.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.class_names.len()];
        for item in &self.items {
            counts[item.label] += 1;
        }
        counts
    }
}

impl Dataset<ImageItem> for ImageFolder {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Directory entries of `dir`, sorted by path.
fn read_dir_sorted(dir: &Path) -> Result<Vec<PathBuf>, DataSourceError> {
    let io_err = |source| DataSourceError::Io { path: dir.to_path_buf(), source };

    let mut paths = fs::read_dir(dir)
        .map_err(io_err)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(io_err)?;
    paths.sort();
    Ok(paths)
}

/// The file name, unless it is hidden (starts with a dot).
fn visible_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    (!name.starts_with('.')).then(|| name.to_string())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Read just enough of the file to know its format and dimensions.
fn probe(path: &Path) -> Result<(), DataSourceError> {
    let undecodable = |reason: String| DataSourceError::Undecodable { path: path.to_path_buf(), reason };

    let reader = image::ImageReader::open(path)
        .map_err(|source| DataSourceError::Io { path: path.to_path_buf(), source })?
        .with_guessed_format()
        .map_err(|e| undecodable(e.to_string()))?;

    let (width, height) = reader.into_dimensions().map_err(|e| undecodable(e.to_string()))?;
    if width == 0 || height == 0 {
        return Err(undecodable("image has no pixels".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fixtures::{write_image, write_tree};

    #[test]
    fn test_discovers_classes_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("zebra", 2), ("ant", 3), ("moth", 1)], 8);

        let folder = ImageFolder::open(dir.path()).unwrap();
        assert_eq!(folder.class_names(), ["ant", "moth", "zebra"]);
        assert_eq!(folder.len(), 6);
        assert_eq!(folder.class_counts(), vec![3, 1, 2]);

        // Discovery order: class by class, file names ascending
        let labels: Vec<usize> = folder.items().iter().map(|i| i.label).collect();
        assert_eq!(labels, vec![0, 0, 0, 1, 2, 2]);
        assert!(folder.items()[0].path.ends_with("ant/img_000.png"));
    }

    #[test]
    fn test_ignores_hidden_and_non_image_files() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a", 1)], 4);
        fs::write(dir.path().join("a/notes.txt"), "not an image").unwrap();
        fs::write(dir.path().join("a/.DS_Store"), "junk").unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        write_image(&dir.path().join(".cache/x.png"), 4, [0, 0, 0]);

        let folder = ImageFolder::open(dir.path()).unwrap();
        assert_eq!(folder.class_names(), ["a"]);
        assert_eq!(folder.len(), 1);
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageFolder::open(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, DataSourceError::MissingDirectory(_)));
    }

    #[test]
    fn test_empty_directory_has_no_classes() {
        let dir = tempfile::tempdir().unwrap();
        let err = ImageFolder::open(dir.path()).unwrap_err();
        assert!(matches!(err, DataSourceError::NoClasses(_)));
    }

    #[test]
    fn test_empty_class_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("full", 2)], 4);
        fs::create_dir(dir.path().join("hollow")).unwrap();

        let err = ImageFolder::open(dir.path()).unwrap_err();
        assert!(matches!(err, DataSourceError::EmptyClass(_)));
    }

    #[test]
    fn test_undecodable_image_is_rejected_at_open() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a", 2)], 4);
        fs::write(dir.path().join("a/broken.png"), b"definitely not a png").unwrap();

        let err = ImageFolder::open(dir.path()).unwrap_err();
        assert!(matches!(err, DataSourceError::Undecodable { .. }));
    }

    #[test]
    fn test_file_instead_of_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        let err = ImageFolder::open(&file).unwrap_err();
        assert!(matches!(err, DataSourceError::NotADirectory(_)));
    }
}
