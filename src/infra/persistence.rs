// ============================================================
// Layer 6 — Model Persistence
// ============================================================
// Three artifacts per trained model:
//
//   model.mpk          — architecture text + class names + parameters,
//                        one named MessagePack record; enough on its
//                        own to rebuild the model
//   weights.mpk        — parameters only (convs.0.weight, denses.1.bias, ...)
//   architecture.json  — human-readable layer list with output shapes
//
// Records are serialised in memory with Burn's bytes recorder at
// full precision, then written through a temporary file in the
// target directory and renamed into place. A failed save leaves
// no file behind and never truncates an existing one.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Record, Recorder},
};
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use crate::error::PersistenceError;
use crate::ml::{
    architecture::ArchitectureDescription,
    model::{Model, Parameters, ParametersRecord},
};

type Bytes = NamedMpkBytesRecorder<FullPrecisionSettings>;

/// Contents of a full model file.
#[derive(Record)]
pub struct ModelFileRecord<B: Backend> {
    /// `ArchitectureDescription` as JSON, class names included
    pub architecture: String,
    pub parameters:   ParametersRecord<B>,
}

// ─── Save ─────────────────────────────────────────────────────────────────────

pub fn save_model<B: Backend>(model: &Model<B>, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    let architecture = describe(model, path)?;

    let record = ModelFileRecord::<B> {
        architecture,
        parameters: model.params().clone().into_record(),
    };
    let bytes = Recorder::<B>::record(&Bytes::default(), record, ())
        .map_err(|e| record_error(path, e))?;

    write_atomic(path, &bytes)?;
    tracing::info!("Saved model ({} bytes) to '{}'", bytes.len(), path.display());
    Ok(())
}

pub fn save_weights<B: Backend>(model: &Model<B>, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    let record = model.params().clone().into_record();
    let bytes = Recorder::<B>::record(&Bytes::default(), record, ())
        .map_err(|e| record_error(path, e))?;

    write_atomic(path, &bytes)?;
    tracing::info!("Saved weights ({} bytes) to '{}'", bytes.len(), path.display());
    Ok(())
}

pub fn save_architecture<B: Backend>(model: &Model<B>, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    let text = describe(model, path)?;

    write_atomic(path, text.as_bytes())?;
    tracing::info!("Saved architecture to '{}'", path.display());
    Ok(())
}

/// Any serde value as pretty JSON, written atomically.
pub fn save_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(value).map_err(|e| record_error(path, e))?;
    write_atomic(path, text.as_bytes())
}

// ─── Load ─────────────────────────────────────────────────────────────────────

/// Rebuild a model from a file written by `save_model`.
pub fn load_model<B: Backend>(path: impl AsRef<Path>, device: &B::Device) -> Result<Model<B>, PersistenceError> {
    let path  = path.as_ref();
    let bytes = read(path)?;

    let record: ModelFileRecord<B> = Recorder::<B>::load(&Bytes::default(), bytes, device)
        .map_err(|e| record_error(path, e))?;

    let description = parse_description(path, &record.architecture)?;
    let architecture = description
        .to_architecture()
        .map_err(|e| architecture_error(path, e))?;

    let params = architecture.init::<B>(device);
    check_layer_counts(path, &record.parameters, &params)?;
    let params = params.load_record(record.parameters);
    check_param_count(path, &params, architecture.num_params())?;

    tracing::info!(
        "Loaded model from '{}': {} layers, {} classes",
        path.display(),
        architecture.layers().len(),
        architecture.num_classes()
    );
    Ok(Model::from_parts(architecture, description.class_names, params))
}

/// Replace the parameters of `model` with those in a file written by `save_weights`.
pub fn load_weights<B: Backend>(
    model:  Model<B>,
    path:   impl AsRef<Path>,
    device: &B::Device,
) -> Result<Model<B>, PersistenceError> {
    let path  = path.as_ref();
    let bytes = read(path)?;

    let record: ParametersRecord<B> = Recorder::<B>::load(&Bytes::default(), bytes, device)
        .map_err(|e| record_error(path, e))?;

    check_layer_counts(path, &record, model.params())?;
    let expected = model.architecture().num_params();
    let model = model.map_params(|params| params.load_record(record));
    check_param_count(path, model.params(), expected)?;

    tracing::debug!("Loaded weights from '{}'", path.display());
    Ok(model)
}

/// Parse and re-validate an `architecture.json` file.
pub fn load_architecture(path: impl AsRef<Path>) -> Result<ArchitectureDescription, PersistenceError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| PersistenceError::Read { path: path.into(), source })?;

    let description = parse_description(path, &text)?;
    description.to_architecture().map_err(|e| architecture_error(path, e))?;
    Ok(description)
}

pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, PersistenceError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| PersistenceError::Read { path: path.into(), source })?;
    serde_json::from_str(&text).map_err(|e| record_error(path, e))
}

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn describe<B: Backend>(model: &Model<B>, path: &Path) -> Result<String, PersistenceError> {
    model
        .architecture()
        .describe(model.class_names())
        .to_json()
        .map_err(|e| architecture_error(path, e))
}

fn parse_description(path: &Path, text: &str) -> Result<ArchitectureDescription, PersistenceError> {
    ArchitectureDescription::from_json(text).map_err(|e| architecture_error(path, e))
}

/// Burn asserts on Vec length mismatches inside `load_record`, so compare them first.
fn check_layer_counts<B: Backend>(
    path:   &Path,
    record: &ParametersRecord<B>,
    params: &Parameters<B>,
) -> Result<(), PersistenceError> {
    let found    = (record.convs.len(), record.denses.len());
    let expected = (params.convs.len(), params.denses.len());
    if found != expected {
        return Err(PersistenceError::Record {
            path:   path.into(),
            reason: format!(
                "record holds {} conv and {} dense layers, the architecture has {} and {}",
                found.0, found.1, expected.0, expected.1
            ),
        });
    }
    Ok(())
}

fn check_param_count<B: Backend>(path: &Path, params: &Parameters<B>, expected: usize) -> Result<(), PersistenceError> {
    let found = params.num_params();
    if found != expected {
        return Err(PersistenceError::Record {
            path:   path.into(),
            reason: format!("record holds {found} parameters, the architecture needs {expected}"),
        });
    }
    Ok(())
}

fn read(path: &Path) -> Result<Vec<u8>, PersistenceError> {
    fs::read(path).map_err(|source| PersistenceError::Read { path: path.into(), source })
}

fn record_error(path: &Path, e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Record { path: path.into(), reason: e.to_string() }
}

fn architecture_error(path: &Path, e: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Architecture { path: path.into(), reason: e.to_string() }
}

/// Write `bytes` to a temp file beside `path`, then rename it over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let parent: PathBuf = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.into(),
        _ => PathBuf::from("."),
    };
    if !parent.is_dir() {
        return Err(PersistenceError::MissingParent(path.into()));
    }

    let write_err = |source| PersistenceError::Write { path: path.into(), source };

    let mut tmp = NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    tracing::debug!("Wrote {} bytes to '{}'", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::shape::ImageShape;
    use crate::ml::architecture::StackConfig;
    use burn::{backend::NdArray, tensor::Distribution};

    type TestBackend = NdArray;

    fn small_model() -> Model<TestBackend> {
        Model::with_stack(
            ImageShape::new(12, 12, 3),
            3,
            &StackConfig::new().with_conv_filters(vec![4]).with_dense_units(8),
            &Default::default(),
        )
        .unwrap()
        .with_class_names(vec!["ant".into(), "bee".into(), "cat".into()])
    }

    fn images() -> Tensor<TestBackend, 4> {
        Tensor::random([2, 3, 12, 12], Distribution::Uniform(0.0, 1.0), &Default::default())
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_model_round_trip_reproduces_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.mpk");
        let model = small_model();
        save_model(&model, &path).unwrap();

        let loaded = load_model::<TestBackend>(&path, &Default::default()).unwrap();
        assert_eq!(loaded.architecture(), model.architecture());
        assert_eq!(loaded.class_names(), model.class_names());
        assert_eq!(
            loaded.architecture().describe(loaded.class_names()),
            model.architecture().describe(model.class_names())
        );

        let x = images();
        model.predict(x.clone()).into_data().assert_approx_eq(&loaded.predict(x).into_data(), 5);
        assert_eq!(files_in(dir.path()), vec!["model.mpk"]);
    }

    #[test]
    fn test_weights_load_into_fresh_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.mpk");
        let model = small_model();
        save_weights(&model, &path).unwrap();

        let fresh = Model::<TestBackend>::from_architecture(model.architecture().clone(), &Default::default());
        let restored = load_weights(fresh, &path, &Default::default()).unwrap();

        let x = images();
        model.predict(x.clone()).into_data().assert_approx_eq(&restored.predict(x).into_data(), 5);
    }

    #[test]
    fn test_weights_with_a_different_layer_count_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.mpk");
        save_weights(&small_model(), &path).unwrap();

        let deeper = Model::<TestBackend>::with_stack(
            ImageShape::new(12, 12, 3),
            3,
            &StackConfig::new().with_conv_filters(vec![4, 4]).with_dense_units(8),
            &Default::default(),
        )
        .unwrap();

        let err = load_weights(deeper, &path, &Default::default()).unwrap_err();
        match err {
            PersistenceError::Record { reason, .. } => assert!(reason.contains("conv"), "{reason}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_weights_with_different_filter_widths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.mpk");
        save_weights(&small_model(), &path).unwrap();

        let wider = Model::<TestBackend>::with_stack(
            ImageShape::new(12, 12, 3),
            3,
            &StackConfig::new().with_conv_filters(vec![6]).with_dense_units(8),
            &Default::default(),
        )
        .unwrap();

        let err = load_weights(wider, &path, &Default::default()).unwrap_err();
        assert!(matches!(err, PersistenceError::Record { .. }));
    }

    #[test]
    fn test_architecture_file_is_revalidated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("architecture.json");
        let model = small_model();
        save_architecture(&model, &path).unwrap();

        let description = load_architecture(&path).unwrap();
        assert_eq!(description.class_names, vec!["ant", "bee", "cat"]);
        assert_eq!(description.to_architecture().unwrap(), *model.architecture());

        // Tamper with a declared output shape
        let text = fs::read_to_string(&path).unwrap().replacen("\"flat\": 3", "\"flat\": 4", 1);
        fs::write(&path, text).unwrap();
        assert!(matches!(load_architecture(&path), Err(PersistenceError::Architecture { .. })));
    }

    #[test]
    fn test_missing_parent_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("model.mpk");

        let err = save_model(&small_model(), &path).unwrap_err();
        assert!(matches!(err, PersistenceError::MissingParent(_)));
        assert!(!path.exists());
        assert!(files_in(dir.path()).is_empty());
    }

    #[test]
    fn test_garbage_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.mpk");
        fs::write(&path, b"not a record").unwrap();

        let err = load_model::<TestBackend>(&path, &Default::default()).unwrap_err();
        assert!(matches!(err, PersistenceError::Record { .. }));
    }
}
