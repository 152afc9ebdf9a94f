//! On-disk dataset store with a verbatim mirror copy.
//!
//! - Missing file reads as an empty dataset
//! - Atomic writes (write to .tmp, rename into place)
//! - After every successful write the file is copied byte-for-byte into the
//!   mirror directory, if that directory exists

use super::dataset::Dataset;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("dataset at {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("dataset serialization: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> DatasetError + '_ {
    move |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// What a persist call touched.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistReport {
    pub path: PathBuf,
    pub digest: String,
    /// Mirror file written, if the mirror directory exists.
    pub mirrored_to: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct DatasetStore {
    path: PathBuf,
    mirror_dir: Option<PathBuf>,
}

impl DatasetStore {
    pub fn new(path: impl Into<PathBuf>, mirror_dir: Option<PathBuf>) -> Self {
        Self {
            path: path.into(),
            mirror_dir,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mirror file path: the dataset's file name inside the mirror directory.
    pub fn mirror_path(&self) -> Option<PathBuf> {
        let dir = self.mirror_dir.as_ref()?;
        let name = self.path.file_name()?;
        Some(dir.join(name))
    }

    /// Read the dataset. A missing file is an empty dataset.
    pub fn load(&self) -> Result<Dataset, DatasetError> {
        read_dataset(&self.path).map(Option::unwrap_or_default)
    }

    /// Read `primary`, else `fallback`, else an empty dataset.
    ///
    /// Also returns the file actually read, `None` when neither exists.
    pub fn load_with_fallback(
        primary: &Path,
        fallback: &Path,
    ) -> Result<(Dataset, Option<PathBuf>), DatasetError> {
        if let Some(ds) = read_dataset(primary)? {
            return Ok((ds, Some(primary.to_path_buf())));
        }
        debug!(primary = %primary.display(), fallback = %fallback.display(), "using fallback read path");
        match read_dataset(fallback)? {
            Some(ds) => Ok((ds, Some(fallback.to_path_buf()))),
            None => Ok((Dataset::new(), None)),
        }
    }

    /// BLAKE3 digest of the file bytes, `None` when the file does not exist.
    pub fn digest(&self) -> Result<Option<String>, DatasetError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(blake3::hash(&bytes).to_hex().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&self.path)(e)),
        }
    }

    /// Write `dataset` as the new durable state, then refresh the mirror.
    pub fn persist(&self, dataset: &Dataset) -> Result<PersistReport, DatasetError> {
        let json = dataset.to_pretty_json()?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json.as_bytes()).map_err(io_err(&tmp_path))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            io_err(&self.path)(e)
        })?;

        let digest = blake3::hash(json.as_bytes()).to_hex().to_string();
        info!(path = %self.path.display(), regions = dataset.len(), %digest, "dataset written");

        let mirrored_to = self.mirror()?;
        Ok(PersistReport {
            path: self.path.clone(),
            digest,
            mirrored_to,
        })
    }

    /// Copy the current dataset file into the mirror directory verbatim.
    ///
    /// Does nothing when the mirror directory or the dataset file is absent.
    pub fn mirror(&self) -> Result<Option<PathBuf>, DatasetError> {
        let Some(target) = self.mirror_path() else {
            return Ok(None);
        };
        let dir_exists = self.mirror_dir.as_ref().is_some_and(|d| d.is_dir());
        if !dir_exists || !self.path.is_file() {
            debug!(target = %target.display(), "mirror skipped");
            return Ok(None);
        }
        // Copying a file onto itself truncates it.
        if same_file(&self.path, &target) {
            warn!(target = %target.display(), "mirror target is the dataset file itself, skipped");
            return Ok(None);
        }
        fs::copy(&self.path, &target).map_err(io_err(&target))?;
        info!(target = %target.display(), "dataset mirrored");
        Ok(Some(target))
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn read_dataset(path: &Path) -> Result<Option<Dataset>, DatasetError> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path)(e)),
    };
    Dataset::from_json(&content)
        .map(Some)
        .map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        })
}
