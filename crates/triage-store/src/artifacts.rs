//! Versioned model artifacts on disk.
//!
//! Each model kind lives in its own well-known JSON file. Files are written to
//! a temporary sibling and renamed into place, so a reader never sees a
//! partially written artifact.

use std::fmt;
use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::info;
use triage_ai::TextClassifier;

use crate::StoreError;

/// Bump when the envelope or [`TextClassifier`] layout changes.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// The two managed model slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Category,
    Priority,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Category, ModelKind::Priority];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Priority => "priority",
        }
    }

    /// Well-known artifact file name.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Category => "category_model.json",
            Self::Priority => "priority_model.json",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trained model plus the metadata needed to load it safely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub format_version: u32,
    pub kind: ModelKind,
    /// Generation that produced this artifact.
    pub generation: u64,
    pub trained_at: DateTime<Utc>,
    /// Training rows, base data plus feedback.
    pub examples: usize,
    pub model: TextClassifier,
}

impl Artifact {
    pub fn new(kind: ModelKind, generation: u64, model: TextClassifier) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            kind,
            generation,
            trained_at: Utc::now(),
            examples: model.example_count(),
            model,
        }
    }
}

/// Directory holding one artifact file per [`ModelKind`].
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open (creating if needed) an artifact directory.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, kind: ModelKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Load the artifact for `kind`.
    ///
    /// Returns `Ok(None)` when no file exists. A file with the wrong format
    /// version or kind is an error, so callers can decide to retrain.
    pub fn load(&self, kind: ModelKind) -> Result<Option<Artifact>, StoreError> {
        let path = self.path(kind);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let artifact: Artifact = serde_json::from_reader(BufReader::new(file))?;
        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(StoreError::ArtifactVersion {
                kind,
                found: artifact.format_version,
                expected: ARTIFACT_FORMAT_VERSION,
            });
        }
        if artifact.kind != kind {
            return Err(StoreError::ArtifactKind {
                expected: kind,
                found: artifact.kind,
            });
        }

        info!(
            kind = %kind,
            generation = artifact.generation,
            examples = artifact.examples,
            path = %path.display(),
            "loaded model artifact"
        );
        Ok(Some(artifact))
    }

    /// Atomically write an artifact, replacing any previous one of the same kind.
    pub fn save(&self, artifact: &Artifact) -> Result<(), StoreError> {
        self.save_all(&[artifact])
    }

    /// Write the artifacts of one generation.
    ///
    /// Every file is serialized and synced to a temporary sibling before the
    /// first rename, so an encoding or disk-full error leaves all previous
    /// files in place. A rename can still fail part way; the loader treats
    /// artifacts with differing generations as unpaired.
    pub fn save_all(&self, artifacts: &[&Artifact]) -> Result<(), StoreError> {
        let mut staged = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            staged.push((*artifact, self.stage(artifact)?));
        }

        for (artifact, tmp) in staged {
            let path = self.path(artifact.kind);
            tmp.persist(&path)?;
            info!(
                kind = %artifact.kind,
                generation = artifact.generation,
                path = %path.display(),
                "saved model artifact"
            );
        }
        Ok(())
    }

    fn stage(&self, artifact: &Artifact) -> Result<NamedTempFile, StoreError> {
        let tmp = NamedTempFile::new_in(&self.dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer(&mut writer, artifact)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }
}
