//! On-disk similarity index.
//!
//! An index is a directory holding `entries.json` (vectors, chunk text and provenance)
//! and `manifest.json`. The manifest is written last, so a directory without one is
//! treated as an unfinished build. Builds happen in a sibling staging directory that
//! is swapped into place only once both files are complete.

use crate::embeddings::{cosine_similarity, Embedder};
use crate::error::{IndexError, IngestError};
use crate::models::{DocumentFingerprint, IndexEntry, RetrievedChunk};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const INDEX_FORMAT_VERSION: u32 = 1;

const MANIFEST_FILE: &str = "manifest.json";
const ENTRIES_FILE: &str = "entries.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    pub format_version: u32,
    pub collection: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub entry_count: usize,
    pub built_at: DateTime<Utc>,
    pub documents: Vec<DocumentFingerprint>,
}

/// A fully loaded, read-only index. Safe to share across concurrent queries.
#[derive(Debug)]
pub struct PersistedIndex {
    root: PathBuf,
    manifest: IndexManifest,
    entries: Vec<IndexEntry>,
}

impl PersistedIndex {
    pub fn open(root: &Path) -> Result<Self, IndexError> {
        if !root.is_dir() {
            return Err(IndexError::Missing(root.to_path_buf()));
        }

        let manifest_path = root.join(MANIFEST_FILE);
        if !manifest_path.is_file() {
            return Err(IndexError::Corrupt {
                path: root.to_path_buf(),
                details: "manifest.json is missing, the build did not finish".to_string(),
            });
        }

        let manifest: IndexManifest = serde_json::from_slice(&fs::read(&manifest_path)?)?;
        if manifest.format_version != INDEX_FORMAT_VERSION {
            return Err(IndexError::UnsupportedFormat {
                found: manifest.format_version,
                expected: INDEX_FORMAT_VERSION,
            });
        }

        let entries: Vec<IndexEntry> = serde_json::from_slice(&fs::read(root.join(ENTRIES_FILE))?)?;
        if entries.len() != manifest.entry_count {
            return Err(IndexError::Corrupt {
                path: root.to_path_buf(),
                details: format!(
                    "manifest lists {} entries but {} were found",
                    manifest.entry_count,
                    entries.len()
                ),
            });
        }

        if let Some(bad) = entries
            .iter()
            .find(|entry| entry.vector.len() != manifest.dimensions)
        {
            return Err(IndexError::Corrupt {
                path: root.to_path_buf(),
                details: format!(
                    "chunk {} has {} dimensions, expected {}",
                    bad.chunk.chunk_id,
                    bad.vector.len(),
                    manifest.dimensions
                ),
            });
        }

        debug!(path = %root.display(), entries = entries.len(), "index loaded");

        Ok(Self {
            root: root.to_path_buf(),
            manifest,
            entries,
        })
    }

    /// Opens the index and refuses it when it was built with a different embedding model.
    pub fn open_for(root: &Path, embedder: &dyn Embedder) -> Result<Self, IndexError> {
        let index = Self::open(root)?;
        index.check_model(embedder)?;
        Ok(index)
    }

    pub fn check_model(&self, embedder: &dyn Embedder) -> Result<(), IndexError> {
        let configured = embedder.model_id();
        if configured != self.manifest.embedding_model
            || embedder.dimensions() != self.manifest.dimensions
        {
            return Err(IndexError::ModelMismatch {
                indexed: self.manifest.embedding_model.clone(),
                indexed_dimensions: self.manifest.dimensions,
                configured,
                configured_dimensions: embedder.dimensions(),
            });
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exhaustive cosine search. Best match first; ties keep index order.
    pub fn nearest(&self, query_vector: &[f32], top_k: usize) -> Vec<RetrievedChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(&entry.vector, query_vector)))
            .collect();

        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        scored
            .into_iter()
            .take(top_k)
            .map(|(position, score)| RetrievedChunk {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect()
    }

    /// Writes a complete index next to `root` and swaps it into place. Any previous index
    /// at `root` stays untouched if the write fails.
    pub fn write(
        root: &Path,
        manifest: &IndexManifest,
        entries: &[IndexEntry],
    ) -> Result<(), IndexError> {
        let (parent, name) = split_root(root);
        fs::create_dir_all(&parent)?;

        let staging = parent.join(format!(".{name}.staging-{}", Uuid::new_v4()));
        let result = write_staging(&staging, manifest, entries).and_then(|()| swap_into_place(&staging, root));

        if result.is_err() && staging.exists() {
            if let Err(error) = fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), %error, "failed to remove staging directory");
            }
        }

        result
    }
}

fn write_staging(
    staging: &Path,
    manifest: &IndexManifest,
    entries: &[IndexEntry],
) -> Result<(), IndexError> {
    fs::create_dir(staging)?;
    fs::write(staging.join(ENTRIES_FILE), serde_json::to_vec(entries)?)?;
    fs::write(
        staging.join(MANIFEST_FILE),
        serde_json::to_vec_pretty(manifest)?,
    )?;
    Ok(())
}

fn swap_into_place(staging: &Path, root: &Path) -> Result<(), IndexError> {
    if !root.exists() {
        fs::rename(staging, root)?;
        return Ok(());
    }

    let (parent, name) = split_root(root);
    let previous = parent.join(format!(".{name}.previous-{}", Uuid::new_v4()));
    fs::rename(root, &previous)?;

    if let Err(error) = fs::rename(staging, root) {
        if let Err(restore) = fs::rename(&previous, root) {
            warn!(path = %previous.display(), error = %restore, "failed to restore previous index");
        }
        return Err(error.into());
    }

    if let Err(error) = fs::remove_dir_all(&previous) {
        warn!(path = %previous.display(), %error, "failed to remove replaced index");
    }
    Ok(())
}

fn split_root(root: &Path) -> (PathBuf, String) {
    let parent = root
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let name = root
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "index".to_string());
    (parent, name)
}

/// Exclusive advisory lock on `.{name}.lock` held for the duration of an index rebuild.
///
/// The OS drops the lock when the holding process exits, so a lock file left behind by
/// a crashed or killed ingest never blocks the next one.
#[derive(Debug)]
pub struct RebuildLock {
    path: PathBuf,
    file: File,
}

impl RebuildLock {
    pub fn acquire(root: &Path) -> Result<Self, IngestError> {
        let (parent, name) = split_root(root);
        fs::create_dir_all(&parent)?;
        let path = parent.join(format!(".{name}.lock"));

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        if let Err(error) = FileExt::try_lock_exclusive(&file) {
            if error.kind() == fs2::lock_contended_error().kind() {
                return Err(IngestError::RebuildInProgress {
                    index: root.to_path_buf(),
                    lock: path,
                });
            }
            return Err(error.into());
        }
        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;

        sweep_abandoned_builds(&parent, &name, root);
        Ok(Self { path, file })
    }
}

impl Drop for RebuildLock {
    fn drop(&mut self) {
        if let Err(error) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), %error, "failed to release rebuild lock");
        }
    }
}

/// Clears what an interrupted rebuild leaves next to `root`. A staging directory is
/// always discarded. A replaced index is put back when the swap never completed and
/// discarded otherwise.
fn sweep_abandoned_builds(parent: &Path, name: &str, root: &Path) {
    let staging_prefix = format!(".{name}.staging-");
    let previous_prefix = format!(".{name}.previous-");
    let siblings = match fs::read_dir(parent) {
        Ok(siblings) => siblings,
        Err(error) => {
            warn!(path = %parent.display(), %error, "failed to scan for abandoned builds");
            return;
        }
    };

    for sibling in siblings.filter_map(|item| item.ok()) {
        let file_name = sibling.file_name().to_string_lossy().to_string();
        let path = sibling.path();

        if file_name.starts_with(&previous_prefix) && !root.exists() {
            match fs::rename(&path, root) {
                Ok(()) => warn!(path = %root.display(), from = %path.display(), "restored index from interrupted rebuild"),
                Err(error) => warn!(path = %path.display(), %error, "failed to restore replaced index"),
            }
            continue;
        }

        if file_name.starts_with(&staging_prefix) || file_name.starts_with(&previous_prefix) {
            match fs::remove_dir_all(&path) {
                Ok(()) => info!(path = %path.display(), "removed abandoned build directory"),
                Err(error) => warn!(path = %path.display(), %error, "failed to remove abandoned build directory"),
            }
        }
    }
}
