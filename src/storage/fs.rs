//! Filesystem access for binary directories.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashSet;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;

use crate::error::{ErrorCode, GcError, GcResult};

/// Outcome of listing a directory that may legitimately not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    /// The directory exists; entry names in enumeration order (possibly none).
    Entries(Vec<String>),
    /// The directory does not exist.
    Absent,
}

/// Trait for the filesystem operations the collector needs.
#[async_trait]
pub trait BinaryFs: Send + Sync {
    /// Lists the entry names directly under `path`.
    ///
    /// A missing directory is reported as [`Listing::Absent`]; any other
    /// failure is an error with [`ErrorCode::ScanFailed`]. Names that are not
    /// valid UTF-8 are left out, since they cannot be addressed again by name.
    async fn list_dir(&self, path: &Path) -> GcResult<Listing>;

    /// Sums the sizes of all regular files under `path`.
    async fn dir_size(&self, path: &Path) -> GcResult<u64>;

    /// Removes `path` and everything under it, whether it is a directory or
    /// not. Removing a missing path succeeds.
    async fn remove_all(&self, path: &Path) -> GcResult<()>;
}

/// Implementation backed by the host filesystem.
#[derive(Debug, Clone, Default)]
pub struct OsBinaryFs;

impl OsBinaryFs {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BinaryFs for OsBinaryFs {
    async fn list_dir(&self, path: &Path) -> GcResult<Listing> {
        let mut dir = match fs::read_dir(path).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Listing::Absent),
            Err(e) => return Err(GcError::io(ErrorCode::ScanFailed, path, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| GcError::io(ErrorCode::ScanFailed, path, e))?
        {
            match entry.file_name().into_string() {
                Ok(name) => entries.push(name),
                Err(name) => warn!(
                    path = %path.display(),
                    entry = ?name,
                    "skipping entry with non UTF-8 name"
                ),
            }
        }
        Ok(Listing::Entries(entries))
    }

    async fn dir_size(&self, path: &Path) -> GcResult<u64> {
        let mut size = 0u64;
        let mut pending = vec![path.to_path_buf()];

        // Symlinks are neither followed nor counted.
        while let Some(current) = pending.pop() {
            let meta = fs::symlink_metadata(&current)
                .await
                .map_err(|e| GcError::io(ErrorCode::MeasureFailed, &current, e))?;

            if meta.is_file() {
                size += meta.len();
            } else if meta.is_dir() {
                let mut dir = fs::read_dir(&current)
                    .await
                    .map_err(|e| GcError::io(ErrorCode::MeasureFailed, &current, e))?;
                while let Some(entry) = dir
                    .next_entry()
                    .await
                    .map_err(|e| GcError::io(ErrorCode::MeasureFailed, &current, e))?
                {
                    pending.push(entry.path());
                }
            }
        }

        Ok(size)
    }

    async fn remove_all(&self, path: &Path) -> GcResult<()> {
        let meta = match fs::symlink_metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(GcError::io(ErrorCode::RemoveFailed, path, e)),
        };

        let removed = if meta.is_dir() {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        };
        match removed {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GcError::io(ErrorCode::RemoveFailed, path, e)),
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Bytes),
}

/// In-memory implementation with failure injection.
///
/// Paths are kept in a sorted map, so listings come back in name order.
/// Injected failures persist until cleared.
#[derive(Debug, Default)]
pub struct MemoryBinaryFs {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
    fail_list: DashSet<PathBuf>,
    fail_size: DashSet<PathBuf>,
    fail_remove: DashSet<PathBuf>,
}

impl MemoryBinaryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates `path` and any missing parents as directories.
    pub fn create_dir_all(&self, path: impl AsRef<Path>) {
        let mut nodes = self.nodes.write();
        for ancestor in path.as_ref().ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            nodes
                .entry(ancestor.to_path_buf())
                .or_insert(Node::Dir);
        }
    }

    /// Writes a file, creating parent directories as needed.
    pub fn write_file(&self, path: impl AsRef<Path>, data: impl Into<Bytes>) {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self.create_dir_all(parent);
        }
        self.nodes
            .write()
            .insert(path.to_path_buf(), Node::File(data.into()));
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        self.nodes.read().contains_key(path.as_ref())
    }

    /// Makes every listing of `path` fail.
    pub fn fail_list(&self, path: impl AsRef<Path>) {
        self.fail_list.insert(path.as_ref().to_path_buf());
    }

    /// Makes every size measurement of `path` fail.
    pub fn fail_size(&self, path: impl AsRef<Path>) {
        self.fail_size.insert(path.as_ref().to_path_buf());
    }

    /// Makes every removal of `path` fail, leaving it in place.
    pub fn fail_remove(&self, path: impl AsRef<Path>) {
        self.fail_remove.insert(path.as_ref().to_path_buf());
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.fail_list.clear();
        self.fail_size.clear();
        self.fail_remove.clear();
    }

    fn injected(code: ErrorCode, path: &Path) -> GcError {
        GcError::io(
            code,
            path,
            io::Error::new(io::ErrorKind::PermissionDenied, "injected failure"),
        )
    }
}

#[async_trait]
impl BinaryFs for MemoryBinaryFs {
    async fn list_dir(&self, path: &Path) -> GcResult<Listing> {
        if self.fail_list.contains(path) {
            return Err(Self::injected(ErrorCode::ScanFailed, path));
        }

        let nodes = self.nodes.read();
        match nodes.get(path) {
            None => Ok(Listing::Absent),
            Some(Node::File(_)) => Err(GcError::with_message(
                ErrorCode::ScanFailed,
                format!("{}: not a directory", path.display()),
            )),
            Some(Node::Dir) => {
                let entries = nodes
                    .range(path.to_path_buf()..)
                    .take_while(|(k, _)| k.starts_with(path))
                    .filter(|(k, _)| k.parent() == Some(path))
                    .filter_map(|(k, _)| k.file_name())
                    .filter_map(|name| name.to_str())
                    .map(str::to_string)
                    .collect();
                Ok(Listing::Entries(entries))
            }
        }
    }

    async fn dir_size(&self, path: &Path) -> GcResult<u64> {
        if self.fail_size.contains(path) {
            return Err(Self::injected(ErrorCode::MeasureFailed, path));
        }

        let nodes = self.nodes.read();
        if !nodes.contains_key(path) {
            return Err(GcError::io(
                ErrorCode::MeasureFailed,
                path,
                io::Error::from(io::ErrorKind::NotFound),
            ));
        }

        Ok(nodes
            .range(path.to_path_buf()..)
            .take_while(|(k, _)| k.starts_with(path))
            .map(|(_, node)| match node {
                Node::File(data) => data.len() as u64,
                Node::Dir => 0,
            })
            .sum())
    }

    async fn remove_all(&self, path: &Path) -> GcResult<()> {
        if self.fail_remove.contains(path) {
            return Err(Self::injected(ErrorCode::RemoveFailed, path));
        }

        self.nodes.write().retain(|k, _| !k.starts_with(path));
        Ok(())
    }
}
