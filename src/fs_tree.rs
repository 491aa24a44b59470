//! Filesystem side of archives: read an unpacked tree from disk and write
//! packed trees out as directories.
//!
//! Writes are staged in a hidden sibling directory and renamed into place
//! only once every file is on disk, so a failed export never leaves a
//! half-written folder behind.

#[cfg(test)]
#[path = "fs_tree_test.rs"]
mod fs_tree_test;

use std::io;
use std::path::{Component, Path, PathBuf};

use plan::archive::{ArchiveError, ArchivePackager, VirtualTree};
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub(crate) enum FsError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("{0} already exists")]
    Exists(PathBuf),
    #[error("refusing to write outside the output directory: {0}")]
    UnsafePath(String),
}

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> FsError + '_ {
    move |source| FsError::Io { path: path.to_path_buf(), source }
}

/// Read every file under `dir` into a tree keyed by `/`-separated relative path.
///
/// # Errors
///
/// Returns [`FsError::NotADirectory`] if `dir` is not a directory, or
/// [`FsError::Io`] on any read failure.
pub(crate) async fn read_tree(dir: &Path) -> Result<VirtualTree, FsError> {
    let meta = fs::metadata(dir).await.map_err(io_err(dir))?;
    if !meta.is_dir() {
        return Err(FsError::NotADirectory(dir.to_path_buf()));
    }

    let mut tree = VirtualTree::new();
    let mut pending = vec![(dir.to_path_buf(), String::new())];
    while let Some((path, prefix)) = pending.pop() {
        let mut entries = fs::read_dir(&path).await.map_err(io_err(&path))?;
        while let Some(entry) = entries.next_entry().await.map_err(io_err(&path))? {
            let name = entry.file_name().to_string_lossy().to_string();
            let key = if prefix.is_empty() { name } else { format!("{prefix}/{name}") };
            let entry_path = entry.path();
            let kind = entry.file_type().await.map_err(io_err(&entry_path))?;
            if kind.is_dir() {
                pending.push((entry_path, key));
            } else if kind.is_file() {
                let bytes = fs::read(&entry_path).await.map_err(io_err(&entry_path))?;
                tree.insert(key, bytes);
            }
        }
    }
    Ok(tree)
}

/// Join a tree key onto `base`, rejecting anything that could escape it.
fn safe_join(base: &Path, key: &str) -> Result<PathBuf, FsError> {
    let rel = Path::new(key);
    let clean = !key.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
    if clean { Ok(base.join(rel)) } else { Err(FsError::UnsafePath(key.to_owned())) }
}

/// Writes each packed tree to `<root>/<file_name>/` as plain files.
#[derive(Debug, Clone)]
pub(crate) struct DirectoryPackager {
    root: PathBuf,
}

impl DirectoryPackager {
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Stage `tree` and move it to its final name.
    ///
    /// # Errors
    ///
    /// Returns [`FsError::Exists`] if the destination is taken,
    /// [`FsError::UnsafePath`] for keys that leave the tree, or
    /// [`FsError::Io`] on any write failure. The staging directory is removed
    /// on failure.
    pub(crate) async fn write(&self, file_name: &str, tree: &VirtualTree) -> Result<PathBuf, FsError> {
        let dest = safe_join(&self.root, file_name)?;
        if fs::try_exists(&dest).await.map_err(io_err(&dest))? {
            return Err(FsError::Exists(dest));
        }
        fs::create_dir_all(&self.root).await.map_err(io_err(&self.root))?;

        let staging = self.root.join(format!(".{file_name}.partial"));
        if fs::try_exists(&staging).await.map_err(io_err(&staging))? {
            fs::remove_dir_all(&staging).await.map_err(io_err(&staging))?;
        }

        if let Err(e) = stage(&staging, tree).await {
            if let Err(cleanup) = fs::remove_dir_all(&staging).await {
                warn!(error = %cleanup, path = %staging.display(), "could not remove staging directory");
            }
            return Err(e);
        }
        fs::rename(&staging, &dest).await.map_err(io_err(&dest))?;
        info!(path = %dest.display(), files = tree.len(), "tree written");
        Ok(dest)
    }
}

async fn stage(staging: &Path, tree: &VirtualTree) -> Result<(), FsError> {
    fs::create_dir_all(staging).await.map_err(io_err(staging))?;
    for (key, bytes) in tree {
        let path = safe_join(staging, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err(parent))?;
        }
        fs::write(&path, bytes).await.map_err(io_err(&path))?;
    }
    Ok(())
}

#[async_trait::async_trait]
impl ArchivePackager for DirectoryPackager {
    async fn pack(&self, file_name: &str, tree: &VirtualTree) -> Result<(), ArchiveError> {
        self.write(file_name, tree).await.map_err(|e| ArchiveError::Packager(e.to_string()))?;
        Ok(())
    }
}
