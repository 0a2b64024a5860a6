//! Replica root and per-directory sync paths.

use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use thiserror::Error;

/// Errors raised while validating the directories of one sync session.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SyncError {
    /// No directory was configured or given.
    #[error("no directories to sync; pass one or set watched_directories")]
    NoDirectories,
    /// A directory is relative or contains `.`/`..` segments.
    #[error("{path} must be an absolute path without . or .. segments")]
    NotAbsolute {
        /// Offending directory.
        path: Utf8PathBuf,
    },
    /// A directory sits directly below `/`.
    #[error("{path} must be at least two levels below the filesystem root")]
    TooShallow {
        /// Offending directory.
        path: Utf8PathBuf,
    },
    /// Two directories live under different top-level directories.
    #[error("{path} does not share the replica root {replica_root}")]
    MixedRoots {
        /// Root established by the first directory.
        replica_root: Utf8PathBuf,
        /// Directory with a different root.
        path: Utf8PathBuf,
    },
}

/// Validated sync directories split into a shared root and relative paths.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyncPlan {
    replica_root: Utf8PathBuf,
    sync_paths: Vec<Utf8PathBuf>,
    directories: Vec<Utf8PathBuf>,
}

impl SyncPlan {
    /// Validates `directories` and derives the replica root.
    ///
    /// The root is `/<first component>`; every directory must share it and
    /// reach at least one level further.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] describing the first directory that breaks an
    /// invariant.
    pub fn new(directories: Vec<Utf8PathBuf>) -> Result<Self, SyncError> {
        if directories.is_empty() {
            return Err(SyncError::NoDirectories);
        }

        let mut replica_root: Option<Utf8PathBuf> = None;
        let mut sync_paths = Vec::with_capacity(directories.len());
        for directory in &directories {
            let (root, relative) = split_directory(directory)?;
            match &replica_root {
                None => replica_root = Some(root),
                Some(existing) if *existing == root => {}
                Some(existing) => {
                    return Err(SyncError::MixedRoots {
                        replica_root: existing.clone(),
                        path: directory.clone(),
                    });
                }
            }
            sync_paths.push(relative);
        }

        let root = replica_root.ok_or(SyncError::NoDirectories)?;
        Ok(Self {
            replica_root: root,
            sync_paths,
            directories,
        })
    }

    /// Shared `/<first>` prefix.
    #[must_use]
    pub fn replica_root(&self) -> &Utf8Path {
        &self.replica_root
    }

    /// Directories relative to the replica root, in input order.
    #[must_use]
    pub fn sync_paths(&self) -> &[Utf8PathBuf] {
        &self.sync_paths
    }

    /// Absolute directories as given.
    #[must_use]
    pub fn directories(&self) -> &[Utf8PathBuf] {
        &self.directories
    }
}

fn split_directory(directory: &Utf8Path) -> Result<(Utf8PathBuf, Utf8PathBuf), SyncError> {
    let not_absolute = || SyncError::NotAbsolute {
        path: directory.to_path_buf(),
    };
    if !directory.is_absolute() {
        return Err(not_absolute());
    }

    let mut segments = Vec::new();
    for component in directory.components() {
        match component {
            Utf8Component::RootDir => {}
            Utf8Component::Normal(segment) => segments.push(segment),
            Utf8Component::CurDir | Utf8Component::ParentDir | Utf8Component::Prefix(_) => {
                return Err(not_absolute());
            }
        }
    }

    let mut remaining = segments.into_iter();
    let (Some(first), Some(second)) = (remaining.next(), remaining.next()) else {
        return Err(SyncError::TooShallow {
            path: directory.to_path_buf(),
        });
    };
    let root = Utf8Path::new("/").join(first);
    let mut relative = Utf8PathBuf::from(second);
    relative.extend(remaining);
    Ok((root, relative))
}
