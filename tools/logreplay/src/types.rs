use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// One log file being replayed: where it is read from and where it is written.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FilePair {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Top-level entries a mirror created directly under the output directory.
///
/// Nested entries are not tracked; removing a top-level directory removes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputTreeSnapshot {
    root: PathBuf,
    directories: BTreeSet<OsString>,
    files: BTreeSet<OsString>,
}

impl OutputTreeSnapshot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            directories: BTreeSet::new(),
            files: BTreeSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_directory(&mut self, name: &OsStr) {
        self.directories.insert(name.to_os_string());
    }

    pub fn record_file(&mut self, name: &OsStr) {
        self.files.insert(name.to_os_string());
    }

    pub fn directories(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.directories.iter().map(|name| self.root.join(name))
    }

    pub fn files(&self) -> impl Iterator<Item = PathBuf> + '_ {
        self.files.iter().map(|name| self.root.join(name))
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}
