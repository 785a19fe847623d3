//! Source file tree access
//!
//! The import engine reads the source tree through [`SourceTree`] so it can
//! run against a real filesystem or a test fixture. Entries are returned
//! sorted by name for reproducible imports.

use crate::error::{ImportError, Result};
use crate::names;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Read access to a source directory tree
pub trait SourceTree {
    /// Subdirectories of a directory, sorted by name
    fn subdirectories(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// Regular files of a directory (descriptor included), sorted by name
    fn files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;

    /// The directory's descriptor document, if it has one
    fn find_descriptor(&self, dir: &Path) -> Option<PathBuf>;

    /// Whole contents of a file
    fn read_bytes(&self, file: &Path) -> io::Result<Vec<u8>>;
}

/// [`SourceTree`] over the local filesystem
#[derive(Debug, Clone)]
pub struct FsSourceTree {
    descriptor_name: String,
}

impl FsSourceTree {
    pub fn new(descriptor_name: impl Into<String>) -> Self {
        Self {
            descriptor_name: descriptor_name.into(),
        }
    }

    pub fn descriptor_name(&self) -> &str {
        &self.descriptor_name
    }

    fn entries(&self, dir: &Path, want_dirs: bool) -> io::Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            // Follows symlinks, so a linked directory imports like a real one
            let metadata = fs::metadata(&path)?;
            if (want_dirs && metadata.is_dir()) || (!want_dirs && metadata.is_file()) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }
}

impl SourceTree for FsSourceTree {
    fn subdirectories(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        self.entries(dir, true)
    }

    fn files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        self.entries(dir, false)
    }

    fn find_descriptor(&self, dir: &Path) -> Option<PathBuf> {
        let path = dir.join(&self.descriptor_name);
        path.is_file().then_some(path)
    }

    fn read_bytes(&self, file: &Path) -> io::Result<Vec<u8>> {
        // The handle is scoped to this call and closed on every path
        fs::read(file)
    }
}

/// Last component of a path as a string
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Locate the descriptor for a path that is either the descriptor file
/// itself or a directory containing one.
pub fn descriptor_path(path: &Path, descriptor_name: &str) -> Option<PathBuf> {
    if path.is_file() {
        return (file_name(path) == descriptor_name).then(|| path.to_path_buf());
    }
    if path.is_dir() {
        let candidate = path.join(descriptor_name);
        return candidate.is_file().then_some(candidate);
    }
    None
}

/// Map a local directory to its repository path.
///
/// The components after the last `marker` directory (usually `jcr_root`)
/// are unmunged and joined: `.../jcr_root/content/_cq_tags` maps to
/// `/content/cq:tags`, and the marker directory itself maps to `/`.
pub fn repository_path(dir: &Path, marker: &str) -> Result<String> {
    let components: Vec<String> = dir
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    let start = components
        .iter()
        .rposition(|c| c == marker)
        .ok_or_else(|| ImportError::OutsideContentRoot(dir.to_path_buf()))?;

    let below: Vec<String> = components[start + 1..]
        .iter()
        .map(|c| names::unmunge(c))
        .collect();
    Ok(format!("/{}", below.join("/")))
}
