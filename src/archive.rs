//! Read access to the ZIP container of an EPUB
//!
//! [EpubArchive] is a thin wrapper around [ZipArchive] that adds the path
//! resolution rules needed for publications whose manifest references do not
//! match the physical layout of the archive.

use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

use log::debug;
use zip::ZipArchive;

use crate::{error::EpubError, utils::get_file_in_zip_archive};

/// Directories commonly used as the root of the publication content
pub const CONTENT_ROOTS: [&str; 2] = ["OPS", "OEBPS"];

/// An opened EPUB container
pub struct EpubArchive<R: Read + Seek> {
    archive: ZipArchive<R>,

    /// Directory of the package document inside the archive, once it is known
    package_dir: Option<String>,
}

impl EpubArchive<BufReader<File>> {
    /// Opens the archive at `path`
    ///
    /// ## Return
    /// - `Ok(EpubArchive)`: The file exists and is a readable ZIP container
    /// - `Err(EpubError)`: The file cannot be opened or its central directory is broken
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EpubError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> EpubArchive<R> {
    pub fn from_reader(reader: R) -> Result<Self, EpubError> {
        let archive = ZipArchive::new(reader)?;
        Ok(Self {
            archive,
            package_dir: None,
        })
    }

    /// Reads the full contents of the entry named `path`
    ///
    /// A missing entry is reported as [EpubError::ResourceNotFound].
    pub fn read(&mut self, path: &str) -> Result<Vec<u8>, EpubError> {
        get_file_in_zip_archive(&mut self.archive, path)
    }

    /// Names of all entries, in archive order
    pub fn entries(&self) -> Vec<String> {
        self.archive.file_names().map(str::to_string).collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.archive.index_for_name(path).is_some()
    }

    /// Records the location of the package document
    ///
    /// Manifest references are relative to the package document, so once this is
    /// set [EpubArchive::resolve_path] also tries references against its directory.
    pub fn set_package_path(&mut self, full_path: &str) {
        self.package_dir = match full_path.rsplit_once('/') {
            Some((dir, _)) if !dir.is_empty() => Some(dir.to_string()),
            _ => None,
        };
    }

    /// Maps a manifest reference to the entry that actually holds it
    ///
    /// Candidates are tried in order: the reference as written, the reference
    /// without a leading `/`, the reference under `OPS/` and `OEBPS/`, and the
    /// reference relative to the package document's directory. The first one that
    /// exists wins. When none exists the reference is returned unchanged, and the
    /// failure surfaces at the read site.
    pub fn resolve_path(&self, reference: &str) -> String {
        let mut candidates = vec![reference.to_string()];

        if let Some(stripped) = reference.strip_prefix('/') {
            candidates.push(stripped.to_string());
        }

        for root in CONTENT_ROOTS {
            candidates.push(format!("{}/{}", root, reference));
        }

        if let Some(dir) = &self.package_dir {
            if let Some(joined) = join_archive_path(dir, reference) {
                candidates.push(joined);
            }
        }

        match candidates.into_iter().find(|path| self.contains(path)) {
            Some(path) => path,
            None => {
                debug!("No archive entry matches \"{}\", using it as is.", reference);
                reference.to_string()
            }
        }
    }

    /// Resolves `reference` and reads the entry it maps to
    pub fn read_resolved(&mut self, reference: &str) -> Result<Vec<u8>, EpubError> {
        let path = self.resolve_path(reference);
        self.read(&path)
    }
}

/// Joins a relative reference onto a directory inside the archive
///
/// `.` segments are dropped and `..` segments consume the previous directory.
/// Returns `None` if the reference climbs above the archive root.
fn join_archive_path(dir: &str, reference: &str) -> Option<String> {
    let mut segments = dir
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<&str>>();

    for segment in reference.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            _ => segments.push(segment),
        }
    }

    Some(segments.join("/"))
}
