//! Media sources
//!
//! A source lists the image entries it holds up front and reads their bytes
//! only on demand, so a run never holds more than one batch in memory.

use crate::error::SourceError;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Extensions accepted as images (compared case-insensitively)
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"];

/// Whether a file name carries an allow-listed image extension
pub fn is_image_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Keep only image names, preserving order
pub fn filter_images<I, S>(names: I) -> Vec<S>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter(|name| is_image_name(name.as_ref()))
        .collect()
}

/// A single file ready to be uploaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    /// File name sent with the upload
    pub name: String,
    pub bytes: Vec<u8>,
}

impl MediaItem {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// MIME type derived from the file extension
    pub fn content_type(&self) -> &'static str {
        let lower = self.name.to_lowercase();
        match lower.rsplit('.').next() {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("bmp") => "image/bmp",
            Some("webp") => "image/webp",
            _ => "image/jpeg",
        }
    }
}

/// Ordered producer of image items
pub trait MediaSource: Send {
    /// Short description used in notifications and logs
    fn label(&self) -> &str;

    /// Number of image entries, after extension filtering
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the entry at a filtered ordinal position
    fn load(&mut self, index: usize) -> Result<MediaItem, SourceError>;
}

/// Largest buffer reserved up front for an archive entry
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Buffer size to reserve for an entry whose header claims `declared` bytes
fn initial_capacity(declared: u64) -> usize {
    declared.min(MAX_PREALLOCATION) as usize
}

/// Final path component of an entry name
fn display_name(path: &str) -> String {
    path.rsplit(['/', '\\'])
        .find(|part| !part.is_empty())
        .unwrap_or(path)
        .to_string()
}

// ============================================================================
// Directory Source
// ============================================================================

/// Images found by walking a directory tree
#[derive(Debug)]
pub struct DirectorySource {
    label: String,
    paths: Vec<PathBuf>,
}

impl DirectorySource {
    /// Walk `root` recursively, in file-name order, collecting image files
    pub fn open(root: impl AsRef<Path>) -> Result<Self, SourceError> {
        let root = root.as_ref();
        let mut paths = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = entry.map_err(|source| SourceError::Walk {
                path: root.display().to_string(),
                source,
            })?;
            if entry.file_type().is_file() && is_image_name(&entry.file_name().to_string_lossy()) {
                paths.push(entry.into_path());
            }
        }

        tracing::debug!(root = %root.display(), images = paths.len(), "Scanned image directory");

        Ok(Self {
            label: format!("directory {}", root.display()),
            paths,
        })
    }
}

impl MediaSource for DirectorySource {
    fn label(&self) -> &str {
        &self.label
    }

    fn len(&self) -> usize {
        self.paths.len()
    }

    fn load(&mut self, index: usize) -> Result<MediaItem, SourceError> {
        let path = &self.paths[index];
        let bytes = std::fs::read(path).map_err(|source| SourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(MediaItem::new(name, bytes))
    }
}

// ============================================================================
// Archive Source
// ============================================================================

/// Images stored in a zip archive, in archive order
pub struct ArchiveSource {
    label: String,
    path: String,
    archive: ZipArchive<File>,
    /// (archive index, entry name) of every image entry
    entries: Vec<(usize, String)>,
}

impl std::fmt::Debug for ArchiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveSource")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ArchiveSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let file = File::open(path).map_err(|source| SourceError::Io {
            path: path_str.clone(),
            source,
        })?;
        let mut archive = ZipArchive::new(file).map_err(|source| SourceError::Archive {
            path: path_str.clone(),
            source,
        })?;

        let mut entries = Vec::new();
        for index in 0..archive.len() {
            let entry = archive.by_index(index).map_err(|source| SourceError::Archive {
                path: path_str.clone(),
                source,
            })?;
            if entry.is_file() && is_image_name(entry.name()) {
                entries.push((index, entry.name().to_string()));
            }
        }

        tracing::debug!(archive = %path_str, images = entries.len(), "Indexed image archive");

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path_str.clone());

        Ok(Self {
            label: format!("archive {}", file_name),
            path: path_str,
            archive,
            entries,
        })
    }
}

impl MediaSource for ArchiveSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn load(&mut self, index: usize) -> Result<MediaItem, SourceError> {
        let (archive_index, name) = &self.entries[index];
        let mut entry = self
            .archive
            .by_index(*archive_index)
            .map_err(|source| SourceError::Archive {
                path: self.path.clone(),
                source,
            })?;

        let mut bytes = Vec::with_capacity(initial_capacity(entry.size()));
        entry.read_to_end(&mut bytes).map_err(|source| SourceError::Io {
            path: format!("{}:{}", self.path, name),
            source,
        })?;

        Ok(MediaItem::new(display_name(name), bytes))
    }
}

// ============================================================================
// Tests
// ============================================================================
