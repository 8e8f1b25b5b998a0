//! Lazy enumeration of input files.

use std::ffi::OsString;
use std::fs::{self, ReadDir};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::ConfigError;

/// One eligible input file, processed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeTask {
    pub source_path: PathBuf,
    pub file_name: OsString,
    /// Size reported by the directory listing, if it could be read.
    pub size: Option<u64>,
}

impl DecodeTask {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let file_name = source_path.file_name().map(OsString::from).unwrap_or_default();
        Self {
            source_path,
            file_name,
            size: None,
        }
    }

    /// `<original name><extension>`, e.g. `a.dat.jpeg`.
    pub fn output_name(&self, extension: &str) -> OsString {
        let mut name = self.file_name.clone();
        name.push(extension);
        name
    }
}

/// Single-pass iterator over the direct entries of an input directory.
///
/// Directories and names not ending in the input extension are skipped.
/// Entries come out in whatever order the OS lists them.
pub struct Dispatcher {
    entries: ReadDir,
    extension: String,
    skipped: usize,
}

impl Dispatcher {
    pub fn open(input_dir: &Path, extension: impl Into<String>) -> Result<Self, ConfigError> {
        let entries = fs::read_dir(input_dir).map_err(|source| ConfigError::InputUnreadable {
            path: input_dir.to_path_buf(),
            source,
        })?;

        Ok(Self {
            entries,
            extension: extension.into(),
            skipped: 0,
        })
    }

    /// Entries filtered out so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    fn accepts(&self, name: &OsString) -> bool {
        name.to_str()
            .map(|n| n.ends_with(self.extension.as_str()))
            .unwrap_or_else(|| {
                name.as_encoded_bytes()
                    .ends_with(self.extension.as_bytes())
            })
    }
}

impl Iterator for Dispatcher {
    type Item = DecodeTask;

    fn next(&mut self) -> Option<DecodeTask> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable directory entry: {}", e);
                    self.skipped += 1;
                    continue;
                }
            };

            let name = entry.file_name();
            if !self.accepts(&name) {
                self.skipped += 1;
                continue;
            }

            let path = entry.path();
            // Follows symlinks, so a link to a directory counts as a directory.
            let size = match fs::metadata(&path) {
                Ok(meta) if meta.is_dir() => {
                    debug!("skipping directory {}", path.display());
                    self.skipped += 1;
                    continue;
                }
                Ok(meta) => Some(meta.len()),
                Err(e) => {
                    debug!("no metadata for {}: {}", path.display(), e);
                    None
                }
            };

            debug!("find file: {}", path.display());
            return Some(DecodeTask {
                source_path: path,
                file_name: name,
                size,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_name_keeps_original_suffix() {
        let task = DecodeTask::new("/in/photo.dat");
        assert_eq!(task.output_name(".png"), OsString::from("photo.dat.png"));
    }

    #[test]
    fn test_filters_entries() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.dat"), b"1").unwrap();
        fs::write(tmp.path().join("b.dat"), b"22").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        fs::write(tmp.path().join("upper.DAT"), b"x").unwrap();
        fs::create_dir(tmp.path().join("sub.dat")).unwrap();

        let mut dispatcher = Dispatcher::open(tmp.path(), ".dat").unwrap();
        let mut names: Vec<_> = dispatcher
            .by_ref()
            .map(|t| t.file_name.into_string().unwrap())
            .collect();
        names.sort();

        assert_eq!(names, ["a.dat", "b.dat"]);
        assert_eq!(dispatcher.skipped(), 3);
    }

    #[test]
    fn test_reports_size() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.dat"), [0u8; 7]).unwrap();
        let task = Dispatcher::open(tmp.path(), ".dat").unwrap().next().unwrap();
        assert_eq!(task.size, Some(7));
    }

    #[test]
    fn test_missing_dir_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let result = Dispatcher::open(&tmp.path().join("nope"), ".dat");
        assert!(matches!(result, Err(ConfigError::InputUnreadable { .. })));
    }
}
