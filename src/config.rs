//! Batch configuration and output directory preparation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::signatures::SignatureSet;

pub const DEFAULT_INPUT_DIR: &str = ".";
pub const DEFAULT_OUTPUT_DIR: &str = "./Decode";
pub const DEFAULT_INPUT_EXTENSION: &str = ".dat";
pub const DEFAULT_PARALLELISM: usize = 10;
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_PREFIX_PROBE_SIZE: usize = 10;
/// Upper bound for the prefix probe (1 MiB).
pub const MAX_PREFIX_PROBE_SIZE: usize = 1024 * 1024;

/// Options for one batch run
#[derive(Debug, Clone)]
pub struct DecodeConfig {
    /// Directory whose direct entries are scanned
    pub input_dir: PathBuf,
    /// Directory receiving the decoded files
    pub output_dir: PathBuf,
    /// Number of worker threads
    pub parallelism: usize,
    /// Suffix an entry name must end with to become a task
    pub input_extension: String,
    /// Bytes read from the start of each file before key recovery
    pub prefix_probe_size: usize,
    /// Capacity of the bounded task queue
    pub queue_capacity: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from(DEFAULT_INPUT_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            parallelism: DEFAULT_PARALLELISM,
            input_extension: DEFAULT_INPUT_EXTENSION.to_string(),
            prefix_probe_size: DEFAULT_PREFIX_PROBE_SIZE,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl DecodeConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism;
        self
    }

    pub fn with_input_extension(mut self, extension: impl Into<String>) -> Self {
        self.input_extension = extension.into();
        self
    }

    pub fn with_prefix_probe_size(mut self, size: usize) -> Self {
        self.prefix_probe_size = size;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Checks the numeric options against the signature table in use.
    pub fn validate(&self, signatures: &SignatureSet) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::InvalidParallelism);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidQueueCapacity);
        }
        if !self.input_extension.starts_with('.') {
            return Err(ConfigError::InvalidExtension(self.input_extension.clone()));
        }

        let required = signatures.longest_magic_len();
        if self.prefix_probe_size < required {
            return Err(ConfigError::ProbeTooSmall {
                probe: self.prefix_probe_size,
                required,
            });
        }
        if self.prefix_probe_size > MAX_PREFIX_PROBE_SIZE {
            return Err(ConfigError::ProbeTooLarge {
                probe: self.prefix_probe_size,
                max: MAX_PREFIX_PROBE_SIZE,
            });
        }
        Ok(())
    }
}

/// Creates `dir` (with parents) if absent; fails if it exists as a non-directory.
pub fn prepare_output_dir(dir: &Path) -> Result<(), ConfigError> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(ConfigError::OutputIsFile(dir.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|source| ConfigError::OutputCreate {
                path: dir.to_path_buf(),
                source,
            })
        }
        Err(source) => Err(ConfigError::OutputCreate {
            path: dir.to_path_buf(),
            source,
        }),
    }
}
