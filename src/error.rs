use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// A single signature did not yield a consistent key for the probed prefix.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("prefix does not match signature")]
pub struct NoMatch;

/// None of the registered signatures matched the probed prefix.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("decode failed: no registered signature matches prefix [{prefix}]")]
pub struct DecodeFailure {
    /// Hex dump of the bytes that were compared.
    pub prefix: String,
}

/// Rejected while building a signature table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signature {0} has no magic bytes")]
    EmptyMagic(String),

    #[error("extension {0:?} must start with '.' and name a suffix")]
    InvalidExtension(String),

    #[error("magic bytes for {extension} are not valid hex: {message}")]
    InvalidHex { extension: String, message: String },
}

/// Fatal problems detected before any file is processed.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read input directory {path}: {source}")]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("output path {0} exists and is not a directory")]
    OutputIsFile(PathBuf),

    #[error("cannot create output directory {path}: {source}")]
    OutputCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parallelism must be at least 1")]
    InvalidParallelism,

    #[error("queue capacity must be at least 1")]
    InvalidQueueCapacity,

    #[error("prefix probe of {probe} bytes is shorter than the longest signature ({required} bytes)")]
    ProbeTooSmall { probe: usize, required: usize },

    #[error("prefix probe of {probe} bytes exceeds the maximum of {max} bytes")]
    ProbeTooLarge { probe: usize, max: usize },

    #[error("input extension {0:?} must start with '.'")]
    InvalidExtension(String),
}

/// Per-file failure. Never aborts the batch.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Recovery(#[from] DecodeFailure),

    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TaskError {
    pub fn kind(&self) -> FailureKind {
        match self {
            TaskError::Read { .. } => FailureKind::Read,
            TaskError::Recovery(_) => FailureKind::Recovery,
            TaskError::Write { .. } => FailureKind::Write,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Read,
    Recovery,
    Write,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(match self {
            FailureKind::Read => "read",
            FailureKind::Recovery => "recovery",
            FailureKind::Write => "write",
        })
    }
}

/// Failure to start a batch.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot spawn thread {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}
