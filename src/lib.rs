pub mod config;
pub mod decoder;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod recovery;
pub mod report;
pub mod signatures;

pub use config::DecodeConfig;
pub use decoder::{decode, decode_in_place, decode_stream};
pub use dispatch::{DecodeTask, Dispatcher};
pub use engine::{decode_file, BatchDecoder};
pub use error::{BatchError, ConfigError, DecodeFailure, FailureKind, NoMatch, TaskError};
pub use recovery::{find_decode_key, recover_key, RecoveredKey};
pub use report::{BatchReport, DecodedFile, FailedFile, TaskOutcome};
pub use signatures::{signatures, Signature, SignatureSet};
