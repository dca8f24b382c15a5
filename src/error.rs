//! Error types for Destilar

use thiserror::Error;

use crate::config::SourceSide;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] crate::config::ValidationError),

    #[error("Recorder '{name}' not found in {side} recorders")]
    RecorderNotFound { name: String, side: SourceSide },

    #[error("Delivery '{0}' not found")]
    DeliveryNotFound(String),

    #[error("Model has no instrumentation point named '{name}'")]
    SourceNotFound { name: String },

    #[error("{what} is already initialized against a model")]
    AlreadyInitialized { what: String },

    #[error("Duplicate loss name: '{0}'")]
    DuplicateLoss(String),

    #[error(
        "Recorder '{recorder}' has no record at index {record_idx}: \
         the forward pass did not reach its capture point"
    )]
    RecordNotPopulated { recorder: String, record_idx: usize },

    #[error(
        "Recorder '{recorder}' record {record_idx} has {len} data item(s), \
         data index {data_idx} is out of range"
    )]
    DataIndexOutOfRange {
        recorder: String,
        record_idx: usize,
        data_idx: usize,
        len: usize,
    },

    #[error(
        "Recorder '{recorder}' record {record_idx} holds {len} data items; \
         a data index is required to pick one"
    )]
    AmbiguousRecord {
        recorder: String,
        record_idx: usize,
        len: usize,
    },

    #[error("Delivery at '{name}' has no recorded data left to substitute")]
    DeliveryExhausted { name: String },

    #[error("Loss argument '{arg}' was not resolved")]
    MissingArgument { arg: String },
}

pub type Result<T> = std::result::Result<T, Error>;
