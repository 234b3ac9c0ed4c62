use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("no extractable text in document (scanned without a text layer?)")]
    UnreadableDocument,

    #[error("completion output failed contract validation: {0}")]
    ExtractionParse(String),

    #[error("retrieval or completion capability unavailable: {0}")]
    CapabilityUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExtractionError>;
