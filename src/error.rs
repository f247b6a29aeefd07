use thiserror::Error;

#[derive(Clone, Debug, Error, Eq, PartialEq)]
/// Enum for various errors in the chunk layer.
pub enum TsdbError {
    #[error("Chunk at full capacity. Max capacity {0}.")]
    CapacityFull(usize),

    #[error("Invalid configuration. {0}")]
    InvalidConfiguration(String),

    #[error("Decoding error. {0}")]
    DecodingError(String),

    #[error("Encoding error. {0}")]
    EncodingError(String),

    #[error("Duplicate sample. {0}")]
    DuplicateSample(String),

    #[error("Invalid compression method. {0}")]
    InvalidCompression(String),

    #[error("{0}")]
    General(String),

    #[error("TSDB: error encoding chunk")]
    ChunkEncoding,

    #[error("TSDB: error decoding chunk")]
    ChunkDecoding,

    #[error("End of stream")]
    EndOfStream,
}

pub type TsdbResult<T = ()> = Result<T, TsdbError>;

impl From<&str> for TsdbError {
    fn from(s: &str) -> Self {
        TsdbError::General(s.to_string())
    }
}

impl From<String> for TsdbError {
    fn from(s: String) -> Self {
        TsdbError::General(s)
    }
}
