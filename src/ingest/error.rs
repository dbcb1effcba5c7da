use thiserror::Error;

/// Errors that can occur while reassembling a streamed upload
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Stream did not begin with a header frame")]
    MissingHeader,

    #[error("Unexpected header frame at chunk position {0}")]
    UnexpectedHeader(u32),

    #[error("Stream ended after {received} of {expected} chunks")]
    UnexpectedEof { received: u32, expected: u32 },

    #[error("Header declared zero chunks")]
    EmptyPayload,

    #[error("Header declared {0} chunks, above the {1} chunk bound")]
    TooManyChunks(u32, u32),

    #[error("Transport receive failed: {0}")]
    Transport(String),

    #[error("Other ingest error: {0}")]
    Other(#[from] anyhow::Error),
}
