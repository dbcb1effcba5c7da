use crate::ingest::error::IngestError;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use tracing::debug;

/// Upper bound on the declared chunk count of a single upload
pub const MAX_CHUNKS: u32 = 4096;

/// Header record that opens every upload stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadHeader {
    /// Number of binary chunks that follow the header
    pub chunk_count: u32,
}

/// One frame of the streaming ingress
#[derive(Debug, Clone)]
pub enum UploadFrame {
    Header(UploadHeader),
    Chunk(Bytes),
}

/// A handle over the transport's per-request chunk sequence.
///
/// The transport drives delivery and guarantees ordering; the assembler
/// blocks on each receive and does not re-validate order.
#[async_trait]
pub trait ChunkStream: Send {
    async fn recv(&mut self) -> Result<UploadFrame, IngestError>;
}

/// Reassemble a streamed upload into a single contiguous buffer.
///
/// Reads the header, then exactly `chunk_count` chunk frames, concatenated
/// in receive order. Any malformed shape or transport error aborts the whole
/// operation; no partial payload is ever returned.
pub async fn assemble<S: ChunkStream>(stream: &mut S) -> Result<Bytes, IngestError> {
    let header = match stream.recv().await? {
        UploadFrame::Header(header) => header,
        UploadFrame::Chunk(_) => return Err(IngestError::MissingHeader),
    };

    if header.chunk_count == 0 {
        return Err(IngestError::EmptyPayload);
    }
    if header.chunk_count > MAX_CHUNKS {
        return Err(IngestError::TooManyChunks(header.chunk_count, MAX_CHUNKS));
    }

    let mut buffer = BytesMut::new();
    for position in 0..header.chunk_count {
        match stream.recv().await? {
            UploadFrame::Chunk(chunk) => buffer.extend_from_slice(&chunk),
            UploadFrame::Header(_) => return Err(IngestError::UnexpectedHeader(position)),
        }
    }

    debug!(
        "Assembled {} chunks into {} bytes",
        header.chunk_count,
        buffer.len()
    );
    Ok(buffer.freeze())
}

/// A ChunkStream over an in-memory frame sequence.
///
/// Used by the CLI to feed a file through the real ingest path, and by tests
/// to build well-formed and malformed streams. An exhausted queue behaves
/// like a transport that hung up mid-request.
pub struct BytesChunkStream {
    frames: VecDeque<UploadFrame>,
    expected: u32,
    received: u32,
}

impl BytesChunkStream {
    /// Build a stream from an explicit frame sequence
    pub fn from_frames(frames: Vec<UploadFrame>) -> Self {
        let expected = frames
            .iter()
            .find_map(|f| match f {
                UploadFrame::Header(h) => Some(h.chunk_count),
                UploadFrame::Chunk(_) => None,
            })
            .unwrap_or(0);
        BytesChunkStream {
            frames: frames.into(),
            expected,
            received: 0,
        }
    }

    /// Build a well-formed stream by splitting `data` into `chunk_size` pieces
    pub fn from_bytes(data: &[u8], chunk_size: usize) -> Self {
        let chunks: Vec<Bytes> = data
            .chunks(chunk_size.max(1))
            .map(Bytes::copy_from_slice)
            .collect();
        let mut frames = vec![UploadFrame::Header(UploadHeader {
            chunk_count: chunks.len() as u32,
        })];
        frames.extend(chunks.into_iter().map(UploadFrame::Chunk));
        Self::from_frames(frames)
    }
}

#[async_trait]
impl ChunkStream for BytesChunkStream {
    async fn recv(&mut self) -> Result<UploadFrame, IngestError> {
        match self.frames.pop_front() {
            Some(frame) => {
                if matches!(frame, UploadFrame::Chunk(_)) {
                    self.received += 1;
                }
                Ok(frame)
            }
            None => Err(IngestError::UnexpectedEof {
                received: self.received,
                expected: self.expected,
            }),
        }
    }
}
