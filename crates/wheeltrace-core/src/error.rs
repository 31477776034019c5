//! Error Types for Wheeltrace
//!
//! This module defines all error types that can occur while encoding or
//! decoding WRTF trace files.
//!
//! ## Error Categories
//!
//! ### Structural Errors
//! - `BadMagic`: a required 8-byte tag at a known offset did not match
//! - `UnsupportedVersion`: the file-header version is not 1
//! - `TruncatedBuffer` / `UnexpectedEof`: insufficient bytes to complete a
//!   structural read
//! - `MisalignedStream`: stream length or a computed offset is not a
//!   multiple of 8
//!
//! ### Metadata Errors
//! - `InvalidMetadata`: empty key, bad length field, or non-UTF-8 text
//! - `DuplicateMetadataKey`: the same key appears twice
//!
//! ### Cross-check Errors
//! - `InconsistentFrameCount`: document-footer entry disagrees with the
//!   session footer
//! - `CorruptSessionLayout`: the frame region size is not `frame_count`
//!   whole frames
//!
//! ### Writer State Errors
//! - `TickOrderViolation`: a frame's tick went backwards
//! - `SessionAlreadyOpen` / `NoSessionOpen` / `WriterClosed`: operation
//!   called in the wrong writer state
//!
//! ## Usage
//! All fallible operations return `Result<T>`, aliased to
//! `Result<T, Error>`, so `?` propagation works throughout.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic at offset {offset}, expected \"{expected}\"")]
    BadMagic { offset: u64, expected: String },

    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u64),

    #[error("truncated buffer: needed {needed} bytes, {available} available")]
    TruncatedBuffer { needed: usize, available: usize },

    #[error("unexpected end of stream while reading {0}")]
    UnexpectedEof(String),

    #[error("misaligned stream: {0}")]
    MisalignedStream(String),

    #[error("invalid sample rate: must be nonzero")]
    InvalidSampleRate,

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("duplicate metadata key: {0:?}")]
    DuplicateMetadataKey(String),

    #[error(
        "frame count mismatch for session {session}: index says {index}, session footer says {footer}"
    )]
    InconsistentFrameCount {
        session: usize,
        index: u64,
        footer: u64,
    },

    #[error("corrupt session layout: {0}")]
    CorruptSessionLayout(String),

    #[error("tick order violation: tick {tick} is behind current tick {current}")]
    TickOrderViolation { tick: u64, current: u64 },

    #[error("a session is already open")]
    SessionAlreadyOpen,

    #[error("no session is open")]
    NoSessionOpen,

    #[error("writer is closed")]
    WriterClosed,
}

impl Error {
    /// Map an I/O failure from a structural read, normalizing end-of-file
    /// into the typed truncation error. `what` names the structure being
    /// read.
    pub fn from_read(err: std::io::Error, what: &str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof(what.to_string())
        } else {
            Error::Io(err)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
