//! WRTF Trace Container Format
//!
//! This module implements the binary container format for fixed-rate
//! telemetry recordings.
//!
//! ## File Structure
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ File header (40 bytes)                                      │
//! │ - Magic: "WRTF0001" (8 bytes)                               │
//! │ - Version: 1 (u64)                                          │
//! │ - Sample rate in Hz (u64)                                   │
//! │ - Start timestamp, µs since Unix epoch (u64)                │
//! │ - Metadata entry count (u32)                                │
//! │ - Reserved (u32, zero)                                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Metadata entries                                            │
//! │ - Per entry: { u32 key_len, key bytes, pad to 8,            │
//! │               u32 val_len, value bytes, pad to 8 }          │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Session 1                                                   │
//! │ - Magic: "WRSE0001" | session header record, padded to 8    │
//! │ - Frames: (u64 tick | payload record), pair padded to 8     │
//! │ - Magic: "WRSF0001" | u64 last_tick | u64 frame_count       │
//! │   | session footer record, padded to 8                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │ ...                                                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Document footer                                             │
//! │ - Magic: "WRDF0001"                                         │
//! │ - N entries: { u64 session_off, u64 footer_off,             │
//! │                u64 frame_count }                            │
//! │ - Session count N (u64)                                     │
//! │ - Magic: "WRDE0001" (always the final 8 bytes)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Every structural boundary is 8-byte
//! aligned and padding bytes are zero, so the total file length is always
//! a multiple of 8.
//!
//! The document footer is discovered end-relative: the reader seeks to the
//! last 8 bytes, expects "WRDE0001", reads the session count just before
//! it, and from that computes where "WRDF0001" must sit. The index entries
//! give O(1) random access to any session without walking the frame data.
//!
//! ## Usage
//!
//! ### Writing a trace
//! ```ignore
//! let mut writer = TraceWriter::create("lap.wrtf", 60, metadata)?;
//! writer.begin_session(&session_header)?;
//! for (tick, sample) in samples {
//!     writer.write_frame(tick, &sample)?;
//! }
//! writer.end_session(&session_footer)?;
//! writer.close()?;
//! ```
//!
//! ### Reading a trace
//! ```ignore
//! let mut reader = TraceReader::open_path("lap.wrtf")?;
//! for session in reader.sessions().to_vec() {
//!     for frame in reader.frames(&session)? {
//!         let frame = frame?;
//!         process(frame.tick(), &frame.payload);
//!     }
//! }
//! ```

mod reader;
mod writer;

pub use reader::{FrameIter, TraceReader};
pub use writer::TraceWriter;

use serde::{Deserialize, Serialize};

/// Magic tag opening a trace file.
pub const FILE_MAGIC: [u8; 8] = *b"WRTF0001";

/// Magic tag opening each session.
pub const SESSION_MAGIC: [u8; 8] = *b"WRSE0001";

/// Magic tag opening each session footer.
pub const SESSION_FOOTER_MAGIC: [u8; 8] = *b"WRSF0001";

/// Magic tag opening the document footer.
pub const DOC_FOOTER_MAGIC: [u8; 8] = *b"WRDF0001";

/// Magic tag closing the document footer; always the last 8 bytes.
pub const DOC_END_MAGIC: [u8; 8] = *b"WRDE0001";

/// Size of every magic tag.
pub const MAGIC_SIZE: usize = 8;

/// Fixed size of the file header, magic included.
pub const FILE_HEADER_SIZE: usize = 40;

/// Size of one session entry in the document footer index.
pub const SESSION_ENTRY_SIZE: usize = 24;

/// Version number for the trace format.
pub const FORMAT_VERSION: u64 = 1;

/// Decoded file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    /// Format version; always 1.
    pub version: u64,

    /// Sample rate in Hz.
    pub sample_rate: u64,

    /// Recording start, microseconds since the Unix epoch.
    pub start_timestamp_us: u64,

    /// Number of metadata entries following the header.
    pub metadata_count: u32,
}
