//! Wheeltrace Codec
//!
//! Streaming reader/writer for WRTF v1 trace files - the binary container
//! format for fixed-rate racing telemetry.
//!
//! A trace is a file header with an embedded metadata dictionary, zero or
//! more sessions (header record, densely packed fixed-size frames, footer
//! record), and a document footer that indexes the sessions for O(1)
//! random access from the end of the stream.
//!
//! ## Main Components
//!
//! ### TraceWriter
//! Streaming producer over any `Write + Seek` sink. Emits the file header
//! lazily, brackets sessions, enforces tick monotonicity, and writes the
//! document footer on close (also on drop, best-effort).
//!
//! ### TraceReader
//! Random-access consumer over any `Read + Seek` source. Validates the
//! whole structure eagerly on open - magics, version, metadata, session
//! index cross-checks - then serves frames lazily per session.
//!
//! ## Record Types
//!
//! The codec is generic over three caller-supplied record types per trace:
//! session header, session footer, and frame payload. Each is bound by
//! `bytemuck::Pod`, so its in-memory bytes are its on-wire bytes and the
//! codec never inspects its internals.
//!
//! ## Example
//! ```ignore
//! use wheeltrace_codec::{Metadata, TraceReader, TraceWriter};
//!
//! let mut metadata = Metadata::new();
//! metadata.insert("track", "monza")?;
//!
//! let mut writer = TraceWriter::create("stint.wrtf", 60, metadata)?;
//! writer.begin_session(&stint_header)?;
//! writer.write_frame(0, &first_sample)?;
//! writer.end_session(&stint_footer)?;
//! writer.close()?;
//!
//! let mut reader = TraceReader::open_path("stint.wrtf")?;
//! let session = reader.sessions()[0];
//! for frame in reader.frames(&session)? {
//!     let frame = frame?;
//!     println!("tick {}", frame.tick());
//! }
//! ```

mod metadata;
pub mod session;
pub mod trace;

pub use session::SessionDescriptor;
pub use trace::{
    FileHeader, FrameIter, TraceReader, TraceWriter, DOC_END_MAGIC, DOC_FOOTER_MAGIC, FILE_MAGIC,
    FILE_HEADER_SIZE, FORMAT_VERSION, MAGIC_SIZE, SESSION_ENTRY_SIZE, SESSION_FOOTER_MAGIC,
    SESSION_MAGIC,
};

pub use wheeltrace_core::{Error, Frame, FrameHeader, Metadata, Result};
