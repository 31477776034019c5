//! Trace Writer - Streaming Producer of WRTF Files
//!
//! `TraceWriter` turns a sequence of sessions and frames into a complete
//! trace file over any writable, seekable sink.
//!
//! ## What Does TraceWriter Do?
//!
//! 1. **Materializes the file header lazily** - header and metadata hit the
//!    stream when the first session opens (or at close for a session-less
//!    file)
//! 2. **Brackets sessions** - each `begin_session`/`end_session` pair emits
//!    the session magic, the caller's header record, the frames, and the
//!    session footer
//! 3. **Appends frames** - one 8-byte tick header plus the payload record,
//!    padded to 8 bytes, with tick monotonicity enforced
//! 4. **Accumulates the session index** in memory
//! 5. **Emits the document footer** on close so readers get O(1) session
//!    lookup from the end of the stream
//!
//! Dropping a writer that was never closed runs the same close path
//! best-effort: an in-progress session gets a zero-initialized footer and
//! the document footer is still emitted, since a trace without one cannot
//! be opened.
//!
//! ## Thread Safety
//!
//! TraceWriter is NOT thread-safe; it owns a single stream cursor. Use one
//! writer per stream.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::marker::PhantomData;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use bytemuck::{Pod, Zeroable};
use bytes::{BufMut, BytesMut};
use tracing::{debug, info, warn};

use wheeltrace_core::layout;
use wheeltrace_core::record::aligned_frame_size;
use wheeltrace_core::{Error, Metadata, Result};

use crate::session::SessionIndexEntry;
use crate::trace::{
    DOC_END_MAGIC, DOC_FOOTER_MAGIC, FILE_MAGIC, FORMAT_VERSION, SESSION_FOOTER_MAGIC,
    SESSION_MAGIC,
};

/// Minimum scratch buffer capacity.
const SCRATCH_FLOOR: usize = 1024;

/// Streaming writer for one trace file.
///
/// `H`, `F`, and `P` are the caller's session header, session footer, and
/// frame payload record types.
pub struct TraceWriter<W: Write + Seek, H: Pod, F: Pod, P: Pod> {
    stream: W,
    sample_rate: u64,
    metadata: Metadata,
    header_written: bool,
    closed: bool,
    session: Option<OpenSession>,
    sessions: Vec<SessionIndexEntry>,
    scratch: BytesMut,
    _records: PhantomData<(H, F, P)>,
}

/// Per-session state while a session is in progress.
struct OpenSession {
    start_offset: u64,
    current_tick: u64,
    frame_count: u64,
}

impl<W: Write + Seek, H: Pod, F: Pod, P: Pod> std::fmt::Debug for TraceWriter<W, H, F, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceWriter")
            .field("sample_rate", &self.sample_rate)
            .field("metadata", &self.metadata)
            .field("header_written", &self.header_written)
            .field("closed", &self.closed)
            .field("sessions", &self.sessions)
            .finish()
    }
}

impl<W: Write + Seek, H: Pod, F: Pod, P: Pod> TraceWriter<W, H, F, P> {
    /// Create a writer over `stream`. Nothing is written until the first
    /// session opens or the writer closes.
    ///
    /// The metadata is cloned here and immutable for the writer's
    /// lifetime.
    pub fn new(stream: W, sample_rate: u64, metadata: Metadata) -> Result<Self> {
        if sample_rate == 0 {
            return Err(Error::InvalidSampleRate);
        }
        let scratch = BytesMut::with_capacity(aligned_frame_size::<P>().max(SCRATCH_FLOOR));
        Ok(Self {
            stream,
            sample_rate,
            metadata,
            header_written: false,
            closed: false,
            session: None,
            sessions: Vec::new(),
            scratch,
            _records: PhantomData,
        })
    }

    /// Open a session with the given header record.
    pub fn begin_session(&mut self, header: &H) -> Result<()> {
        if self.closed {
            return Err(Error::WriterClosed);
        }
        if self.session.is_some() {
            return Err(Error::SessionAlreadyOpen);
        }
        self.ensure_file_header()?;

        let start_offset = self.stream.stream_position()?;
        self.scratch.clear();
        self.scratch.put_slice(&SESSION_MAGIC);
        put_record_aligned(&mut self.scratch, header);
        self.stream.write_all(&self.scratch)?;

        debug!(
            session = self.sessions.len(),
            offset = start_offset,
            "session opened"
        );
        self.session = Some(OpenSession {
            start_offset,
            current_tick: 0,
            frame_count: 0,
        });
        Ok(())
    }

    /// Append one frame to the open session.
    ///
    /// The first frame of a session accepts any tick; afterwards `tick`
    /// must not go backwards.
    pub fn write_frame(&mut self, tick: u64, payload: &P) -> Result<()> {
        if self.closed {
            return Err(Error::WriterClosed);
        }
        let session = self.session.as_mut().ok_or(Error::NoSessionOpen)?;
        if session.frame_count > 0 && tick < session.current_tick {
            return Err(Error::TickOrderViolation {
                tick,
                current: session.current_tick,
            });
        }

        self.scratch.clear();
        self.scratch.put_u64_le(tick);
        self.scratch.put_slice(bytemuck::bytes_of(payload));
        self.scratch.put_bytes(0, layout::padding(self.scratch.len()));
        self.stream.write_all(&self.scratch)?;

        session.current_tick = tick;
        session.frame_count += 1;
        Ok(())
    }

    /// Close the open session with the given footer record.
    pub fn end_session(&mut self, footer: &F) -> Result<()> {
        if self.closed {
            return Err(Error::WriterClosed);
        }
        let session = self.session.take().ok_or(Error::NoSessionOpen)?;
        let footer_offset = self.stream.stream_position()?;

        self.scratch.clear();
        self.scratch.put_slice(&SESSION_FOOTER_MAGIC);
        self.scratch.put_u64_le(session.current_tick);
        self.scratch.put_u64_le(session.frame_count);
        put_record_aligned(&mut self.scratch, footer);
        self.stream.write_all(&self.scratch)?;
        self.stream.flush()?;

        debug!(
            session = self.sessions.len(),
            frames = session.frame_count,
            last_tick = session.current_tick,
            "session closed"
        );
        self.sessions.push(SessionIndexEntry {
            start_offset: session.start_offset,
            footer_offset,
            frame_count: session.frame_count,
        });
        Ok(())
    }

    /// Finish the trace: synthesize a footer for any in-progress session,
    /// emit the document footer, and flush.
    ///
    /// An I/O failure from the synthetic session footer is suppressed so
    /// the document footer still gets a chance to land; every other
    /// failure propagates. After `close`, all operations fail with
    /// `WriterClosed`.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::WriterClosed);
        }
        if self.session.is_some() {
            if let Err(err) = self.end_session(&F::zeroed()) {
                warn!(error = %err, "synthetic session footer failed");
            }
        }
        self.ensure_file_header()?;

        self.scratch.clear();
        self.scratch.put_slice(&DOC_FOOTER_MAGIC);
        for entry in &self.sessions {
            self.scratch.put_u64_le(entry.start_offset);
            self.scratch.put_u64_le(entry.footer_offset);
            self.scratch.put_u64_le(entry.frame_count);
        }
        self.scratch.put_u64_le(self.sessions.len() as u64);
        self.scratch.put_slice(&DOC_END_MAGIC);
        self.stream.write_all(&self.scratch)?;
        self.stream.flush()?;

        self.closed = true;
        info!(sessions = self.sessions.len(), "trace closed");
        Ok(())
    }

    /// Write the file header and metadata block if not yet on the stream.
    fn ensure_file_header(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        let start_timestamp_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before Unix epoch")
            .as_micros() as u64;

        self.scratch.clear();
        self.scratch.put_slice(&FILE_MAGIC);
        self.scratch.put_u64_le(FORMAT_VERSION);
        self.scratch.put_u64_le(self.sample_rate);
        self.scratch.put_u64_le(start_timestamp_us);
        self.scratch.put_u32_le(self.metadata.len() as u32);
        self.scratch.put_u32_le(0); // reserved
        crate::metadata::encode(&self.metadata, &mut self.scratch);
        self.stream.write_all(&self.scratch)?;
        self.stream.flush()?;

        self.header_written = true;
        info!(
            sample_rate = self.sample_rate,
            metadata_count = self.metadata.len(),
            "file header written"
        );
        Ok(())
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u64 {
        self.sample_rate
    }

    /// Metadata captured at construction.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Number of completed sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether a session is currently in progress.
    pub fn is_session_open(&self) -> bool {
        self.session.is_some()
    }

    /// Tick of the last frame written to the open session, if any.
    pub fn current_tick(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.current_tick)
    }

    /// Frames written to the open session, if any.
    pub fn frame_count(&self) -> Option<u64> {
        self.session.as_ref().map(|s| s.frame_count)
    }
}

impl<H: Pod, F: Pod, P: Pod> TraceWriter<BufWriter<File>, H, F, P> {
    /// Create a trace file at `path`.
    pub fn create(path: impl AsRef<Path>, sample_rate: u64, metadata: Metadata) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file), sample_rate, metadata)
    }
}

impl<W: Write + Seek, H: Pod, F: Pod, P: Pod> Drop for TraceWriter<W, H, F, P> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(err) = self.close() {
            warn!(error = %err, "trace writer close on drop failed");
        }
    }
}

/// Append a record image followed by its alignment padding.
fn put_record_aligned<T: Pod>(buf: &mut BytesMut, value: &T) {
    let image = bytemuck::bytes_of(value);
    buf.put_slice(image);
    buf.put_bytes(0, layout::padding(image.len()));
}
