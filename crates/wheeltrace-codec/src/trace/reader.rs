//! Trace Reader - Random-Access Consumer of WRTF Files
//!
//! `TraceReader` validates a trace eagerly on open and serves frames
//! lazily afterwards.
//!
//! ## Validation Process
//!
//! 1. Stream length must be a multiple of 8
//! 2. File header: magic "WRTF0001", version 1
//! 3. Metadata block decoded (two-pass, duplicate keys rejected)
//! 4. Document footer located from the end of the stream: the last 8
//!    bytes must read "WRDE0001", the session count sits just before
//!    them, and from the count the "WRDF0001" position is computed and
//!    verified
//! 5. Every session index entry is followed: header magic and record
//!    validated at the header offset, footer magic, last tick, frame
//!    count, and footer record validated at the footer offset
//! 6. Cross-checks: footer frame count against the index entry, and the
//!    frame region size against `frame_count * aligned frame size`
//!
//! Any mismatch fails `open` with a typed error; no attempt is made to
//! heal a malformed file. The reader never writes.
//!
//! ## Frame Access
//!
//! `frames` returns a lazy, restartable iterator over one session. It
//! borrows the reader mutably because iteration moves the stream cursor;
//! per-session iterations therefore cannot be interleaved on a single
//! reader. Distinct readers over distinct streams are independent.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::Path;

use bytemuck::Pod;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use tracing::{debug, info};

use wheeltrace_core::layout;
use wheeltrace_core::record::aligned_frame_size;
use wheeltrace_core::{Error, Frame, Metadata, Result, FRAME_HEADER_SIZE};

use crate::session::{SessionDescriptor, SessionIndexEntry};
use crate::trace::{
    FileHeader, DOC_END_MAGIC, DOC_FOOTER_MAGIC, FILE_HEADER_SIZE, FILE_MAGIC, FORMAT_VERSION,
    MAGIC_SIZE, SESSION_ENTRY_SIZE, SESSION_FOOTER_MAGIC, SESSION_MAGIC,
};

/// Smallest structurally valid trace: file header plus an empty document
/// footer.
const MIN_FILE_SIZE: u64 = (FILE_HEADER_SIZE + MAGIC_SIZE + 8 + MAGIC_SIZE) as u64;

/// Random-access reader for one trace file.
///
/// `H`, `F`, and `P` are the caller's session header, session footer, and
/// frame payload record types; they must match the types the trace was
/// written with.
pub struct TraceReader<R: Read + Seek, H: Pod, F: Pod, P: Pod> {
    stream: R,
    header: FileHeader,
    metadata: Metadata,
    sessions: Vec<SessionDescriptor<H, F>>,
    _payload: PhantomData<P>,
}

impl<R: Read + Seek, H: Pod, F: Pod, P: Pod> std::fmt::Debug for TraceReader<R, H, F, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceReader")
            .field("header", &self.header)
            .field("metadata", &self.metadata)
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl<R: Read + Seek, H: Pod, F: Pod, P: Pod> TraceReader<R, H, F, P> {
    /// Open a trace, validating the header, metadata, document footer,
    /// and every session's header and footer.
    pub fn open(mut stream: R) -> Result<Self> {
        let stream_len = stream.seek(SeekFrom::End(0))?;
        if stream_len % layout::ALIGNMENT as u64 != 0 {
            return Err(Error::MisalignedStream(format!(
                "stream length {stream_len} is not a multiple of 8"
            )));
        }
        if stream_len < MIN_FILE_SIZE {
            return Err(Error::TruncatedBuffer {
                needed: MIN_FILE_SIZE as usize,
                available: stream_len as usize,
            });
        }

        let header = Self::read_file_header(&mut stream)?;
        let metadata = crate::metadata::decode(&mut stream, header.metadata_count, stream_len)?;
        let entries = Self::read_document_footer(&mut stream, stream_len)?;

        let mut sessions = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            sessions.push(Self::validate_session(&mut stream, entry, index)?);
        }

        info!(
            sessions = sessions.len(),
            sample_rate = header.sample_rate,
            "trace opened"
        );
        Ok(Self {
            stream,
            header,
            metadata,
            sessions,
            _payload: PhantomData,
        })
    }

    fn read_file_header(stream: &mut R) -> Result<FileHeader> {
        stream.seek(SeekFrom::Start(0))?;
        let mut magic = [0u8; MAGIC_SIZE];
        stream
            .read_exact(&mut magic)
            .map_err(|err| Error::from_read(err, "file magic"))?;
        layout::check_magic(&magic, &FILE_MAGIC, 0)?;

        let version = read_u64(stream, "file version")?;
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        let sample_rate = read_u64(stream, "sample rate")?;
        let start_timestamp_us = read_u64(stream, "start timestamp")?;
        let metadata_count = read_u32(stream, "metadata count")?;
        let _reserved = read_u32(stream, "reserved field")?;

        Ok(FileHeader {
            version,
            sample_rate,
            start_timestamp_us,
            metadata_count,
        })
    }

    /// Locate and parse the document footer, end-relative.
    fn read_document_footer(stream: &mut R, stream_len: u64) -> Result<Vec<SessionIndexEntry>> {
        let end_magic_pos = stream_len - MAGIC_SIZE as u64;
        stream.seek(SeekFrom::Start(end_magic_pos))?;
        let mut magic = [0u8; MAGIC_SIZE];
        stream
            .read_exact(&mut magic)
            .map_err(|err| Error::from_read(err, "document end marker"))?;
        layout::check_magic(&magic, &DOC_END_MAGIC, end_magic_pos)?;

        let count_pos = stream_len - (MAGIC_SIZE + 8) as u64;
        stream.seek(SeekFrom::Start(count_pos))?;
        let count = read_u64(stream, "session count")?;

        let index_size = count
            .checked_mul(SESSION_ENTRY_SIZE as u64)
            .ok_or_else(|| Error::UnexpectedEof("document footer index".to_string()))?;
        let footer_magic_pos = stream_len
            .checked_sub((MAGIC_SIZE + 8 + MAGIC_SIZE) as u64 + index_size)
            .filter(|pos| *pos >= FILE_HEADER_SIZE as u64)
            .ok_or_else(|| Error::UnexpectedEof("document footer index".to_string()))?;

        stream.seek(SeekFrom::Start(footer_magic_pos))?;
        stream
            .read_exact(&mut magic)
            .map_err(|err| Error::from_read(err, "document footer marker"))?;
        layout::check_magic(&magic, &DOC_FOOTER_MAGIC, footer_magic_pos)?;

        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(SessionIndexEntry {
                start_offset: read_u64(stream, "session index entry")?,
                footer_offset: read_u64(stream, "session index entry")?,
                frame_count: read_u64(stream, "session index entry")?,
            });
        }
        Ok(entries)
    }

    /// Validate one session's header and footer and build its descriptor.
    fn validate_session(
        stream: &mut R,
        entry: SessionIndexEntry,
        index: usize,
    ) -> Result<SessionDescriptor<H, F>> {
        for offset in [entry.start_offset, entry.footer_offset] {
            if offset % layout::ALIGNMENT as u64 != 0 {
                return Err(Error::MisalignedStream(format!(
                    "session {index} offset {offset} is not a multiple of 8"
                )));
            }
        }

        let header_size = layout::aligned_size_of::<H>();
        let footer_size = layout::aligned_size_of::<F>();
        let mut buf = vec![0u8; header_size.max(footer_size)];
        let mut magic = [0u8; MAGIC_SIZE];

        stream.seek(SeekFrom::Start(entry.start_offset))?;
        stream
            .read_exact(&mut magic)
            .map_err(|err| Error::from_read(err, "session magic"))?;
        layout::check_magic(&magic, &SESSION_MAGIC, entry.start_offset)?;
        stream
            .read_exact(&mut buf[..header_size])
            .map_err(|err| Error::from_read(err, "session header record"))?;
        let header: H = layout::read_record(&buf)?;
        let data_offset = entry.start_offset + (MAGIC_SIZE + header_size) as u64;

        stream.seek(SeekFrom::Start(entry.footer_offset))?;
        stream
            .read_exact(&mut magic)
            .map_err(|err| Error::from_read(err, "session footer magic"))?;
        layout::check_magic(&magic, &SESSION_FOOTER_MAGIC, entry.footer_offset)?;
        let last_tick = read_u64(stream, "session last tick")?;
        let frame_count = read_u64(stream, "session frame count")?;
        if frame_count != entry.frame_count {
            return Err(Error::InconsistentFrameCount {
                session: index,
                index: entry.frame_count,
                footer: frame_count,
            });
        }
        stream
            .read_exact(&mut buf[..footer_size])
            .map_err(|err| Error::from_read(err, "session footer record"))?;
        let footer: F = layout::read_record(&buf)?;

        let frame_size = aligned_frame_size::<P>() as u64;
        let span = entry
            .footer_offset
            .checked_sub(data_offset)
            .ok_or_else(|| {
                Error::CorruptSessionLayout(format!(
                    "session {index}: footer offset {} precedes data offset {data_offset}",
                    entry.footer_offset
                ))
            })?;
        let expected = frame_count.checked_mul(frame_size).ok_or_else(|| {
            Error::CorruptSessionLayout(format!("session {index}: frame count overflow"))
        })?;
        if span != expected {
            return Err(Error::CorruptSessionLayout(format!(
                "session {index}: frame region is {span} bytes, expected {frame_count} frames \
                 of {frame_size} bytes"
            )));
        }

        debug!(session = index, frames = frame_count, "session validated");
        Ok(SessionDescriptor {
            header,
            footer,
            frame_count,
            last_tick,
            start_offset: entry.start_offset,
            data_offset,
            footer_offset: entry.footer_offset,
        })
    }

    /// Decoded file header.
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u64 {
        self.header.sample_rate
    }

    /// Decoded metadata dictionary.
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Sessions in on-wire (chronological) order.
    pub fn sessions(&self) -> &[SessionDescriptor<H, F>] {
        &self.sessions
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Iterate the frames of one session lazily, in wire order.
    ///
    /// The iterator is restartable: calling `frames` again rewinds to the
    /// session's first frame.
    pub fn frames(&mut self, session: &SessionDescriptor<H, F>) -> Result<FrameIter<'_, R, P>> {
        self.stream.seek(SeekFrom::Start(session.data_offset))?;
        let frame_size = aligned_frame_size::<P>();
        Ok(FrameIter {
            stream: &mut self.stream,
            remaining: session.frame_count,
            next_offset: session.data_offset,
            end_offset: session.footer_offset,
            frame_size,
            buf: vec![0u8; frame_size],
            _payload: PhantomData,
        })
    }

    /// Collect every frame of one session.
    pub fn read_all_frames(&mut self, session: &SessionDescriptor<H, F>) -> Result<Vec<Frame<P>>> {
        self.frames(session)?.collect()
    }
}

impl<H: Pod, F: Pod, P: Pod> TraceReader<BufReader<File>, H, F, P> {
    /// Open a trace file at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::open(BufReader::new(file))
    }
}

/// Lazy frame sequence over one session.
///
/// Stops after exactly the session's frame count, or earlier if the next
/// frame would cross into the session footer.
pub struct FrameIter<'a, R: Read + Seek, P: Pod> {
    stream: &'a mut R,
    remaining: u64,
    next_offset: u64,
    end_offset: u64,
    frame_size: usize,
    buf: Vec<u8>,
    _payload: PhantomData<P>,
}

impl<R: Read + Seek, P: Pod> FrameIter<'_, R, P> {
    fn read_frame(&mut self) -> Result<Frame<P>> {
        self.stream
            .read_exact(&mut self.buf)
            .map_err(|err| Error::from_read(err, "frame"))?;
        let tick = LittleEndian::read_u64(&self.buf[..FRAME_HEADER_SIZE]);
        let payload = layout::read_record::<P>(&self.buf[FRAME_HEADER_SIZE..])?;
        Ok(Frame::new(tick, payload))
    }
}

impl<R: Read + Seek, P: Pod> Iterator for FrameIter<'_, R, P> {
    type Item = Result<Frame<P>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        if self.next_offset + self.frame_size as u64 > self.end_offset {
            return None;
        }
        match self.read_frame() {
            Ok(frame) => {
                self.remaining -= 1;
                self.next_offset += self.frame_size as u64;
                Some(Ok(frame))
            }
            Err(err) => {
                // fuse on failure
                self.remaining = 0;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

fn read_u64<R: Read>(stream: &mut R, what: &str) -> Result<u64> {
    stream
        .read_u64::<LittleEndian>()
        .map_err(|err| Error::from_read(err, what))
}

fn read_u32<R: Read>(stream: &mut R, what: &str) -> Result<u32> {
    stream
        .read_u32::<LittleEndian>()
        .map_err(|err| Error::from_read(err, what))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::TraceWriter;
    use bytemuck::Zeroable;
    use std::io::Cursor;

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct StintHeader {
        session_id: u64,
        lap_count: u32,
        tyre_set: u32,
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct StintFooter {
        best_lap_us: u64,
        cuts: u64,
    }

    #[repr(C)]
    #[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
    struct CarSample {
        speed_kmh: f32,
        rpm: f32,
        throttle: f32,
    }

    type Reader = TraceReader<Cursor<Vec<u8>>, StintHeader, StintFooter, CarSample>;

    /// Write one session with the given ticks and return the file bytes.
    fn write_trace(ticks: &[u64]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut writer: TraceWriter<_, StintHeader, StintFooter, CarSample> =
                TraceWriter::new(Cursor::new(&mut buf), 60, Metadata::new()).unwrap();
            writer
                .begin_session(&StintHeader {
                    session_id: 1,
                    lap_count: 0,
                    tyre_set: 0,
                })
                .unwrap();
            for &tick in ticks {
                writer
                    .write_frame(
                        tick,
                        &CarSample {
                            speed_kmh: tick as f32,
                            rpm: 8000.0,
                            throttle: 0.5,
                        },
                    )
                    .unwrap();
            }
            writer.end_session(&StintFooter::zeroed()).unwrap();
            writer.close().unwrap();
        }
        buf
    }

    // ---------------------------------------------------------------
    // Open failures
    // ---------------------------------------------------------------

    #[test]
    fn test_open_empty_stream() {
        let err = Reader::open(Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, Error::TruncatedBuffer { .. }));
    }

    #[test]
    fn test_open_aligned_but_too_small() {
        let err = Reader::open(Cursor::new(vec![0u8; 48])).unwrap_err();
        assert!(matches!(err, Error::TruncatedBuffer { .. }));
    }

    #[test]
    fn test_open_misaligned_length() {
        let err = Reader::open(Cursor::new(vec![0u8; 67])).unwrap_err();
        assert!(matches!(err, Error::MisalignedStream(_)));
    }

    #[test]
    fn test_open_zeroed_stream_bad_magic() {
        let err = Reader::open(Cursor::new(vec![0u8; 64])).unwrap_err();
        match err {
            Error::BadMagic { offset, expected } => {
                assert_eq!(offset, 0);
                assert_eq!(expected, "WRTF0001");
            }
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn test_open_unsupported_version() {
        let mut bytes = write_trace(&[0, 1, 2]);
        bytes[8] = 2; // version u64 LE low byte
        let err = Reader::open(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedVersion(2)));
    }

    #[test]
    fn test_open_truncated_tail() {
        let mut bytes = write_trace(&[0, 1, 2]);
        bytes.truncate(bytes.len() - 8);
        let err = Reader::open(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::BadMagic { .. }));
    }

    #[test]
    fn test_open_corrupt_index_frame_count() {
        let mut bytes = write_trace(&[0, 1, 2]);
        // Frame count of the single index entry sits 24 bytes before the
        // session count.
        let pos = bytes.len() - 16 - 8;
        bytes[pos] ^= 0x01;
        let err = Reader::open(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::InconsistentFrameCount { .. }));
    }

    #[test]
    fn test_open_wrong_payload_type_size() {
        let bytes = write_trace(&[0, 1, 2]);
        // A wider payload type changes the aligned frame size, so the
        // frame region no longer divides into whole frames.
        let err = TraceReader::<_, StintHeader, StintFooter, [u64; 4]>::open(Cursor::new(bytes))
            .unwrap_err();
        assert!(matches!(err, Error::CorruptSessionLayout(_)));
    }

    // ---------------------------------------------------------------
    // Happy path
    // ---------------------------------------------------------------

    #[test]
    fn test_open_and_iterate_frames() {
        let bytes = write_trace(&[0, 5, 9]);
        let mut reader = Reader::open(Cursor::new(bytes)).unwrap();

        assert_eq!(reader.header().version, 1);
        assert_eq!(reader.sample_rate(), 60);
        assert_eq!(reader.session_count(), 1);

        let session = reader.sessions()[0];
        assert_eq!(session.frame_count, 3);
        assert_eq!(session.last_tick, 9);
        assert_eq!(session.header.session_id, 1);

        let frames = reader.read_all_frames(&session).unwrap();
        let ticks: Vec<u64> = frames.iter().map(|f| f.tick()).collect();
        assert_eq!(ticks, [0, 5, 9]);
        assert_eq!(frames[1].payload.speed_kmh, 5.0);
    }

    #[test]
    fn test_frames_iterator_is_restartable() {
        let bytes = write_trace(&[1, 2, 3, 4]);
        let mut reader = Reader::open(Cursor::new(bytes)).unwrap();
        let session = reader.sessions()[0];

        let first: Vec<u64> = reader
            .frames(&session)
            .unwrap()
            .map(|f| f.unwrap().tick())
            .collect();
        let second: Vec<u64> = reader
            .frames(&session)
            .unwrap()
            .map(|f| f.unwrap().tick())
            .collect();
        assert_eq!(first, second);
        assert_eq!(first, [1, 2, 3, 4]);
    }

    #[test]
    fn test_frames_size_hint() {
        let bytes = write_trace(&[0, 1]);
        let mut reader = Reader::open(Cursor::new(bytes)).unwrap();
        let session = reader.sessions()[0];
        let iter = reader.frames(&session).unwrap();
        assert_eq!(iter.size_hint(), (2, Some(2)));
    }

    #[test]
    fn test_all_descriptor_offsets_aligned() {
        let bytes = write_trace(&[0, 1, 2, 3, 4]);
        let reader = Reader::open(Cursor::new(bytes)).unwrap();
        let session = &reader.sessions()[0];
        for offset in [
            session.start_offset,
            session.data_offset,
            session.footer_offset,
        ] {
            assert_eq!(offset % 8, 0, "offset {offset}");
        }
    }
}
