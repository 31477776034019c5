//! Metadata Dictionary Wire Codec
//!
//! Serializes the metadata dictionary that sits between the file header and
//! the first session. Each entry is `{ u32 key_len, key bytes, pad to 8,
//! u32 val_len, value bytes, pad to 8 }`, with padding computed from the
//! running position so every entry boundary lands on an 8-byte multiple.
//! The block starts at file offset 40, itself a multiple of 8, so
//! block-relative and absolute alignment agree.
//!
//! Decoding is two-pass: a prescan records the (start, length) span of
//! every key and value while advancing past padding, then a single decode
//! buffer sized to the longest span fetches the text. Duplicate keys and
//! non-UTF-8 text are malformed input.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::{BufMut, BytesMut};

use wheeltrace_core::layout;
use wheeltrace_core::{Error, Metadata, Result};

use crate::trace::FILE_HEADER_SIZE;

/// Byte span of one text field recorded during the prescan.
#[derive(Debug, Clone, Copy)]
struct TextSpan {
    start: u64,
    len: usize,
}

/// Append the dictionary's wire image to `buf`.
///
/// `buf` may already hold earlier bytes (the file header); padding is
/// computed relative to the block start, i.e. the length of `buf` at entry.
pub(crate) fn encode(metadata: &Metadata, buf: &mut BytesMut) {
    let base = buf.len();
    for (key, value) in metadata.iter() {
        put_text(buf, base, key);
        put_text(buf, base, value);
    }
}

fn put_text(buf: &mut BytesMut, base: usize, text: &str) {
    buf.put_u32_le(text.len() as u32);
    buf.put_slice(text.as_bytes());
    buf.put_bytes(0, layout::padding(buf.len() - base));
}

/// Decode `count` entries starting at the fixed metadata offset.
///
/// `stream_len` bounds every span so a corrupt length field fails fast
/// instead of seeking past the end of the file.
pub(crate) fn decode<R: Read + Seek>(
    stream: &mut R,
    count: u32,
    stream_len: u64,
) -> Result<Metadata> {
    let mut spans = Vec::with_capacity(count as usize);
    let mut pos = FILE_HEADER_SIZE as u64;
    stream.seek(SeekFrom::Start(pos))?;

    for entry in 0..count {
        let key = scan_text(stream, &mut pos, stream_len, entry)?;
        let value = scan_text(stream, &mut pos, stream_len, entry)?;
        spans.push((key, value));
    }

    let longest = spans
        .iter()
        .flat_map(|(k, v)| [k.len, v.len])
        .max()
        .unwrap_or(0);
    let mut buf = vec![0u8; longest];

    let mut metadata = Metadata::new();
    for (entry, (key_span, value_span)) in spans.iter().enumerate() {
        let key = fetch_text(stream, &mut buf, *key_span, entry)?;
        let value = fetch_text(stream, &mut buf, *value_span, entry)?;
        metadata.insert(key, value)?;
    }
    Ok(metadata)
}

/// Record one length-prefixed text span and advance past it and its
/// padding.
fn scan_text<R: Read + Seek>(
    stream: &mut R,
    pos: &mut u64,
    stream_len: u64,
    entry: u32,
) -> Result<TextSpan> {
    let len = stream
        .read_u32::<LittleEndian>()
        .map_err(|err| Error::from_read(err, &format!("metadata entry {entry} length")))?;
    *pos += 4;

    let span = TextSpan {
        start: *pos,
        len: len as usize,
    };
    *pos += len as u64;
    *pos += layout::padding(*pos as usize) as u64;
    if *pos > stream_len {
        return Err(Error::UnexpectedEof(format!("metadata entry {entry}")));
    }
    stream.seek(SeekFrom::Start(*pos))?;
    Ok(span)
}

fn fetch_text<R: Read + Seek>(
    stream: &mut R,
    buf: &mut [u8],
    span: TextSpan,
    entry: usize,
) -> Result<String> {
    stream.seek(SeekFrom::Start(span.start))?;
    let slot = &mut buf[..span.len];
    stream
        .read_exact(slot)
        .map_err(|err| Error::from_read(err, &format!("metadata entry {entry} text")))?;
    match std::str::from_utf8(slot) {
        Ok(text) => Ok(text.to_owned()),
        Err(_) => Err(Error::InvalidMetadata(format!(
            "entry {entry} is not valid UTF-8"
        ))),
    }
}
