//! 8-byte Layout Arithmetic and Blittable Record Copies
//!
//! Every structural boundary in a WRTF trace file is aligned to 8 bytes.
//! This module owns the arithmetic behind that rule (`aligned_size`,
//! `padding`), magic-tag comparison, and the copy paths that move a
//! caller-supplied record between its in-memory representation and its
//! on-wire byte image.
//!
//! Records crossing this layer are *blittable*: their in-memory bytes equal
//! their on-wire bytes. The `bytemuck::Pod` bound enforces that — fixed
//! size, trivially copyable, no implicit padding. Reads tolerate source
//! slices that are not 8-aligned in memory: the direct cast is attempted
//! first and a byte-wise copy is used when the address does not line up.

use bytemuck::Pod;

use crate::error::{Error, Result};

/// Alignment unit for every structural boundary in a trace file.
pub const ALIGNMENT: usize = 8;

/// Size of `size` bytes rounded up to the next multiple of 8.
pub const fn aligned_size(size: usize) -> usize {
    (size + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}

/// Zero bytes required to advance `position` to the next 8-byte boundary.
pub const fn padding(position: usize) -> usize {
    aligned_size(position) - position
}

/// Aligned on-wire size of a record type.
pub fn aligned_size_of<T: Pod>() -> usize {
    aligned_size(std::mem::size_of::<T>())
}

/// Compare an 8-byte span against an expected ASCII magic tag.
///
/// `offset` is the absolute stream position of `found`, reported on
/// mismatch.
pub fn check_magic(found: &[u8; 8], expected: &[u8; 8], offset: u64) -> Result<()> {
    if found == expected {
        Ok(())
    } else {
        Err(Error::BadMagic {
            offset,
            expected: String::from_utf8_lossy(expected).into_owned(),
        })
    }
}

/// Copy a record out of the start of `bytes`.
///
/// The slice must hold at least `size_of::<T>()` bytes; extra trailing
/// bytes (wire padding) are ignored. The source address does not need to
/// be aligned.
pub fn read_record<T: Pod>(bytes: &[u8]) -> Result<T> {
    let size = std::mem::size_of::<T>();
    if bytes.len() < size {
        return Err(Error::TruncatedBuffer {
            needed: size,
            available: bytes.len(),
        });
    }
    let image = &bytes[..size];
    match bytemuck::try_from_bytes::<T>(image) {
        Ok(value) => Ok(*value),
        // source not aligned for T; fall back to a byte-wise copy
        Err(_) => Ok(bytemuck::pod_read_unaligned(image)),
    }
}

/// Copy a record's byte image into the start of `bytes`.
pub fn write_record<T: Pod>(bytes: &mut [u8], value: &T) -> Result<()> {
    let image = bytemuck::bytes_of(value);
    if bytes.len() < image.len() {
        return Err(Error::TruncatedBuffer {
            needed: image.len(),
            available: bytes.len(),
        });
    }
    bytes[..image.len()].copy_from_slice(image);
    Ok(())
}
