//! Frame Records
//!
//! A frame is one tick's worth of telemetry: a fixed 8-byte header holding
//! the tick counter, immediately followed by a caller-defined fixed-size
//! payload, the pair zero-padded to a multiple of 8 bytes.
//!
//! The codec never inspects payload internals. Callers supply three record
//! types per trace — session header, session footer, frame payload — each
//! bound by `bytemuck::Pod` so its byte image can be copied verbatim to and
//! from the wire.

use bytemuck::{Pod, Zeroable};

use crate::layout;

/// Wire size of the fixed frame header (the tick counter).
pub const FRAME_HEADER_SIZE: usize = 8;

/// Fixed header preceding every frame payload.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct FrameHeader {
    /// Monotonic sample counter. Real time is
    /// `start_timestamp_us + tick * 1_000_000 / sample_rate`.
    pub tick: u64,
}

/// One decoded frame: the tick header plus the caller-defined payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame<P> {
    pub header: FrameHeader,
    pub payload: P,
}

impl<P> Frame<P> {
    pub fn new(tick: u64, payload: P) -> Self {
        Self {
            header: FrameHeader { tick },
            payload,
        }
    }

    pub fn tick(&self) -> u64 {
        self.header.tick
    }
}

/// Total on-wire size of one frame for payload type `P`: header plus
/// payload, padded to 8 bytes. Every frame in a session has this size.
pub fn aligned_frame_size<P: Pod>() -> usize {
    layout::aligned_size(FRAME_HEADER_SIZE + std::mem::size_of::<P>())
}
