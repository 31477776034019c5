//! Edge-case tests for layout arithmetic, record copies, and the metadata
//! dictionary.

use bytemuck::{Pod, Zeroable};
use wheeltrace_core::layout::{aligned_size, aligned_size_of, check_magic, padding, read_record};
use wheeltrace_core::record::{aligned_frame_size, FRAME_HEADER_SIZE};
use wheeltrace_core::{Error, Frame, FrameHeader, Metadata};

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
struct WheelSpeeds {
    fl: f32,
    fr: f32,
    rl: f32,
    rr: f32,
}

// ---------------------------------------------------------------
// Alignment arithmetic
// ---------------------------------------------------------------

#[test]
fn aligned_size_never_shrinks() {
    for n in 0..256usize {
        let aligned = aligned_size(n);
        assert!(aligned >= n);
        assert!(aligned - n < 8);
        assert_eq!(aligned % 8, 0);
    }
}

#[test]
fn padding_complements_position() {
    for pos in 0..256usize {
        assert_eq!(padding(pos), (8 - pos % 8) % 8);
    }
}

#[test]
fn aligned_size_of_various_types() {
    assert_eq!(aligned_size_of::<u8>(), 8);
    assert_eq!(aligned_size_of::<u64>(), 8);
    assert_eq!(aligned_size_of::<WheelSpeeds>(), 16);
    assert_eq!(aligned_size_of::<[u8; 0]>(), 0);
    assert_eq!(aligned_size_of::<[u16; 5]>(), 16);
}

#[test]
fn frame_size_includes_header_and_padding() {
    assert_eq!(aligned_frame_size::<WheelSpeeds>(), FRAME_HEADER_SIZE + 16);
    assert_eq!(aligned_frame_size::<u8>(), 16);
    assert_eq!(aligned_frame_size::<[u8; 8]>(), 16);
    assert_eq!(aligned_frame_size::<[u8; 9]>(), 24);
}

// ---------------------------------------------------------------
// Magic comparison
// ---------------------------------------------------------------

#[test]
fn magic_mismatch_reports_offset() {
    let err = check_magic(b"XXXX0001", b"WRSF0001", 4096).unwrap_err();
    match err {
        Error::BadMagic { offset, expected } => {
            assert_eq!(offset, 4096);
            assert_eq!(expected, "WRSF0001");
        }
        other => panic!("expected BadMagic, got {other:?}"),
    }
}

#[test]
fn magic_match_is_exact() {
    assert!(check_magic(b"WRTF0001", b"WRTF0001", 0).is_ok());
    assert!(check_magic(b"WRTF0001", b"WRTF0002", 0).is_err());
    assert!(check_magic(b"wrtf0001", b"WRTF0001", 0).is_err());
}

// ---------------------------------------------------------------
// Record copies
// ---------------------------------------------------------------

#[test]
fn record_roundtrip_through_bytes() {
    let speeds = WheelSpeeds {
        fl: 212.4,
        fr: 212.9,
        rl: 214.0,
        rr: 213.7,
    };
    let image = bytemuck::bytes_of(&speeds);
    let back: WheelSpeeds = read_record(image).unwrap();
    assert_eq!(back, speeds);
}

#[test]
fn record_read_from_every_misalignment() {
    let speeds = WheelSpeeds {
        fl: 1.0,
        fr: 2.0,
        rl: 3.0,
        rr: 4.0,
    };
    let image = bytemuck::bytes_of(&speeds);
    for shift in 0..8 {
        let mut storage = vec![0u8; shift + image.len()];
        storage[shift..].copy_from_slice(image);
        let back: WheelSpeeds = read_record(&storage[shift..]).unwrap();
        assert_eq!(back, speeds, "shift {shift}");
    }
}

#[test]
fn record_read_rejects_short_buffer() {
    let short = [0u8; 15];
    assert!(matches!(
        read_record::<WheelSpeeds>(&short),
        Err(Error::TruncatedBuffer {
            needed: 16,
            available: 15
        })
    ));
}

// ---------------------------------------------------------------
// Frames
// ---------------------------------------------------------------

#[test]
fn frame_pairs_tick_with_payload() {
    let frame = Frame::new(
        1234,
        WheelSpeeds {
            fl: 0.0,
            fr: 0.0,
            rl: 0.0,
            rr: 0.0,
        },
    );
    assert_eq!(frame.tick(), 1234);
    assert_eq!(frame.header, FrameHeader { tick: 1234 });
}

// ---------------------------------------------------------------
// Metadata dictionary
// ---------------------------------------------------------------

#[test]
fn metadata_many_entries_keep_order() {
    let mut metadata = Metadata::new();
    for i in 0..100 {
        metadata.insert(format!("key-{i:03}"), format!("value-{i}")).unwrap();
    }
    assert_eq!(metadata.len(), 100);
    let keys: Vec<&str> = metadata.iter().map(|(k, _)| k).collect();
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(*key, format!("key-{i:03}"));
    }
}

#[test]
fn metadata_rejects_duplicate_after_many_inserts() {
    let mut metadata = Metadata::new();
    for i in 0..10 {
        metadata.insert(format!("k{i}"), "v").unwrap();
    }
    assert!(matches!(
        metadata.insert("k5", "other"),
        Err(Error::DuplicateMetadataKey(_))
    ));
    assert_eq!(metadata.len(), 10);
}

#[test]
fn metadata_beyond_bmp_text() {
    let mut metadata = Metadata::new();
    metadata.insert("\u{1F3CE}", "\u{1F3C1}\u{1F3C6}").unwrap();
    let (key, value) = metadata.iter().next().unwrap();
    assert_eq!(key, "\u{1F3CE}");
    assert_eq!(value, "\u{1F3C1}\u{1F3C6}");
}
