//! Channel descriptors and typed value decoding.
//!
//! Each channel declares one numeric quantity in the device's memory: an
//! address, an element type, and an optional bitfield slice within the raw
//! integer. Continuous frames pack the channels contiguously in declaration
//! order, little-endian, with no padding, followed by the CRC16 trailer.

use serde::{Deserialize, Serialize};

/// Wire element type of a channel. Closed set: new kinds extend this enum and
/// the `byte_size`/decode mappings in this module, nowhere else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    Bool,
    /// UTF-16 code unit, decoded as its numeric value.
    Char,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ElementType {
    /// Number of bytes this element occupies in a frame.
    pub fn byte_size(self) -> usize {
        match self {
            ElementType::Bool | ElementType::I8 | ElementType::U8 => 1,
            ElementType::Char | ElementType::I16 | ElementType::U16 => 2,
            ElementType::I32 | ElementType::U32 | ElementType::F32 => 4,
            ElementType::I64 | ElementType::U64 | ElementType::F64 => 8,
        }
    }

    /// Whether bitfield extraction applies to this element.
    fn is_integer(self) -> bool {
        !matches!(self, ElementType::Bool | ElementType::F32 | ElementType::F64)
    }
}

/// One declared channel. Immutable once a capture session starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub name: String,
    /// Optional free-text description for the consuming shell.
    pub info: Option<String>,
    /// Device memory address of the quantity.
    pub address: u32,
    pub element_type: ElementType,
    /// Bit offset of the field within the raw integer.
    pub bit_offset: u32,
    /// Bit width of the field; 0 means the whole element.
    pub bit_size: u32,
}

impl ChannelDescriptor {
    pub fn new(name: impl Into<String>, address: u32, element_type: ElementType) -> Self {
        Self {
            name: name.into(),
            info: None,
            address,
            element_type,
            bit_offset: 0,
            bit_size: 0,
        }
    }

    /// Restrict this channel to a bitfield slice of the raw integer.
    pub fn with_bitfield(mut self, offset: u32, size: u32) -> Self {
        self.bit_offset = offset;
        self.bit_size = size;
        self
    }

    pub fn byte_size(&self) -> usize {
        self.element_type.byte_size()
    }
}

/// Extract an arbitrary-width field from an integer.
///
/// A size of 0 is treated as "whole field" and returns `value` unchanged.
/// The mask is built in two steps so a full-width field does not overflow
/// the shift.
pub fn extract_bits(value: u64, offset: u32, size: u32) -> u64 {
    if size == 0 {
        return value;
    }
    let mask = (((1u64 << (size - 1)) - 1) << 1) | 1;
    (value >> offset) & mask
}

/// Read one typed value off the front of `cursor`, advancing it by exactly
/// the element's byte width and widening the result to `f64`.
///
/// Little-endian throughout; booleans become 1.0/0.0. A cursor shorter than
/// the element width is a framing-arithmetic bug in the caller and panics.
pub fn read_value(cursor: &mut &[u8], ty: ElementType) -> f64 {
    let width = ty.byte_size();
    assert!(
        cursor.len() >= width,
        "cursor underrun: {} bytes left, {ty:?} needs {width}",
        cursor.len()
    );
    let (head, rest) = cursor.split_at(width);
    *cursor = rest;
    match ty {
        ElementType::Bool => {
            if head[0] != 0 {
                1.0
            } else {
                0.0
            }
        }
        ElementType::Char => u16::from_le_bytes([head[0], head[1]]) as f64,
        ElementType::I8 => head[0] as i8 as f64,
        ElementType::U8 => head[0] as f64,
        ElementType::I16 => i16::from_le_bytes([head[0], head[1]]) as f64,
        ElementType::U16 => u16::from_le_bytes([head[0], head[1]]) as f64,
        ElementType::I32 => i32::from_le_bytes(head.try_into().unwrap()) as f64,
        ElementType::U32 => u32::from_le_bytes(head.try_into().unwrap()) as f64,
        ElementType::I64 => i64::from_le_bytes(head.try_into().unwrap()) as f64,
        ElementType::U64 => u64::from_le_bytes(head.try_into().unwrap()) as f64,
        ElementType::F32 => f32::from_le_bytes(head.try_into().unwrap()) as f64,
        ElementType::F64 => f64::from_le_bytes(head.try_into().unwrap()),
    }
}

/// Read the raw unsigned little-endian integer of the element's width.
fn read_raw(cursor: &mut &[u8], width: usize) -> u64 {
    assert!(
        cursor.len() >= width,
        "cursor underrun: {} bytes left, raw read needs {width}",
        cursor.len()
    );
    let (head, rest) = cursor.split_at(width);
    *cursor = rest;
    let mut raw = 0u64;
    for (i, &byte) in head.iter().enumerate() {
        raw |= (byte as u64) << (8 * i);
    }
    raw
}

/// Decode one verified frame payload (trailer already removed) into one value
/// per channel, in declaration order, off a single shared cursor.
pub fn decode_sample_vector(payload: &[u8], channels: &[ChannelDescriptor]) -> Vec<f64> {
    let mut cursor = payload;
    channels
        .iter()
        .map(|ch| decode_channel(&mut cursor, ch))
        .collect()
}

fn decode_channel(cursor: &mut &[u8], channel: &ChannelDescriptor) -> f64 {
    // Bitfield slices only make sense on integer elements; a slice is an
    // unsigned quantity regardless of the declared signedness. A size of 0
    // means the whole field, offset included, so only a sized slice takes
    // the raw-read path.
    if channel.element_type.is_integer() && channel.bit_size != 0 {
        let raw = read_raw(cursor, channel.byte_size());
        extract_bits(raw, channel.bit_offset, channel.bit_size) as f64
    } else {
        read_value(cursor, channel.element_type)
    }
}

/// The vector emitted for a frame that failed CRC verification: same length,
/// every slot the not-a-number sentinel.
pub fn nan_sample_vector(channel_count: usize) -> Vec<f64> {
    vec![f64::NAN; channel_count]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bits_basic() {
        assert_eq!(extract_bits(0b1011_0100, 2, 3), 0b101);
    }

    #[test]
    fn extract_bits_size_zero_is_identity() {
        for x in [0u64, 1, 0xDEAD_BEEF, u64::MAX] {
            assert_eq!(extract_bits(x, 0, 0), x);
        }
    }

    #[test]
    fn extract_bits_full_width() {
        assert_eq!(extract_bits(u64::MAX, 0, 64), u64::MAX);
        assert_eq!(extract_bits(u64::MAX, 32, 32), u32::MAX as u64);
    }

    #[test]
    fn cursor_advances_per_type() {
        let data = [0u8; 32];
        for ty in [
            ElementType::Bool,
            ElementType::Char,
            ElementType::I8,
            ElementType::U8,
            ElementType::I16,
            ElementType::U16,
            ElementType::I32,
            ElementType::U32,
            ElementType::I64,
            ElementType::U64,
            ElementType::F32,
            ElementType::F64,
        ] {
            let mut cursor = &data[..];
            read_value(&mut cursor, ty);
            assert_eq!(data.len() - cursor.len(), ty.byte_size(), "{ty:?}");
        }
    }

    #[test]
    fn typed_reads_are_little_endian() {
        let mut cursor = &[0x01u8, 0x00][..];
        assert_eq!(read_value(&mut cursor, ElementType::U16), 1.0);

        let mut cursor = &[0xFFu8][..];
        assert_eq!(read_value(&mut cursor, ElementType::I8), -1.0);

        let mut cursor = &[0x00u8, 0x00, 0x80, 0x3F][..];
        assert_eq!(read_value(&mut cursor, ElementType::F32), 1.0);

        let mut cursor = &[0x02u8][..];
        assert_eq!(read_value(&mut cursor, ElementType::Bool), 1.0);
        let mut cursor = &[0x00u8][..];
        assert_eq!(read_value(&mut cursor, ElementType::Bool), 0.0);
    }

    #[test]
    #[should_panic(expected = "cursor underrun")]
    fn short_cursor_panics() {
        let mut cursor = &[0x01u8][..];
        read_value(&mut cursor, ElementType::U32);
    }

    #[test]
    fn sample_vector_shared_cursor() {
        let channels = vec![
            ChannelDescriptor::new("count", 0x1000, ElementType::U16),
            ChannelDescriptor::new("level", 0x1004, ElementType::F32),
        ];
        let payload = [0x01, 0x00, 0x00, 0x00, 0x80, 0x3F];
        assert_eq!(decode_sample_vector(&payload, &channels), vec![1.0, 1.0]);
    }

    #[test]
    fn sample_vector_bitfield_channel() {
        let channels = vec![
            ChannelDescriptor::new("flags", 0x2000, ElementType::U8).with_bitfield(2, 3)
        ];
        let payload = [0b1011_0100];
        assert_eq!(decode_sample_vector(&payload, &channels), vec![5.0]);
    }

    #[test]
    fn size_zero_bitfield_keeps_signedness() {
        // Offset with size 0 still means "whole field": the signed decode
        // applies, not the unsigned raw read.
        let channels = vec![
            ChannelDescriptor::new("signed", 0x2000, ElementType::I16).with_bitfield(3, 0)
        ];
        let payload = [0xFF, 0xFF];
        assert_eq!(decode_sample_vector(&payload, &channels), vec![-1.0]);
    }

    #[test]
    fn nan_vector_shape() {
        let v = nan_sample_vector(3);
        assert_eq!(v.len(), 3);
        assert!(v.iter().all(|x| x.is_nan()));
    }
}
