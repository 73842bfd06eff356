//! CRC16 codec for the link protocol.
//!
//! Classic reflected CRC-16 with the Modbus polynomial (0xA001, seed 0xFFFF).
//! Every frame on the wire carries its checksum as a little-endian trailer in
//! the last two bytes.

use once_cell::sync::Lazy;

const POLYNOMIAL: u16 = 0xA001;
const SEED: u16 = 0xFFFF;

/// Precomputed 256-entry table: one shift-and-xor reduction per dividend byte.
static CRC_TABLE: Lazy<[u16; 256]> = Lazy::new(|| {
    let mut table = [0u16; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let mut value = 0u16;
        let mut temp = i as u16;
        for _ in 0..8 {
            if (value ^ temp) & 0x0001 != 0 {
                value = (value >> 1) ^ POLYNOMIAL;
            } else {
                value >>= 1;
            }
            temp >>= 1;
        }
        *entry = value;
    }
    table
});

/// Calculate the CRC16 of `data`.
pub fn calculate(data: &[u8]) -> u16 {
    let mut crc = SEED;
    for &byte in data {
        crc = (crc >> 8) ^ CRC_TABLE[((crc ^ byte as u16) & 0xFF) as usize];
    }
    crc
}

/// Check the little-endian CRC16 trailer of a complete frame.
///
/// Returns `false` for inputs shorter than the trailer itself.
pub fn verify(data: &[u8]) -> bool {
    let Some(body_len) = data.len().checked_sub(2) else {
        return false;
    };
    let received = u16::from_le_bytes([data[body_len], data[body_len + 1]]);
    calculate(&data[..body_len]) == received
}

/// Append the little-endian CRC16 trailer to an outgoing frame.
pub fn append(frame: &mut Vec<u8>) {
    let crc = calculate(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        // Reference value for the capture-start header bytes.
        assert_eq!(calculate(&[0x01, 0x17]), 0x2E40);
    }

    #[test]
    fn stop_frame_trailer() {
        // The fixed stop/pause frame is the header plus its own trailer.
        let mut frame = vec![0x01, 0x18];
        append(&mut frame);
        assert_eq!(frame, [0x01, 0x18, 0x00, 0x2A]);
        assert!(verify(&frame));
    }

    #[test]
    fn round_trip() {
        for data in [&b""[..], b"\x00", b"\x01\x02\x03\x04\x05", b"oscilloscope"] {
            let mut frame = data.to_vec();
            append(&mut frame);
            assert!(verify(&frame), "frame {frame:02X?} should verify");
        }
    }

    #[test]
    fn single_bit_flip_fails() {
        let mut frame = vec![0x01, 0x02, 0x03, 0x04, 0x05];
        append(&mut frame);
        for byte in 0..frame.len() {
            for bit in 0..8 {
                let mut corrupted = frame.clone();
                corrupted[byte] ^= 1 << bit;
                assert!(
                    !verify(&corrupted),
                    "flip of byte {byte} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn too_short_is_false() {
        assert!(!verify(&[]));
        assert!(!verify(&[0xFF]));
    }
}
