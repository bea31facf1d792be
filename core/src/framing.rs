//! Wire framing: the 12-byte header frame and variable-length data frames.

use crc::{Crc, CRC_16_CCITT_FALSE};
use rand::RngCore;

use crate::error::{ModemError, Result};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_CCITT_FALSE);

pub const HEADER_MAGIC: [u8; 2] = *b"N3";
pub const HEADER_SIZE: usize = 12;
pub const DATA_FRAME_MAGIC: u8 = b'D';
pub const DATA_FRAME_HEADER_SIZE: usize = 3;
pub const VERSION: u8 = 0x03;

/// The 12-byte header frame described in SPEC_FULL.md §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderFrame {
    pub flags: u8,
    pub total_frames: u8,
    pub payload_len: u16,
    pub original_len: u16,
    pub session_id: u16,
}

impl HeaderFrame {
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..2].copy_from_slice(&HEADER_MAGIC);
        buf[2] = (VERSION << 4) | (self.flags & 0x0F);
        buf[3] = self.total_frames;
        buf[4..6].copy_from_slice(&self.payload_len.to_le_bytes());
        buf[6..8].copy_from_slice(&self.original_len.to_le_bytes());
        buf[8..10].copy_from_slice(&self.session_id.to_le_bytes());
        let crc = CRC16.checksum(&buf[0..10]);
        buf[10..12].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(ModemError::InvalidFrameSize);
        }
        if buf[0..2] != HEADER_MAGIC {
            return Err(ModemError::UnknownMagic);
        }
        let crc = u16::from_le_bytes([buf[10], buf[11]]);
        if CRC16.checksum(&buf[0..10]) != crc {
            return Err(ModemError::HeaderCrcFailed);
        }
        let flags = buf[2] & 0x0F;
        let total_frames = buf[3];
        let payload_len = u16::from_le_bytes([buf[4], buf[5]]);
        let original_len = u16::from_le_bytes([buf[6], buf[7]]);
        let session_id = u16::from_le_bytes([buf[8], buf[9]]);
        Ok(HeaderFrame {
            flags,
            total_frames,
            payload_len,
            original_len,
            session_id,
        })
    }
}

/// A single data frame: 1-based index, up to 255 payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub index: u8,
    pub data: Vec<u8>,
}

impl DataFrame {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(DATA_FRAME_HEADER_SIZE + self.data.len());
        buf.push(DATA_FRAME_MAGIC);
        buf.push(self.index);
        buf.push(self.data.len() as u8);
        buf.extend_from_slice(&self.data);
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < DATA_FRAME_HEADER_SIZE {
            return Err(ModemError::InvalidFrameSize);
        }
        if buf[0] != DATA_FRAME_MAGIC {
            return Err(ModemError::UnknownMagic);
        }
        let index = buf[1];
        let len = buf[2] as usize;
        if buf.len() < DATA_FRAME_HEADER_SIZE + len {
            return Err(ModemError::InvalidFrameSize);
        }
        Ok(DataFrame {
            index,
            data: buf[DATA_FRAME_HEADER_SIZE..DATA_FRAME_HEADER_SIZE + len].to_vec(),
        })
    }
}

pub(crate) fn frame_payload_size(len: usize) -> usize {
    if len <= 32 {
        32
    } else if len <= 64 {
        64
    } else {
        128
    }
}

/// Raw wire byte length (3-byte frame header + payload) of each data frame
/// implied by a decoded [`HeaderFrame`], in index order. Both sides derive
/// frame sizes the same way from `payload_len`/`total_frames` alone, so the
/// decoder never needs the size transmitted separately.
pub fn data_frame_wire_lengths(header: &HeaderFrame) -> Vec<usize> {
    let total = header.total_frames as usize;
    if total == 0 {
        return Vec::new();
    }
    let payload_len = header.payload_len as usize;
    let frame_size = frame_payload_size(payload_len);
    let mut lengths = Vec::with_capacity(total);
    let mut remaining = payload_len;
    for _ in 0..total {
        let n = remaining.min(frame_size);
        lengths.push(DATA_FRAME_HEADER_SIZE + n);
        remaining = remaining.saturating_sub(n);
    }
    lengths
}

/// Split a prepared payload into a header frame and its data frames.
pub fn packetize(payload: &[u8], original_len: u16, flags: u8) -> Result<(HeaderFrame, Vec<DataFrame>)> {
    let frame_size = frame_payload_size(payload.len());
    let total_frames = payload.len().div_ceil(frame_size).max(1);
    if total_frames > 255 {
        return Err(ModemError::InvalidConfig(
            "payload requires more than 255 data frames".into(),
        ));
    }

    let session_id = rand::rngs::OsRng.next_u32() as u16;

    let mut frames = Vec::with_capacity(total_frames);
    for (i, chunk) in payload.chunks(frame_size).enumerate() {
        frames.push(DataFrame {
            index: (i + 1) as u8,
            data: chunk.to_vec(),
        });
    }
    if frames.is_empty() {
        frames.push(DataFrame { index: 1, data: Vec::new() });
    }

    let header = HeaderFrame {
        flags,
        total_frames: total_frames as u8,
        payload_len: payload
            .len()
            .try_into()
            .map_err(|_| ModemError::InvalidConfig("payload too large".into()))?,
        original_len,
        session_id,
    };
    Ok((header, frames))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAGS_TEST: u8 = 0b101;

    #[test]
    fn header_roundtrip() {
        let header = HeaderFrame {
            flags: FLAGS_TEST,
            total_frames: 3,
            payload_len: 200,
            original_len: 300,
            session_id: 0xBEEF,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), HEADER_SIZE);
        let decoded = HeaderFrame::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn header_crc_catches_corruption() {
        let header = HeaderFrame {
            flags: 0,
            total_frames: 1,
            payload_len: 10,
            original_len: 10,
            session_id: 42,
        };
        let mut bytes = header.to_bytes();
        bytes[3] ^= 0xFF;
        assert!(matches!(
            HeaderFrame::from_bytes(&bytes),
            Err(ModemError::HeaderCrcFailed)
        ));
    }

    #[test]
    fn rejects_unknown_magic() {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = b'X';
        bytes[1] = b'X';
        assert!(matches!(
            HeaderFrame::from_bytes(&bytes),
            Err(ModemError::UnknownMagic)
        ));
    }

    #[test]
    fn data_frame_roundtrip() {
        let frame = DataFrame {
            index: 5,
            data: vec![1, 2, 3, 4, 5],
        };
        let bytes = frame.to_bytes();
        let decoded = DataFrame::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn packetize_single_frame() {
        let payload = vec![0xAAu8; 11];
        let (header, frames) = packetize(&payload, 11, 0).unwrap();
        assert_eq!(header.total_frames, 1);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, payload);
    }

    #[test]
    fn packetize_multiple_frames() {
        let payload = vec![0x55u8; 300];
        let (header, frames) = packetize(&payload, 300, 0).unwrap();
        assert_eq!(frames.len(), header.total_frames as usize);
        let reassembled: Vec<u8> = frames.iter().flat_map(|f| f.data.clone()).collect();
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn packetize_frame_size_tiers() {
        assert_eq!(frame_payload_size(1), 32);
        assert_eq!(frame_payload_size(32), 32);
        assert_eq!(frame_payload_size(33), 64);
        assert_eq!(frame_payload_size(64), 64);
        assert_eq!(frame_payload_size(65), 128);
    }

    #[test]
    fn wire_lengths_match_actual_frames() {
        let payload = vec![0x7u8; 300];
        let (header, frames) = packetize(&payload, 300, 0).unwrap();
        let lengths = data_frame_wire_lengths(&header);
        let actual: Vec<usize> = frames.iter().map(|f| f.to_bytes().len()).collect();
        assert_eq!(lengths, actual);
    }
}
