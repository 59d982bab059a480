//! Raw frame layout.
//!
//! ```text
//! [length][to][from][id][flags][payload...][crc_lo][crc_hi]
//! ```
//!
//! `length` counts every byte of the raw frame including itself and the trailer.
//! The trailer is the ones' complement of the CRC-CCITT over all preceding
//! bytes, sent low byte first.

use heapless::Vec;

use crate::consts::{
    BROADCAST_ADDRESS, RADIO_HEADER_LEN, RADIO_MAX_MESSAGE_LEN_USIZE, RADIO_MAX_PAYLOAD_LEN_USIZE,
};
use crate::crc::crc_ccitt;
use crate::error::RadioError;

/// A raw, not yet symbol encoded, frame.
pub type RawFrame = Vec<u8, RADIO_MAX_PAYLOAD_LEN_USIZE>;

/// The four header bytes following the length byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct FrameHeader {
    /// Destination address.
    pub to: u8,
    /// Source address.
    pub from: u8,
    /// Sequence id.
    pub id: u8,
    /// Application flags.
    pub flags: u8,
}

impl Default for FrameHeader {
    fn default() -> Self {
        Self {
            to: BROADCAST_ADDRESS,
            from: BROADCAST_ADDRESS,
            id: 0,
            flags: 0,
        }
    }
}

impl FrameHeader {
    /// Reads the header out of a received raw frame.
    ///
    /// Returns `None` when `raw` is too short to hold one.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        match raw {
            [_, to, from, id, flags, ..] => Some(Self {
                to: *to,
                from: *from,
                id: *id,
                flags: *flags,
            }),
            _ => None,
        }
    }

    /// True when a frame with this header is addressed to `address`,
    /// either directly or through the wildcard.
    pub fn is_for(&self, address: u8) -> bool {
        self.to == address || self.to == BROADCAST_ADDRESS
    }
}

/// Assembles the raw frame for `payload`: length, header, payload and CRC trailer.
///
/// # Errors
/// [`RadioError::PayloadTooLong`] if `payload` exceeds the frame capacity.
pub fn build_frame(header: &FrameHeader, payload: &[u8]) -> Result<RawFrame, RadioError> {
    if payload.len() > RADIO_MAX_MESSAGE_LEN_USIZE {
        return Err(RadioError::PayloadTooLong {
            len: payload.len(),
            max: RADIO_MAX_MESSAGE_LEN_USIZE,
        });
    }
    // byte count, headers, payload and the 2 FCS bytes
    let count = payload.len() as u8 + RADIO_HEADER_LEN + 3;

    let mut raw = RawFrame::new();
    let overflow = RadioError::PayloadTooLong {
        len: payload.len(),
        max: RADIO_MAX_MESSAGE_LEN_USIZE,
    };
    raw.extend_from_slice(&[count, header.to, header.from, header.id, header.flags])
        .map_err(|_| overflow)?;
    raw.extend_from_slice(payload).map_err(|_| overflow)?;

    // The receiver expects the ones' complement of the CRC, low byte first
    let fcs = !crc_ccitt(&raw);
    raw.extend_from_slice(&fcs.to_le_bytes())
        .map_err(|_| overflow)?;
    Ok(raw)
}

/// Payload portion of a validated raw frame.
pub fn payload(raw: &[u8]) -> &[u8] {
    let start = usize::from(RADIO_HEADER_LEN) + 1;
    let end = raw.len().saturating_sub(2);
    raw.get(start..end).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::frame_crc_ok;

    #[test]
    fn test_frame_layout() {
        let header = FrameHeader {
            to: 0x10,
            from: 0x20,
            id: 3,
            flags: 0x0a,
        };
        let raw = build_frame(&header, b"Hi").unwrap();
        assert_eq!(raw.len(), 9);
        assert_eq!(raw[0], 9);
        assert_eq!(&raw[1..5], &[0x10, 0x20, 3, 0x0a]);
        assert_eq!(payload(&raw), b"Hi");
        assert!(frame_crc_ok(&raw));
        assert_eq!(FrameHeader::parse(&raw), Some(header));
    }

    #[test]
    fn test_empty_payload_is_minimal_frame() {
        let raw = build_frame(&FrameHeader::default(), &[]).unwrap();
        assert_eq!(raw.len(), 7);
        assert!(payload(&raw).is_empty());
        assert!(frame_crc_ok(&raw));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = [0u8; RADIO_MAX_MESSAGE_LEN_USIZE + 1];
        assert_eq!(
            build_frame(&FrameHeader::default(), &payload),
            Err(RadioError::PayloadTooLong { len: 61, max: 60 })
        );
        let payload = [0u8; RADIO_MAX_MESSAGE_LEN_USIZE];
        assert_eq!(
            build_frame(&FrameHeader::default(), &payload).unwrap().len(),
            RADIO_MAX_PAYLOAD_LEN_USIZE
        );
    }

    #[test]
    fn test_address_filter() {
        let direct = FrameHeader {
            to: 0x42,
            ..FrameHeader::default()
        };
        assert!(direct.is_for(0x42));
        assert!(!direct.is_for(0x43));
        assert!(FrameHeader::default().is_for(0x43));
    }
}
