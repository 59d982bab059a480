//! Update records.
//!
//! Each radio message carries one record, laid out like a binary Intel HEX line:
//!
//! ```text
//! [data_len][addr_hi][addr_lo][type][data; data_len][checksum]
//! ```
//!
//! The checksum is the two's complement of the byte sum of everything before it.
//! Bytes following the checksum are padding and are ignored.

use heapless::Vec;

use crate::consts::{RADIO_MAX_MESSAGE_LEN_USIZE, RECORD_DATA, RECORD_END_OF_FILE, RECORD_OVERHEAD};
use crate::error::RecordError;

/// An encoded record, ready to be sent as one message.
pub type RecordMessage = Vec<u8, RADIO_MAX_MESSAGE_LEN_USIZE>;

/// Largest amount of data a single record can carry.
pub const RECORD_MAX_DATA_LEN: usize = RADIO_MAX_MESSAGE_LEN_USIZE - RECORD_OVERHEAD;

/// Record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RecordType {
    /// Bytes to program at the record's address.
    Data,
    /// End of the image.
    EndOfFile,
    /// Any other type. Acknowledged and ignored.
    Other(u8),
}

impl From<u8> for RecordType {
    fn from(value: u8) -> Self {
        match value {
            RECORD_DATA => Self::Data,
            RECORD_END_OF_FILE => Self::EndOfFile,
            other => Self::Other(other),
        }
    }
}

impl From<RecordType> for u8 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::Data => RECORD_DATA,
            RecordType::EndOfFile => RECORD_END_OF_FILE,
            RecordType::Other(other) => other,
        }
    }
}

/// A validated record borrowing its data from the received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateRecord<'a> {
    /// Record type.
    pub kind: RecordType,
    /// Target address of the first data byte.
    pub address: u16,
    /// Record data.
    pub data: &'a [u8],
}

impl<'a> UpdateRecord<'a> {
    /// A data record.
    pub const fn data(address: u16, data: &'a [u8]) -> Self {
        Self {
            kind: RecordType::Data,
            address,
            data,
        }
    }

    /// The end-of-file record.
    pub const fn end_of_file() -> Self {
        Self {
            kind: RecordType::EndOfFile,
            address: 0,
            data: &[],
        }
    }

    /// Parses and validates the record at the start of `msg`.
    ///
    /// # Errors
    /// - [`RecordError::Truncated`] if `msg` ends before the checksum
    /// - [`RecordError::Checksum`] if the checksum does not match
    pub fn parse(msg: &'a [u8]) -> Result<Self, RecordError> {
        let (&data_len, _) = msg
            .split_first()
            .ok_or(RecordError::Truncated { len: msg.len() })?;
        let data_end = 4 + usize::from(data_len);
        if msg.len() <= data_end {
            return Err(RecordError::Truncated { len: msg.len() });
        }
        let expected = msg[data_end];
        let computed = checksum(&msg[..data_end]);
        if expected != computed {
            return Err(RecordError::Checksum { expected, computed });
        }
        Ok(Self {
            kind: RecordType::from(msg[3]),
            address: u16::from_be_bytes([msg[1], msg[2]]),
            data: &msg[4..data_end],
        })
    }

    /// Number of bytes [`encode`](Self::encode) produces.
    pub fn encoded_len(&self) -> usize {
        self.data.len() + RECORD_OVERHEAD
    }

    /// Encodes the record, checksum included.
    ///
    /// # Errors
    /// [`RecordError::TooLong`] if the record does not fit into one message.
    pub fn encode(&self) -> Result<RecordMessage, RecordError> {
        let too_long = RecordError::TooLong {
            len: self.encoded_len(),
        };
        if self.data.len() > RECORD_MAX_DATA_LEN {
            return Err(too_long);
        }
        let mut msg = RecordMessage::new();
        let [addr_hi, addr_lo] = self.address.to_be_bytes();
        msg.extend_from_slice(&[self.data.len() as u8, addr_hi, addr_lo, self.kind.into()])
            .map_err(|_| too_long)?;
        msg.extend_from_slice(self.data).map_err(|_| too_long)?;
        msg.push(checksum(&msg)).map_err(|_| too_long)?;
        Ok(msg)
    }
}

/// Two's complement of the byte sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .fold(0u8, |sum, &b| sum.wrapping_add(b))
        .wrapping_neg()
}

/// Converts one Intel HEX text line (`:LLAAAATTDD..CC`) to the binary record sent
/// over the radio.
///
/// Surrounding whitespace is ignored. The line's own checksum is verified.
///
/// # Errors
/// - [`RecordError::Malformed`] if the line is not a hex record
/// - [`RecordError::Checksum`] if its checksum does not match
/// - [`RecordError::TooLong`] if it does not fit into one message
pub fn hex_line_to_record(line: &str) -> Result<RecordMessage, RecordError> {
    let digits = line
        .trim()
        .strip_prefix(':')
        .ok_or(RecordError::Malformed)?
        .as_bytes();
    if digits.len() % 2 != 0 || digits.len() < RECORD_OVERHEAD * 2 {
        return Err(RecordError::Malformed);
    }
    let mut msg = RecordMessage::new();
    for pair in digits.chunks(2) {
        let byte = (hex_digit(pair[0])? << 4) | hex_digit(pair[1])?;
        msg.push(byte).map_err(|_| RecordError::TooLong {
            len: digits.len() / 2,
        })?;
    }
    let record = UpdateRecord::parse(&msg)?;
    if record.encoded_len() != msg.len() {
        return Err(RecordError::Malformed);
    }
    Ok(msg)
}

fn hex_digit(c: u8) -> Result<u8, RecordError> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => Err(RecordError::Malformed),
    }
}
