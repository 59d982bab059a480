//! Constants used across the radio protocol and the bootloader.
//!
//! The radio constants follow the RadioHead ASK/OOK framing conventions, the
//! bootloader constants define the control vocabulary spoken over that link and
//! the layout of the persistent recovery marker.
//!
//! ## Key Concepts
//!
//! - **Headers**: Fixed 4-byte format used to identify sender, receiver, and metadata.
//! - **Payload Limits**: Derived from maximum frame size with allowance for headers and CRC.
//! - **Preamble**: Symbol pattern used to help synchronize the software PLL in the receiver.
//! - **Control codes**: 3-byte ASCII replies sent by the bootloader after each frame.
//! - **Recovery marker**: 4-byte sentinel flagging an incomplete image.

/// Length (in bytes) of the fixed-length frame header.
///
/// This includes the `to`, `from`, `id`, and `flags` fields.
pub const RADIO_HEADER_LEN: u8 = 4;

/// Maximum total length (in bytes) of a raw frame, including the length byte,
/// header, data, and the CRC trailer.
///
/// This includes everything before symbol encoding (4b6b).
pub const RADIO_MAX_PAYLOAD_LEN: u8 = 67;

/// See [`RADIO_MAX_PAYLOAD_LEN`]
pub const RADIO_MAX_PAYLOAD_LEN_USIZE: usize = RADIO_MAX_PAYLOAD_LEN as usize;

/// Smallest sane frame: length byte, 4 header bytes and 2 CRC bytes.
pub const RADIO_MIN_FRAME_LEN: u8 = RADIO_HEADER_LEN + 3;

/// Length (in symbols) of the transmitted preamble used to train the receiver PLL.
pub const RADIO_PREAMBLE_LEN: u8 = 8;

/// The preamble: six alternating-bit training symbols followed by the two
/// symbols forming [`RADIO_START_SYMBOL`].
pub const RADIO_PREAMBLE: [u8; RADIO_PREAMBLE_LEN as usize] =
    [0x2a, 0x2a, 0x2a, 0x2a, 0x2a, 0x2a, 0x38, 0x2c];

/// Maximum size (in bytes) of user message content.
///
/// This is the maximum frame size minus the length byte, header and CRC bytes.
pub const RADIO_MAX_MESSAGE_LEN: u8 = RADIO_MAX_PAYLOAD_LEN - RADIO_HEADER_LEN - 3;

/// See [`RADIO_MAX_MESSAGE_LEN`]
pub const RADIO_MAX_MESSAGE_LEN_USIZE: usize = RADIO_MAX_MESSAGE_LEN as usize;

/// Maximum size (in symbols) of the full transmission buffer, after encoding and preamble.
///
/// Each frame byte becomes two encoded symbols, hence the `* 2`.
pub const RADIO_MAX_BUF_LEN: u8 = (RADIO_MAX_PAYLOAD_LEN * 2) + RADIO_PREAMBLE_LEN;

/// See [`RADIO_MAX_BUF_LEN`]
pub const RADIO_MAX_BUF_LEN_USIZE: usize = RADIO_MAX_BUF_LEN as usize;

/// The wildcard address. Frames sent to it are accepted by every node.
pub const BROADCAST_ADDRESS: u8 = u8::MAX;

/// The 12-bit start pattern (two symbols, `0x38` then `0x2c`, LSB first)
/// terminating the preamble.
pub const RADIO_START_SYMBOL: u16 = 0xb38;

/// CRC-CCITT residual left after running the CRC over a frame and its
/// (ones-complemented) trailer.
pub const RADIO_CRC_RESIDUAL: u16 = 0xf0b8;

/// Default radio bit rate in bits per second.
pub const RADIO_BIT_RATE: u16 = 2_000;

/// Default number of bit-clock ticks per bit.
pub const RADIO_SAMPLES_PER_BIT: u8 = 8;

/// Activation signal sent by the controller to enter programming mode.
pub const ACTIVATION_SIGNAL: [u8; 4] = *b"BOOT";

/// Ready after activation.
pub const REPLY_READY: [u8; 3] = *b"RDY";
/// Record accepted.
pub const REPLY_PROGRESS: [u8; 3] = *b"PRG";
/// Image complete.
pub const REPLY_DONE: [u8; 3] = *b"DNE";
/// Record checksum mismatch.
pub const REPLY_CHECKSUM: [u8; 3] = *b"CHK";
/// Generic error.
pub const REPLY_ERROR: [u8; 3] = *b"ERR";

/// Value of the recovery marker while an update is in progress or incomplete.
pub const RECOVERY_MAGIC: u32 = 0xdead_beef;

/// Size of the recovery marker in bytes.
pub const RECOVERY_MARKER_LEN: usize = 4;

/// Value of an erased flash byte.
pub const ERASED_BYTE: u8 = 0xff;

/// Record type of a data record.
pub const RECORD_DATA: u8 = 0x00;

/// Record type of the end-of-file record.
pub const RECORD_END_OF_FILE: u8 = 0x01;

/// Bytes surrounding the data of a binary update record:
/// length, address high, address low, type and checksum.
pub const RECORD_OVERHEAD: usize = 5;
