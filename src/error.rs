//! Error types shared by the modem, the flash layer and the programming engine.

use thiserror::Error;

/// Errors reported by the radio modem.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RadioError {
    /// The payload does not fit into a single frame.
    #[error("payload of {len} bytes exceeds the {max} byte frame capacity")]
    PayloadTooLong {
        /// Requested payload length.
        len: usize,
        /// Largest payload a frame can carry.
        max: usize,
    },
    /// No driver has been installed behind the handle yet.
    #[error("radio driver not initialized")]
    NotInitialized,
    /// The bit clock could not be configured.
    #[error("bit clock unavailable: {0}")]
    Timer(#[from] TimerError),
}

/// Errors reported while computing the bit-clock timer configuration.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum TimerError {
    /// No prescaler yields a compare value that fits the timer.
    #[error("no prescaler produces {tick_rate} ticks per second")]
    NoPrescaler {
        /// Requested tick rate (bit rate times samples per bit).
        tick_rate: u32,
    },
}

/// Errors reported by the flash write primitive.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum FlashError {
    /// The address is not the first byte of a page.
    #[error("address {0:#x} is not page aligned")]
    Unaligned(u32),
    /// More data than fits into one page.
    #[error("{0} bytes do not fit into one page")]
    TooLong(usize),
    /// The address lies inside the bootloader's own region.
    #[error("address {0:#x} is inside the protected bootloader region")]
    Protected(u32),
    /// The self-programming hardware reported a failure.
    #[error("flash device error")]
    Device,
}

/// Errors reported while parsing an update record.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RecordError {
    /// The message is shorter than the record it announces.
    #[error("record truncated at {len} bytes")]
    Truncated {
        /// Number of bytes available.
        len: usize,
    },
    /// The trailing checksum does not match the record contents.
    #[error("checksum mismatch: record carries {expected:#04x}, computed {computed:#04x}")]
    Checksum {
        /// Checksum byte carried by the record.
        expected: u8,
        /// Checksum computed over the record.
        computed: u8,
    },
    /// The record does not fit into a single radio message.
    #[error("record of {len} bytes does not fit into a message")]
    TooLong {
        /// Encoded record length.
        len: usize,
    },
    /// A textual hex line could not be parsed.
    #[error("malformed hex record line")]
    Malformed,
}

/// Reasons a programming session ends without a complete image.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum SessionError {
    /// The controller went silent before any data record was applied.
    /// The recovery marker has been cleared; the previous image is intact.
    #[error("programming timed out before anything was written")]
    NothingModified,
    /// The controller went silent in the middle of an image.
    /// The recovery marker stays set.
    #[error("programming timed out with a partial image")]
    Incomplete,
    /// Writing to flash failed. The recovery marker stays set if it was set.
    #[error("flash write failed: {0}")]
    Flash(#[from] FlashError),
}
