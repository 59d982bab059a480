//! ASK/OOK modem driver for 433 MHz RF transceivers.
//!
//! This module provides the [`RadioDriver`] struct, which implements a software-based
//! Amplitude Shift Keying (ASK) modem for use with low-cost 433 MHz RF modules.
//! It supports both transmission and reception using only digital I/O and a timing source.
//!
//! The driver operates independently of the target platform's oscillator speed,
//! provided that the [`tick()`](RadioDriver::tick) method is called at regular intervals
//! (every 62.5 µs for 2 kbps with 8 ticks per bit).
//!
//! ## Example
//!
//! ```rust
//! # use embedded_hal_mock::eh1::digital::{Mock as Pin, State as PinState, Transaction as PinTransaction};
//! use waveboot::config::RadioConfig;
//! use waveboot::driver::RadioDriver;
//!
//! # let tx_pin = Pin::new(&[PinTransaction::set(PinState::Low)]);
//! # let rx_pin = Pin::new(&[]);
//! let mut driver = RadioDriver::new(tx_pin, rx_pin, &RadioConfig::default());
//!
//! loop {
//!     driver.tick(); // Called every 62.5 µs by a delay or timer interrupt
//!     # break;
//! }
//! # driver.tx.done();
//! # driver.rx.done();
//! ```
//!
//! ## Design Notes
//!
//! Transmission and reception are mutually exclusive. A complete received frame
//! releases receive mode and is only validated (CRC, symbol errors, address) when
//! the foreground calls [`available()`](RadioDriver::available). While a validated
//! frame waits for [`recv()`](RadioDriver::recv) the receiver does not sample, so
//! the frame cannot be overwritten.
//!
//! For demodulation internals, see [`crate::pll::SoftwarePLL`].
//!
//! For interrupt and polling integration, see [`crate::timer`].

use core::convert::Infallible;

use embedded_hal::digital::{InputPin, OutputPin};

use crate::config::RadioConfig;
use crate::consts::{RADIO_MAX_MESSAGE_LEN_USIZE, RADIO_PREAMBLE};
use crate::crc::frame_crc_ok;
use crate::encoding::{SymbolBuffer, encode_frame};
use crate::error::RadioError;
use crate::frame::{self, FrameHeader, build_frame};
use crate::pll::SoftwarePLL;

/// Operational mode of the [`RadioDriver`].
///
/// Exactly one mode is active at a time. The mode is written both by the
/// foreground (`send`, `available`) and by the bit-clock interrupt (`tick`), so a
/// driver shared with an interrupt must only be touched inside a critical section
/// (see [`crate::timer::RadioHandle`]).
#[derive(PartialEq, Eq, Clone, Copy, Default, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum RadioMode {
    /// Neither sending nor listening. The TX output is held low.
    #[default]
    Idle,
    /// A frame is being clocked out, one bit every `ticks_per_bit` ticks.
    Tx,
    /// The software PLL samples the RX input every tick.
    Rx,
}

/// Reasons a complete frame was discarded by [`RadioDriver::validate_rx_buf`].
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Rejection {
    /// At least one 6-bit symbol was not in the symbol table.
    InvalidSymbol,
    /// The CRC residual did not match.
    Crc,
    /// The frame was addressed to another node.
    NotForUs,
}

/// A software-driven Amplitude Shift Keying (ASK) modem for 433 MHz RF transceivers.
///
/// ## Transmission
///
/// Transmission toggles a digital output pin (`TX`) using On-Off Keying (OOK):
/// - `HIGH` = carrier on = logical `1`
/// - `LOW`  = carrier off = logical `0`
///
/// ## Reception
///
/// Reception samples an input pin (`RX`) every tick through a [`SoftwarePLL`].
///
/// ## Type Parameters
///
/// - `TX`: A type implementing [`embedded_hal::digital::OutputPin`] used for RF transmission
/// - `RX`: A type implementing [`embedded_hal::digital::InputPin`] used for RF reception
#[derive(Debug)]
pub struct RadioDriver<TX, RX>
where
    TX: OutputPin,
    RX: InputPin,
{
    mode: RadioMode,
    /// TX pin
    pub tx: TX,
    /// RX pin
    pub rx: RX,
    /// [`SoftwarePLL`] instance
    pub pll: SoftwarePLL,
    ticks_per_bit: u8,
    tick_counter: u8,
    /// Preamble plus the symbols of the frame being sent
    pub tx_buf: SymbolBuffer,
    this_address: u8,
    promiscuous: bool,

    /// Header used for outgoing frames.
    pub tx_header: FrameHeader,

    /// Header of the last accepted frame.
    pub rx_header: FrameHeader,

    /// Index into the transmission buffer, pointing to the current symbol being transmitted.
    pub(crate) tx_index: usize,

    /// Current bit position within the current 6-bit symbol being transmitted (0–5).
    pub(crate) tx_bit: u8,

    /// Counter of successfully completed transmissions.
    pub tx_good: u16,

    /// Counter of complete frames discarded by validation.
    pub rx_bad: u16,

    /// Counter of frames accepted for this node.
    pub rx_good: u16,

    /// Reason the most recent complete frame was discarded, if it was.
    pub last_rejection: Option<Rejection>,

    rx_buf_valid: bool,
}

impl<TX, RX> RadioDriver<TX, RX>
where
    TX: OutputPin,
    RX: InputPin,
{
    /// Creates a new `RadioDriver` with the given TX and RX pins.
    ///
    /// TX is driven `LOW` initially (carrier off) and the driver starts [`RadioMode::Idle`].
    pub fn new(tx: TX, rx: RX, config: &RadioConfig) -> Self {
        let ticks_per_bit = config.ticks_per_bit.max(2);
        let mut tx = tx;
        let _ = tx.set_low();
        let mut tx_buf = SymbolBuffer::new();
        let _ = tx_buf.extend_from_slice(&RADIO_PREAMBLE);
        Self {
            mode: RadioMode::Idle,
            tx,
            rx,
            pll: SoftwarePLL::new(ticks_per_bit, config.rx_inverted),
            ticks_per_bit,
            tick_counter: 0,
            tx_buf,
            this_address: config.address,
            promiscuous: config.promiscuous,
            tx_header: FrameHeader::default(),
            rx_header: FrameHeader::default(),
            tx_index: 0,
            tx_bit: 0,
            tx_good: 0,
            rx_bad: 0,
            rx_good: 0,
            last_rejection: None,
            rx_buf_valid: false,
        }
    }

    /// Sets the address for this node.
    /// Defaults to the wildcard address.
    pub fn set_address(&mut self, addr: u8) {
        self.this_address = addr;
    }

    /// Accept every frame regardless of its destination.
    pub fn set_promiscuous(&mut self, promiscuous: bool) {
        self.promiscuous = promiscuous;
    }

    /// Current operating mode.
    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    fn write_tx(&mut self, level: bool) {
        let _ = if level {
            self.tx.set_high()
        } else {
            self.tx.set_low()
        };
    }

    /// Sets the driver into idle mode.
    pub fn set_mode_idle(&mut self) {
        if self.mode != RadioMode::Idle {
            self.write_tx(false);
            self.mode = RadioMode::Idle;
        }
    }

    /// Sets the driver into receive mode.
    pub fn set_mode_rx(&mut self) {
        if self.mode != RadioMode::Rx {
            self.write_tx(false);
            self.mode = RadioMode::Rx;
        }
    }

    /// Sets the driver into transmit mode, restarting at the first symbol of `tx_buf`.
    pub fn set_mode_tx(&mut self) {
        if self.mode != RadioMode::Tx {
            self.tx_index = 0;
            self.tx_bit = 0;
            self.tick_counter = 0;
            self.mode = RadioMode::Tx;
        }
    }

    /// Checks whether a valid, complete frame addressed to this node is waiting.
    ///
    /// # Behavior
    /// - If the driver is currently transmitting ([`RadioMode::Tx`]), returns `false`
    /// - Otherwise enters [`RadioMode::Rx`]
    /// - If the software PLL has completed a frame, validates it with
    ///   [`validate_rx_buf()`](RadioDriver::validate_rx_buf); a frame failing
    ///   validation is dropped silently
    ///
    /// Calling this function does **not** consume the frame; use
    /// [`recv()`](RadioDriver::recv) for that.
    pub fn available(&mut self) -> bool {
        if self.mode == RadioMode::Tx {
            return false;
        }
        self.set_mode_rx();
        if self.pll.full {
            self.pll.full = false;
            match self.validate_rx_buf() {
                Ok(()) => self.last_rejection = None,
                Err(reason) => {
                    self.last_rejection = Some(reason);
                    self.pll.reset_frame();
                }
            }
        }
        self.rx_buf_valid
    }

    /// Validates the received frame and extracts its header.
    ///
    /// # Behavior
    /// - Rejects frames containing an invalid symbol
    /// - Computes the CRC over the entire frame, trailer included, and compares it
    ///   against [`RADIO_CRC_RESIDUAL`](crate::consts::RADIO_CRC_RESIDUAL)
    /// - Extracts the four header fields and accepts the frame if it is addressed to
    ///   this node, to the wildcard address, or the driver is promiscuous
    pub fn validate_rx_buf(&mut self) -> Result<(), Rejection> {
        self.rx_buf_valid = false;
        if self.pll.tainted {
            self.rx_bad = self.rx_bad.wrapping_add(1);
            debug!("radio: dropped frame with invalid symbols");
            return Err(Rejection::InvalidSymbol);
        }
        if !frame_crc_ok(&self.pll.buf) {
            self.rx_bad = self.rx_bad.wrapping_add(1);
            debug!("radio: dropped frame with bad crc");
            return Err(Rejection::Crc);
        }

        let header = FrameHeader::parse(&self.pll.buf).ok_or(Rejection::Crc)?;
        if !self.promiscuous && !header.is_for(self.this_address) {
            trace!("radio: frame for {} ignored", header.to);
            return Err(Rejection::NotForUs);
        }
        self.rx_header = header;
        self.rx_good = self.rx_good.wrapping_add(1);
        self.rx_buf_valid = true;
        trace!(
            "radio: accepted {} byte frame from {}",
            self.pll.buf.len(),
            header.from
        );
        Ok(())
    }

    /// Copies the payload of a pending valid frame into `buf`.
    ///
    /// The payload is trimmed to `buf.len()`; the excess is lost.
    ///
    /// # Returns
    /// - `Some(n)`: `n` payload bytes were copied and the frame is consumed
    /// - `None`: no valid frame is pending
    pub fn recv(&mut self, buf: &mut [u8]) -> Option<usize> {
        if !self.available() {
            return None;
        }
        let payload = frame::payload(&self.pll.buf);
        let len = payload.len().min(buf.len());
        buf[..len].copy_from_slice(&payload[..len]);
        self.rx_buf_valid = false;
        self.pll.reset_frame();
        Some(len)
    }

    /// Advances the internal transmit/receive state machine by one timing tick.
    ///
    /// This function must be called at fixed intervals, ideally from a timer interrupt.
    pub fn tick(&mut self) {
        match self.mode {
            RadioMode::Rx => {
                if self.rx_buf_valid {
                    return;
                }
                self.pll.update(&mut self.rx);
                if self.pll.full {
                    // Release receive mode until the foreground has looked at the frame
                    self.set_mode_idle();
                }
            }
            RadioMode::Tx => {
                self.tick_counter += 1;
                if self.tick_counter >= self.ticks_per_bit {
                    self.tick_counter = 0;
                    self.transmit_bit();
                }
            }
            RadioMode::Idle => {}
        }
    }

    /// `WouldBlock` while a transmission is in progress.
    pub fn wait_packet_sent(&self) -> nb::Result<(), Infallible> {
        if self.mode == RadioMode::Tx {
            Err(nb::Error::WouldBlock)
        } else {
            Ok(())
        }
    }

    /// Queues `payload` for transmission.
    ///
    /// Builds the frame with [`tx_header`](RadioDriver::tx_header), encodes it
    /// behind the preamble and switches to [`RadioMode::Tx`]. Bits are clocked
    /// out by subsequent [`tick()`](RadioDriver::tick) calls.
    ///
    /// # Errors
    /// - [`RadioError::PayloadTooLong`] if the payload exceeds
    ///   [`RADIO_MAX_MESSAGE_LEN`](crate::consts::RADIO_MAX_MESSAGE_LEN)
    /// - `WouldBlock` while the previous transmission is still running
    pub fn send(&mut self, payload: &[u8]) -> nb::Result<(), RadioError> {
        let raw = build_frame(&self.tx_header, payload).map_err(nb::Error::Other)?;
        if self.mode == RadioMode::Tx {
            return Err(nb::Error::WouldBlock);
        }
        let symbols = encode_frame(&raw).ok_or(nb::Error::Other(RadioError::PayloadTooLong {
            len: payload.len(),
            max: RADIO_MAX_MESSAGE_LEN_USIZE,
        }))?;
        self.tx_buf = symbols;
        self.set_mode_tx();
        Ok(())
    }

    /// Emits the next encoded bit, LSB first within each symbol.
    ///
    /// Called once per bit period. After the last bit, waits one more bit period
    /// and returns to [`RadioMode::Idle`].
    fn transmit_bit(&mut self) {
        if self.tx_index >= self.tx_buf.len() {
            self.tx_good = self.tx_good.wrapping_add(1);
            self.set_mode_idle();
        } else {
            let bit = self.tx_buf[self.tx_index] & (1 << self.tx_bit);
            self.tx_bit += 1;
            self.write_tx(bit != 0);
            if self.tx_bit >= 6 {
                self.tx_bit = 0;
                self.tx_index += 1;
            }
        }
    }
}
