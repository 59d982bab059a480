//! Software PLL for ASK/OOK signal demodulation.
//!
//! This module implements a software phase-locked loop used to reconstruct
//! digital data from 433 MHz ASK-modulated signals. It works by sampling the
//! receiver output at a fixed multiple of the bit rate, aligning to bit
//! transitions, and recovering bits using a majority-vote integrator.
//!
//! Once the 12-bit start pattern has been seen, every 12 bits are decoded into
//! one frame byte. The first byte is the declared frame length and must be
//! sane or the acquisition is dropped.

use embedded_hal::digital::InputPin;
use heapless::Vec;

use crate::consts::{
    RADIO_MAX_PAYLOAD_LEN, RADIO_MAX_PAYLOAD_LEN_USIZE, RADIO_MIN_FRAME_LEN, RADIO_START_SYMBOL,
};
use crate::encoding::decode_symbol;

/// Step the ramp is nudged by on a transition.
const RAMP_ADJUST: u16 = 9;

/// Phase units per sample tick.
const RAMP_UNITS_PER_TICK: u16 = 20;

#[derive(Debug)]
/// A simple digital phase-locked loop for demodulating ASK signals.
///
/// This PLL samples the input pin at a fixed frequency (e.g., 8x per bit),
/// detects transitions to adjust phase, and integrates high samples to decide bits.
pub struct SoftwarePLL {
    /// Last 12 bits received, so we can look for the start symbol
    bits: u16,

    /// Phase accumulator used to track position within a single bit interval.
    ///
    /// This is incremented on each `update()` and wraps around at `ramp_len`.
    /// Signal edges (transitions) adjust how fast it is incremented to maintain phase lock.
    ramp: u16,

    /// Counts how many of the samples in the current bit interval were high.
    integrator: u8,

    /// Previous sample value, used to detect edges.
    last_sample: bool,

    /// Bits shifted in since the last decoded byte while active.
    pub bit_count: u8,

    /// Phase units per bit, `ticks_per_bit * 20`.
    ramp_len: u16,

    /// Default ramp increment per sample, no timing correction.
    ramp_inc: u16,

    /// Smaller increment used when a transition arrives early (retard).
    ramp_retard: u16,

    /// Larger increment used when a transition arrives late (advance).
    ramp_advance: u16,

    /// Majority threshold: samples that must be high for a `1` bit.
    threshold: u8,

    /// Whether the read bits should be inverted.
    /// e.g. HIGH => LOW
    inverted: bool,

    /// The start symbol has been seen and a frame is being acquired.
    pub active: bool,

    /// Declared frame length, taken from the first decoded byte.
    count: u8,

    /// Frames dropped because of an insane length byte.
    pub bad: u16,

    /// Invalid 6-bit symbols seen since construction.
    pub symbol_errors: u16,

    /// The frame in `buf` contained at least one invalid symbol.
    pub tainted: bool,

    /// A complete frame of `count` bytes sits in `buf`.
    pub full: bool,

    /// Decoded frame bytes, length byte first.
    pub buf: Vec<u8, RADIO_MAX_PAYLOAD_LEN_USIZE>,
}

impl SoftwarePLL {
    /// Creates a new, zeroed software PLL instance.
    ///
    /// # Arguments
    /// - `ticks_per_bit`: samples taken per bit period (8 for the default bit clock)
    /// - `inverted`: treat a LOW input as carrier present
    pub fn new(ticks_per_bit: u8, inverted: bool) -> Self {
        let ticks = u16::from(ticks_per_bit.max(2));
        let ramp_len = ticks * RAMP_UNITS_PER_TICK;
        let ramp_inc = ramp_len / ticks;
        Self {
            bits: 0,
            ramp: 0,
            integrator: 0,
            last_sample: false,
            bit_count: 0,
            ramp_len,
            ramp_inc,
            ramp_retard: ramp_inc - RAMP_ADJUST,
            ramp_advance: ramp_inc + RAMP_ADJUST,
            // 5 of 8 at the default rate
            threshold: (ticks / 2 + 1) as u8,
            inverted,
            active: false,
            count: 0,
            bad: 0,
            symbol_errors: 0,
            tainted: false,
            full: false,
            buf: Vec::new(),
        }
    }

    /// Samples per bit this PLL integrates over.
    pub fn ticks_per_bit(&self) -> u8 {
        (self.ramp_len / RAMP_UNITS_PER_TICK) as u8
    }

    /// Drops any partially or fully received frame.
    pub fn reset_frame(&mut self) {
        self.active = false;
        self.full = false;
        self.tainted = false;
        self.bit_count = 0;
        self.count = 0;
        self.buf.clear();
    }

    /// Updates the PLL state using the current RX input sample.
    ///
    /// Should be called once per timing tick. This reads the RX pin, counts high
    /// samples, adjusts timing on transitions, and resolves a bit whenever the
    /// ramp wraps.
    pub fn update<RX: InputPin>(&mut self, rx: &mut RX) {
        let level = rx.is_high().unwrap_or(false);
        self.sample(level != self.inverted);
    }

    /// Feeds one already-read sample into the loop.
    pub fn sample(&mut self, sample: bool) {
        if sample {
            self.integrator = self.integrator.saturating_add(1);
        }

        if sample != self.last_sample {
            // Transition: retard if early in the slot, advance if late
            self.ramp += if self.ramp < self.ramp_len / 2 {
                self.ramp_retard
            } else {
                self.ramp_advance
            };
            self.last_sample = sample;
        } else {
            self.ramp += self.ramp_inc;
        }

        if self.ramp < self.ramp_len {
            return;
        }

        // Shift the resolved bit into the 12th bit, LSB first on air
        self.bits >>= 1;
        if self.integrator >= self.threshold {
            self.bits |= 0x800;
        }
        self.ramp -= self.ramp_len;
        self.integrator = 0;

        if self.active {
            self.bit_count += 1;
            if self.bit_count >= 12 {
                self.bit_count = 0;
                self.shift_byte();
            }
        } else if self.bits == RADIO_START_SYMBOL && !self.full {
            self.active = true;
            self.tainted = false;
            self.bit_count = 0;
            self.count = 0;
            self.buf.clear();
        }
    }

    /// Decodes the 12 collected bits into one frame byte.
    fn shift_byte(&mut self) {
        // The 6 least significant bits hold the high nibble
        let hi = decode_symbol((self.bits & 0x3f) as u8);
        let lo = decode_symbol((self.bits >> 6) as u8);
        if hi.is_none() || lo.is_none() {
            self.symbol_errors = self.symbol_errors.wrapping_add(1);
            self.tainted = true;
        }
        // Invalid symbols decode as 0 so the frame keeps its declared length
        let byte = (hi.unwrap_or(0) << 4) | lo.unwrap_or(0);

        if self.buf.is_empty() {
            // The length byte counts itself, the 4 header bytes and the 2 FCS bytes
            if !(RADIO_MIN_FRAME_LEN..=RADIO_MAX_PAYLOAD_LEN).contains(&byte) {
                trace!("pll: dropping frame with length byte {}", byte);
                self.active = false;
                self.bad = self.bad.wrapping_add(1);
                return;
            }
            self.count = byte;
        }

        if self.buf.push(byte).is_err() || self.buf.len() >= usize::from(self.count) {
            self.active = false;
            self.full = true;
        }
    }
}
