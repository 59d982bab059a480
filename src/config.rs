//! Runtime configuration for the modem and the bootloader.
//!
//! Both structs come with defaults matching an ATmega328P at 16 MHz with a 4 KiB
//! boot section and a 2 kbps radio link.

use crate::consts::{BROADCAST_ADDRESS, RADIO_BIT_RATE, RADIO_SAMPLES_PER_BIT, RECOVERY_MARKER_LEN};
use crate::timer::ticks_per_bit;

/// Modem configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioConfig {
    /// Number of `tick()` calls per bit period (e.g., 8 for 2 kbps at 16 kHz).
    pub ticks_per_bit: u8,
    /// Whether the RX input is active low.
    pub rx_inverted: bool,
    /// This node's address.
    pub address: u8,
    /// Accept frames regardless of their destination.
    pub promiscuous: bool,
}

impl RadioConfig {
    /// Default modem configuration.
    pub const fn new() -> Self {
        Self {
            ticks_per_bit: RADIO_SAMPLES_PER_BIT,
            rx_inverted: false,
            address: BROADCAST_ADDRESS,
            promiscuous: false,
        }
    }

    /// Sets this node's address.
    pub const fn with_address(mut self, address: u8) -> Self {
        self.address = address;
        self
    }

    /// Derives the ticks per bit from the bit rate and the interval between
    /// `tick()` calls, e.g. 2000 bps at 62.5 µs gives 8.
    pub fn with_tick_interval(mut self, bit_rate: u16, tick_us: f32) -> Self {
        self.ticks_per_bit = ticks_per_bit(bit_rate, tick_us);
        self
    }

    /// Sets the number of ticks per bit.
    pub const fn with_ticks_per_bit(mut self, ticks_per_bit: u8) -> Self {
        self.ticks_per_bit = ticks_per_bit;
        self
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Bootloader configuration: timing windows, clocking and flash geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootConfig {
    /// How long a node with a trusted image listens for `BOOT` before starting it.
    pub boot_window_ms: u32,
    /// Inactivity timeout of a programming session.
    pub programming_timeout_ms: u32,
    /// Length of one listen window while the recovery marker is set.
    pub recovery_window_ms: u32,
    /// Pause between two recovery listen windows.
    pub recovery_pause_ms: u32,
    /// Duration of one status LED blink phase.
    pub blink_ms: u32,
    /// CPU clock in Hz, used to derive the bit clock.
    pub f_cpu: u32,
    /// Radio bit rate in bits per second.
    pub bit_rate: u16,
    /// Bit clock ticks per bit.
    pub samples_per_bit: u8,
    /// Address of the last byte of program memory.
    pub flash_end: u32,
    /// Size of the boot section at the top of program memory.
    pub boot_size: u32,
}

impl BootConfig {
    /// Default bootloader configuration.
    pub const fn new() -> Self {
        Self {
            boot_window_ms: 4_000,
            programming_timeout_ms: 10_000,
            recovery_window_ms: 10_000,
            recovery_pause_ms: 1_000,
            blink_ms: 50,
            f_cpu: 16_000_000,
            bit_rate: RADIO_BIT_RATE,
            samples_per_bit: RADIO_SAMPLES_PER_BIT,
            flash_end: 0x7fff,
            boot_size: 4_096,
        }
    }

    /// First address of the boot section. Application records must stay below it.
    pub const fn boot_start(&self) -> u32 {
        self.flash_end + 1 - self.boot_size
    }

    /// Address of the 4-byte recovery marker, the last bytes of program memory.
    pub const fn recovery_marker_address(&self) -> u32 {
        self.flash_end + 1 - RECOVERY_MARKER_LEN as u32
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::new()
    }
}
