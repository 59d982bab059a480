//! Bit clock configuration and tick scheduling for the radio.
//!
//! The modem needs [`RadioDriver::tick()`](crate::driver::RadioDriver::tick) at
//! `bit_rate * samples_per_bit` Hz. Two ways of providing it:
//!
//! - `timer-isr` (default): the driver lives in a statically-owned
//!   `critical_section::Mutex` cell, a hardware timer interrupt calls
//!   [`RadioHandle::tick`], and the foreground uses the same [`RadioHandle`]
//!   through [`Modem`](crate::modem::Modem)
//! - `delay-loop`: [`PolledRadio`] owns the driver and advances it from the
//!   foreground, sleeping with `embedded_hal::delay::DelayNs` between ticks
//!
//! [`timer_calc`] picks the CTC prescaler and compare value for the bit clock.
//! When no prescaler fits, the radio cannot be brought up.
//!
//! | PRESCALER | CS bits | Compare @ 16 MHz, 16 kHz tick |
//! |-----------|---------|-------------------------------|
//! |         1 |       1 |                          1000 |
//! |         8 |       2 |                           125 |
//! |        64 |       3 |                            15 |

use crate::error::TimerError;

#[cfg(feature = "delay-loop")]
mod delay;
#[cfg(feature = "delay-loop")]
pub use delay::*;

#[cfg(feature = "timer-isr")]
mod isr;
#[cfg(feature = "timer-isr")]
pub use isr::*;

#[cfg(feature = "timer-isr")]
mod macros;

/// Prescalers of a 16-bit AVR timer, in clock-select order (CS = index + 1).
pub const PRESCALERS: [u16; 5] = [1, 8, 64, 256, 1024];

/// Largest compare value of a 16-bit timer.
pub const MAX_TIMER_TICKS: u16 = u16::MAX;

/// Timer configuration producing the bit clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct BitClockSetting {
    /// Clock-select bits for the prescaler.
    pub clock_select: u8,
    /// Prescaler divisor.
    pub prescaler: u16,
    /// Compare match value (CTC mode).
    pub compare: u16,
}

impl BitClockSetting {
    /// Tick frequency this setting actually produces.
    pub fn tick_hz(&self, f_cpu: u32) -> f32 {
        f_cpu as f32 / (f32::from(self.prescaler) * f32::from(self.compare))
    }
}

/// Searches the smallest prescaler for which the bit clock's compare value fits
/// into `max_ticks` with at least two counts.
///
/// # Arguments
/// - `f_cpu`: CPU frequency in Hz
/// - `bit_rate`: radio bit rate in bits per second
/// - `samples_per_bit`: ticks per bit (oversampling factor)
/// - `max_ticks`: largest compare value the timer supports
///
/// # Errors
/// [`TimerError::NoPrescaler`] when the requested rate cannot be produced.
pub fn timer_calc(
    f_cpu: u32,
    bit_rate: u16,
    samples_per_bit: u8,
    max_ticks: u16,
) -> Result<BitClockSetting, TimerError> {
    let tick_rate = u32::from(bit_rate) * u32::from(samples_per_bit);
    if tick_rate == 0 {
        return Err(TimerError::NoPrescaler { tick_rate });
    }
    for (index, &prescaler) in PRESCALERS.iter().enumerate() {
        let ticks = f_cpu / u32::from(prescaler) / tick_rate;
        if ticks > 1 && ticks < u32::from(max_ticks) {
            return Ok(BitClockSetting {
                clock_select: index as u8 + 1,
                prescaler,
                compare: ticks as u16,
            });
        }
    }
    Err(TimerError::NoPrescaler { tick_rate })
}

/// Ticks per bit for a given tick interval, rounded to the nearest integer.
///
/// # Arguments
/// - `bit_rate`: radio bit rate in bits per second
/// - `tick_us`: interval between `tick()` calls in microseconds (e.g., 62.5)
pub fn ticks_per_bit(bit_rate: u16, tick_us: f32) -> u8 {
    let bit_us = 1_000_000.0 / f32::from(bit_rate);
    libm::roundf(bit_us / tick_us) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bit_clock() {
        let setting = timer_calc(16_000_000, 2_000, 8, MAX_TIMER_TICKS).unwrap();
        assert_eq!(
            setting,
            BitClockSetting {
                clock_select: 1,
                prescaler: 1,
                compare: 1000
            }
        );
        assert!((setting.tick_hz(16_000_000) - 16_000.0).abs() < 0.5);
    }

    #[test]
    fn test_small_timer_needs_prescaler() {
        let setting = timer_calc(16_000_000, 2_000, 8, 255).unwrap();
        assert_eq!(setting.prescaler, 8);
        assert_eq!(setting.compare, 125);
    }

    #[test]
    fn test_impossible_rate_fails() {
        assert_eq!(
            timer_calc(16_000_000, 0, 8, MAX_TIMER_TICKS),
            Err(TimerError::NoPrescaler { tick_rate: 0 })
        );
        // 524 kHz of ticks leaves a 1 MHz CPU a single count per tick
        assert_eq!(
            timer_calc(1_000_000, 65_535, 8, MAX_TIMER_TICKS),
            Err(TimerError::NoPrescaler {
                tick_rate: 524_280
            })
        );
        assert_eq!(
            timer_calc(1_000_000, 60_000, 8, MAX_TIMER_TICKS).map(|s| s.compare),
            Ok(2)
        );
    }

    #[test]
    fn test_ticks_per_bit() {
        assert_eq!(ticks_per_bit(2_000, 62.5), 8);
        assert_eq!(ticks_per_bit(2_000, 63.0), 8);
        assert_eq!(ticks_per_bit(1_000, 62.5), 16);
    }
}
