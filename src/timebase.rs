//! Millisecond timebase.
//!
//! The bootloader only needs a free-running millisecond counter. On the target
//! it is incremented by a 1 ms timer interrupt, so the 32-bit read from the
//! foreground happens inside a critical section.

use core::cell::Cell;

use critical_section::Mutex;

/// A free-running millisecond clock.
pub trait Millis {
    /// Milliseconds since start-up. Wraps around after ~49 days.
    fn millis(&self) -> u32;
}

impl<T: Millis + ?Sized> Millis for &T {
    fn millis(&self) -> u32 {
        (**self).millis()
    }
}

/// Interrupt-driven millisecond counter.
///
/// ```rust
/// use waveboot::timebase::{Millis, MillisCounter};
///
/// static MILLIS: MillisCounter = MillisCounter::new();
///
/// // from the 1 ms timer interrupt
/// MILLIS.tick();
/// assert_eq!(MILLIS.millis(), 1);
/// ```
#[derive(Debug)]
pub struct MillisCounter {
    ms: Mutex<Cell<u32>>,
}

impl MillisCounter {
    /// A counter starting at zero.
    pub const fn new() -> Self {
        Self {
            ms: Mutex::new(Cell::new(0)),
        }
    }

    /// Advances the counter by one millisecond. Call from the 1 ms interrupt.
    pub fn tick(&self) {
        critical_section::with(|cs| {
            let cell = self.ms.borrow(cs);
            cell.set(cell.get().wrapping_add(1));
        });
    }
}

impl Default for MillisCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl Millis for MillisCounter {
    fn millis(&self) -> u32 {
        critical_section::with(|cs| self.ms.borrow(cs).get())
    }
}

/// Milliseconds elapsed since `start`, robust against counter wrap-around.
pub fn elapsed_since<C: Millis + ?Sized>(clock: &C, start: u32) -> u32 {
    clock.millis().wrapping_sub(start)
}

/// Busy-waits for `ms` milliseconds.
pub fn delay_ms<C: Millis + ?Sized>(clock: &C, ms: u32) {
    let start = clock.millis();
    while elapsed_since(clock, start) < ms {
        core::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Stepping(Cell<u32>);

    impl Millis for Stepping {
        fn millis(&self) -> u32 {
            let now = self.0.get();
            self.0.set(now.wrapping_add(1));
            now
        }
    }

    #[test]
    fn test_counter_ticks() {
        let counter = MillisCounter::new();
        for _ in 0..5 {
            counter.tick();
        }
        assert_eq!(counter.millis(), 5);
    }

    #[test]
    fn test_elapsed_survives_wrap() {
        let clock = Stepping(Cell::new(u32::MAX - 1));
        assert_eq!(elapsed_since(&clock, u32::MAX - 3), 2);
        assert_eq!(elapsed_since(&clock, u32::MAX - 3), 3);
    }

    #[test]
    fn test_delay_waits_for_clock() {
        let clock = Stepping(Cell::new(100));
        delay_ms(&clock, 50);
        assert!(clock.0.get() >= 150);
    }
}
