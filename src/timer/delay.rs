use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::driver::{RadioDriver, RadioMode};
use crate::error::RadioError;
use crate::modem::Modem;

/// A radio driver advanced from the foreground instead of a timer interrupt.
///
/// Every blocking or polling [`Modem`] call runs one `tick()` followed by
/// `delay.delay_us(tick_us)`. This suits firmware without a free timer, at the
/// cost of bit timing that drifts with the work done between polls: pick
/// `tick_us` slightly below the nominal tick interval.
///
/// # Example
/// ```rust
/// # use embedded_hal_mock::eh1::delay::NoopDelay;
/// # use embedded_hal_mock::eh1::digital::{Mock as Pin, State, Transaction};
/// use waveboot::config::RadioConfig;
/// use waveboot::driver::RadioDriver;
/// use waveboot::modem::Modem;
/// use waveboot::timer::PolledRadio;
///
/// # let tx = Pin::new(&[Transaction::set(State::Low), Transaction::set(State::Low)]);
/// # let rx = Pin::new(&[Transaction::get(State::Low)]);
/// let driver = RadioDriver::new(tx, rx, &RadioConfig::default());
/// let mut radio = PolledRadio::new(driver, NoopDelay::new(), 62);
/// assert!(!radio.available());
/// # let mut driver = radio.release().0;
/// # driver.tx.done();
/// # driver.rx.done();
/// ```
#[derive(Debug)]
pub struct PolledRadio<TX, RX, D>
where
    TX: OutputPin,
    RX: InputPin,
    D: DelayNs,
{
    driver: RadioDriver<TX, RX>,
    delay: D,
    tick_us: u32,
}

impl<TX, RX, D> PolledRadio<TX, RX, D>
where
    TX: OutputPin,
    RX: InputPin,
    D: DelayNs,
{
    /// Wraps `driver`, sleeping `tick_us` microseconds after each tick.
    pub fn new(driver: RadioDriver<TX, RX>, delay: D, tick_us: u32) -> Self {
        Self {
            driver,
            delay,
            tick_us,
        }
    }

    /// Runs one tick and one tick delay.
    pub fn poll(&mut self) {
        self.driver.tick();
        self.delay.delay_us(self.tick_us);
    }

    /// Borrows the wrapped driver.
    pub fn driver(&mut self) -> &mut RadioDriver<TX, RX> {
        &mut self.driver
    }

    /// Gives back the driver and the delay provider.
    pub fn release(self) -> (RadioDriver<TX, RX>, D) {
        (self.driver, self.delay)
    }
}

impl<TX, RX, D> Modem for PolledRadio<TX, RX, D>
where
    TX: OutputPin,
    RX: InputPin,
    D: DelayNs,
{
    fn init(&mut self) -> Result<(), RadioError> {
        self.driver.set_mode_idle();
        Ok(())
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        loop {
            match self.driver.send(payload) {
                Ok(()) => return Ok(()),
                Err(nb::Error::Other(e)) => return Err(e),
                Err(nb::Error::WouldBlock) => self.poll(),
            }
        }
    }

    fn wait_packet_send(&mut self) {
        while self.driver.mode() == RadioMode::Tx {
            self.poll();
        }
    }

    fn available(&mut self) -> bool {
        if self.driver.mode() != RadioMode::Tx {
            self.driver.set_mode_rx();
        }
        self.poll();
        self.driver.available()
    }

    fn recv(&mut self, buf: &mut [u8]) -> Option<usize> {
        if self.available() {
            self.driver.recv(buf)
        } else {
            None
        }
    }
}
