use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::config::RadioConfig;
use crate::driver::{RadioDriver, RadioMode};
use crate::error::RadioError;
use crate::modem::Modem;

/// Storage shared between the bit-clock interrupt and the foreground.
pub type RadioCell<TX, RX> = Mutex<RefCell<Option<RadioDriver<TX, RX>>>>;

/// Used to initialize the static [`RadioCell`] for use with `critical_section`.
///
/// # Returns
/// * An empty cell; install a driver with [`radio_setup`]
///
/// # Example
/// ```rust
/// use embedded_hal_mock::eh1::digital::Mock as Pin;
/// use waveboot::timer::{RadioCell, global_radio_init};
///
/// static RADIO: RadioCell<Pin, Pin> = global_radio_init::<Pin, Pin>();
/// ```
pub const fn global_radio_init<TX: OutputPin, RX: InputPin>() -> RadioCell<TX, RX> {
    Mutex::new(RefCell::new(None))
}

/// Installs a freshly constructed [`RadioDriver`] into `cell`.
///
/// # Arguments
/// * The static cell, usually declared with [`declare_radio!`](crate::declare_radio)
/// * The tx pin
/// * The rx pin
/// * The modem configuration. `ticks_per_bit` must satisfy
///   `interrupt frequency / ticks per bit = bit rate`,
///   e.g. 8 for a 16 kHz interrupt at 2 kbps
///
/// # Returns
/// A [`RadioHandle`] for both the interrupt and the foreground.
pub fn radio_setup<TX: OutputPin + 'static, RX: InputPin + 'static>(
    cell: &'static RadioCell<TX, RX>,
    tx: TX,
    rx: RX,
    config: &RadioConfig,
) -> RadioHandle<TX, RX> {
    critical_section::with(|cs| {
        let _ = cell
            .borrow(cs)
            .replace(Some(RadioDriver::new(tx, rx, config)));
    });
    RadioHandle::new(cell)
}

/// Copyable access to a radio driver living in a static [`RadioCell`].
///
/// Every access runs inside a critical section, so the handle may be used from
/// the timer interrupt ([`tick`](RadioHandle::tick)) and the foreground
/// ([`Modem`]) at the same time. Blocking operations release the critical
/// section between polls so the interrupt keeps clocking bits.
///
/// ```rust
/// # use embedded_hal_mock::eh1::digital::Mock as Pin;
/// use waveboot::timer::RadioHandle;
///
/// waveboot::declare_radio!(RADIO, Pin, Pin);
///
/// // from the bit clock interrupt
/// RadioHandle::new(&RADIO).tick();
/// ```
pub struct RadioHandle<TX, RX>
where
    TX: OutputPin + 'static,
    RX: InputPin + 'static,
{
    cell: &'static RadioCell<TX, RX>,
}

impl<TX, RX> RadioHandle<TX, RX>
where
    TX: OutputPin + 'static,
    RX: InputPin + 'static,
{
    /// Wraps a static cell. The cell may still be empty.
    pub const fn new(cell: &'static RadioCell<TX, RX>) -> Self {
        Self { cell }
    }

    /// Runs `f` on the driver inside a critical section.
    ///
    /// Returns `None` if no driver has been installed.
    pub fn with<R>(&self, f: impl FnOnce(&mut RadioDriver<TX, RX>) -> R) -> Option<R> {
        critical_section::with(|cs| self.cell.borrow(cs).borrow_mut().as_mut().map(f))
    }

    /// Advances the driver by one tick. Call from the bit clock interrupt.
    ///
    /// Does nothing until a driver is installed.
    pub fn tick(&self) {
        let _ = self.with(|driver| driver.tick());
    }

    /// Current mode of the driver, if installed.
    pub fn mode(&self) -> Option<RadioMode> {
        self.with(|driver| driver.mode())
    }
}

impl<TX, RX> Clone for RadioHandle<TX, RX>
where
    TX: OutputPin + 'static,
    RX: InputPin + 'static,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<TX, RX> Copy for RadioHandle<TX, RX>
where
    TX: OutputPin + 'static,
    RX: InputPin + 'static,
{
}

impl<TX, RX> core::fmt::Debug for RadioHandle<TX, RX>
where
    TX: OutputPin + 'static,
    RX: InputPin + 'static,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RadioHandle").finish_non_exhaustive()
    }
}

impl<TX, RX> Modem for RadioHandle<TX, RX>
where
    TX: OutputPin + 'static,
    RX: InputPin + 'static,
{
    fn init(&mut self) -> Result<(), RadioError> {
        self.with(|driver| driver.set_mode_idle())
            .ok_or(RadioError::NotInitialized)
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        loop {
            match self.with(|driver| driver.send(payload)) {
                None => return Err(RadioError::NotInitialized),
                Some(Ok(())) => return Ok(()),
                Some(Err(nb::Error::Other(e))) => return Err(e),
                Some(Err(nb::Error::WouldBlock)) => core::hint::spin_loop(),
            }
        }
    }

    fn wait_packet_send(&mut self) {
        while self.mode() == Some(RadioMode::Tx) {
            core::hint::spin_loop();
        }
    }

    fn available(&mut self) -> bool {
        self.with(|driver| driver.available()).unwrap_or(false)
    }

    fn recv(&mut self, buf: &mut [u8]) -> Option<usize> {
        self.with(|driver| driver.recv(buf)).flatten()
    }
}
