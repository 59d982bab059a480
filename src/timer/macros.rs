/// Declares a static [`RadioCell`](crate::timer::RadioCell) protected by a
/// `critical_section` mutex.
///
/// The cell is shared between the bit clock interrupt and the foreground through
/// [`RadioHandle`](crate::timer::RadioHandle).
///
/// # Arguments
/// - `$name`: Name of the static
/// - `$tx`: The concrete type of the TX pin (must implement `OutputPin`)
/// - `$rx`: The concrete type of the RX pin (must implement `InputPin`)
///
/// # Example
/// ```rust
/// # use embedded_hal_mock::eh1::digital::Mock as MyPin;
/// use waveboot::config::RadioConfig;
/// use waveboot::timer::radio_setup;
///
/// waveboot::declare_radio!(RADIO, MyPin, MyPin);
///
/// # let (tx, rx) = (MyPin::new(&[embedded_hal_mock::eh1::digital::Transaction::set(
/// #     embedded_hal_mock::eh1::digital::State::Low)]), MyPin::new(&[]));
/// let radio = radio_setup(&RADIO, tx, rx, &RadioConfig::default());
/// # radio.with(|d| { d.tx.done(); d.rx.done(); });
/// ```
#[macro_export]
macro_rules! declare_radio {
    ( $name:ident, $tx:ty, $rx:ty ) => {
        static $name: $crate::timer::RadioCell<$tx, $rx> =
            $crate::critical_section::Mutex::new(core::cell::RefCell::new(None));
    };
}
