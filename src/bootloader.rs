//! Boot state machine.
//!
//! ```text
//! Start --(radio up)--> Evaluate --(marker clear)--> Listening --(timeout)--> Application
//!   |                     |   ^                         |(BOOT)
//!   |                     |   +-------(failure)-------- Programming --(DNE)--> Application
//!   |                     +--(marker set)--> Recovery --(BOOT)--^
//!   +--(radio down)--> Application if the marker is clear, Halted otherwise
//! ```
//!
//! Recovery listens in windows of `recovery_window_ms` separated by
//! `recovery_pause_ms`, forever. A device whose marker is set never leaves the
//! bootloader except through a completed image.
//!
//! Everything the bootloader cannot express portably (vector table selection,
//! watchdog, timer registers, the final jump) goes through [`Board`].

use embedded_hal::digital::OutputPin;

use crate::config::BootConfig;
use crate::consts::{ACTIVATION_SIGNAL, REPLY_READY};
use crate::error::RadioError;
use crate::engine::ProgrammingSession;
use crate::flash::{Flash, SelfProgram};
use crate::modem::Modem;
use crate::recovery::RecoveryMarker;
use crate::timebase::{Millis, delay_ms, elapsed_since};
use crate::timer::{BitClockSetting, MAX_TIMER_TICKS, timer_calc};

/// Number of LED blinks acknowledging the activation signal.
pub const ACTIVATION_BLINKS: u8 = 5;

/// Platform specific control flow.
///
/// On an ATmega328P: `MCUCR` IVCE/IVSEL for the vector table, `WDTCSR` for the
/// watchdog, timer 1 in CTC mode for the bit clock, and a stack pointer reset
/// followed by `jmp 0x0000` to enter the application.
pub trait Board {
    /// Moves the interrupt vectors to the boot section.
    fn map_vectors_to_bootloader(&mut self);

    /// Clears a pending watchdog reset and stops the watchdog.
    fn disable_watchdog(&mut self);

    /// Starts the bit clock interrupt with the given timer setting and enables
    /// interrupts.
    fn start_bit_clock(&mut self, setting: BitClockSetting);

    /// Masks all interrupts.
    fn disable_interrupts(&mut self);

    /// Stops every timer and disables its interrupts.
    fn stop_timers(&mut self);

    /// Returns I/O ports and other peripherals to their power-on state.
    fn reset_peripherals(&mut self);

    /// Moves the interrupt vectors back to the application section.
    fn map_vectors_to_application(&mut self);

    /// Resets the stack pointer and jumps to the application's reset vector.
    fn enter_application(&mut self) -> !;
}

/// States of the [`Bootloader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum BootState {
    /// Vector remapping, watchdog and radio bring-up.
    Start,
    /// Reads the recovery marker.
    Evaluate,
    /// Trusted image: waits one boot window for `BOOT`.
    Listening,
    /// Untrusted image: waits for `BOOT` forever.
    Recovery,
    /// A programming session is running.
    Programming,
    /// Control goes to the application.
    Application,
    /// The radio is down and the image cannot be trusted.
    Halted,
}

impl BootState {
    /// True for states the bootloader does not leave on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Application | Self::Halted)
    }
}

/// The bootloader.
#[derive(Debug)]
pub struct Bootloader<B, M, P, C, L, const PAGE: usize>
where
    B: Board,
    M: Modem,
    P: SelfProgram,
    C: Millis,
    L: OutputPin,
{
    board: B,
    modem: M,
    flash: Flash<P, PAGE>,
    clock: C,
    led: L,
    config: BootConfig,
    marker: RecoveryMarker,
    state: BootState,
}

impl<B, M, P, C, L, const PAGE: usize> Bootloader<B, M, P, C, L, PAGE>
where
    B: Board,
    M: Modem,
    P: SelfProgram,
    C: Millis,
    L: OutputPin,
{
    /// Creates the bootloader in [`BootState::Start`].
    pub fn new(
        board: B,
        modem: M,
        flash: Flash<P, PAGE>,
        clock: C,
        led: L,
        config: BootConfig,
    ) -> Self {
        Self {
            board,
            modem,
            flash,
            clock,
            led,
            marker: RecoveryMarker::from_config(&config),
            config,
            state: BootState::Start,
        }
    }

    /// Current state.
    pub fn state(&self) -> BootState {
        self.state
    }

    /// The board.
    pub fn board(&mut self) -> &mut B {
        &mut self.board
    }

    /// The modem.
    pub fn modem(&mut self) -> &mut M {
        &mut self.modem
    }

    /// The flash.
    pub fn flash(&mut self) -> &mut Flash<P, PAGE> {
        &mut self.flash
    }

    /// Runs one transition and returns the new state.
    ///
    /// Listening, Recovery and Programming block for up to their respective
    /// windows. Terminal states are left unchanged.
    pub fn step(&mut self) -> BootState {
        self.state = match self.state {
            BootState::Start => self.start(),
            BootState::Evaluate => {
                if self.marker_set() {
                    warn!("boot: image incomplete, entering recovery");
                    BootState::Recovery
                } else {
                    let _ = self.led.set_low();
                    BootState::Listening
                }
            }
            BootState::Listening => {
                if self.listen_for_boot_signal(self.config.boot_window_ms) {
                    self.activate()
                } else {
                    info!("boot: no activation, starting application");
                    let _ = self.led.set_low();
                    BootState::Application
                }
            }
            BootState::Recovery => {
                if self.listen_for_boot_signal(self.config.recovery_window_ms) {
                    self.activate()
                } else {
                    delay_ms(&self.clock, self.config.recovery_pause_ms);
                    BootState::Recovery
                }
            }
            BootState::Programming => {
                let result = ProgrammingSession::new(
                    &mut self.modem,
                    &mut self.flash,
                    &self.clock,
                    &mut self.led,
                    &self.config,
                )
                .run();
                let _ = self.led.set_low();
                match result {
                    Ok(()) => BootState::Application,
                    Err(e) => {
                        warn!("boot: programming failed: {:?}", e);
                        BootState::Evaluate
                    }
                }
            }
            terminal => terminal,
        };
        self.state
    }

    /// Steps until [`BootState::Application`] or [`BootState::Halted`].
    pub fn run(&mut self) -> BootState {
        while !self.step().is_terminal() {}
        self.state
    }

    /// Runs the bootloader and never returns: either the application is entered or
    /// the device halts.
    pub fn boot(mut self) -> ! {
        if self.run() == BootState::Application {
            self.prepare_application_transfer();
            self.board.enter_application()
        }
        error!("boot: halted");
        loop {
            core::hint::spin_loop();
        }
    }

    /// Undoes everything the bootloader configured, in the order the application
    /// expects to find the hardware: interrupts masked, timers stopped,
    /// peripherals reset, application vectors.
    pub fn prepare_application_transfer(&mut self) {
        self.board.disable_interrupts();
        self.board.stop_timers();
        self.board.reset_peripherals();
        self.board.map_vectors_to_application();
    }

    /// Listens for the activation signal for `window_ms`.
    pub fn listen_for_boot_signal(&mut self, window_ms: u32) -> bool {
        let start = self.clock.millis();
        while elapsed_since(&self.clock, start) < window_ms {
            let mut buf = [0u8; ACTIVATION_SIGNAL.len()];
            if let Some(len) = self.modem.recv(&mut buf) {
                if len >= ACTIVATION_SIGNAL.len() && buf == ACTIVATION_SIGNAL {
                    info!("boot: activation received");
                    return true;
                }
            }
        }
        false
    }

    fn start(&mut self) -> BootState {
        self.board.map_vectors_to_bootloader();
        self.board.disable_watchdog();
        match self.radio_init() {
            Ok(()) => BootState::Evaluate,
            Err(e) => {
                error!("boot: radio init failed: {:?}", e);
                if self.marker_set() {
                    BootState::Halted
                } else {
                    BootState::Application
                }
            }
        }
    }

    fn radio_init(&mut self) -> Result<(), RadioError> {
        let setting = timer_calc(
            self.config.f_cpu,
            self.config.bit_rate,
            self.config.samples_per_bit,
            MAX_TIMER_TICKS,
        )?;
        debug!(
            "boot: bit clock prescaler {} compare {}",
            setting.prescaler, setting.compare
        );
        self.board.start_bit_clock(setting);
        self.modem.init()
    }

    fn marker_set(&mut self) -> bool {
        // an unreadable marker cannot vouch for the image
        self.marker.is_set(&mut self.flash).unwrap_or(true)
    }

    fn activate(&mut self) -> BootState {
        for _ in 0..ACTIVATION_BLINKS {
            let _ = self.led.set_high();
            delay_ms(&self.clock, self.config.blink_ms);
            let _ = self.led.set_low();
            delay_ms(&self.clock, self.config.blink_ms);
        }
        if let Err(e) = self.modem.reply(&REPLY_READY) {
            error!("boot: ready reply failed: {:?}", e);
        }
        BootState::Programming
    }
}
