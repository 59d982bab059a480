//! Simulated hardware shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use waveboot::bootloader::Board;
use waveboot::error::RadioError;
use waveboot::flash::{Flash, SelfProgram};
use waveboot::modem::Modem;
use waveboot::timebase::Millis;
use waveboot::timer::BitClockSetting;

/// Page size of the simulated part.
pub const PAGE: usize = 128;

/// Program memory size of the simulated part.
pub const FLASH_SIZE: usize = 0x8000;

/// Page holding the recovery marker with the default configuration.
pub const MARKER_PAGE: u32 = 0x7f80;

pub type SimFlashPages = Flash<SimFlash, PAGE>;

/// AVR-like self-programming: a temporary page buffer filled word by word and
/// committed to an erased page.
#[derive(Debug)]
pub struct SimFlash {
    pub mem: Vec<u8>,
    temp: [u8; PAGE],
    /// Page addresses in commit order.
    pub writes: Vec<u32>,
}

impl SimFlash {
    pub fn new() -> Self {
        Self {
            mem: vec![0xff; FLASH_SIZE],
            temp: [0xff; PAGE],
            writes: Vec::new(),
        }
    }

    pub fn pages() -> SimFlashPages {
        Flash::new(Self::new())
    }
}

impl SelfProgram for SimFlash {
    type Error = Infallible;

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let start = address as usize;
        buf.copy_from_slice(&self.mem[start..start + buf.len()]);
        Ok(())
    }

    fn erase_page(&mut self, address: u32) -> Result<(), Self::Error> {
        let start = address as usize;
        self.mem[start..start + PAGE].fill(0xff);
        Ok(())
    }

    fn fill_word(&mut self, address: u32, word: u16) -> Result<(), Self::Error> {
        let offset = address as usize % PAGE;
        self.temp[offset..offset + 2].copy_from_slice(&word.to_le_bytes());
        Ok(())
    }

    fn write_page(&mut self, address: u32) -> Result<(), Self::Error> {
        let start = address as usize;
        for (cell, byte) in self.mem[start..start + PAGE].iter_mut().zip(self.temp) {
            *cell &= byte;
        }
        self.temp = [0xff; PAGE];
        self.writes.push(address);
        Ok(())
    }

    fn enable_read(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Millisecond clock advancing by one on every read.
#[derive(Debug, Default)]
pub struct SimClock(Cell<u32>);

impl Millis for SimClock {
    fn millis(&self) -> u32 {
        let now = self.0.get();
        self.0.set(now.wrapping_add(1));
        now
    }
}

/// Modem replaying queued messages and recording everything sent.
#[derive(Debug, Default)]
pub struct ScriptedModem {
    pub incoming: VecDeque<Vec<u8>>,
    pub replies: Vec<Vec<u8>>,
    /// Number of `recv` polls that return nothing before the script starts.
    pub silent_polls: usize,
    pub init_error: Option<RadioError>,
}

impl ScriptedModem {
    pub fn with_messages<I: IntoIterator<Item = Vec<u8>>>(messages: I) -> Self {
        Self {
            incoming: messages.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn replies(&self) -> Vec<&[u8]> {
        self.replies.iter().map(Vec::as_slice).collect()
    }
}

impl Modem for ScriptedModem {
    fn init(&mut self) -> Result<(), RadioError> {
        match self.init_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.replies.push(payload.to_vec());
        Ok(())
    }

    fn wait_packet_send(&mut self) {}

    fn available(&mut self) -> bool {
        self.silent_polls == 0 && !self.incoming.is_empty()
    }

    fn recv(&mut self, buf: &mut [u8]) -> Option<usize> {
        if self.silent_polls > 0 {
            self.silent_polls -= 1;
            return None;
        }
        let msg = self.incoming.pop_front()?;
        let len = msg.len().min(buf.len());
        buf[..len].copy_from_slice(&msg[..len]);
        Some(len)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    MapVectorsToBootloader,
    DisableWatchdog,
    StartBitClock(BitClockSetting),
    DisableInterrupts,
    StopTimers,
    ResetPeripherals,
    MapVectorsToApplication,
    EnterApplication,
}

/// Board recording every call. Entering the application panics so tests can
/// observe it; the log is shared so it survives the bootloader.
#[derive(Debug, Default)]
pub struct RecordingBoard {
    log: Rc<RefCell<Vec<BoardEvent>>>,
}

impl RecordingBoard {
    pub fn events(&self) -> Vec<BoardEvent> {
        self.log.borrow().clone()
    }

    pub fn log(&self) -> Rc<RefCell<Vec<BoardEvent>>> {
        self.log.clone()
    }

    fn record(&mut self, event: BoardEvent) {
        self.log.borrow_mut().push(event);
    }
}

impl Board for RecordingBoard {
    fn map_vectors_to_bootloader(&mut self) {
        self.record(BoardEvent::MapVectorsToBootloader);
    }

    fn disable_watchdog(&mut self) {
        self.record(BoardEvent::DisableWatchdog);
    }

    fn start_bit_clock(&mut self, setting: BitClockSetting) {
        self.record(BoardEvent::StartBitClock(setting));
    }

    fn disable_interrupts(&mut self) {
        self.record(BoardEvent::DisableInterrupts);
    }

    fn stop_timers(&mut self) {
        self.record(BoardEvent::StopTimers);
    }

    fn reset_peripherals(&mut self) {
        self.record(BoardEvent::ResetPeripherals);
    }

    fn map_vectors_to_application(&mut self) {
        self.record(BoardEvent::MapVectorsToApplication);
    }

    fn enter_application(&mut self) -> ! {
        self.record(BoardEvent::EnterApplication);
        panic!("entered application");
    }
}

/// Pin that accepts writes and always reads low.
#[derive(Debug, Default)]
pub struct NullPin;

impl ErrorType for NullPin {
    type Error = Infallible;
}

impl OutputPin for NullPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl InputPin for NullPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(false)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// Transmitting end of a [`wire`].
#[derive(Debug)]
pub struct WireTx(Rc<Cell<bool>>);

/// Receiving end of a [`wire`].
#[derive(Debug)]
pub struct WireRx(Rc<Cell<bool>>);

/// A noiseless channel: the receiver reads whatever the transmitter last wrote.
pub fn wire() -> (WireTx, WireRx) {
    let level = Rc::new(Cell::new(false));
    (WireTx(level.clone()), WireRx(level))
}

impl ErrorType for WireTx {
    type Error = Infallible;
}

impl OutputPin for WireTx {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set(true);
        Ok(())
    }
}

impl ErrorType for WireRx {
    type Error = Infallible;
}

impl InputPin for WireRx {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.get())
    }
}

/// Input pin playing back a prepared sample stream, low once exhausted.
#[derive(Debug)]
pub struct SamplePin {
    samples: VecDeque<bool>,
}

impl SamplePin {
    /// Ideal samples for `symbols`, `ticks_per_bit` per bit, LSB first, behind a
    /// short idle gap.
    pub fn from_symbols(symbols: &[u8], ticks_per_bit: usize) -> Self {
        let mut samples = VecDeque::new();
        samples.extend(std::iter::repeat_n(false, 2 * ticks_per_bit));
        for symbol in symbols {
            for bit in 0..6 {
                let level = symbol & (1 << bit) != 0;
                samples.extend(std::iter::repeat_n(level, ticks_per_bit));
            }
        }
        Self { samples }
    }

    pub fn remaining(&self) -> usize {
        self.samples.len()
    }
}

impl ErrorType for SamplePin {
    type Error = Infallible;
}

impl InputPin for SamplePin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.samples.pop_front().unwrap_or(false))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.samples.pop_front().unwrap_or(false))
    }
}
