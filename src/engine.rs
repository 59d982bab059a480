//! Programming engine.
//!
//! A [`ProgrammingSession`] turns received update records into flash pages.
//! Records are buffered in a single [`PageBuffer`]; when a record targets a
//! different page, the buffered page is committed first and the new one starts
//! out erased. Every message is answered before the next one is received:
//!
//! | Reply | Meaning |
//! |-------|---------|
//! | `PRG` | record applied (or ignored, for unknown types) |
//! | `DNE` | end-of-file applied, image complete |
//! | `CHK` | checksum mismatch, nothing changed |
//! | `ERR` | malformed record, protected address or flash failure |
//!
//! The recovery marker is set before the first data byte is buffered and only
//! cleared once the end-of-file record has been committed, or when the
//! controller goes silent before anything was applied.

use embedded_hal::digital::OutputPin;

use crate::config::BootConfig;
use crate::consts::{
    ERASED_BYTE, RADIO_MAX_MESSAGE_LEN_USIZE, REPLY_CHECKSUM, REPLY_DONE, REPLY_ERROR,
    REPLY_PROGRESS,
};
use crate::error::{FlashError, RecordError, SessionError};
use crate::flash::{Flash, SelfProgram};
use crate::modem::Modem;
use crate::record::{RecordType, UpdateRecord};
use crate::recovery::RecoveryMarker;
use crate::timebase::{Millis, delay_ms, elapsed_since};

/// RAM mirror of one flash page.
#[derive(Debug, Clone)]
pub struct PageBuffer<const PAGE: usize> {
    base: Option<u32>,
    data: [u8; PAGE],
    dirty: bool,
}

impl<const PAGE: usize> PageBuffer<PAGE> {
    /// An empty buffer not bound to any page.
    pub const fn new() -> Self {
        Self {
            base: None,
            data: [ERASED_BYTE; PAGE],
            dirty: false,
        }
    }

    /// Base address of the buffered page.
    pub fn base(&self) -> Option<u32> {
        self.base
    }

    /// True if the buffer holds bytes not yet written to flash.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Buffered page contents.
    pub fn data(&self) -> &[u8; PAGE] {
        &self.data
    }

    /// Binds the buffer to the page at `base`, starting out erased.
    pub fn load(&mut self, base: u32) {
        self.base = Some(base);
        self.data = [ERASED_BYTE; PAGE];
        self.dirty = false;
    }

    /// Copies `bytes` to `offset` within the page. Bytes past the page end are dropped.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) {
        if offset >= PAGE {
            return;
        }
        let len = bytes.len().min(PAGE - offset);
        self.data[offset..offset + len].copy_from_slice(&bytes[..len]);
        self.dirty |= len > 0;
    }

    /// Commits the page if it is dirty.
    pub fn flush<P: SelfProgram>(&mut self, flash: &mut Flash<P, PAGE>) -> Result<(), FlashError> {
        if let (Some(base), true) = (self.base, self.dirty) {
            flash.write_page(base, &self.data)?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl<const PAGE: usize> Default for PageBuffer<PAGE> {
    fn default() -> Self {
        Self::new()
    }
}

/// What a handled message leads to.
enum Handled {
    Reply(&'static [u8]),
    Finished,
    Failed(SessionError),
}

/// One programming session, from the `RDY` reply to `DNE` or a timeout.
#[derive(Debug)]
pub struct ProgrammingSession<'a, M, P, C, L, const PAGE: usize>
where
    M: Modem,
    P: SelfProgram,
    C: Millis,
    L: OutputPin,
{
    modem: &'a mut M,
    flash: &'a mut Flash<P, PAGE>,
    clock: &'a C,
    led: &'a mut L,
    config: BootConfig,
    marker: RecoveryMarker,
    page: PageBuffer<PAGE>,
    image_modified: bool,
    last_activity: u32,
}

impl<'a, M, P, C, L, const PAGE: usize> ProgrammingSession<'a, M, P, C, L, PAGE>
where
    M: Modem,
    P: SelfProgram,
    C: Millis,
    L: OutputPin,
{
    /// Starts a session. The status LED is switched on.
    pub fn new(
        modem: &'a mut M,
        flash: &'a mut Flash<P, PAGE>,
        clock: &'a C,
        led: &'a mut L,
        config: &BootConfig,
    ) -> Self {
        let _ = led.set_high();
        info!("engine: session started");
        Self {
            modem,
            flash,
            clock,
            led,
            config: *config,
            marker: RecoveryMarker::from_config(config),
            page: PageBuffer::new(),
            image_modified: false,
            last_activity: clock.millis(),
        }
    }

    /// True once a data record has been applied in this session.
    pub fn image_modified(&self) -> bool {
        self.image_modified
    }

    /// The page buffer.
    pub fn page(&self) -> &PageBuffer<PAGE> {
        &self.page
    }

    /// The modem the session talks through.
    pub fn modem(&mut self) -> &mut M {
        self.modem
    }

    /// The flash the session programs.
    pub fn flash(&mut self) -> &mut Flash<P, PAGE> {
        self.flash
    }

    /// Handles at most one incoming message.
    ///
    /// # Returns
    /// - `Ok(())` once the end-of-file record has been committed
    /// - `WouldBlock` while the session goes on
    /// - [`SessionError::NothingModified`] on timeout before any data record
    ///   (the recovery marker has been cleared)
    /// - [`SessionError::Incomplete`] on timeout after data records (marker stays set)
    /// - [`SessionError::Flash`] if flash programming failed
    pub fn step(&mut self) -> nb::Result<(), SessionError> {
        let mut buf = [0u8; RADIO_MAX_MESSAGE_LEN_USIZE];
        let Some(len) = self.modem.recv(&mut buf) else {
            if elapsed_since(self.clock, self.last_activity) > self.config.programming_timeout_ms
            {
                return Err(nb::Error::Other(self.time_out()));
            }
            return Err(nb::Error::WouldBlock);
        };
        self.last_activity = self.clock.millis();

        let _ = self.led.set_low();
        delay_ms(self.clock, self.config.blink_ms);

        match self.handle(&buf[..len]) {
            Handled::Reply(code) => {
                self.reply(code);
                self.blink();
                Err(nb::Error::WouldBlock)
            }
            Handled::Finished => {
                self.reply(&REPLY_DONE);
                let _ = self.led.set_high();
                info!("engine: image complete");
                Ok(())
            }
            Handled::Failed(e) => {
                self.reply(&REPLY_ERROR);
                let _ = self.led.set_high();
                Err(nb::Error::Other(e))
            }
        }
    }

    /// Runs the session to completion.
    pub fn run(&mut self) -> Result<(), SessionError> {
        nb::block!(self.step())
    }

    fn handle(&mut self, msg: &[u8]) -> Handled {
        let record = match UpdateRecord::parse(msg) {
            Ok(record) => record,
            Err(RecordError::Checksum { expected, computed }) => {
                debug!("engine: checksum {} != {}", expected, computed);
                return Handled::Reply(&REPLY_CHECKSUM);
            }
            Err(e) => {
                debug!("engine: bad record {:?}", e);
                return Handled::Reply(&REPLY_ERROR);
            }
        };
        match record.kind {
            RecordType::Data => match self.apply(&record) {
                Ok(()) => Handled::Reply(&REPLY_PROGRESS),
                Err(FlashError::Protected(address)) => {
                    warn!("engine: refusing write to {}", address);
                    Handled::Reply(&REPLY_ERROR)
                }
                Err(e) => Handled::Failed(e.into()),
            },
            RecordType::EndOfFile => match self.finish() {
                Ok(()) => Handled::Finished,
                Err(e) => Handled::Failed(e.into()),
            },
            RecordType::Other(kind) => {
                trace!("engine: ignoring record type {}", kind);
                Handled::Reply(&REPLY_PROGRESS)
            }
        }
    }

    /// Copies a data record into the page buffer, splitting it at page boundaries.
    fn apply(&mut self, record: &UpdateRecord<'_>) -> Result<(), FlashError> {
        let start = u32::from(record.address);
        let end = start + record.data.len() as u32;
        let boot_start = self.config.boot_start();
        if end > boot_start {
            return Err(FlashError::Protected(start.max(boot_start)));
        }

        if !self.image_modified {
            self.marker.set(self.flash)?;
            self.image_modified = true;
        }

        let mut address = start;
        let mut data = record.data;
        while !data.is_empty() {
            let base = Flash::<P, PAGE>::page_base(address);
            if self.page.base() != Some(base) {
                self.page.flush(self.flash)?;
                self.page.load(base);
            }
            let offset = (address - base) as usize;
            let len = data.len().min(PAGE - offset);
            self.page.write(offset, &data[..len]);
            address += len as u32;
            data = &data[len..];
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), FlashError> {
        self.page.flush(self.flash)?;
        self.marker.clear(self.flash)
    }

    fn time_out(&mut self) -> SessionError {
        if self.image_modified {
            warn!("engine: timed out with a partial image");
            return SessionError::Incomplete;
        }
        warn!("engine: timed out, nothing modified");
        match self.marker.clear(self.flash) {
            Ok(()) => SessionError::NothingModified,
            Err(e) => e.into(),
        }
    }

    fn reply(&mut self, code: &[u8]) {
        if let Err(e) = self.modem.reply(code) {
            error!("engine: reply failed: {:?}", e);
        }
    }

    fn blink(&mut self) {
        let _ = self.led.set_high();
        delay_ms(self.clock, self.config.blink_ms);
        let _ = self.led.set_low();
        delay_ms(self.clock, self.config.blink_ms);
        let _ = self.led.set_high();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RadioError;
    use crate::flash::NorFlashProgram;
    use crate::flash::sim::RamFlash;
    use core::cell::Cell;
    use core::convert::Infallible;
    use embedded_hal::digital::ErrorType;
    use std::collections::VecDeque;
    use std::vec::Vec;

    type TestFlash = Flash<NorFlashProgram<RamFlash, 128>, 128>;

    const MARKER_PAGE: u32 = 0x7f80;

    struct Clock(Cell<u32>);

    impl Millis for Clock {
        fn millis(&self) -> u32 {
            let now = self.0.get();
            self.0.set(now + 1);
            now
        }
    }

    #[derive(Default)]
    struct Script {
        incoming: VecDeque<Vec<u8>>,
        replies: Vec<Vec<u8>>,
    }

    impl Modem for Script {
        fn init(&mut self) -> Result<(), RadioError> {
            Ok(())
        }

        fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
            self.replies.push(payload.to_vec());
            Ok(())
        }

        fn wait_packet_send(&mut self) {}

        fn available(&mut self) -> bool {
            !self.incoming.is_empty()
        }

        fn recv(&mut self, buf: &mut [u8]) -> Option<usize> {
            let msg = self.incoming.pop_front()?;
            let len = msg.len().min(buf.len());
            buf[..len].copy_from_slice(&msg[..len]);
            Some(len)
        }
    }

    struct Led;

    impl ErrorType for Led {
        type Error = Infallible;
    }

    impl OutputPin for Led {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    struct Bench {
        modem: Script,
        flash: TestFlash,
        clock: Clock,
        led: Led,
        config: BootConfig,
    }

    impl Bench {
        fn new(records: &[Vec<u8>]) -> Self {
            Self {
                modem: Script {
                    incoming: records.iter().cloned().collect(),
                    replies: Vec::new(),
                },
                flash: Flash::new(NorFlashProgram::new(RamFlash::new(0x8000))),
                clock: Clock(Cell::new(0)),
                led: Led,
                config: BootConfig::default(),
            }
        }

        fn run(&mut self) -> Result<(), SessionError> {
            ProgrammingSession::new(
                &mut self.modem,
                &mut self.flash,
                &self.clock,
                &mut self.led,
                &self.config,
            )
            .run()
        }

        fn replies(&self) -> Vec<&[u8]> {
            self.modem.replies.iter().map(|r| r.as_slice()).collect()
        }

        fn writes(&mut self) -> Vec<u32> {
            self.flash.hw().flash().writes.clone()
        }

        fn marker_set(&mut self) -> bool {
            RecoveryMarker::from_config(&self.config)
                .is_set(&mut self.flash)
                .unwrap()
        }
    }

    fn data(address: u16, bytes: &[u8]) -> Vec<u8> {
        UpdateRecord::data(address, bytes).encode().unwrap().to_vec()
    }

    fn eof() -> Vec<u8> {
        UpdateRecord::end_of_file().encode().unwrap().to_vec()
    }

    #[test]
    fn test_image_is_programmed() {
        let mut bench = Bench::new(&[data(0, &[0x0c, 0x94, 0x34]), eof()]);
        assert_eq!(bench.run(), Ok(()));
        assert_eq!(bench.replies(), [&b"PRG"[..], b"DNE"]);
        assert!(!bench.marker_set());
        let page = bench.flash.read_page(0).unwrap();
        assert_eq!(&page[..4], &[0x0c, 0x94, 0x34, 0xff]);
        // marker set, page 0, marker cleared
        assert_eq!(bench.writes(), [MARKER_PAGE, 0, MARKER_PAGE]);
    }

    #[test]
    fn test_checksum_mismatch_changes_nothing() {
        let mut bad = data(0x40, &[1, 2, 3]);
        let last = bad.len() - 1;
        bad[last] ^= 0x01;
        let mut bench = Bench::new(&[bad]);
        assert_eq!(bench.run(), Err(SessionError::NothingModified));
        assert_eq!(bench.replies(), [&b"CHK"[..]]);
        assert!(!bench.marker_set());
        let page = bench.flash.read_page(0).unwrap();
        assert!(page.iter().all(|&b| b == 0xff));
        // only the marker clear on timeout
        assert_eq!(bench.writes(), [MARKER_PAGE]);
    }

    #[test]
    fn test_pages_are_flushed_once_per_occupancy() {
        let mut bench = Bench::new(&[
            data(0x40, &[0x11, 0x12, 0x13, 0x14]),
            data(0x10, &[0x21, 0x22]),
            data(0x42, &[0x31]),
            data(0x90, &[0x41, 0x42]),
            eof(),
        ]);
        assert_eq!(bench.run(), Ok(()));
        assert_eq!(bench.writes(), [MARKER_PAGE, 0x00, 0x80, MARKER_PAGE]);

        let page = bench.flash.read_page(0).unwrap();
        for (offset, &byte) in page.iter().enumerate() {
            let expected = match offset {
                0x10 => 0x21,
                0x11 => 0x22,
                0x40 => 0x11,
                0x41 => 0x12,
                0x42 => 0x31,
                0x43 => 0x14,
                _ => 0xff,
            };
            assert_eq!(byte, expected, "offset {offset:#x}");
        }
        let page = bench.flash.read_page(0x80).unwrap();
        assert_eq!(&page[0x10..0x12], &[0x41, 0x42]);
    }

    #[test]
    fn test_record_across_page_boundary_is_split() {
        let mut bench = Bench::new(&[data(0x7e, &[1, 2, 3, 4]), eof()]);
        assert_eq!(bench.run(), Ok(()));
        assert_eq!(bench.writes(), [MARKER_PAGE, 0x00, 0x80, MARKER_PAGE]);
        assert_eq!(&bench.flash.read_page(0).unwrap()[0x7e..], &[1, 2]);
        assert_eq!(&bench.flash.read_page(0x80).unwrap()[..2], &[3, 4]);
    }

    #[test]
    fn test_timeout_after_data_leaves_marker_set() {
        let mut bench = Bench::new(&[data(0, &[0xaa; 16])]);
        assert_eq!(bench.run(), Err(SessionError::Incomplete));
        assert_eq!(bench.replies(), [&b"PRG"[..]]);
        assert!(bench.marker_set());
        // the buffered page is never committed
        assert_eq!(bench.writes(), [MARKER_PAGE]);
    }

    #[test]
    fn test_timeout_without_data_clears_marker() {
        let mut bench = Bench::new(&[]);
        RecoveryMarker::from_config(&bench.config)
            .set(&mut bench.flash)
            .unwrap();
        assert_eq!(bench.run(), Err(SessionError::NothingModified));
        assert!(bench.replies().is_empty());
        assert!(!bench.marker_set());
    }

    #[test]
    fn test_protected_and_malformed_records_reply_err() {
        let mut bench = Bench::new(&[
            data(0x6fff, &[1, 2]),
            vec![0x05, 0x00],
            eof(),
        ]);
        assert_eq!(bench.run(), Ok(()));
        assert_eq!(bench.replies(), [&b"ERR"[..], b"ERR", b"DNE"]);
        // nothing applied, so the marker was never set
        assert_eq!(bench.writes(), [MARKER_PAGE]);
        assert!(!bench.marker_set());
    }

    #[test]
    fn test_unknown_record_type_is_acknowledged() {
        let other = UpdateRecord {
            kind: RecordType::Other(0x03),
            address: 0,
            data: &[0, 0, 0, 0],
        }
        .encode()
        .unwrap()
        .to_vec();
        let mut bench = Bench::new(&[other, eof()]);
        assert_eq!(bench.run(), Ok(()));
        assert_eq!(bench.replies(), [&b"PRG"[..], b"DNE"]);
    }

    #[test]
    fn test_flash_failure_ends_session() {
        let mut bench = Bench::new(&[data(0, &[1]), data(0x80, &[2]), eof()]);
        let mut session = ProgrammingSession::new(
            &mut bench.modem,
            &mut bench.flash,
            &bench.clock,
            &mut bench.led,
            &bench.config,
        );
        assert_eq!(session.step(), Err(nb::Error::WouldBlock));
        assert!(session.image_modified());
        assert_eq!(session.page().base(), Some(0));
        assert!(session.page().is_dirty());
        session.flash.hw().flash().fail_writes = true;
        assert_eq!(
            session.step(),
            Err(nb::Error::Other(SessionError::Flash(FlashError::Device)))
        );
        assert_eq!(bench.replies(), [&b"PRG"[..], b"ERR"]);
        assert!(bench.marker_set());
    }

    #[test]
    fn test_page_buffer_write_clamps() {
        let mut page = PageBuffer::<8>::new();
        page.load(16);
        page.write(6, &[1, 2, 3]);
        assert_eq!(page.data(), &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 1, 2]);
        assert!(page.is_dirty());
        page.write(8, &[9]);
        assert_eq!(page.data()[7], 2);
    }
}
