//! Flash page programming.
//!
//! Program memory is only writable a whole page at a time: erase the page, fill
//! the hardware page buffer one 16-bit word at a time, commit it, then re-enable
//! reads of the section that was being written. [`Flash::write_page`] runs that
//! sequence as one unit inside a critical section, so neither the bit clock nor
//! the millisecond interrupt can run between erase and commit. The radio loses
//! samples for the duration of a commit.
//!
//! Targets provide the raw instructions through [`SelfProgram`]. Any
//! `embedded_storage::nor_flash::NorFlash` can be used through [`NorFlashProgram`].

use embedded_storage::nor_flash::NorFlash;

use crate::consts::ERASED_BYTE;
use crate::error::FlashError;

/// Page size of the ATmega328P and other 32 KiB AVR parts.
pub const ATMEGA328P_PAGE_SIZE: usize = 128;

/// Raw self-programming instructions of the target.
///
/// Addresses are byte addresses into program memory.
pub trait SelfProgram {
    /// Error reported by the hardware.
    type Error: core::fmt::Debug;

    /// Reads program memory starting at `address`.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Erases the page starting at `address`.
    fn erase_page(&mut self, address: u32) -> Result<(), Self::Error>;

    /// Loads one little-endian word into the temporary page buffer.
    fn fill_word(&mut self, address: u32, word: u16) -> Result<(), Self::Error>;

    /// Commits the temporary page buffer to the page starting at `address`.
    fn write_page(&mut self, address: u32) -> Result<(), Self::Error>;

    /// Re-enables reading of the section that was just programmed.
    fn enable_read(&mut self) -> Result<(), Self::Error>;
}

/// Page writer over a [`SelfProgram`] implementation with `PAGE`-byte pages.
#[derive(Debug)]
pub struct Flash<P: SelfProgram, const PAGE: usize> {
    hw: P,
}

impl<P: SelfProgram, const PAGE: usize> Flash<P, PAGE> {
    /// Wraps the self-programming hardware.
    pub fn new(hw: P) -> Self {
        Self { hw }
    }

    /// Page size in bytes.
    pub const fn page_size(&self) -> usize {
        PAGE
    }

    /// Base address of the page containing `address`.
    pub fn page_base(address: u32) -> u32 {
        address - address % PAGE as u32
    }

    /// Borrows the hardware.
    pub fn hw(&mut self) -> &mut P {
        &mut self.hw
    }

    /// Gives back the hardware.
    pub fn release(self) -> P {
        self.hw
    }

    /// Reads program memory starting at `address`.
    pub fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        self.hw.read(address, buf).map_err(|_| FlashError::Device)
    }

    /// Reads the whole page starting at the page-aligned `address`.
    pub fn read_page(&mut self, address: u32) -> Result<[u8; PAGE], FlashError> {
        if address % PAGE as u32 != 0 {
            return Err(FlashError::Unaligned(address));
        }
        let mut page = [ERASED_BYTE; PAGE];
        self.read(address, &mut page)?;
        Ok(page)
    }

    /// Erases the page at `address` and programs it with `data`.
    ///
    /// `data` is written as little-endian words from the start of the page; an
    /// odd trailing byte is padded with the erased value, and the rest of the page
    /// stays erased. The whole sequence runs with interrupts masked.
    ///
    /// # Errors
    /// - [`FlashError::Unaligned`] if `address` is not the start of a page
    /// - [`FlashError::TooLong`] if `data` is longer than a page
    /// - [`FlashError::Device`] if the hardware reports a failure
    pub fn write_page(&mut self, address: u32, data: &[u8]) -> Result<(), FlashError> {
        if address % PAGE as u32 != 0 {
            return Err(FlashError::Unaligned(address));
        }
        if data.len() > PAGE {
            return Err(FlashError::TooLong(data.len()));
        }
        let hw = &mut self.hw;
        critical_section::with(|_| -> Result<(), P::Error> {
            hw.erase_page(address)?;
            let mut offset = address;
            for chunk in data.chunks(2) {
                let high = chunk.get(1).copied().unwrap_or(ERASED_BYTE);
                hw.fill_word(offset, u16::from_le_bytes([chunk[0], high]))?;
                offset += 2;
            }
            hw.write_page(address)?;
            hw.enable_read()
        })
        .map_err(|_| {
            error!("flash: programming page {} failed", address);
            FlashError::Device
        })?;
        debug!("flash: wrote {} bytes at {}", data.len(), address);
        Ok(())
    }
}

/// [`SelfProgram`] over an `embedded-storage` NOR flash with `PAGE`-byte erase
/// units.
///
/// Filled words are staged in RAM and written with a single
/// [`NorFlash::write`] on commit. Offsets are relative to the start of `F`.
#[derive(Debug)]
pub struct NorFlashProgram<F: NorFlash, const PAGE: usize> {
    flash: F,
    staging: [u8; PAGE],
}

impl<F: NorFlash, const PAGE: usize> NorFlashProgram<F, PAGE> {
    /// Wraps `flash`. `PAGE` must be a multiple of `F::ERASE_SIZE` and `F::WRITE_SIZE`.
    pub fn new(flash: F) -> Self {
        Self {
            flash,
            staging: [ERASED_BYTE; PAGE],
        }
    }

    /// Borrows the underlying flash.
    pub fn flash(&mut self) -> &mut F {
        &mut self.flash
    }
}

impl<F: NorFlash, const PAGE: usize> SelfProgram for NorFlashProgram<F, PAGE> {
    type Error = F::Error;

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.flash.read(address, buf)
    }

    fn erase_page(&mut self, address: u32) -> Result<(), Self::Error> {
        self.staging = [ERASED_BYTE; PAGE];
        self.flash.erase(address, address + PAGE as u32)
    }

    fn fill_word(&mut self, address: u32, word: u16) -> Result<(), Self::Error> {
        let offset = address as usize % PAGE;
        self.staging[offset..offset + 2].copy_from_slice(&word.to_le_bytes());
        Ok(())
    }

    fn write_page(&mut self, address: u32) -> Result<(), Self::Error> {
        self.flash.write(address, &self.staging)
    }

    fn enable_read(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::sim::RamFlash;
    use super::*;

    type TestFlash = Flash<NorFlashProgram<RamFlash, 128>, 128>;

    fn flash() -> TestFlash {
        Flash::new(NorFlashProgram::new(RamFlash::new(1024)))
    }

    #[test]
    fn test_write_page_pads_odd_length() {
        let mut flash = flash();
        flash.write_page(256, &[1, 2, 3]).unwrap();
        let page = flash.read_page(256).unwrap();
        assert_eq!(&page[..4], &[1, 2, 3, 0xff]);
        assert!(page[4..].iter().all(|&b| b == 0xff));
        assert_eq!(flash.hw().flash().erases, &[256]);
        assert_eq!(flash.hw().flash().writes, &[256]);
    }

    #[test]
    fn test_rewrite_replaces_previous_content() {
        let mut flash = flash();
        flash.write_page(0, &[0x00; 128]).unwrap();
        flash.write_page(0, &[0xa5, 0x5a]).unwrap();
        let page = flash.read_page(0).unwrap();
        assert_eq!(&page[..2], &[0xa5, 0x5a]);
        assert_eq!(page[2], 0xff);
    }

    #[test]
    fn test_write_page_checks_arguments() {
        let mut flash = flash();
        assert_eq!(flash.write_page(130, &[0]), Err(FlashError::Unaligned(130)));
        assert_eq!(
            flash.write_page(128, &[0; 129]),
            Err(FlashError::TooLong(129))
        );
        assert!(flash.hw().flash().erases.is_empty());
    }

    #[test]
    fn test_device_failure_is_reported() {
        let mut flash = flash();
        flash.hw().flash().fail_writes = true;
        assert_eq!(flash.write_page(0, &[1, 2]), Err(FlashError::Device));
    }

    #[test]
    fn test_page_base() {
        assert_eq!(TestFlash::page_base(0), 0);
        assert_eq!(TestFlash::page_base(127), 0);
        assert_eq!(TestFlash::page_base(0x1234), 0x1200);
    }
}
