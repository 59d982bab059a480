//! Persistent recovery marker.
//!
//! Four bytes at the top of program memory. While they hold [`RECOVERY_MAGIC`]
//! (little-endian) an update is in progress or was left incomplete, and the
//! bootloader must not start the application. Any other value, normally the
//! erased `0xff_ff_ff_ff`, means the application image can be trusted.
//!
//! The marker shares its page with other data, so it is updated by reading the
//! whole page, patching the four bytes and writing the page back.

use crate::config::BootConfig;
use crate::consts::{ERASED_BYTE, RECOVERY_MAGIC, RECOVERY_MARKER_LEN};
use crate::error::FlashError;
use crate::flash::{Flash, SelfProgram};

/// Location of the recovery marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct RecoveryMarker {
    address: u32,
}

impl RecoveryMarker {
    /// Marker at `address`. The four bytes must not cross a page boundary.
    pub const fn new(address: u32) -> Self {
        Self { address }
    }

    /// Marker at the location given by `config`.
    pub const fn from_config(config: &BootConfig) -> Self {
        Self::new(config.recovery_marker_address())
    }

    /// Byte address of the marker.
    pub const fn address(&self) -> u32 {
        self.address
    }

    /// True while an update is in progress or incomplete.
    pub fn is_set<P: SelfProgram, const PAGE: usize>(
        &self,
        flash: &mut Flash<P, PAGE>,
    ) -> Result<bool, FlashError> {
        let mut bytes = [0u8; RECOVERY_MARKER_LEN];
        flash.read(self.address, &mut bytes)?;
        Ok(u32::from_le_bytes(bytes) == RECOVERY_MAGIC)
    }

    /// Flags the image as incomplete.
    pub fn set<P: SelfProgram, const PAGE: usize>(
        &self,
        flash: &mut Flash<P, PAGE>,
    ) -> Result<(), FlashError> {
        info!("recovery: marker set");
        self.store(flash, RECOVERY_MAGIC.to_le_bytes())
    }

    /// Flags the image as trustworthy.
    pub fn clear<P: SelfProgram, const PAGE: usize>(
        &self,
        flash: &mut Flash<P, PAGE>,
    ) -> Result<(), FlashError> {
        info!("recovery: marker cleared");
        self.store(flash, [ERASED_BYTE; RECOVERY_MARKER_LEN])
    }

    fn store<P: SelfProgram, const PAGE: usize>(
        &self,
        flash: &mut Flash<P, PAGE>,
        value: [u8; RECOVERY_MARKER_LEN],
    ) -> Result<(), FlashError> {
        let base = Flash::<P, PAGE>::page_base(self.address);
        let offset = (self.address - base) as usize;
        if offset + RECOVERY_MARKER_LEN > PAGE {
            return Err(FlashError::Unaligned(self.address));
        }
        let mut page = flash.read_page(base)?;
        page[offset..offset + RECOVERY_MARKER_LEN].copy_from_slice(&value);
        flash.write_page(base, &page)
    }
}
