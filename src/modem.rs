//! Foreground interface to the radio.
//!
//! The bootloader and programming engine talk to the radio only through
//! [`Modem`], so the same state machines run on an interrupt-driven
//! [`RadioHandle`](crate::timer::RadioHandle), a polled
//! [`PolledRadio`](crate::timer::PolledRadio), or a test double.

use crate::error::RadioError;

/// Byte-oriented, half-duplex radio access.
pub trait Modem {
    /// Brings the modem into a known idle state.
    ///
    /// # Errors
    /// [`RadioError::NotInitialized`] when no driver sits behind the modem.
    fn init(&mut self) -> Result<(), RadioError>;

    /// Sends `payload` as one frame.
    ///
    /// Blocks while a previous transmission is still running, then returns as
    /// soon as the new frame is queued.
    ///
    /// # Errors
    /// [`RadioError::PayloadTooLong`] if `payload` does not fit into a frame.
    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError>;

    /// Blocks until the current transmission, if any, is complete.
    fn wait_packet_send(&mut self);

    /// True when a valid frame addressed to this node is waiting.
    fn available(&mut self) -> bool;

    /// Non-blocking receive. Copies the payload of a pending frame into `buf`,
    /// trimmed to its length, and returns the number of bytes copied.
    fn recv(&mut self, buf: &mut [u8]) -> Option<usize>;

    /// Sends `payload` and waits for it to leave the antenna.
    fn reply(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.send(payload)?;
        self.wait_packet_send();
        Ok(())
    }
}

impl<M: Modem + ?Sized> Modem for &mut M {
    fn init(&mut self) -> Result<(), RadioError> {
        (**self).init()
    }

    fn send(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        (**self).send(payload)
    }

    fn wait_packet_send(&mut self) {
        (**self).wait_packet_send()
    }

    fn available(&mut self) -> bool {
        (**self).available()
    }

    fn recv(&mut self, buf: &mut [u8]) -> Option<usize> {
        (**self).recv(buf)
    }
}
