//! # waveboot
//!
//! A portable, no_std over-the-air bootloader for small field nodes that only have a
//! cheap 433 MHz ASK/OOK transmitter and receiver pair (FS1000A, XY-MK-5V and friends).
//!
//! The crate is built from two halves:
//!
//! - a software ASK modem: bit-banged transmission, a software PLL for clock
//!   recovery, 4b6b symbol encoding and CRC16 frame validation
//! - a flash programming engine and boot state machine that turn received update
//!   records into program memory pages, guarded by a persistent recovery marker
//!
//! ## Crate features
//! | Feature               | Description |
//! |-----------------------|-------------|
//! | `std`                 | Disables `#![no_std]` (used for host-side tests) |
//! | `delay-loop`          | Provides [`timer::PolledRadio`], driven by `embedded_hal::delay::DelayNs` |
//! | `timer-isr` (default) | Provides [`timer::RadioHandle`] for a timer interrupt driven modem |
//! | `defmt-0-3`           | Uses `defmt` logging |
//! | `log`                 | Uses `log` logging |
//!
//! ## Boot flow
//!
//! ```text
//! Start -> Evaluate -> Listening -----(no BOOT)-----> Application
//!            ^   \         |(BOOT)
//!            |    Recovery-+-> Programming --(DNE)--> Application
//!            +---------------------(failure)-+
//! ```
//!
//! A board crate implements [`bootloader::Board`], [`flash::SelfProgram`] and
//! [`timebase::Millis`], wires the radio timer interrupt to
//! [`timer::RadioHandle::tick`] and hands everything to
//! [`bootloader::Bootloader::boot`].
//!
//! ## Integration Notes
//!
//! - Transmit and receive timing are based on a 2 kbps bit rate with 8 ticks per bit (62.5 µs)
//! - Flash page commits mask interrupts, so the radio drops samples while a page is written
//! - The bootloader never runs an image while the recovery marker is set

#![deny(
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results
)]
#![cfg_attr(not(feature = "std"), no_std)]

pub use critical_section;
pub use heapless;

#[macro_use]
mod fmt;

pub mod bootloader;
pub mod config;
pub mod consts;
pub(crate) mod crc;
pub mod driver;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod flash;
pub mod frame;
pub mod modem;
pub mod pll;
pub mod record;
pub mod recovery;
pub mod timebase;
pub mod timer;
