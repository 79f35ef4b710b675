//! # embedded-sdphy
//!
//! > An SD/SDIO line protocol engine written in Embedded Rust
//!
//! This crate turns byte- and block-oriented requests into the bit-serial
//! protocol spoken on an SD card's command and data lines, and decodes the
//! card's serial responses back into byte streams. It is written in
//! pure-Rust, is `#![no_std]` and does not use `alloc`.
//!
//! The engine is modelled at the cycle level. You call [`SdPhy::tick`] once
//! per control clock cycle; a divided-down line clock decides on which of
//! those ticks the protocol state machines advance. Requests go in, and
//! results come out, through single-slot handoff buffers.
//!
//! ## Using the crate
//!
//! You will need something that implements the [`Card`] trait, which samples
//! and drives the physical lines. In tests that is a card model, on real
//! hardware it is the pad/tristate layer.
//!
//! ```rust
//! use embedded_sdphy::{Card, CommandReadRequest, PadsIn, PadsOut, PhyOptions, SdPhy, StreamByte};
//!
//! struct Silent;
//!
//! impl Card for Silent {
//!     fn drive(&mut self) -> PadsIn {
//!         PadsIn::IDLE
//!     }
//!     fn clock(&mut self, _pads: &PadsOut) {}
//! }
//!
//! let mut phy = SdPhy::new(PhyOptions::default());
//! phy.set_clock_enable(true);
//! phy.write_command(StreamByte { data: 0x40, last: false }).unwrap();
//! let mut card = Silent;
//! while phy.step(&mut card).is_none() {}
//! phy.read_response(CommandReadRequest { length: 6, last: true }).unwrap();
//! ```
//!
//! ## Features
//!
//! * `log`: Enabled by default. Generates log messages using the `log` crate.
//! * `defmt-log`: By turning off the default features and enabling the
//!   `defmt-log` feature you can configure this crate to log messages over defmt
//!   instead.
//!
//! You cannot enable both the `log` feature and the `defmt-log` feature.

#![cfg_attr(not(test), no_std)]

#[cfg(test)]
#[macro_use]
extern crate hex_literal;

pub mod pads;
pub mod phy;
pub mod proto;
pub mod stream;

#[doc(inline)]
pub use crate::pads::{arbitrate, Card, NoCardDetect, PadsIn, PadsOut};

#[doc(inline)]
pub use crate::phy::{CrcStatus, Error, PhyOptions, SdPhy};

#[doc(inline)]
pub use crate::stream::{CommandReadRequest, DataReadRequest, Handoff, ReadByte, Status, StreamByte};

#[cfg(all(feature = "defmt-log", feature = "log"))]
compile_error!("Cannot enable both log and defmt-log");

#[cfg(feature = "log")]
use log::{debug, trace, warn};

#[cfg(feature = "defmt-log")]
use defmt::{debug, trace, warn};

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::debug! but does nothing at all
macro_rules! debug {
    ($($arg:tt)+) => {};
}

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::trace! but does nothing at all
macro_rules! trace {
    ($($arg:tt)+) => {};
}

#[cfg(all(not(feature = "defmt-log"), not(feature = "log")))]
#[macro_export]
/// Like log::warn! but does nothing at all
macro_rules! warn {
    ($($arg:tt)+) => {};
}

// ****************************************************************************
//
// End Of File
//
// ****************************************************************************
