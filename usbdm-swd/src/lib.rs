// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! usbdm-swd library
//!
//! ARM Serial Wire Debug (SWD) engine for the USBDM pod, including the
//! Kinetis mass erase recovery sequence used to unsecure locked parts.
//!
//! The following diagram shows the key `usbdm-swd` concepts.
//!
//! ```text
//!        Command dispatcher (usbdm crate)
//!      ----------------------------------
//!               SwdInterface              \
//!      ----------------------------------  |-- Error (usbdm-core)
//!               SwdProtocol               /
//!      ----------------------------------
//!            SwdDriver (pin driver)
//!      ----------------------------------
//!          SWDIO/SWCLK  >========<  SWD Target
//! ```
//!
//! * [`SwdInterface`] performs individual SWD operations - register reads
//!   and writes, connect, error recovery - and the mass erase composite
//!   (see [`recovery`]).
//! * [`SwdProtocol`] frames requests, acknowledges and data on the wire.
//! * [`SwdDriver`] shifts raw bits and owns the pins.  [`bitbang::BitBang`]
//!   is a reference implementation over `embedded-hal` pins; a port
//!   supplies its own driver when it can do better (SPI assist, PIO).
//!
//! Register-level access is strongly typed via the descriptor traits in
//! `usbdm_core::arm::register`; raw `u32` access is also available for the
//! host passthrough commands.

#![no_std]

pub mod bitbang;
pub mod driver;
pub mod interface;
pub mod protocol;
pub mod recovery;

#[doc(inline)]
pub use crate::driver::SwdDriver;
#[doc(inline)]
pub use crate::interface::SwdInterface;
#[doc(inline)]
pub use crate::protocol::SwdProtocol;

extern crate alloc;

/// Simulated SWD target.  Compiled for this crate's own tests and, with
/// the `sim` feature, for dependants' test suites.
#[cfg(any(test, feature = "sim"))]
pub mod sim;

/// Tuning knobs for the SWD engine.
///
/// The defaults suit a dedicated pod driving real hardware.  Hosts that
/// want bounded behaviour, for instance a recovery loop that gives up
/// rather than running until the target appears, override the relevant
/// field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwdConfig {
    /// Total attempts for an operation answered with WAIT before giving up
    /// with `Error::AckTimeout`
    pub ack_wait_retries: u32,

    /// Consecutive clean connect/hold-reset rounds required before the
    /// recovery sequence commits to a mass erase
    pub settle_count: u32,

    /// Poll limit on MDM-AP status flash-ready during mass erase
    pub flash_ready_polls: u32,

    /// Poll limit on mass erase completion
    pub erase_polls: u32,

    /// Attempt budget for the recovery connect loop.  `None` keeps trying
    /// for as long as it takes, which is the behaviour wanted on a
    /// dedicated pod - the user plugs the target in whenever they are
    /// ready.
    pub connect_attempt_limit: Option<u32>,
}

impl Default for SwdConfig {
    fn default() -> Self {
        SwdConfig {
            ack_wait_retries: 2000,
            settle_count: 100,
            flash_ready_polls: 10_000,
            erase_polls: 10_000,
            connect_attempt_limit: None,
        }
    }
}
