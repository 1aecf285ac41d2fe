// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! usbdm-bdm library
//!
//! Freescale Background Debug Mode (BDM) engine for the USBDM pod,
//! covering the HCS12, HCS08, RS08 and ColdFire V1 families.
//!
//! The following diagram shows the key `usbdm-bdm` concepts.
//!
//! ```text
//!        Command dispatcher (usbdm crate)
//!      ----------------------------------
//!          hcs12 / hcs08 / cfv1 engines   \
//!      ----------------------------------  |-- Error (usbdm-core)
//!                  BdmLink                /
//!      ----------------------------------
//!            BdmDriver (pin driver)
//!      ----------------------------------
//!            BKGD/RESET  >=====<  BDM Target
//! ```
//!
//! * The family modules ([`hcs12`], [`hcs08`], [`cfv1`]) implement memory
//!   and register access in each family's dialect.  RS08 rides the HCS08
//!   engine with a restricted register set.
//! * [`BdmLink`] owns the cable state - measured speed, ACKN mode, the
//!   HCS12 page register cache - and the family-independent operations:
//!   connect, speed, status/control, reset, go/halt/step.
//! * [`BdmDriver`] shifts command bytes on BKGD and owns the timing
//!   critical pieces: SYNC measurement, bit timing, ACKN detection and
//!   reset generation.

#![no_std]

pub mod cfv1;
pub mod driver;
pub mod hcs08;
pub mod hcs12;
pub mod link;

#[doc(inline)]
pub use crate::driver::BdmDriver;
#[doc(inline)]
pub use crate::link::BdmLink;

extern crate alloc;

/// Simulated BDM target.  Compiled for this crate's own tests and, with
/// the `sim` feature, for dependants' test suites.
#[cfg(any(test, feature = "sim"))]
pub mod sim;

/// BDM clock source selection for the target's debug module.
///
/// Some parts come out of reset clocking their BDM logic from a slow
/// self-timed source.  Forcing the alternate (bus) clock speeds the
/// interface up considerably, at the cost of a re-sync whenever the bus
/// clock changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockSelect {
    /// Leave the target's reset default alone
    #[default]
    Default,
    /// Force the alternate (bus) clock
    AltClock,
    /// Force the standard BDM clock
    NormalClock,
}

/// Host-settable BDM behaviour options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BdmOptions {
    /// BDM clock source applied on connect
    pub clock: ClockSelect,
}
