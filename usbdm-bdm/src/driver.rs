// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! BDM pin driver trait.
//!
//! Everything timing critical about the single-wire BKGD protocol lives
//! behind this trait: SYNC pulse measurement, per-bit timing, ACKN pulse
//! detection and reset line generation.  [`BdmLink`](crate::BdmLink) and
//! the family engines only deal in whole command transactions.

use usbdm_core::{Error, ResetMethod};

/// Drives the BKGD and RESET pins of a BDM target.
///
/// A BDM command is a fixed byte sequence: opcode, parameters, then any
/// returned bytes, all MSB-first on the wire.  [`transact`](BdmDriver::transact)
/// performs one whole command, inserting the ACKN wait (or the fixed
/// fallback delay) between the transmit and receive phases.
pub trait BdmDriver {
    /// Issue a SYNC request and measure the target's response pulse.
    /// Returns the pulse length in pod timer ticks, the unit carried in
    /// speed commands.  Fails with `Error::NoConnection` if no target
    /// answers.
    fn sync(&mut self) -> Result<u16, Error>;

    /// Configure bit timing from a SYNC length.  Fails with
    /// `Error::NoConnection` if no timing table entry covers the value.
    fn select_timing(&mut self, sync_length: u16) -> Result<(), Error>;

    /// Drop the timing configuration; communication speed is no longer
    /// known.
    fn deselect_timing(&mut self);

    /// Send the family's ACK_ENABLE command and watch for the ACKN pulse.
    /// Returns true if the target acknowledged.
    fn enable_ackn(&mut self, opcode: u8) -> Result<bool, Error>;

    /// Execute one BDM command: shift out `tx`, wait for ACKN or the
    /// fallback delay, shift `rx.len()` bytes back in.
    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), Error>;

    /// Apply a reset.  `special` holds BKGD low through the reset so the
    /// target stops in active background mode instead of running.
    fn reset_line(&mut self, method: ResetMethod, special: bool) -> Result<(), Error>;

    /// Busy wait
    fn delay_ms(&mut self, ms: u32);
}
