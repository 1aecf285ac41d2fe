// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM SWD Wire Protocol Implementation
//!
//! This module frames SWD transfers on top of an [`SwdDriver`]: request
//! bytes, acknowledge cycles, data phases with parity, turnarounds and the
//! JTAG-to-SWD mode switch.  It provides the `SwdProtocol` struct used by
//! [`SwdInterface`](crate::SwdInterface); applications are not expected to
//! use it directly.

use core::result::Result;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::driver::SwdDriver;
use usbdm_core::Error;

// JTAG-to-SWD sequence as documented: 0111100111100111
const JTAG_TO_SWD_DOCUMENTED: u16 = 0b0111100111100111; // 0x79E7

// Reversed for SWD LSB-first transmission
const JTAG_TO_SWD_SEQUENCE: u16 = JTAG_TO_SWD_DOCUMENTED.reverse_bits(); // 0xE79E

// 50+ clock cycles with SWDIO high
const LINE_RESET_SWDIO_HIGH_CYCLES: usize = 51;

// Minimum 8 idle clocks after an operation
const POST_OPERATION_IDLE_CYCLES: usize = 8;

/// Target acknowledge field of an SWD transfer.
///
/// Only [`Ack::Ok`] lets the transfer proceed to a data phase.  `Wait` is
/// transient and retried by the interface layer; anything else aborts the
/// operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ack {
    Ok,
    Wait,
    Fault,
    Invalid(u8),
}

impl Ack {
    /// Decode the 4 bits clocked in after a request: one turnaround cycle
    /// of junk, then the 3-bit acknowledge LSB first.
    fn from_nibble(nibble: u8) -> Self {
        match (nibble >> 1) & 0x7 {
            1 => Ack::Ok,
            2 => Ack::Wait,
            4 => Ack::Fault,
            ack => Ack::Invalid(ack),
        }
    }
}

/// SWD Protocol object
///
/// Owns the pin driver and implements the wire-level pieces of every SWD
/// transfer.  The interface layer sequences these into whole operations.
pub struct SwdProtocol<D> {
    driver: D,
}

impl<D: SwdDriver> SwdProtocol<D> {
    /// Create a new SWD protocol instance over a pin driver.
    pub fn new(driver: D) -> Self {
        SwdProtocol { driver }
    }

    /// Consumes the protocol, returning the driver
    pub fn release(self) -> D {
        self.driver
    }

    /// Direct driver access for tests
    #[cfg(any(test, feature = "sim"))]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Busy wait, passed through to the driver
    pub(crate) fn delay_ms(&mut self, ms: u32) {
        self.driver.delay_ms(ms);
    }

    /// Send a request byte.  The line must be idle (pod driving).
    pub(crate) fn send_request(&mut self, cmd: u8) {
        self.driver.swdio_output();
        self.driver.write_bits(8, cmd as u64);
    }

    /// Re-send a request after a WAIT.  The target released the line after
    /// acknowledging, so one driven turnaround bit precedes the request.
    pub(crate) fn resend_request(&mut self, cmd: u8) {
        self.driver.swdio_output();
        self.driver.write_bits(9, ((cmd as u64) << 1) | 1);
    }

    /// Read the turnaround and acknowledge cycles following a request
    pub(crate) fn read_ack(&mut self) -> Ack {
        self.driver.swdio_input();
        let nibble = self.driver.read_bits(4) as u8;
        Ack::from_nibble(nibble)
    }

    /// Data phase of a read: 32 data bits and parity from the target, then
    /// take the line back and run the idle clocks
    pub(crate) fn read_data_parity(&mut self) -> Result<u32, Error> {
        let bits = self.driver.read_bits(33);
        let data = (bits & 0xFFFF_FFFF) as u32;
        let parity = (bits >> 32) & 1 == 1;

        // Take the line back and idle whether or not parity checks out -
        // the target doesn't know anything went wrong
        self.idle_clocks();

        if calculate_parity(data) != parity {
            debug!("SWD read parity error: data=0x{data:08X}, parity={parity}");
            return Err(Error::ArmParity);
        }
        Ok(data)
    }

    /// Data phase of a write: driven turnaround bit, 32 data bits and
    /// parity, then the idle clocks
    pub(crate) fn write_data_parity(&mut self, data: u32) {
        let mut bits = ((data as u64) << 1) | 1;
        if calculate_parity(data) {
            bits |= 1 << 33;
        }
        self.driver.swdio_output();
        self.driver.write_bits(34, bits);
        self.idle_clocks();
    }

    /// Abandon a transfer after a FAULT or invalid acknowledge: take the
    /// line back and idle so the next request starts clean
    pub(crate) fn recover_to_idle(&mut self) {
        self.driver.swdio_output();
        self.idle_clocks();
    }

    /// Run the post-operation idle clocks with SWDIO low
    pub(crate) fn idle_clocks(&mut self) {
        self.driver.swdio_output();
        self.driver.write_bits(POST_OPERATION_IDLE_CYCLES, 0);
    }

    /// 50+ clocks with SWDIO high, resetting the target's SWD state machine
    pub(crate) fn line_reset(&mut self) {
        self.driver.swdio_output();
        self.driver.write_bits(LINE_RESET_SWDIO_HIGH_CYCLES, u64::MAX);
    }

    /// Switch the target's debug pins from JTAG to SWD: line reset, the
    /// documented 16-bit switch sequence, another line reset, then idle
    /// clocks so the first request starts from a clean bus
    pub(crate) fn jtag_to_swd(&mut self) {
        self.line_reset();
        self.driver.write_bits(16, JTAG_TO_SWD_SEQUENCE as u64);
        self.line_reset();
        self.idle_clocks();
    }
}

/// Calculate SWD parity - 1 for an odd number of bits set to 1, 0 otherwise.
pub(crate) fn calculate_parity<T>(value: T) -> bool
where
    T: Into<u64>,
{
    (value.into().count_ones() % 2) == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parity_of_known_values() {
        assert!(!calculate_parity(0u32));
        assert!(calculate_parity(1u32));
        assert!(!calculate_parity(0xFFFF_FFFFu32));
        assert!(calculate_parity(0x8000_0001u32 ^ 0x1u32));
    }

    #[test]
    fn single_bit_flip_changes_parity() {
        let data = 0x1BA0_1477u32;
        let parity = calculate_parity(data);
        for bit in 0..32 {
            assert_ne!(parity, calculate_parity(data ^ (1u32 << bit)));
        }
    }

    #[test]
    fn ack_decoding() {
        // Turnaround junk in bit 0 must be ignored
        assert_eq!(Ack::from_nibble(0b0010), Ack::Ok);
        assert_eq!(Ack::from_nibble(0b0011), Ack::Ok);
        assert_eq!(Ack::from_nibble(0b0100), Ack::Wait);
        assert_eq!(Ack::from_nibble(0b1000), Ack::Fault);
        assert_eq!(Ack::from_nibble(0b1110), Ack::Invalid(7));
    }

    #[test]
    fn jtag_to_swd_sequence_value() {
        assert_eq!(JTAG_TO_SWD_SEQUENCE, 0xE79E);
    }
}
