// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! usbdm-core library
//!
//! Core types for a USBDM-style debug pod: result codes shared by every
//! layer, target family identification, cable state tracking, and register
//! definitions for the ARM SWD and Freescale BDM sides of the pod.
//!
//! The pod speaks two unrelated wire protocols, selected by the current
//! target family:
//!
//! ```text
//!      Host (command frames over USB/serial)
//! ----------------------------------------
//!              Command dispatcher
//!            /                  \
//!     SwdInterface            BdmLink
//!   (ARM Cortex targets)  (HCS12/HCS08/RS08/CFV1)
//!            \                  /
//!          SWDIO/SWCLK      BKGD/RESET
//! ```
//!
//! `usbdm-core` holds everything both sides and the dispatcher share, but
//! nothing wire-protocol specific.  See `usbdm-swd` and `usbdm-bdm` for the
//! protocol engines, and `usbdm-bin` for the command frame format.

#![no_std]

pub mod arm;
pub mod bdm;
pub mod state;

#[doc(inline)]
pub use crate::state::CableState;

extern crate alloc;
use core::fmt;
use serde::Serialize;

/// Result code used by every usbdm crate.
///
/// Each variant has a stable wire code, returned to the host in the first
/// byte of every response frame.  [`Error::code()`] and [`Error::from_code()`]
/// convert between the two.
///
/// Methods are provided to make it easier to handle errors, by checking if
/// either a retry or reset is required:
///
/// - [`Error::requires_retry()`]
/// - [`Error::requires_reset()`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Command parameters were out of range or inconsistent, for example a
    /// block transfer larger than the command buffer, or a register number
    /// the selected family does not have.
    IllegalParams,

    /// The operation failed for a reason with no more specific code, for
    /// example a mass erase that never completed.
    Fail,

    /// The command byte is not recognised, or is not valid for the currently
    /// selected target family.
    IllegalCommand,

    /// No working connection with the target.  On a BDM target this means
    /// the interface speed is unknown (sync failed and no speed was supplied
    /// by the host); on an SWD target it means the ACK field was neither
    /// OK, WAIT nor FAULT.
    NoConnection,

    /// Mass erase was requested but the target reports the feature disabled
    /// (MDM-AP status `MASS_ERASE_ENABLE` clear).
    MassEraseDisabled,

    /// Mass erase was requested before the target's flash controller
    /// reported ready.
    FlashNotReady,

    /// The target kept answering WAIT until the retry budget was exhausted.
    AckTimeout,

    /// A parity error was detected on SWD read data.  The data cannot be
    /// trusted.
    ArmParity,

    /// The target answered FAULT.  A sticky error is set in the debug port
    /// and must be cleared through the ABORT register before further
    /// transfers will succeed.
    ArmFault,

    /// A register read-back did not show the value just written, for example
    /// the MDM-AP control register dropping `MASS_ERASE_REQUEST`.
    UnexpectedResponse,

    /// A BDM hardware access failed, for example no ACKN pulse from a target
    /// which had previously acknowledged.
    HcsAccess,
}

impl Error {
    /// Returns the wire code for this error, as carried in the first byte of
    /// a response frame.  `0x00` always means success and is never produced
    /// by an `Error` value.
    pub fn code(&self) -> u8 {
        match self {
            Error::IllegalParams => 1,
            Error::Fail => 2,
            Error::IllegalCommand => 4,
            Error::NoConnection => 5,
            Error::MassEraseDisabled => 8,
            Error::FlashNotReady => 9,
            Error::AckTimeout => 30,
            Error::ArmParity => 49,
            Error::ArmFault => 50,
            Error::UnexpectedResponse => 51,
            Error::HcsAccess => 52,
        }
    }

    /// Decodes a wire code.  `0x00` decodes to `Ok(())`, an unknown code to
    /// `Err(Error::Fail)`.
    pub fn from_code(code: u8) -> Result<(), Error> {
        match code {
            0 => Ok(()),
            1 => Err(Error::IllegalParams),
            2 => Err(Error::Fail),
            4 => Err(Error::IllegalCommand),
            5 => Err(Error::NoConnection),
            8 => Err(Error::MassEraseDisabled),
            9 => Err(Error::FlashNotReady),
            30 => Err(Error::AckTimeout),
            49 => Err(Error::ArmParity),
            50 => Err(Error::ArmFault),
            51 => Err(Error::UnexpectedResponse),
            52 => Err(Error::HcsAccess),
            _ => Err(Error::Fail),
        }
    }

    /// Returns true if the error means the target must be reset or
    /// reconnected before further operations can succeed.
    pub fn requires_reset(&self) -> bool {
        matches!(
            self,
            Error::NoConnection | Error::ArmFault | Error::ArmParity | Error::HcsAccess
        )
    }

    /// Returns true if the error is transient and the operation can simply
    /// be retried.
    pub fn requires_retry(&self) -> bool {
        matches!(self, Error::AckTimeout)
    }

    /// Returns true if the error requires neither a reset nor a retry.
    /// Normally this means an application error - the API has probably been
    /// used incorrectly, or the request does not apply to this target.
    pub fn requires_other(&self) -> bool {
        !self.requires_reset() && !self.requires_retry()
    }

    /// Returns a string representation of the error.
    pub fn as_str(&self) -> &'static str {
        match self {
            Error::IllegalParams => "Illegal Parameters",
            Error::Fail => "Failed",
            Error::IllegalCommand => "Illegal Command",
            Error::NoConnection => "No Connection",
            Error::MassEraseDisabled => "Mass Erase Disabled",
            Error::FlashNotReady => "Flash Not Ready",
            Error::AckTimeout => "ACK Timeout",
            Error::ArmParity => "ARM Parity Error",
            Error::ArmFault => "ARM Fault",
            Error::UnexpectedResponse => "Unexpected Response",
            Error::HcsAccess => "BDM Access Error",
        }
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("Error", 2)?;
        state.serialize_field("code", &self.code())?;
        state.serialize_field("kind", self.as_str())?;
        state.end()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Target family selected by the host.
///
/// The family decides which protocol engine a command frame is routed to,
/// and within the BDM engine which opcode set and memory access strategy
/// are used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetFamily {
    /// Freescale HCS12, word-oriented 16-bit BDM with banked global memory
    Hcs12,
    /// Freescale HCS08, byte-oriented 8-bit BDM
    Hcs08,
    /// Freescale RS08, rides the HCS08 BDM engine
    Rs08,
    /// Freescale ColdFire V1, single-wire BDM with 32-bit addressing
    Cfv1,
    /// ARM Cortex via Serial Wire Debug
    ArmSwd,
}

impl TargetFamily {
    /// Returns true if the family is driven by the BDM engine.
    pub fn is_bdm(&self) -> bool {
        !matches!(self, TargetFamily::ArmSwd)
    }

    /// Decodes the family selector byte of a set-target command.
    pub fn from_byte(byte: u8) -> Result<TargetFamily, Error> {
        match byte {
            0 => Ok(TargetFamily::Hcs12),
            1 => Ok(TargetFamily::Hcs08),
            2 => Ok(TargetFamily::Rs08),
            3 => Ok(TargetFamily::Cfv1),
            10 => Ok(TargetFamily::ArmSwd),
            _ => Err(Error::IllegalParams),
        }
    }

    /// Returns the family selector byte.
    pub fn to_byte(&self) -> u8 {
        match self {
            TargetFamily::Hcs12 => 0,
            TargetFamily::Hcs08 => 1,
            TargetFamily::Rs08 => 2,
            TargetFamily::Cfv1 => 3,
            TargetFamily::ArmSwd => 10,
        }
    }

    /// Returns a string representation of the family.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFamily::Hcs12 => "HCS12",
            TargetFamily::Hcs08 => "HCS08",
            TargetFamily::Rs08 => "RS08",
            TargetFamily::Cfv1 => "CFV1",
            TargetFamily::ArmSwd => "ARM-SWD",
        }
    }
}

impl fmt::Display for TargetFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the current BDM communication speed was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpeedStatus {
    /// Speed unknown, no communication is possible until a connect or an
    /// explicit speed from the host
    NoInfo,
    /// Speed measured from the target's SYNC response
    Sync,
    /// Speed supplied by the host, unverified
    UserSupplied,
}

/// Whether the BDM hardware ACKN protocol is in use.
///
/// After a successful ACKN probe the target strobes an acknowledge pulse at
/// the end of each command and the pod waits for it; otherwise a fixed
/// worst-case delay is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AcknMode {
    /// Target acknowledges each command with an ACKN pulse
    Ackn,
    /// No ACKN, fall back on fixed delays
    Wait,
}

/// Reset method requested by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMethod {
    /// Drive the RESET line
    Hardware,
    /// Issue the family's software reset sequence over BDM
    Software,
    /// Cycle target power
    Power,
    /// Whatever the pod considers best for the target
    All,
}

impl ResetMethod {
    /// Decodes the method field of a reset command byte.
    pub fn from_byte(byte: u8) -> Result<ResetMethod, Error> {
        match byte & 0x0C {
            0x00 => Ok(ResetMethod::Software),
            0x04 => Ok(ResetMethod::Hardware),
            0x08 => Ok(ResetMethod::Power),
            0x0C => Ok(ResetMethod::All),
            _ => Err(Error::IllegalParams),
        }
    }
}

/// Reset mode: where the target ends up after the reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    /// Halted in background debug mode
    Special,
    /// Running user code
    Normal,
}

impl ResetMode {
    /// Decodes the mode field of a reset command byte.
    pub fn from_byte(byte: u8) -> ResetMode {
        if byte & 0x01 == 0 {
            ResetMode::Special
        } else {
            ResetMode::Normal
        }
    }
}

/// Memory space/element-size byte used by block memory commands.
///
/// The low nibble carries the element size in bytes, the high nibble carries
/// addressing flags.
pub mod memory_space {
    /// Element size mask (1, 2 or 4)
    pub const SIZE: u8 = 0x0F;
    /// Use the fast block access path where the family supports one
    pub const FAST: u8 = 0x80;
    /// Address space selector mask
    pub const SPACE: u8 = 0x70;
    /// HCS12 global (banked) address space, routed through BDMPPR
    pub const GLOBAL: u8 = 0x40;
}
