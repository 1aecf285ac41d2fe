// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! usbdm-bin - USBDM command frame format, shared pod/host constants and
//! types.
//!
//! Commands arrive from the host as a single frame in a fixed-size buffer.
//! The response is built in the same buffer:
//!
//! ```text
//!   request:   [0] command byte   [2..] parameters
//!   response:  [0] result code    [1..] data
//! ```
//!
//! Parameter layouts per command group (all multi-byte fields big-endian):
//!
//! ```text
//!   memory:    [2] element size/space   [3] count
//!              [4..8] address           [8..] write data
//!   register:  [2..4] register number   [4..8] write value
//!   speed:     [2..4] sync length
//!   reset:     [2] method/mode byte
//!   target:    [2] family byte
//!   control:   [2] control byte
//! ```
//!
//! [`CommandFrame`] wraps the buffer and provides bounds-checked accessors
//! for both directions.  Because request and response share the buffer, a
//! handler must read all its parameters before writing any response data.
//!
//! This crate is `no_std` and platform agnostic.

#![no_std]

use core::fmt;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use static_assertions::const_assert;
use usbdm_core::Error;

/// Size of the command buffer, and so the largest possible frame
pub const MAX_COMMAND_SIZE: usize = 254;

/// Largest byte count for a block read: every data byte plus the result
/// code must fit in one response frame
pub const MAX_READ_BYTES: usize = MAX_COMMAND_SIZE - 1;

/// Largest byte count for a block write, data starts at [`MEM_DATA_OFFSET`]
pub const MAX_WRITE_BYTES: usize = MAX_COMMAND_SIZE - MEM_DATA_OFFSET;

/// First parameter byte of a request
pub const PARAM_OFFSET: usize = 2;
/// Element size/space byte of a memory command
pub const MEM_SPACE_OFFSET: usize = 2;
/// Byte count of a memory command
pub const MEM_COUNT_OFFSET: usize = 3;
/// 32-bit address of a memory command
pub const MEM_ADDR_OFFSET: usize = 4;
/// Write data of a memory command
pub const MEM_DATA_OFFSET: usize = 8;
/// 16-bit register number of a register command
pub const REG_NO_OFFSET: usize = 2;
/// 32-bit value of a register write
pub const REG_VALUE_OFFSET: usize = 4;
/// First data byte of a response
pub const REPLY_DATA_OFFSET: usize = 1;

const_assert!(MEM_DATA_OFFSET < MAX_COMMAND_SIZE);
const_assert!(REG_VALUE_OFFSET + 4 <= MAX_COMMAND_SIZE);

/// Command bytes
pub const CMD_SET_TARGET: u8 = 1;
pub const CMD_CONNECT: u8 = 15;
pub const CMD_SET_SPEED: u8 = 16;
pub const CMD_GET_SPEED: u8 = 17;
pub const CMD_READ_STATUS_REG: u8 = 20;
pub const CMD_WRITE_CONTROL_REG: u8 = 21;
pub const CMD_TARGET_RESET: u8 = 22;
pub const CMD_TARGET_STEP: u8 = 23;
pub const CMD_TARGET_GO: u8 = 24;
pub const CMD_TARGET_HALT: u8 = 25;
pub const CMD_WRITE_REG: u8 = 26;
pub const CMD_READ_REG: u8 = 27;
pub const CMD_WRITE_DREG: u8 = 30;
pub const CMD_READ_DREG: u8 = 31;
pub const CMD_WRITE_MEM: u8 = 32;
pub const CMD_READ_MEM: u8 = 33;
pub const CMD_MASS_ERASE: u8 = 64;

/// Result code for success, never produced by [`Error`]
pub const RSP_OK: u8 = 0;

/// Single byte command codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    SetTarget = CMD_SET_TARGET,
    Connect = CMD_CONNECT,
    SetSpeed = CMD_SET_SPEED,
    GetSpeed = CMD_GET_SPEED,
    ReadStatusReg = CMD_READ_STATUS_REG,
    WriteControlReg = CMD_WRITE_CONTROL_REG,
    TargetReset = CMD_TARGET_RESET,
    TargetStep = CMD_TARGET_STEP,
    TargetGo = CMD_TARGET_GO,
    TargetHalt = CMD_TARGET_HALT,
    WriteReg = CMD_WRITE_REG,
    ReadReg = CMD_READ_REG,
    WriteDreg = CMD_WRITE_DREG,
    ReadDreg = CMD_READ_DREG,
    WriteMem = CMD_WRITE_MEM,
    ReadMem = CMD_READ_MEM,
    MassErase = CMD_MASS_ERASE,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetTarget => write!(f, "Set Target"),
            Command::Connect => write!(f, "Connect"),
            Command::SetSpeed => write!(f, "Set Speed"),
            Command::GetSpeed => write!(f, "Get Speed"),
            Command::ReadStatusReg => write!(f, "Read Status Register"),
            Command::WriteControlReg => write!(f, "Write Control Register"),
            Command::TargetReset => write!(f, "Target Reset"),
            Command::TargetStep => write!(f, "Target Step"),
            Command::TargetGo => write!(f, "Target Go"),
            Command::TargetHalt => write!(f, "Target Halt"),
            Command::WriteReg => write!(f, "Write Register"),
            Command::ReadReg => write!(f, "Read Register"),
            Command::WriteDreg => write!(f, "Write Debug Register"),
            Command::ReadDreg => write!(f, "Read Debug Register"),
            Command::WriteMem => write!(f, "Write Memory"),
            Command::ReadMem => write!(f, "Read Memory"),
            Command::MassErase => write!(f, "Mass Erase"),
        }
    }
}

impl Command {
    /// Converts a Command to its byte representation
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Convert a command byte to a `Command` enum variant
    ///
    /// Returns:
    /// - `Ok(Command)`: If the command byte is recognized.
    /// - `Err(Error::IllegalCommand)`: If it is not.
    pub fn from_byte(cmd: u8) -> Result<Self, Error> {
        match cmd {
            CMD_SET_TARGET => Ok(Self::SetTarget),
            CMD_CONNECT => Ok(Self::Connect),
            CMD_SET_SPEED => Ok(Self::SetSpeed),
            CMD_GET_SPEED => Ok(Self::GetSpeed),
            CMD_READ_STATUS_REG => Ok(Self::ReadStatusReg),
            CMD_WRITE_CONTROL_REG => Ok(Self::WriteControlReg),
            CMD_TARGET_RESET => Ok(Self::TargetReset),
            CMD_TARGET_STEP => Ok(Self::TargetStep),
            CMD_TARGET_GO => Ok(Self::TargetGo),
            CMD_TARGET_HALT => Ok(Self::TargetHalt),
            CMD_WRITE_REG => Ok(Self::WriteReg),
            CMD_READ_REG => Ok(Self::ReadReg),
            CMD_WRITE_DREG => Ok(Self::WriteDreg),
            CMD_READ_DREG => Ok(Self::ReadDreg),
            CMD_WRITE_MEM => Ok(Self::WriteMem),
            CMD_READ_MEM => Ok(Self::ReadMem),
            CMD_MASS_ERASE => Ok(Self::MassErase),
            _ => {
                debug!("Invalid command byte: {cmd}");
                Err(Error::IllegalCommand)
            }
        }
    }
}

/// A command frame in the shared request/response buffer.
///
/// The dispatcher hands a `CommandFrame` to one handler per command.  The
/// handler reads parameters with the `u8_at`/`u16_at`/`u32_at`/`bytes`
/// accessors, writes its response with the `set_*` accessors, then declares
/// the response length.  The result code at byte 0 is filled in by the
/// dispatcher from the handler's `Result`.
pub struct CommandFrame<'a> {
    buf: &'a mut [u8],
    response_len: usize,
}

impl<'a> CommandFrame<'a> {
    /// Wraps a received frame.  The buffer must hold at least the command
    /// byte; responses always include at least the result code.
    pub fn new(buf: &'a mut [u8]) -> Result<Self, Error> {
        if buf.is_empty() || buf.len() > MAX_COMMAND_SIZE {
            return Err(Error::IllegalParams);
        }
        Ok(CommandFrame {
            buf,
            response_len: 1,
        })
    }

    /// Decode the command byte
    pub fn command(&self) -> Result<Command, Error> {
        Command::from_byte(self.buf[0])
    }

    /// Parameter byte at `offset`
    pub fn u8_at(&self, offset: usize) -> Result<u8, Error> {
        self.buf.get(offset).copied().ok_or(Error::IllegalParams)
    }

    /// Big-endian 16-bit parameter at `offset`
    pub fn u16_at(&self, offset: usize) -> Result<u16, Error> {
        let bytes = self.bytes(offset, 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Big-endian 32-bit parameter at `offset`
    pub fn u32_at(&self, offset: usize) -> Result<u32, Error> {
        let bytes = self.bytes(offset, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// `len` parameter bytes starting at `offset`
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&[u8], Error> {
        self.buf
            .get(offset..offset + len)
            .ok_or(Error::IllegalParams)
    }

    /// Write one response byte at `offset`
    pub fn set_u8(&mut self, offset: usize, value: u8) -> Result<(), Error> {
        let byte = self.buf.get_mut(offset).ok_or(Error::IllegalParams)?;
        *byte = value;
        Ok(())
    }

    /// Write a big-endian 16-bit response value at `offset`
    pub fn set_u16(&mut self, offset: usize, value: u16) -> Result<(), Error> {
        self.set_bytes(offset, &value.to_be_bytes())
    }

    /// Write a big-endian 32-bit response value at `offset`
    pub fn set_u32(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        self.set_bytes(offset, &value.to_be_bytes())
    }

    /// Write response bytes starting at `offset`
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Error> {
        let dest = self
            .buf
            .get_mut(offset..offset + bytes.len())
            .ok_or(Error::IllegalParams)?;
        dest.copy_from_slice(bytes);
        Ok(())
    }

    /// Mutable response region starting at `offset`, for block reads that
    /// fill data in place
    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8], Error> {
        self.buf
            .get_mut(offset..offset + len)
            .ok_or(Error::IllegalParams)
    }

    /// Declare the total response length including the result code.
    /// Defaults to 1 (result code only).
    pub fn set_response_len(&mut self, len: usize) {
        self.response_len = len.clamp(1, self.buf.len());
    }

    /// Store the result code and return the response as a slice
    pub fn finish(self, result: Result<(), Error>) -> &'a [u8] {
        self.buf[0] = match result {
            Ok(()) => RSP_OK,
            Err(e) => e.code(),
        };
        // Errors never carry data
        let len = match result {
            Ok(()) => self.response_len,
            Err(_) => 1,
        };
        &self.buf[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_round_trip() {
        for cmd in [
            Command::SetTarget,
            Command::Connect,
            Command::ReadMem,
            Command::MassErase,
        ] {
            assert_eq!(Command::from_byte(cmd.to_byte()), Ok(cmd));
        }
        assert_eq!(Command::from_byte(0xFE), Err(Error::IllegalCommand));
    }

    #[test]
    fn frame_reads_big_endian() {
        let mut buf = [0u8; 16];
        buf[0] = CMD_READ_MEM;
        buf[4] = 0x12;
        buf[5] = 0x34;
        buf[6] = 0x56;
        buf[7] = 0x78;
        let frame = CommandFrame::new(&mut buf).unwrap();
        assert_eq!(frame.command(), Ok(Command::ReadMem));
        assert_eq!(frame.u32_at(MEM_ADDR_OFFSET), Ok(0x1234_5678));
        assert_eq!(frame.u16_at(6), Ok(0x5678));
    }

    #[test]
    fn frame_rejects_out_of_range() {
        let mut buf = [0u8; 4];
        let frame = CommandFrame::new(&mut buf).unwrap();
        assert_eq!(frame.u32_at(2), Err(Error::IllegalParams));
    }

    #[test]
    fn finish_reports_result() {
        let mut buf = [0u8; 8];
        let mut frame = CommandFrame::new(&mut buf).unwrap();
        frame.set_u16(REPLY_DATA_OFFSET, 0xABCD).unwrap();
        frame.set_response_len(3);
        let response = frame.finish(Ok(()));
        assert_eq!(response, &[0, 0xAB, 0xCD]);

        let mut buf = [0u8; 8];
        let mut frame = CommandFrame::new(&mut buf).unwrap();
        frame.set_response_len(5);
        let response = frame.finish(Err(Error::NoConnection));
        assert_eq!(response, &[Error::NoConnection.code()]);
    }
}
