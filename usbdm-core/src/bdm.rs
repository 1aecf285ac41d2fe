// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Freescale BDM command opcodes and debug register definitions.
//!
//! Each family speaks its own single-wire BDM dialect over the BKGD pin.
//! The opcodes here are the values shifted out on the wire; how bytes and
//! acknowledge pulses are framed around them is the driver's business
//! (`usbdm_bdm::driver`).
//!
//! HCS12 and HCS08/RS08 firmware commands are split into "hardware"
//! commands, usable any time BDM is enabled, and "firmware" commands that
//! need the target halted in active background mode.  CFV1 instead splits
//! commands into non-intrusive and halted groups.  The distinction only
//! matters to callers; the wire framing is identical.

/// HCS12 BDM opcodes
pub mod hc12 {
    /// Halt the target into active background mode (hardware)
    pub const BACKGROUND: u8 = 0x90;
    /// Enable the ACKN handshake protocol
    pub const ACK_ENABLE: u8 = 0xD5;
    /// Disable the ACKN handshake protocol
    pub const ACK_DISABLE: u8 = 0xD6;

    /// Read byte from memory (hardware, returns a word, byte lane by
    /// address parity)
    pub const READ_BYTE: u8 = 0xE0;
    /// Read byte from BDM firmware space (hardware)
    pub const READ_BD_BYTE: u8 = 0xE4;
    /// Read aligned word from memory (hardware)
    pub const READ_WORD: u8 = 0xE8;
    /// Write byte to memory (hardware)
    pub const WRITE_BYTE: u8 = 0xC0;
    /// Write byte to BDM firmware space (hardware)
    pub const WRITE_BD_BYTE: u8 = 0xC4;
    /// Write aligned word to memory (hardware)
    pub const WRITE_WORD: u8 = 0xC8;

    /// Read word from address in X, post-increment X by 2 (firmware)
    pub const READ_NEXT: u8 = 0x62;
    /// Write word to address in X, post-increment X by 2 (firmware)
    pub const WRITE_NEXT: u8 = 0x42;
    /// Write the X index register (firmware)
    pub const WRITE_X: u8 = 0x45;

    /// Resume execution (firmware)
    pub const GO: u8 = 0x08;
    /// Execute one instruction then re-enter background mode (firmware)
    pub const TRACE1: u8 = 0x10;

    /// Read core register, `reg` from [`Reg`] (firmware)
    pub const READ_REG: u8 = 0x60;
    /// Write core register, `reg` from [`Reg`] (firmware)
    pub const WRITE_REG: u8 = 0x40;

    /// BDM status register address in BDM firmware space
    pub const BDMSTS_ADDR: u16 = 0xFF01;
    /// BDM CCR holding register address
    pub const BDMCCR_ADDR: u16 = 0xFF06;
    /// BDM program page register address (global addressing)
    pub const BDMPPR_ADDR: u16 = 0xFF08;

    /// BDMSTS: BDM enabled
    pub const BDMSTS_ENBDM: u8 = 0x80;
    /// BDMSTS: target halted in background mode
    pub const BDMSTS_BDMACT: u8 = 0x40;
    /// BDMSTS: BDM clock source is the alternate (bus) clock
    pub const BDMSTS_CLKSW: u8 = 0x04;
    /// BDMSTS: target is unsecured
    pub const BDMSTS_UNSEC: u8 = 0x02;

    /// BDMPPR: page address enable
    pub const BDMPPR_BPAE: u8 = 0x80;

    /// HCS12 core register numbers
    ///
    /// The number is ORed directly into [`READ_REG`]/[`WRITE_REG`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u8)]
    pub enum Reg {
        Pc = 3,
        D = 4,
        X = 5,
        Y = 6,
        Sp = 7,
    }

    impl Reg {
        /// Decode a host-supplied register number, rejecting anything
        /// outside PC..SP.
        pub fn from_byte(byte: u8) -> Result<Reg, crate::Error> {
            match byte {
                3 => Ok(Reg::Pc),
                4 => Ok(Reg::D),
                5 => Ok(Reg::X),
                6 => Ok(Reg::Y),
                7 => Ok(Reg::Sp),
                _ => Err(crate::Error::IllegalParams),
            }
        }
    }
}

/// HCS08 and RS08 BDM opcodes
///
/// RS08 shares the HCS08 wire dialect; commands that address registers the
/// RS08 does not have (HX, CCR) are rejected at dispatch.
pub mod hc08 {
    /// Halt the target into active background mode (hardware)
    pub const BACKGROUND: u8 = 0x90;
    /// Enable the ACKN handshake protocol
    pub const ACK_ENABLE: u8 = 0xD5;
    /// Disable the ACKN handshake protocol
    pub const ACK_DISABLE: u8 = 0xD6;

    /// Read the BDCSCR status byte (hardware)
    pub const READ_STATUS: u8 = 0xE4;
    /// Write the BDCSCR control byte (hardware)
    pub const WRITE_CONTROL: u8 = 0xC4;

    /// Read byte from memory (hardware)
    pub const READ_BYTE: u8 = 0xE0;
    /// Write byte to memory (hardware)
    pub const WRITE_BYTE: u8 = 0xC0;
    /// Read byte at address in HX, post-increment HX (firmware)
    pub const READ_NEXT: u8 = 0x70;
    /// Write byte at address in HX, post-increment HX (firmware)
    pub const WRITE_NEXT: u8 = 0x50;

    /// Read the BDC breakpoint register (hardware)
    pub const READ_BKPT: u8 = 0xE2;
    /// Write the BDC breakpoint register (hardware)
    pub const WRITE_BKPT: u8 = 0xC2;

    /// Resume execution (firmware)
    pub const GO: u8 = 0x08;
    /// Execute one instruction then re-enter background mode (firmware)
    pub const TRACE1: u8 = 0x10;

    /// Read accumulator A (firmware)
    pub const READ_A: u8 = 0x68;
    /// Read condition code register (firmware)
    pub const READ_CCR: u8 = 0x69;
    /// Read program counter (firmware)
    pub const READ_PC: u8 = 0x6B;
    /// Read index register pair HX (firmware)
    pub const READ_HX: u8 = 0x6C;
    /// Read stack pointer (firmware)
    pub const READ_SP: u8 = 0x6F;
    /// Write accumulator A (firmware)
    pub const WRITE_A: u8 = 0x48;
    /// Write condition code register (firmware)
    pub const WRITE_CCR: u8 = 0x49;
    /// Write program counter (firmware)
    pub const WRITE_PC: u8 = 0x4B;
    /// Write index register pair HX (firmware)
    pub const WRITE_HX: u8 = 0x4C;
    /// Write stack pointer (firmware)
    pub const WRITE_SP: u8 = 0x4F;

    /// BDCSCR: BDM enabled
    pub const BDCSCR_ENBDM: u8 = 0x80;
    /// BDCSCR: target halted in background mode
    pub const BDCSCR_BDMACT: u8 = 0x40;
    /// BDCSCR: BDC clock source is the bus clock
    pub const BDCSCR_CLKSW: u8 = 0x08;
    /// BDCSCR: wait or stop status
    pub const BDCSCR_WS: u8 = 0x04;
    /// BDCSCR: wait or stop failure
    pub const BDCSCR_WSF: u8 = 0x02;
    /// BDCSCR: data valid failure
    pub const BDCSCR_DVF: u8 = 0x01;

    /// HCS08/RS08 core register numbers as supplied by the host
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u8)]
    pub enum Reg {
        A = 8,
        Ccr = 9,
        Pc = 0xB,
        Hx = 0xC,
        Sp = 0xF,
    }

    impl Reg {
        /// Decode a host-supplied register number.  `rs08` restricts the
        /// set to the registers an RS08 actually has.
        pub fn from_byte(byte: u8, rs08: bool) -> Result<Reg, crate::Error> {
            let reg = match byte {
                8 => Reg::A,
                9 => Reg::Ccr,
                0xB => Reg::Pc,
                0xC => Reg::Hx,
                0xF => Reg::Sp,
                _ => return Err(crate::Error::IllegalParams),
            };
            if rs08 && matches!(reg, Reg::Hx | Reg::Ccr) {
                return Err(crate::Error::IllegalParams);
            }
            Ok(reg)
        }

        /// Firmware read opcode for this register
        pub fn read_opcode(&self) -> u8 {
            0x68 | (*self as u8 & 0x07)
        }

        /// Firmware write opcode for this register
        pub fn write_opcode(&self) -> u8 {
            0x48 | (*self as u8 & 0x07)
        }

        /// True for the 16-bit registers (PC, HX, SP)
        pub fn is_word(&self) -> bool {
            matches!(self, Reg::Pc | Reg::Hx | Reg::Sp)
        }
    }
}

/// ColdFire V1 single-wire BDM opcodes
pub mod cfv1 {
    /// No operation, used to flush the command pipeline after recovery
    pub const NOP: u8 = 0x00;
    /// Halt the target (non-intrusive)
    pub const BACKGROUND: u8 = 0x04;
    /// Resume execution (halted)
    pub const GO: u8 = 0x08;
    /// Enable the ACKN handshake protocol
    pub const ACK_ENABLE: u8 = 0x02;
    /// Disable the ACKN handshake protocol
    pub const ACK_DISABLE: u8 = 0x03;

    /// Read the XCSR status byte (non-intrusive)
    pub const READ_XCSR_BYTE: u8 = 0x2D;
    /// Read the CSR2 extension byte (non-intrusive)
    pub const READ_CSR2_BYTE: u8 = 0x2E;
    /// Read the CSR3 extension byte (non-intrusive)
    pub const READ_CSR3_BYTE: u8 = 0x2F;
    /// Write the XCSR control byte (non-intrusive)
    pub const WRITE_XCSR_BYTE: u8 = 0x25;
    /// Write the CSR2 extension byte (non-intrusive)
    pub const WRITE_CSR2_BYTE: u8 = 0x26;
    /// Write the CSR3 extension byte (non-intrusive)
    pub const WRITE_CSR3_BYTE: u8 = 0x27;

    /// Read memory, byte (non-intrusive, 32-bit address follows)
    pub const READ_MEM_B: u8 = 0x10;
    /// Read memory, word
    pub const READ_MEM_W: u8 = 0x14;
    /// Read memory, longword
    pub const READ_MEM_L: u8 = 0x18;
    /// Write memory, byte
    pub const WRITE_MEM_B: u8 = 0x11;
    /// Write memory, word
    pub const WRITE_MEM_W: u8 = 0x15;
    /// Write memory, longword
    pub const WRITE_MEM_L: u8 = 0x19;
    /// Read next sequential byte after a READ_MEM/DUMP_MEM
    pub const DUMP_MEM_B: u8 = 0x12;
    /// Read next sequential word
    pub const DUMP_MEM_W: u8 = 0x16;
    /// Read next sequential longword
    pub const DUMP_MEM_L: u8 = 0x1A;
    /// Write next sequential byte after a WRITE_MEM/FILL_MEM
    pub const FILL_MEM_B: u8 = 0x13;
    /// Write next sequential word
    pub const FILL_MEM_W: u8 = 0x17;
    /// Write next sequential longword
    pub const FILL_MEM_L: u8 = 0x1B;

    /// Read core register D0-D7/A0-A7, register number ORed in (halted)
    pub const READ_REG: u8 = 0x60;
    /// Write core register, register number ORed in (halted)
    pub const WRITE_REG: u8 = 0x40;
    /// Read control register via 32-bit Rc number (halted)
    pub const READ_CREG: u8 = 0x29;
    /// Write control register via 32-bit Rc number (halted)
    pub const WRITE_CREG: u8 = 0x28;
    /// Read debug register, register number follows as an operand byte
    /// (non-intrusive)
    pub const READ_DREG: u8 = 0x2C;
    /// Write debug register, register number follows as an operand byte
    /// (non-intrusive)
    pub const WRITE_DREG: u8 = 0x24;

    /// XCSR: BDM enabled
    pub const XCSR_ENBDM: u8 = 0x80;
    /// XCSR: command status field
    pub const XCSR_CSTAT: u8 = 0x38;
    /// XCSR: command status - last command OK
    pub const XCSR_CSTAT_OK: u8 = 0x00;
    /// XCSR: command status - command overrun
    pub const XCSR_CSTAT_OVERRUN: u8 = 0x20;
    /// XCSR: BDM clock source is the bus clock
    pub const XCSR_CLKSW: u8 = 0x04;
    /// XCSR: target is secured
    pub const XCSR_SEC: u8 = 0x02;

    /// Debug register numbers reachable through the byte-wide status
    /// register commands
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[repr(u8)]
    pub enum StatusReg {
        Csr2 = 0,
        Csr3 = 1,
        Xcsr = 2,
    }

    impl StatusReg {
        pub fn from_byte(byte: u8) -> Result<StatusReg, crate::Error> {
            match byte {
                0 => Ok(StatusReg::Csr2),
                1 => Ok(StatusReg::Csr3),
                2 => Ok(StatusReg::Xcsr),
                _ => Err(crate::Error::IllegalParams),
            }
        }

        pub fn read_opcode(&self) -> u8 {
            match self {
                StatusReg::Csr2 => READ_CSR2_BYTE,
                StatusReg::Csr3 => READ_CSR3_BYTE,
                StatusReg::Xcsr => READ_XCSR_BYTE,
            }
        }

        pub fn write_opcode(&self) -> u8 {
            match self {
                StatusReg::Csr2 => WRITE_CSR2_BYTE,
                StatusReg::Csr3 => WRITE_CSR3_BYTE,
                StatusReg::Xcsr => WRITE_XCSR_BYTE,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hc12_reg_bounds() {
        assert!(hc12::Reg::from_byte(2).is_err());
        assert_eq!(hc12::Reg::from_byte(3), Ok(hc12::Reg::Pc));
        assert_eq!(hc12::Reg::from_byte(7), Ok(hc12::Reg::Sp));
        assert!(hc12::Reg::from_byte(8).is_err());
    }

    #[test]
    fn hc08_reg_opcodes() {
        assert_eq!(hc08::Reg::Pc.read_opcode(), hc08::READ_PC);
        assert_eq!(hc08::Reg::Sp.write_opcode(), hc08::WRITE_SP);
        assert_eq!(hc08::Reg::A.read_opcode(), hc08::READ_A);
    }

    #[test]
    fn rs08_rejects_hx_and_ccr() {
        assert!(hc08::Reg::from_byte(0xC, true).is_err());
        assert!(hc08::Reg::from_byte(9, true).is_err());
        assert!(hc08::Reg::from_byte(0xB, true).is_ok());
    }
}
