// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Simulated BDM target for tests.
//!
//! [`SimBdm`] implements [`BdmDriver`] against a 64KB byte array plus the
//! family's debug registers, decoding the same command bytes the engines
//! emit.  Public fields act as fault-injection knobs and wire-traffic
//! counters so tests can assert on exactly what reached the target.

use alloc::vec;
use alloc::vec::Vec;

use usbdm_core::bdm::{cfv1, hc08, hc12};
use usbdm_core::{Error, ResetMethod, TargetFamily};

use crate::BdmDriver;

pub struct SimBdm {
    family: TargetFamily,

    /// Simulated target memory, 64KB
    pub memory: Vec<u8>,
    /// Family status register (BDMSTS, BDCSCR or XCSR)
    pub status: u8,
    /// Cached HCS12 BDMPPR value as written through the BD space
    pub bdmppr: u8,

    /// SYNC requests go unanswered
    pub sync_fails: bool,
    /// No timing table entry matches any SYNC length
    pub timing_fails: bool,
    /// Target answers ACK_ENABLE with an ACKN pulse
    pub ackn_supported: bool,
    /// CFV1: clear the XCSR command status field after this many NOPs
    pub overrun_clears_after_nops: u32,

    /// SYNC requests issued
    pub syncs: u32,
    /// CFV1 NOPs executed
    pub nops: u32,
    /// READ_NEXT/WRITE_NEXT transfers that touched the 0xFFxx page
    pub next_ops_in_ff_page: u32,
    /// GO commands executed
    pub gos: u32,
    /// BACKGROUND commands executed
    pub backgrounds: u32,
    /// Resets applied, as (method, special)
    pub resets: Vec<(ResetMethod, bool)>,
    /// Accumulated busy-wait time
    pub delays_ms: u32,

    // HCS12 X register, HCS08 H:X register, both auto-incrementing
    x: u16,
    hx: u16,
    // CFV1 sequential access cursor
    cursor: u32,
    regs: [u32; 16],
    dregs: [u32; 32],
    cregs: [u32; 16],
    csr2: u8,
    csr3: u8,
    bkpt: u16,
}

impl SimBdm {
    /// SYNC response length reported to the link
    pub const SYNC_TICKS: u16 = 0x03C0;

    pub fn new(family: TargetFamily) -> Self {
        SimBdm {
            family,
            memory: vec![0; 0x1_0000],
            status: 0,
            bdmppr: 0,
            sync_fails: false,
            timing_fails: false,
            ackn_supported: true,
            overrun_clears_after_nops: 0,
            syncs: 0,
            nops: 0,
            next_ops_in_ff_page: 0,
            gos: 0,
            backgrounds: 0,
            resets: Vec::new(),
            delays_ms: 0,
            x: 0,
            hx: 0,
            cursor: 0,
            regs: [0; 16],
            dregs: [0; 32],
            cregs: [0; 16],
            csr2: 0,
            csr3: 0,
            bkpt: 0,
        }
    }

    /// Register file access for test assertions
    pub fn reg(&self, n: usize) -> u32 {
        self.regs[n]
    }

    pub fn set_reg(&mut self, n: usize, value: u32) {
        self.regs[n] = value;
    }

    pub fn dreg(&self, n: usize) -> u32 {
        self.dregs[n]
    }

    pub fn set_dreg(&mut self, n: usize, value: u32) {
        self.dregs[n] = value;
    }

    pub fn creg(&self, n: usize) -> u32 {
        self.cregs[n]
    }

    pub fn bkpt(&self) -> u16 {
        self.bkpt
    }

    fn addr16(tx: &[u8]) -> usize {
        (u16::from_be_bytes([tx[1], tx[2]])) as usize
    }

    fn addr32(tx: &[u8]) -> u32 {
        u32::from_be_bytes([tx[1], tx[2], tx[3], tx[4]])
    }

    fn mem_read(&self, addr: u32, buf: &mut [u8]) {
        for (i, b) in buf.iter_mut().enumerate() {
            *b = self.memory[(addr as usize + i) & 0xFFFF];
        }
    }

    fn mem_write(&mut self, addr: u32, data: &[u8]) {
        for (i, b) in data.iter().enumerate() {
            self.memory[(addr as usize + i) & 0xFFFF] = *b;
        }
    }

    fn note_next_op(&mut self, addr: u16) {
        if addr & 0xFF00 == 0xFF00 {
            self.next_ops_in_ff_page += 1;
        }
    }

    fn hc12_transact(&mut self, tx: &[u8], rx: &mut [u8]) {
        match tx[0] {
            hc12::GO => self.gos += 1,
            hc12::BACKGROUND => self.backgrounds += 1,
            hc12::READ_BD_BYTE => {
                let addr = Self::addr16(tx);
                let value = match addr as u16 {
                    hc12::BDMSTS_ADDR => self.status,
                    hc12::BDMPPR_ADDR => self.bdmppr,
                    _ => 0,
                };
                // Byte appears in the lane selected by address parity
                rx[addr & 1] = value;
                rx[addr & 1 ^ 1] = 0;
            }
            hc12::WRITE_BD_BYTE => {
                let addr = Self::addr16(tx);
                let value = tx[3 + (addr & 1)];
                match addr as u16 {
                    hc12::BDMSTS_ADDR => self.status = value,
                    hc12::BDMPPR_ADDR => self.bdmppr = value,
                    _ => (),
                }
            }
            hc12::READ_BYTE => {
                let addr = Self::addr16(tx) & !1;
                self.mem_read(addr as u32, rx);
            }
            hc12::READ_WORD => {
                let addr = Self::addr16(tx);
                self.mem_read(addr as u32, rx);
            }
            hc12::WRITE_BYTE => {
                let addr = Self::addr16(tx);
                self.mem_write(addr as u32, &[tx[3 + (addr & 1)]]);
            }
            hc12::WRITE_WORD => {
                let addr = Self::addr16(tx);
                self.mem_write(addr as u32, &tx[3..5]);
            }
            hc12::WRITE_X => {
                self.x = u16::from_be_bytes([tx[1], tx[2]]);
                self.regs[5] = self.x as u32;
            }
            hc12::READ_NEXT => {
                self.x = self.x.wrapping_add(2);
                self.note_next_op(self.x);
                self.mem_read(self.x as u32, rx);
            }
            hc12::WRITE_NEXT => {
                self.x = self.x.wrapping_add(2);
                self.note_next_op(self.x);
                let data = [tx[1], tx[2]];
                self.mem_write(self.x as u32, &data);
            }
            op if op & 0xF8 == hc12::READ_REG => {
                let value = self.regs[(op & 0x07) as usize] as u16;
                rx.copy_from_slice(&value.to_be_bytes());
            }
            op if op & 0xF8 == hc12::WRITE_REG => {
                let value = u16::from_be_bytes([tx[1], tx[2]]);
                self.regs[(op & 0x07) as usize] = value as u32;
                if op & 0x07 == 5 {
                    self.x = value;
                }
            }
            _ => (),
        }
    }

    fn hc08_transact(&mut self, tx: &[u8], rx: &mut [u8]) {
        match tx[0] {
            hc08::GO => self.gos += 1,
            hc08::BACKGROUND => self.backgrounds += 1,
            hc08::READ_STATUS => rx[0] = self.status,
            hc08::WRITE_CONTROL => self.status = tx[1],
            hc08::READ_BYTE => {
                let addr = Self::addr16(tx);
                self.mem_read(addr as u32, rx);
            }
            hc08::WRITE_BYTE => {
                let addr = Self::addr16(tx);
                self.mem_write(addr as u32, &[tx[3]]);
            }
            hc08::WRITE_HX => {
                self.hx = u16::from_be_bytes([tx[1], tx[2]]);
                self.regs[0xC] = self.hx as u32;
            }
            hc08::READ_NEXT => {
                self.hx = self.hx.wrapping_add(1);
                self.note_next_op(self.hx);
                self.mem_read(self.hx as u32, rx);
            }
            hc08::WRITE_NEXT => {
                self.hx = self.hx.wrapping_add(1);
                self.note_next_op(self.hx);
                let data = [tx[1]];
                self.mem_write(self.hx as u32, &data);
            }
            hc08::READ_BKPT => rx.copy_from_slice(&self.bkpt.to_be_bytes()),
            hc08::WRITE_BKPT => self.bkpt = u16::from_be_bytes([tx[1], tx[2]]),
            op if op & 0xF8 == 0x68 => {
                let value = self.regs[(op & 0x0F) as usize];
                if rx.len() == 2 {
                    rx.copy_from_slice(&(value as u16).to_be_bytes());
                } else {
                    rx[0] = value as u8;
                }
            }
            op if op & 0xF8 == 0x48 && op != hc08::WRITE_HX => {
                let value = if tx.len() == 3 {
                    u16::from_be_bytes([tx[1], tx[2]]) as u32
                } else {
                    tx[1] as u32
                };
                self.regs[(op & 0x0F) as usize] = value;
            }
            _ => (),
        }
    }

    fn cfv1_size(op: u8) -> usize {
        match op & 0x0C {
            0x00 => 1,
            0x04 => 2,
            _ => 4,
        }
    }

    fn cfv1_transact(&mut self, tx: &[u8], rx: &mut [u8]) {
        match tx[0] {
            cfv1::NOP => {
                self.nops += 1;
                if self.overrun_clears_after_nops > 0 {
                    self.overrun_clears_after_nops -= 1;
                    if self.overrun_clears_after_nops == 0 {
                        self.status &= !cfv1::XCSR_CSTAT;
                    }
                }
            }
            cfv1::GO => self.gos += 1,
            cfv1::BACKGROUND => self.backgrounds += 1,
            cfv1::READ_XCSR_BYTE => rx[0] = self.status,
            cfv1::WRITE_XCSR_BYTE => self.status = tx[1],
            cfv1::READ_CSR2_BYTE => rx[0] = self.csr2,
            cfv1::WRITE_CSR2_BYTE => self.csr2 = tx[1],
            cfv1::READ_CSR3_BYTE => rx[0] = self.csr3,
            cfv1::WRITE_CSR3_BYTE => self.csr3 = tx[1],
            op @ (cfv1::READ_MEM_B | cfv1::READ_MEM_W | cfv1::READ_MEM_L) => {
                let addr = Self::addr32(tx);
                self.mem_read(addr, rx);
                self.cursor = addr.wrapping_add(Self::cfv1_size(op) as u32);
            }
            op @ (cfv1::WRITE_MEM_B | cfv1::WRITE_MEM_W | cfv1::WRITE_MEM_L) => {
                let addr = Self::addr32(tx);
                let data = &tx[5..];
                self.mem_write(addr, data);
                self.cursor = addr.wrapping_add(Self::cfv1_size(op) as u32);
            }
            op @ (cfv1::DUMP_MEM_B | cfv1::DUMP_MEM_W | cfv1::DUMP_MEM_L) => {
                let addr = self.cursor;
                self.mem_read(addr, rx);
                self.cursor = addr.wrapping_add(Self::cfv1_size(op) as u32);
            }
            op @ (cfv1::FILL_MEM_B | cfv1::FILL_MEM_W | cfv1::FILL_MEM_L) => {
                let addr = self.cursor;
                let data = &tx[1..];
                self.mem_write(addr, data);
                self.cursor = addr.wrapping_add(Self::cfv1_size(op) as u32);
            }
            cfv1::READ_CREG => {
                let n = (u16::from_be_bytes([tx[1], tx[2]]) & 0x0F) as usize;
                rx.copy_from_slice(&self.cregs[n].to_be_bytes());
            }
            cfv1::WRITE_CREG => {
                let n = (u16::from_be_bytes([tx[1], tx[2]]) & 0x0F) as usize;
                self.cregs[n] = u32::from_be_bytes([tx[3], tx[4], tx[5], tx[6]]);
            }
            cfv1::READ_DREG => {
                let n = (tx[1] & 0x1F) as usize;
                rx.copy_from_slice(&self.dregs[n].to_be_bytes());
            }
            cfv1::WRITE_DREG => {
                let n = (tx[1] & 0x1F) as usize;
                self.dregs[n] = u32::from_be_bytes([tx[2], tx[3], tx[4], tx[5]]);
            }
            op if op & 0xF0 == cfv1::READ_REG => {
                let value = self.regs[(op & 0x0F) as usize];
                rx.copy_from_slice(&value.to_be_bytes());
            }
            op if op & 0xF0 == cfv1::WRITE_REG => {
                self.regs[(op & 0x0F) as usize] =
                    u32::from_be_bytes([tx[1], tx[2], tx[3], tx[4]]);
            }
            _ => (),
        }
    }
}

impl BdmDriver for SimBdm {
    fn sync(&mut self) -> Result<u16, Error> {
        self.syncs += 1;
        if self.sync_fails {
            Err(Error::NoConnection)
        } else {
            Ok(Self::SYNC_TICKS)
        }
    }

    fn select_timing(&mut self, _sync_length: u16) -> Result<(), Error> {
        if self.timing_fails {
            Err(Error::NoConnection)
        } else {
            Ok(())
        }
    }

    fn deselect_timing(&mut self) {}

    fn enable_ackn(&mut self, _opcode: u8) -> Result<bool, Error> {
        Ok(self.ackn_supported)
    }

    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<(), Error> {
        match self.family {
            TargetFamily::Hcs12 => self.hc12_transact(tx, rx),
            TargetFamily::Cfv1 => self.cfv1_transact(tx, rx),
            _ => self.hc08_transact(tx, rx),
        }
        Ok(())
    }

    fn reset_line(&mut self, method: ResetMethod, special: bool) -> Result<(), Error> {
        self.resets.push((method, special));
        Ok(())
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays_ms += ms;
    }
}
