// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Simulated SWD target for unit tests.
//!
//! Implements [`SwdDriver`] by decoding the bit patterns the protocol
//! layer produces: 8/9-bit requests, 4-bit acknowledge reads, 33-bit data
//! reads and 34-bit data writes.  Models a DP with a pipelined AP, a
//! generic AP 0 register bank and a Kinetis MDM-AP at AP 1.

use alloc::collections::VecDeque;

use crate::driver::SwdDriver;
use crate::protocol::calculate_parity;

/// IDCODE the simulated target reports
pub const SIM_IDCODE: u32 = 0x2BA0_1477;

const ACK_OK: u64 = 1 << 1;
const ACK_WAIT: u64 = 2 << 1;
const ACK_FAULT: u64 = 4 << 1;
const ACK_NONE: u64 = 7 << 1;

const MDM_STATUS_FLASH_READY: u32 = 1 << 1;
const MDM_STATUS_ERASE_ENABLE: u32 = 1 << 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    Read(Reg),
    Write(Reg),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reg {
    Dp(u8),
    Ap(u8),
}

pub struct SimTarget {
    // Behaviour knobs
    pub wait_forever: bool,
    pub wait_responses: u32,
    pub flip_parity: bool,
    pub fault_on_rdbuff: bool,
    /// Outcome per IDCODE read; empty queue means succeed
    pub connect_acks: VecDeque<bool>,
    pub mdm_status: u32,
    /// Control reads that still show the erase in progress
    pub erase_busy_reads: u32,
    /// Drop MASS_ERASE_REQUEST on write, as a secured-out part would
    pub drop_erase_request: bool,
    /// Never acknowledge debug domain power-up
    pub refuse_power_up: bool,

    // Observability
    pub requests: u32,
    pub select_writes: u32,
    pub connects: u32,
    pub last_abort: Option<u32>,
    pub erase_requested: bool,
    pub delays_ms: u32,

    // Target state
    pending: Option<Pending>,
    select: u32,
    ctrl_stat: u32,
    pipeline: u32,
    mdm_control: u32,
    ap0_regs: [u32; 4],
}

impl SimTarget {
    pub fn new() -> Self {
        SimTarget {
            wait_forever: false,
            wait_responses: 0,
            flip_parity: false,
            fault_on_rdbuff: false,
            connect_acks: VecDeque::new(),
            mdm_status: MDM_STATUS_FLASH_READY | MDM_STATUS_ERASE_ENABLE,
            erase_busy_reads: 2,
            drop_erase_request: false,
            refuse_power_up: false,
            requests: 0,
            select_writes: 0,
            connects: 0,
            last_abort: None,
            erase_requested: false,
            delays_ms: 0,
            pending: None,
            select: 0,
            ctrl_stat: 0,
            pipeline: 0,
            mdm_control: 0,
            ap0_regs: [0; 4],
        }
    }

    fn decode_request(&mut self, cmd: u8) {
        self.requests += 1;
        let addr = ((cmd >> 3) & 0x3) << 2;
        let reg = if cmd & 0x02 != 0 {
            Reg::Ap(addr)
        } else {
            Reg::Dp(addr)
        };
        self.pending = Some(if cmd & 0x04 != 0 {
            Pending::Read(reg)
        } else {
            Pending::Write(reg)
        });
    }

    /// Full AP register address from the cached SELECT plus A[3:2]
    fn ap_full_addr(&self, addr: u8) -> (u8, u8) {
        let apsel = (self.select >> 24) as u8;
        let bank = ((self.select >> 4) & 0xF) as u8;
        (apsel, bank << 4 | addr)
    }

    fn ap_read(&mut self, addr: u8) -> u32 {
        match self.ap_full_addr(addr) {
            (1, 0x00) => self.mdm_status,
            (1, 0x04) => {
                if self.mdm_control & 1 != 0 {
                    if self.erase_busy_reads > 0 {
                        self.erase_busy_reads -= 1;
                    } else {
                        self.mdm_control &= !1;
                    }
                }
                self.mdm_control
            }
            (1, 0x3C) => usbdm_core::arm::mdm::MdmIdr::KINETIS,
            (0, _) => self.ap0_regs[(addr >> 2) as usize & 0x3],
            _ => 0,
        }
    }

    fn ap_write(&mut self, addr: u8, value: u32) {
        match self.ap_full_addr(addr) {
            (1, 0x04) => {
                self.mdm_control = value;
                if value & 1 != 0 {
                    if self.drop_erase_request || self.mdm_status & MDM_STATUS_ERASE_ENABLE == 0 {
                        self.mdm_control &= !1;
                    } else {
                        self.erase_requested = true;
                    }
                }
            }
            (0, _) => self.ap0_regs[(addr >> 2) as usize & 0x3] = value,
            _ => (),
        }
    }

    fn serve_ack(&mut self) -> u64 {
        let Some(pending) = self.pending else {
            return ACK_NONE;
        };
        if self.wait_forever {
            return ACK_WAIT;
        }
        if self.wait_responses > 0 {
            self.wait_responses -= 1;
            return ACK_WAIT;
        }
        match pending {
            Pending::Read(Reg::Dp(0x00)) => {
                if let Some(ok) = self.connect_acks.pop_front()
                    && !ok
                {
                    self.pending = None;
                    return ACK_NONE;
                }
                ACK_OK
            }
            Pending::Read(Reg::Dp(0x0C)) if self.fault_on_rdbuff => {
                self.pending = None;
                ACK_FAULT
            }
            _ => ACK_OK,
        }
    }

    fn serve_read(&mut self) -> u64 {
        let value = match self.pending.take() {
            Some(Pending::Read(Reg::Dp(0x00))) => SIM_IDCODE,
            Some(Pending::Read(Reg::Dp(0x04))) => self.ctrl_stat,
            Some(Pending::Read(Reg::Dp(0x0C))) => self.pipeline,
            Some(Pending::Read(Reg::Ap(addr))) => {
                // Pipelined: this transfer returns the previous result
                let stale = self.pipeline;
                self.pipeline = self.ap_read(addr);
                stale
            }
            _ => 0,
        };
        let mut parity = calculate_parity(value);
        if self.flip_parity {
            parity = !parity;
        }
        (value as u64) | ((parity as u64) << 32)
    }

    fn serve_write(&mut self, value: u32) {
        match self.pending.take() {
            Some(Pending::Write(Reg::Dp(0x00))) => self.last_abort = Some(value),
            Some(Pending::Write(Reg::Dp(0x04))) => {
                self.ctrl_stat = value;
                if !self.refuse_power_up {
                    // Acknowledge whichever power-up requests are set
                    self.ctrl_stat |= (value & (1 << 28)) << 1;
                    self.ctrl_stat |= (value & (1 << 30)) << 1;
                }
            }
            Some(Pending::Write(Reg::Dp(0x08))) => {
                self.select = value;
                self.select_writes += 1;
            }
            Some(Pending::Write(Reg::Ap(addr))) => self.ap_write(addr, value),
            _ => (),
        }
    }
}

impl SwdDriver for SimTarget {
    fn swdio_output(&mut self) {}

    fn swdio_input(&mut self) {}

    fn write_bits(&mut self, count: usize, data: u64) {
        match count {
            // Idle clocks are also 8 bits; only a request has the start bit
            8 if data & 1 != 0 => self.decode_request(data as u8),
            8 => self.pending = None,
            9 => self.decode_request((data >> 1) as u8),
            16 => self.connects += 1, // JTAG-to-SWD switch sequence
            34 => self.serve_write((data >> 1) as u32),
            _ => (), // line resets and idle clocks
        }
    }

    fn read_bits(&mut self, count: usize) -> u64 {
        match count {
            4 => self.serve_ack(),
            33 => self.serve_read(),
            _ => 0,
        }
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays_ms += ms;
    }
}
