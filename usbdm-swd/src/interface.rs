// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD operation layer.
//!
//! [`SwdInterface`] turns the wire pieces from [`crate::protocol`] into
//! whole operations: connect, DP/AP register reads and writes with WAIT
//! retry, and sticky error clearing.  AP registers are addressed with the
//! compact [`ApAddress`] form; the SELECT register is cached so repeated
//! access to the same AP bank costs one transfer.

use core::fmt;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::SwdConfig;
use crate::driver::SwdDriver;
use crate::protocol::{Ack, SwdProtocol};
use usbdm_core::Error;
use usbdm_core::arm::ApAddress;
use usbdm_core::arm::dp::{
    CtrlStat, CtrlStatRegister, IdCode, IdCodeRegister, RdBuffRegister, Select, SelectRegister,
};
use usbdm_core::arm::register::{
    ApRegister, DpRegister, ReadableRegister, RegisterDescriptor, WritableRegister,
};

/// A single SWD operation, used to build the request byte and for logging.
///
/// The payload is the register address within the port, 0x0-0xC word
/// aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwdOp {
    DpRead(u8),
    DpWrite(u8),
    ApRead(u8),
    ApWrite(u8),
}

impl SwdOp {
    /// Builds the request byte: start and park bits, port select, direction,
    /// A[3:2] and the request parity bit.
    pub fn to_cmd(self) -> u8 {
        let (base, addr) = match self {
            SwdOp::DpRead(addr) => (0x85u8, addr),
            SwdOp::DpWrite(addr) => (0x81u8, addr),
            SwdOp::ApRead(addr) => (0x87u8, addr),
            SwdOp::ApWrite(addr) => (0x83u8, addr),
        };
        let mut cmd = base | ((addr & 0x0C) << 1);

        // Parity covers APnDP, RnW and A[3:2]
        if ((cmd >> 1) & 0xF).count_ones() % 2 == 1 {
            cmd |= 1 << 5;
        }
        cmd
    }
}

impl fmt::Display for SwdOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwdOp::DpRead(addr) => write!(f, "DP Read 0x{addr:02X}"),
            SwdOp::DpWrite(addr) => write!(f, "DP Write 0x{addr:02X}"),
            SwdOp::ApRead(addr) => write!(f, "AP Read 0x{addr:02X}"),
            SwdOp::ApWrite(addr) => write!(f, "AP Write 0x{addr:02X}"),
        }
    }
}

/// SWD operation interface
///
/// Created over an [`SwdProtocol`].  All operations return
/// [`usbdm_core::Error`] on failure; a WAIT acknowledge is retried
/// transparently up to the configured budget.
pub struct SwdInterface<D> {
    protocol: SwdProtocol<D>,
    config: SwdConfig,
    idcode: Option<IdCode>,
    select: Option<Select>,
}

impl<D: SwdDriver> SwdInterface<D> {
    /// Creates the interface with default configuration
    pub fn new(protocol: SwdProtocol<D>) -> Self {
        Self::with_config(protocol, SwdConfig::default())
    }

    /// Creates the interface with explicit configuration
    pub fn with_config(protocol: SwdProtocol<D>, config: SwdConfig) -> Self {
        SwdInterface {
            protocol,
            config,
            idcode: None,
            select: None,
        }
    }

    /// Current configuration
    pub fn config(&self) -> &SwdConfig {
        &self.config
    }

    /// IDCODE from the last successful connect
    pub fn idcode(&self) -> Option<IdCode> {
        self.idcode
    }

    /// Underlying protocol engine, for raw line operations
    pub fn protocol_mut(&mut self) -> &mut SwdProtocol<D> {
        &mut self.protocol
    }

    /// Connects to the target: JTAG-to-SWD switch sequence followed by an
    /// IDCODE read, which the target requires before any other transfer.
    pub fn connect(&mut self) -> Result<IdCode, Error> {
        trace!("Exec:  SWD connect");
        self.idcode = None;
        self.select = None;
        self.protocol.jtag_to_swd();

        let idcode = self.read_dp_register::<IdCodeRegister>()?;
        if !idcode.is_valid() {
            debug!("Error: SWD connect - bad IDCODE {idcode:#}");
            return Err(Error::NoConnection);
        }

        info!("OK:    SWD connect - IDCODE {idcode}");
        self.idcode = Some(idcode);
        Ok(idcode)
    }

    /// Powers up the target's debug domain via CTRL/STAT.
    ///
    /// Required after [`Self::connect`] before AP accesses will work.
    /// Fails with `Error::NoConnection` if the target does not acknowledge
    /// the power-up request.
    pub fn power_up_debug_domain(&mut self) -> Result<(), Error> {
        let mut ctrl_stat = CtrlStat::default();
        ctrl_stat.set_cdbgpwrupreq(true);
        ctrl_stat.set_csyspwrupreq(true);
        self.write_dp_register::<CtrlStatRegister>(ctrl_stat)?;

        let status = self.read_dp_register::<CtrlStatRegister>()?;
        if !status.cdbgpwrupack() || !status.csyspwrupack() {
            debug!("Error: Debug power up not acknowledged (0x{:08X})", status.value());
            return Err(Error::NoConnection);
        }
        trace!("OK:    Debug domain powered up");
        Ok(())
    }

    /// Reads a DP register by type
    pub fn read_dp_register<R>(&mut self) -> Result<R::Value, Error>
    where
        R: DpRegister + ReadableRegister,
        R::Value: From<u32>,
    {
        self.read_dp(R::ADDRESS).map(R::Value::from)
    }

    /// Writes a DP register by type
    pub fn write_dp_register<R>(&mut self, value: R::Value) -> Result<(), Error>
    where
        R: DpRegister + WritableRegister,
        R::Value: Into<u32>,
    {
        self.write_dp(R::ADDRESS, value.into())
    }

    /// Reads a DP register by raw address
    pub fn read_dp(&mut self, addr: u8) -> Result<u32, Error> {
        self.do_read_op(SwdOp::DpRead(addr))
    }

    /// Writes a DP register by raw address
    pub fn write_dp(&mut self, addr: u8, data: u32) -> Result<(), Error> {
        if addr == SelectRegister::ADDRESS {
            // Keep the cache honest when the host writes SELECT directly
            self.select = None;
        }
        self.do_write_op(SwdOp::DpWrite(addr), data)
    }

    /// Reads an AP register by type
    pub fn read_ap_register<R>(&mut self) -> Result<R::Value, Error>
    where
        R: ApRegister + ReadableRegister,
        R::Value: From<u32>,
    {
        self.read_ap(R::AP_ADDRESS).map(R::Value::from)
    }

    /// Writes an AP register by type
    pub fn write_ap_register<R>(&mut self, value: R::Value) -> Result<(), Error>
    where
        R: ApRegister + WritableRegister,
        R::Value: Into<u32>,
    {
        self.write_ap(R::AP_ADDRESS, value.into())
    }

    /// Reads an AP register.
    ///
    /// AP reads are pipelined: the access itself returns the previous
    /// result, the real data is collected from RDBUFF.  A FAULT on the
    /// RDBUFF read surfaces a failure of the AP access itself.
    pub fn read_ap(&mut self, addr: ApAddress) -> Result<u32, Error> {
        self.update_select(addr)?;
        let _stale = self.do_read_op(SwdOp::ApRead(addr.reg()))?;
        self.do_read_op(SwdOp::DpRead(RdBuffRegister::ADDRESS))
    }

    /// Writes an AP register, then reads RDBUFF so the write completes and
    /// any fault surfaces here rather than on the next operation.
    pub fn write_ap(&mut self, addr: ApAddress, data: u32) -> Result<(), Error> {
        self.update_select(addr)?;
        self.do_write_op(SwdOp::ApWrite(addr.reg()), data)?;
        let _ = self.do_read_op(SwdOp::DpRead(RdBuffRegister::ADDRESS))?;
        Ok(())
    }

    /// Clears the sticky error flags via ABORT, recovering from a FAULT.
    /// DP reads survive a FAULT, so the flags are read and logged first.
    pub fn clear_sticky_errors(&mut self) -> Result<(), Error> {
        if let Ok(status) = self.read_dp_register::<CtrlStatRegister>()
            && status.has_errors()
        {
            warn!("Info:  {}", status.error_states());
        }
        self.write_dp_register::<usbdm_core::arm::dp::AbortRegister>(
            usbdm_core::arm::dp::Abort::clear_sticky(),
        )
    }

    /// Clears the sticky error flags and aborts any stalled AP transaction
    pub fn abort_ap(&mut self) -> Result<(), Error> {
        self.write_dp_register::<usbdm_core::arm::dp::AbortRegister>(
            usbdm_core::arm::dp::Abort::clear_sticky_and_abort_ap(),
        )
    }

    /// Routes SELECT at the given AP register, skipping the write when the
    /// cached value already matches
    fn update_select(&mut self, addr: ApAddress) -> Result<(), Error> {
        let select = Select::for_ap_addr(addr);
        if self.select == Some(select) {
            return Ok(());
        }
        self.do_write_op(SwdOp::DpWrite(SelectRegister::ADDRESS), select.value())?;
        self.select = Some(select);
        Ok(())
    }

    fn do_read_op(&mut self, op: SwdOp) -> Result<u32, Error> {
        let cmd = op.to_cmd();
        trace!("Exec:  {op} cmd 0x{cmd:02X}");
        self.protocol.send_request(cmd);
        self.wait_for_ack(op, cmd)?;

        let data = self.protocol.read_data_parity().inspect_err(|e| {
            debug!("Error: {op} - {e}");
            self.select = None;
        })?;
        trace!("OK:    {op} -> 0x{data:08X}");
        Ok(data)
    }

    fn do_write_op(&mut self, op: SwdOp, data: u32) -> Result<(), Error> {
        let cmd = op.to_cmd();
        trace!("Exec:  {op} cmd 0x{cmd:02X} data 0x{data:08X}");
        self.protocol.send_request(cmd);
        self.wait_for_ack(op, cmd)?;

        self.protocol.write_data_parity(data);
        trace!("OK:    {op}");
        Ok(())
    }

    /// Waits out WAIT acknowledges, re-sending the request each time, up to
    /// the configured attempt budget.
    fn wait_for_ack(&mut self, op: SwdOp, cmd: u8) -> Result<(), Error> {
        let mut attempts = self.config.ack_wait_retries;
        loop {
            match self.protocol.read_ack() {
                Ack::Ok => return Ok(()),
                Ack::Wait => {
                    attempts = attempts.saturating_sub(1);
                    if attempts == 0 {
                        debug!("Error: {op} - ACK timeout");
                        self.select = None;
                        self.protocol.recover_to_idle();
                        return Err(Error::AckTimeout);
                    }
                    trace!("Retry: {op}");
                    self.protocol.resend_request(cmd);
                }
                Ack::Fault => {
                    debug!("Error: {op} - FAULT");
                    self.select = None;
                    self.protocol.recover_to_idle();
                    return Err(Error::ArmFault);
                }
                Ack::Invalid(ack) => {
                    debug!("Error: {op} - no ACK ({ack})");
                    self.select = None;
                    self.protocol.recover_to_idle();
                    return Err(Error::NoConnection);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimTarget;

    fn interface(sim: SimTarget) -> SwdInterface<SimTarget> {
        SwdInterface::new(SwdProtocol::new(sim))
    }

    #[test]
    fn request_bytes() {
        // IDCODE read is the canonical request byte
        assert_eq!(SwdOp::DpRead(0x00).to_cmd(), 0xA5);
        assert_eq!(SwdOp::DpWrite(0x00).to_cmd(), 0x81);
        assert_eq!(SwdOp::DpWrite(0x08).to_cmd(), 0xB1);
        assert_eq!(SwdOp::DpRead(0x0C).to_cmd(), 0xBD);
        assert_eq!(SwdOp::ApRead(0x04).to_cmd(), 0xAF);
    }

    #[test]
    fn connect_reads_idcode() {
        let mut swd = interface(SimTarget::new());
        let idcode = swd.connect().unwrap();
        assert_eq!(idcode.data(), crate::sim::SIM_IDCODE);
        assert_eq!(swd.idcode(), Some(idcode));
    }

    #[test]
    fn power_up_acknowledged() {
        let mut swd = interface(SimTarget::new());
        swd.connect().unwrap();
        assert_eq!(swd.power_up_debug_domain(), Ok(()));
    }

    #[test]
    fn power_up_refused() {
        let mut sim = SimTarget::new();
        sim.refuse_power_up = true;
        let mut swd = interface(sim);
        swd.connect().unwrap();
        assert_eq!(swd.power_up_debug_domain(), Err(Error::NoConnection));
    }

    #[test]
    fn ack_timeout_after_exact_retry_budget() {
        let mut sim = SimTarget::new();
        sim.wait_forever = true;
        let config = SwdConfig {
            ack_wait_retries: 7,
            ..SwdConfig::default()
        };
        let mut swd = SwdInterface::with_config(SwdProtocol::new(sim), config);

        assert_eq!(swd.read_dp(0x00), Err(Error::AckTimeout));
        // One initial request plus one re-send per WAIT consumes the whole
        // budget
        assert_eq!(swd.protocol_mut().driver_mut().requests, 7);
    }

    #[test]
    fn wait_then_ok_succeeds() {
        let mut sim = SimTarget::new();
        sim.wait_responses = 3;
        let mut swd = interface(sim);
        assert_eq!(swd.read_dp(0x00), Ok(crate::sim::SIM_IDCODE));
    }

    #[test]
    fn parity_error_reported() {
        let mut sim = SimTarget::new();
        sim.flip_parity = true;
        let mut swd = interface(sim);
        assert_eq!(swd.read_dp(0x00), Err(Error::ArmParity));
    }

    #[test]
    fn ap_round_trip_through_rdbuff() {
        let mut swd = interface(SimTarget::new());
        swd.connect().unwrap();

        let addr = ApAddress::new(0x0004);
        swd.write_ap(addr, 0xCAFE_F00D).unwrap();
        assert_eq!(swd.read_ap(addr), Ok(0xCAFE_F00D));
    }

    #[test]
    fn fault_on_rdbuff_surfaces_ap_failure() {
        let mut sim = SimTarget::new();
        sim.fault_on_rdbuff = true;
        let mut swd = interface(sim);
        swd.connect().unwrap();

        assert_eq!(swd.read_ap(ApAddress::new(0x0004)), Err(Error::ArmFault));
    }

    #[test]
    fn select_cached_between_same_bank_accesses() {
        let mut swd = interface(SimTarget::new());
        swd.connect().unwrap();

        let addr = ApAddress::new(0x0004);
        swd.read_ap(addr).unwrap();
        let selects_after_first = swd.protocol_mut().driver_mut().select_writes;
        swd.read_ap(addr).unwrap();
        assert_eq!(swd.protocol_mut().driver_mut().select_writes, selects_after_first);
    }

    #[test]
    fn clearing_errors_on_clean_link_changes_nothing() {
        let mut swd = interface(SimTarget::new());
        swd.connect().unwrap();
        swd.power_up_debug_domain().unwrap();

        let before = swd.read_dp_register::<CtrlStatRegister>().unwrap();
        swd.clear_sticky_errors().unwrap();
        let after = swd.read_dp_register::<CtrlStatRegister>().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn abort_values_on_wire() {
        let mut swd = interface(SimTarget::new());
        swd.connect().unwrap();
        swd.clear_sticky_errors().unwrap();
        assert_eq!(swd.protocol_mut().driver_mut().last_abort, Some(0x1E));
        swd.abort_ap().unwrap();
        assert_eq!(swd.protocol_mut().driver_mut().last_abort, Some(0x1F));
    }
}
