// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! BDM link management.
//!
//! [`BdmLink`] wraps a [`BdmDriver`] and owns the [`CableState`], providing
//! the family-independent operations: connect, speed control, status and
//! control register access, reset and execution control.  Family-specific
//! memory and register access lives in the [`crate::hcs12`], [`crate::hcs08`]
//! and [`crate::cfv1`] modules, which reach the wire through this type.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use usbdm_core::bdm::{cfv1, hc08, hc12};
use usbdm_core::{
    AcknMode, CableState, Error, ResetMethod, ResetMode, SpeedStatus, TargetFamily,
};

use crate::{BdmDriver, BdmOptions, ClockSelect};

/// A BDM cable to a single target.
///
/// Owns the pin driver and the per-target state.  All commands that touch
/// the wire go through here or through the family engines, which take a
/// `&mut BdmLink`.
pub struct BdmLink<D: BdmDriver> {
    pub(crate) driver: D,
    pub(crate) state: CableState,
    options: BdmOptions,
}

impl<D: BdmDriver> BdmLink<D> {
    /// Creates a link for the given target family.  No communication takes
    /// place until [`connect`](Self::connect) or
    /// [`set_speed`](Self::set_speed).
    pub fn new(driver: D, family: TargetFamily) -> Self {
        Self::with_options(driver, family, BdmOptions::default())
    }

    /// Creates a link with non-default options.
    pub fn with_options(driver: D, family: TargetFamily, options: BdmOptions) -> Self {
        BdmLink {
            driver,
            state: CableState::new(family),
            options,
        }
    }

    /// Current cable state.
    pub fn state(&self) -> &CableState {
        &self.state
    }

    /// Currently selected family.
    pub fn family(&self) -> TargetFamily {
        self.state.family
    }

    /// Replaces the behaviour options.  Takes effect on the next connect.
    pub fn set_options(&mut self, options: BdmOptions) {
        self.options = options;
    }

    /// Selects a new target family, discarding all state established with
    /// the previous target.
    pub fn select_family(&mut self, family: TargetFamily) {
        trace!("Exec:  Select family {family}");
        self.state = CableState::new(family);
        self.driver.deselect_timing();
    }

    /// Direct driver access for tests
    #[cfg(any(test, feature = "sim"))]
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Fails unless the communication speed has been established.
    pub(crate) fn require_speed(&self) -> Result<(), Error> {
        if self.state.has_speed() {
            Ok(())
        } else {
            Err(Error::NoConnection)
        }
    }

    /// Connects to the target: measures its speed with SYNC, negotiates
    /// ACKN and enables the debug module.
    ///
    /// When the options request a particular BDM clock source, the status
    /// register's clock select bit is rewritten and the whole sequence is
    /// repeated, since changing the clock source changes the speed.
    pub fn connect(&mut self) -> Result<(), Error> {
        trace!("Exec:  Connect {}", self.state.family);
        self.physical_connect()?;

        if self.options.clock == ClockSelect::Default {
            return Ok(());
        }
        let want_alt = self.options.clock == ClockSelect::AltClock;
        let status = self.read_status_raw()?;
        let clk_bit = match self.state.family {
            TargetFamily::Hcs12 => hc12::BDMSTS_CLKSW,
            TargetFamily::Cfv1 => cfv1::XCSR_CLKSW,
            _ => hc08::BDCSCR_CLKSW,
        };
        if (status & clk_bit != 0) != want_alt {
            let value = if want_alt {
                status | clk_bit
            } else {
                status & !clk_bit
            };
            self.write_control(value)?;
            trace!("Info:  Clock source changed, re-syncing");
            self.physical_connect()?;
        }
        Ok(())
    }

    /// SYNC, timing selection, ACKN negotiation and debug module enable.
    fn physical_connect(&mut self) -> Result<(), Error> {
        let sync_length = self.driver.sync().inspect_err(|_| {
            self.state.invalidate();
            self.driver.deselect_timing();
        })?;
        self.driver.select_timing(sync_length)?;
        self.state.sync_length = sync_length;
        self.state.speed = SpeedStatus::Sync;
        self.ackn_init()?;
        self.enable_bdm()?;
        info!("OK:    Connected, SYNC {sync_length} ticks");
        Ok(())
    }

    /// Sends the family's ACK_ENABLE and records whether the target
    /// supports hardware ACKN.
    fn ackn_init(&mut self) -> Result<(), Error> {
        let opcode = match self.state.family {
            TargetFamily::Hcs12 => hc12::ACK_ENABLE,
            TargetFamily::Cfv1 => cfv1::ACK_ENABLE,
            _ => hc08::ACK_ENABLE,
        };
        self.state.ackn = if self.driver.enable_ackn(opcode)? {
            AcknMode::Ackn
        } else {
            AcknMode::Wait
        };
        trace!("Info:  ACKN mode {:?}", self.state.ackn);
        Ok(())
    }

    /// Sets the ENBDM bit if the target doesn't already have it set.
    fn enable_bdm(&mut self) -> Result<(), Error> {
        let status = self.read_status_raw()?;
        let enbdm = match self.state.family {
            TargetFamily::Hcs12 => hc12::BDMSTS_ENBDM,
            TargetFamily::Cfv1 => cfv1::XCSR_ENBDM,
            _ => hc08::BDCSCR_ENBDM,
        };
        if status & enbdm == 0 {
            let mut value = status | enbdm;
            if self.state.family == TargetFamily::Cfv1 {
                // Writing SEC back as 1 would re-secure the part
                value &= !cfv1::XCSR_SEC;
            }
            self.write_control_raw(value)?;
        }
        Ok(())
    }

    /// Sets the communication speed from a user-supplied SYNC length, or
    /// re-connects when the length is zero.
    pub fn set_speed(&mut self, sync_length: u16) -> Result<(), Error> {
        trace!("Exec:  Set speed {sync_length}");
        if sync_length == 0 {
            return self.connect();
        }
        if let Err(e) = self.driver.select_timing(sync_length) {
            self.state.sync_length = 1;
            self.state.speed = SpeedStatus::NoInfo;
            self.state.ackn = AcknMode::Wait;
            error!("Error: No timing entry for SYNC length {sync_length}");
            return Err(e);
        }
        self.state.sync_length = sync_length;
        self.state.speed = SpeedStatus::UserSupplied;
        self.ackn_init()?;
        self.enable_bdm()
    }

    /// Last established SYNC length in timer ticks.
    pub fn sync_length(&self) -> u16 {
        self.state.sync_length
    }

    /// Reads the family's BDM status register.
    ///
    /// On CFV1 a command overrun reported in XCSR triggers a recovery
    /// ladder before the status is re-read, so the caller sees the state
    /// after recovery rather than the stale overrun.
    pub fn read_status(&mut self) -> Result<u8, Error> {
        let status = self.read_status_raw()?;
        if self.state.family == TargetFamily::Cfv1
            && status & cfv1::XCSR_CSTAT == cfv1::XCSR_CSTAT_OVERRUN
        {
            warn!("Retry: CFV1 command overrun, recovering");
            self.recover_cfv1()?;
            return self.read_status_raw();
        }
        Ok(status)
    }

    /// Writes the family's BDM control register.  On CFV1 the security bit
    /// is masked so a read-modify-write can't accidentally re-secure the
    /// part.
    pub fn write_control(&mut self, value: u8) -> Result<(), Error> {
        let value = if self.state.family == TargetFamily::Cfv1 {
            value & !cfv1::XCSR_SEC
        } else {
            value
        };
        self.write_control_raw(value)
    }

    /// Reads the status register without overrun handling.
    pub(crate) fn read_status_raw(&mut self) -> Result<u8, Error> {
        self.require_speed()?;
        match self.state.family {
            TargetFamily::Hcs12 => crate::hcs12::bd_read_byte(self, hc12::BDMSTS_ADDR),
            TargetFamily::Cfv1 => {
                let mut rx = [0u8; 1];
                self.driver.transact(&[cfv1::READ_XCSR_BYTE], &mut rx)?;
                Ok(rx[0])
            }
            _ => {
                let mut rx = [0u8; 1];
                self.driver.transact(&[hc08::READ_STATUS], &mut rx)?;
                Ok(rx[0])
            }
        }
    }

    /// Writes the control register with no masking.
    pub(crate) fn write_control_raw(&mut self, value: u8) -> Result<(), Error> {
        self.require_speed()?;
        self.state.control = value;
        match self.state.family {
            TargetFamily::Hcs12 => crate::hcs12::bd_write_byte(self, hc12::BDMSTS_ADDR, value),
            TargetFamily::Cfv1 => self
                .driver
                .transact(&[cfv1::WRITE_XCSR_BYTE, value], &mut []),
            _ => self.driver.transact(&[hc08::WRITE_CONTROL, value], &mut []),
        }
    }

    /// Escalating recovery from a CFV1 command overrun.
    ///
    /// Tries a re-connect, then re-connect plus BACKGROUND, then a special
    /// mode software reset, flushing with NOP and checking XCSR after each
    /// rung.  Gives up with `Error::HcsAccess` when none of them clear the
    /// overrun.
    fn recover_cfv1(&mut self) -> Result<(), Error> {
        for attempt in 0..3 {
            match attempt {
                0 => self.connect()?,
                1 => {
                    self.connect()?;
                    self.driver.transact(&[cfv1::BACKGROUND], &mut [])?;
                }
                _ => {
                    self.driver.reset_line(ResetMethod::Software, true)?;
                    self.connect()?;
                }
            }
            self.driver.transact(&[cfv1::NOP], &mut [])?;
            let mut rx = [0u8; 1];
            self.driver.transact(&[cfv1::READ_XCSR_BYTE], &mut rx)?;
            if rx[0] & cfv1::XCSR_CSTAT == cfv1::XCSR_CSTAT_OK {
                info!("OK:    CFV1 recovered on attempt {}", attempt + 1);
                return Ok(());
            }
        }
        error!("Error: CFV1 overrun recovery failed");
        Err(Error::HcsAccess)
    }

    /// Resets the target.
    ///
    /// A reset through anything other than the BDM command set may change
    /// the target clock, so a SYNC-measured speed is invalidated.  A
    /// user-supplied speed is assumed to still hold.
    pub fn reset(&mut self, method: ResetMethod, mode: ResetMode) -> Result<(), Error> {
        trace!("Exec:  Reset {method:?} {mode:?}");
        self.state.bdmppr = 0;
        let method = if method == ResetMethod::All {
            ResetMethod::Hardware
        } else {
            method
        };
        let result = self
            .driver
            .reset_line(method, mode == ResetMode::Special);
        if self.state.speed == SpeedStatus::UserSupplied {
            self.state.ackn = AcknMode::Wait;
        } else {
            self.state.invalidate();
            self.driver.deselect_timing();
        }
        self.state.reset_pending = false;
        result
    }

    /// Halts the target by forcing it into active background mode.
    pub fn halt(&mut self) -> Result<(), Error> {
        self.require_speed()?;
        let opcode = match self.state.family {
            TargetFamily::Cfv1 => cfv1::BACKGROUND,
            _ => hc12::BACKGROUND,
        };
        self.driver.transact(&[opcode], &mut [])
    }

    /// Resumes execution from the current PC.
    pub fn go(&mut self) -> Result<(), Error> {
        self.require_speed()?;
        let opcode = match self.state.family {
            TargetFamily::Cfv1 => cfv1::GO,
            _ => hc12::GO,
        };
        self.driver.transact(&[opcode], &mut [])
    }

    /// Executes a single instruction and returns to background mode.
    pub fn step(&mut self) -> Result<(), Error> {
        self.require_speed()?;
        match self.state.family {
            TargetFamily::Cfv1 => crate::cfv1::step(self),
            _ => self.driver.transact(&[hc12::TRACE1], &mut []),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBdm;
    use alloc::vec;

    #[test]
    fn connect_measures_speed_and_enables_bdm() {
        let sim = SimBdm::new(TargetFamily::Hcs08);
        let mut link = BdmLink::new(sim, TargetFamily::Hcs08);

        link.connect().unwrap();

        assert_eq!(link.state().speed, SpeedStatus::Sync);
        assert_eq!(link.sync_length(), SimBdm::SYNC_TICKS);
        assert_eq!(link.state().ackn, AcknMode::Ackn);
        assert_ne!(link.driver_mut().status & hc08::BDCSCR_ENBDM, 0);
    }

    #[test]
    fn connect_fails_cleanly_with_no_target() {
        let mut sim = SimBdm::new(TargetFamily::Hcs12);
        sim.sync_fails = true;
        let mut link = BdmLink::new(sim, TargetFamily::Hcs12);

        assert_eq!(link.connect(), Err(Error::NoConnection));
        assert_eq!(link.state().speed, SpeedStatus::NoInfo);
        assert!(!link.state().has_speed());
    }

    #[test]
    fn set_speed_records_user_supplied_rate() {
        let sim = SimBdm::new(TargetFamily::Hcs08);
        let mut link = BdmLink::new(sim, TargetFamily::Hcs08);

        link.set_speed(0x0456).unwrap();

        assert_eq!(link.state().speed, SpeedStatus::UserSupplied);
        assert_eq!(link.sync_length(), 0x0456);
    }

    #[test]
    fn set_speed_zero_means_connect() {
        let sim = SimBdm::new(TargetFamily::Hcs08);
        let mut link = BdmLink::new(sim, TargetFamily::Hcs08);

        link.set_speed(0).unwrap();

        assert_eq!(link.state().speed, SpeedStatus::Sync);
        assert_eq!(link.sync_length(), SimBdm::SYNC_TICKS);
    }

    #[test]
    fn set_speed_out_of_range_invalidates_state() {
        let mut sim = SimBdm::new(TargetFamily::Hcs08);
        sim.timing_fails = true;
        let mut link = BdmLink::new(sim, TargetFamily::Hcs08);

        assert_eq!(link.set_speed(0xFFFF), Err(Error::NoConnection));
        assert_eq!(link.state().speed, SpeedStatus::NoInfo);
        assert_eq!(link.sync_length(), 1);
        assert_eq!(link.state().ackn, AcknMode::Wait);
    }

    #[test]
    fn reset_invalidates_synced_speed() {
        let sim = SimBdm::new(TargetFamily::Hcs12);
        let mut link = BdmLink::new(sim, TargetFamily::Hcs12);
        link.connect().unwrap();

        link.reset(ResetMethod::Hardware, ResetMode::Special).unwrap();

        assert_eq!(link.state().speed, SpeedStatus::NoInfo);
        assert_eq!(link.state().bdmppr, 0);
        assert_eq!(
            link.driver_mut().resets,
            vec![(ResetMethod::Hardware, true)]
        );
    }

    #[test]
    fn reset_keeps_user_supplied_speed() {
        let sim = SimBdm::new(TargetFamily::Hcs08);
        let mut link = BdmLink::new(sim, TargetFamily::Hcs08);
        link.set_speed(0x0300).unwrap();

        link.reset(ResetMethod::Software, ResetMode::Normal).unwrap();

        assert_eq!(link.state().speed, SpeedStatus::UserSupplied);
        assert_eq!(link.sync_length(), 0x0300);
        assert_eq!(link.state().ackn, AcknMode::Wait);
    }

    #[test]
    fn reset_all_degrades_to_hardware() {
        let sim = SimBdm::new(TargetFamily::Hcs08);
        let mut link = BdmLink::new(sim, TargetFamily::Hcs08);
        link.connect().unwrap();

        link.reset(ResetMethod::All, ResetMode::Normal).unwrap();

        assert_eq!(
            link.driver_mut().resets,
            vec![(ResetMethod::Hardware, false)]
        );
    }

    #[test]
    fn operations_require_established_speed() {
        let sim = SimBdm::new(TargetFamily::Hcs08);
        let mut link = BdmLink::new(sim, TargetFamily::Hcs08);

        assert_eq!(link.halt(), Err(Error::NoConnection));
        assert_eq!(link.go(), Err(Error::NoConnection));
        assert_eq!(link.read_status(), Err(Error::NoConnection));
    }

    #[test]
    fn alt_clock_rewrites_clksw_and_resyncs() {
        let sim = SimBdm::new(TargetFamily::Hcs08);
        let mut link = BdmLink::with_options(
            sim,
            TargetFamily::Hcs08,
            BdmOptions {
                clock: ClockSelect::AltClock,
            },
        );

        link.connect().unwrap();

        assert_ne!(link.driver_mut().status & hc08::BDCSCR_CLKSW, 0);
        // Initial connect plus the re-sync after the clock switch
        assert_eq!(link.driver_mut().syncs, 2);
    }

    #[test]
    fn clock_rewrite_never_writes_security_bit() {
        let mut sim = SimBdm::new(TargetFamily::Cfv1);
        sim.status = cfv1::XCSR_ENBDM | cfv1::XCSR_SEC;
        let mut link = BdmLink::with_options(
            sim,
            TargetFamily::Cfv1,
            BdmOptions {
                clock: ClockSelect::AltClock,
            },
        );

        link.connect().unwrap();

        // Clock switched, but SEC must not have been written back as 1
        let status = link.driver_mut().status;
        assert_ne!(status & cfv1::XCSR_CLKSW, 0);
        assert_eq!(status & cfv1::XCSR_SEC, 0);
    }

    #[test]
    fn cfv1_overrun_triggers_recovery() {
        let mut sim = SimBdm::new(TargetFamily::Cfv1);
        sim.status = cfv1::XCSR_ENBDM | cfv1::XCSR_CSTAT_OVERRUN;
        sim.overrun_clears_after_nops = 1;
        let mut link = BdmLink::new(sim, TargetFamily::Cfv1);
        link.connect().unwrap();
        link.driver_mut().status = cfv1::XCSR_ENBDM | cfv1::XCSR_CSTAT_OVERRUN;

        let status = link.read_status().unwrap();

        assert_eq!(status & cfv1::XCSR_CSTAT, cfv1::XCSR_CSTAT_OK);
        assert!(link.driver_mut().nops > 0);
    }
}
