// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Kinetis mass erase recovery.
//!
//! A secured Kinetis part blocks its memory AP, so a normal debug connect
//! is useless.  The way back in is through the MDM-AP: hold the system in
//! reset, wait for the flash controller, then request a mass erase which
//! wipes flash and the security byte with it.
//!
//! [`SwdInterface::reset_capture_mass_erase`] is the whole recovery story:
//! it re-connects over and over, holding reset each time, and only commits
//! to the erase once the target has answered cleanly for a full settle
//! window.  That debounce matters because the sequence is typically started
//! *before* the target is plugged in, and a target with a misbehaving
//! reset circuit can produce bursts of successful transfers while still
//! power-cycling underneath.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::driver::SwdDriver;
use crate::interface::SwdInterface;
use usbdm_core::Error;
use usbdm_core::arm::mdm::{MdmControl, MdmControlRegister, MdmIdrRegister, MdmStatusRegister};

// Pause after requesting the erase before polling for completion
const ERASE_SETTLE_MS: u32 = 100;

impl<D: SwdDriver> SwdInterface<D> {
    /// Mass erases the target via the MDM-AP.
    ///
    /// The caller must already hold the system in reset (see
    /// [`Self::reset_capture_mass_erase`]).  Fails with:
    ///
    /// - `Error::FlashNotReady` if the flash controller never reports ready
    /// - `Error::MassEraseDisabled` if the part forbids mass erase
    /// - `Error::UnexpectedResponse` if the erase request doesn't latch
    /// - `Error::Fail` if the erase never completes
    pub fn mass_erase(&mut self) -> Result<(), Error> {
        debug!("Exec:  Mass erase");

        // Wait for the flash controller to come up
        let mut status = None;
        let mut last_err = Error::Fail;
        let polls = self.config().flash_ready_polls;
        for _ in 0..polls {
            match self.read_ap_register::<MdmStatusRegister>() {
                Ok(s) => {
                    status = Some(s);
                    if s.flash_ready() {
                        break;
                    }
                }
                Err(e) => {
                    last_err = e;
                    let _ = self.clear_sticky_errors();
                }
            }
        }
        let status = status.ok_or(last_err)?;
        if !status.flash_ready() {
            debug!("Error: Mass erase - flash never ready");
            return Err(Error::FlashNotReady);
        }
        if !status.mass_erase_enable() {
            debug!("Error: Mass erase - disabled on this part");
            return Err(Error::MassEraseDisabled);
        }

        // Request the erase and check it latched
        self.write_ap_register::<MdmControlRegister>(MdmControl::erase_in_reset())?;
        let control = self.read_ap_register::<MdmControlRegister>()?;
        if !control.mass_erase_request() {
            debug!("Error: Mass erase - request did not latch ({control})");
            return Err(Error::UnexpectedResponse);
        }

        // The request bit self-clears when the erase finishes
        self.protocol_mut().delay_ms(ERASE_SETTLE_MS);
        let polls = self.config().erase_polls;
        for _ in 0..polls {
            if let Ok(control) = self.read_ap_register::<MdmControlRegister>()
                && !control.mass_erase_request()
            {
                info!("OK:    Mass erase complete");
                return Ok(());
            }
        }
        debug!("Error: Mass erase - did not complete");
        Err(Error::Fail)
    }

    /// Captures the target out of reset and mass erases it.
    ///
    /// Repeats connect / power-up / hold-reset / MDM-AP probe rounds until
    /// the target
    /// has answered cleanly for `settle_count` consecutive rounds, then
    /// performs the erase.  Any failed transfer restarts the settle window.
    /// An erase the part itself refuses (`MassEraseDisabled`,
    /// `FlashNotReady`) is returned immediately - that is the target's
    /// policy, not a link failure.
    /// With no `connect_attempt_limit` configured this runs until the
    /// target appears, which is the wanted behaviour on a pod - start the
    /// recovery, then plug the target in.
    ///
    /// Returns the final MDM-AP control value, reported back to the host.
    pub fn reset_capture_mass_erase(&mut self) -> Result<u32, Error> {
        info!("Exec:  Reset capture mass erase");
        let mut settle: u32 = 0;
        let mut attempts: u32 = 0;
        loop {
            if let Some(limit) = self.config().connect_attempt_limit
                && attempts >= limit
            {
                debug!("Error: Reset capture - attempt budget exhausted");
                return Err(Error::Fail);
            }
            attempts = attempts.saturating_add(1);

            if self.connect().is_err() {
                settle = 0;
                continue;
            }
            if self.power_up_debug_domain().is_err() {
                settle = 0;
                continue;
            }
            if self
                .write_ap_register::<MdmControlRegister>(MdmControl::hold_reset())
                .is_err()
            {
                let _ = self.clear_sticky_errors();
                settle = 0;
                continue;
            }
            if self.read_ap_register::<MdmIdrRegister>().is_err() {
                let _ = self.clear_sticky_errors();
                settle = 0;
                continue;
            }
            if self.read_ap_register::<MdmControlRegister>().is_err() {
                let _ = self.clear_sticky_errors();
                settle = 0;
                continue;
            }

            settle += 1;
            if settle > self.config().settle_count {
                settle = 0;
                match self.mass_erase() {
                    Ok(()) => break,
                    // Target policy, not a flaky link - reconnecting
                    // cannot change the answer
                    Err(e @ (Error::MassEraseDisabled | Error::FlashNotReady)) => {
                        return Err(e);
                    }
                    Err(_) => (),
                }
            }
        }

        self.read_ap_register::<MdmControlRegister>().map(u32::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SwdProtocol;
    use crate::sim::SimTarget;
    use crate::SwdConfig;

    fn interface_with(sim: SimTarget, config: SwdConfig) -> SwdInterface<SimTarget> {
        SwdInterface::with_config(SwdProtocol::new(sim), config)
    }

    fn quick_config() -> SwdConfig {
        SwdConfig {
            settle_count: 3,
            flash_ready_polls: 8,
            erase_polls: 8,
            ..SwdConfig::default()
        }
    }

    #[test]
    fn mass_erase_succeeds() {
        let mut swd = interface_with(SimTarget::new(), quick_config());
        swd.connect().unwrap();

        assert_eq!(swd.mass_erase(), Ok(()));
        let sim = swd.protocol_mut().driver_mut();
        assert!(sim.erase_requested);
        assert_eq!(sim.delays_ms, 100);
    }

    #[test]
    fn mass_erase_flash_never_ready() {
        let mut sim = SimTarget::new();
        sim.mdm_status = 0x20; // erase enabled, never ready
        let mut swd = interface_with(sim, quick_config());
        swd.connect().unwrap();

        assert_eq!(swd.mass_erase(), Err(Error::FlashNotReady));
        assert!(!swd.protocol_mut().driver_mut().erase_requested);
    }

    #[test]
    fn mass_erase_disabled() {
        let mut sim = SimTarget::new();
        sim.mdm_status = 0x02; // ready but erase disabled
        let mut swd = interface_with(sim, quick_config());
        swd.connect().unwrap();

        assert_eq!(swd.mass_erase(), Err(Error::MassEraseDisabled));
    }

    #[test]
    fn mass_erase_request_must_latch() {
        let mut sim = SimTarget::new();
        sim.drop_erase_request = true;
        let mut swd = interface_with(sim, quick_config());
        swd.connect().unwrap();

        assert_eq!(swd.mass_erase(), Err(Error::UnexpectedResponse));
    }

    #[test]
    fn mass_erase_never_completes() {
        let mut sim = SimTarget::new();
        sim.erase_busy_reads = u32::MAX;
        let mut swd = interface_with(sim, quick_config());
        swd.connect().unwrap();

        assert_eq!(swd.mass_erase(), Err(Error::Fail));
    }

    #[test]
    fn recovery_debounces_flaky_connects() {
        let mut sim = SimTarget::new();
        // Target power-cycling: every other connect round fails, so the
        // settle window must keep restarting
        for ii in 0..12 {
            sim.connect_acks.push_back(ii % 2 == 0);
        }
        let mut swd = interface_with(sim, quick_config());

        let control = swd.reset_capture_mass_erase().unwrap();
        // Erase finished: reset held, request bit cleared
        assert_eq!(control, 0x08);

        let sim = swd.protocol_mut().driver_mut();
        assert!(sim.erase_requested);
        // 12 flaky rounds, then settle_count + 1 clean rounds to commit
        assert_eq!(sim.connects, 16);
    }

    #[test]
    fn recovery_reports_disabled_erase_immediately() {
        let mut sim = SimTarget::new();
        sim.mdm_status = 0x02; // ready but erase disabled
        let config = SwdConfig {
            connect_attempt_limit: Some(50),
            ..quick_config()
        };
        let mut swd = interface_with(sim, config);

        assert_eq!(
            swd.reset_capture_mass_erase(),
            Err(Error::MassEraseDisabled)
        );
        // settle_count + 1 clean rounds, then the refusal ends the run
        assert_eq!(swd.protocol_mut().driver_mut().connects, 4);
    }

    #[test]
    fn recovery_attempt_budget() {
        let mut sim = SimTarget::new();
        for _ in 0..32 {
            sim.connect_acks.push_back(false);
        }
        let config = SwdConfig {
            connect_attempt_limit: Some(5),
            ..quick_config()
        };
        let mut swd = interface_with(sim, config);

        assert_eq!(swd.reset_capture_mass_erase(), Err(Error::Fail));
        assert_eq!(swd.protocol_mut().driver_mut().connects, 5);
    }
}
