// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Cable state shared between the dispatcher and the protocol engines.
//!
//! One [`CableState`] exists per pod.  Every field that a previous command
//! may have established and a later command relies on lives here, so that
//! selecting a new target or resetting the current one can invalidate it
//! all in one place.

use crate::{AcknMode, SpeedStatus, TargetFamily};
use serde::Serialize;

/// Everything the pod remembers about the current target between commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CableState {
    /// Currently selected target family
    pub family: TargetFamily,
    /// How the BDM speed was established, if at all
    pub speed: SpeedStatus,
    /// Measured SYNC length in timer ticks, valid when `speed` is `Sync`
    pub sync_length: u16,
    /// Whether the target acknowledges commands with ACKN pulses
    pub ackn: AcknMode,
    /// Last value written to the family's BDM control register
    pub control: u8,
    /// Cached HCS12 BDMPPR value, 0 when no page is selected
    pub bdmppr: u8,
    /// Set when a target reset has been seen and not yet reported
    pub reset_pending: bool,
}

impl CableState {
    /// Fresh state for a newly selected family.  Nothing is known about the
    /// target yet.
    pub fn new(family: TargetFamily) -> Self {
        CableState {
            family,
            speed: SpeedStatus::NoInfo,
            sync_length: 0,
            ackn: AcknMode::Wait,
            control: 0,
            bdmppr: 0,
            reset_pending: false,
        }
    }

    /// Invalidates everything derived from communication with the target.
    ///
    /// Called after any reset that may have changed the target clock.  The
    /// family selection survives; speed, ACKN mode and the BDMPPR cache do
    /// not.
    pub fn invalidate(&mut self) {
        self.speed = SpeedStatus::NoInfo;
        self.sync_length = 0;
        self.ackn = AcknMode::Wait;
        self.control = 0;
        self.bdmppr = 0;
    }

    /// Returns true if BDM communication is currently possible.
    pub fn has_speed(&self) -> bool {
        self.speed != SpeedStatus::NoInfo
    }
}

impl Default for CableState {
    fn default() -> Self {
        CableState::new(TargetFamily::Hcs12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidate_clears_speed_but_keeps_family() {
        let mut state = CableState::new(TargetFamily::Hcs08);
        state.speed = SpeedStatus::Sync;
        state.sync_length = 0x1234;
        state.ackn = AcknMode::Ackn;
        state.control = 0x80;
        state.bdmppr = 0x81;

        state.invalidate();

        assert_eq!(state.family, TargetFamily::Hcs08);
        assert_eq!(state.speed, SpeedStatus::NoInfo);
        assert_eq!(state.sync_length, 0);
        assert_eq!(state.ackn, AcknMode::Wait);
        assert_eq!(state.control, 0);
        assert_eq!(state.bdmppr, 0);
    }
}
