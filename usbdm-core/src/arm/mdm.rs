// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Kinetis MDM-AP Registers
//!
//! Kinetis parts expose a vendor AP (AP 1) controlling flash security and
//! mass erase.  A secured part refuses normal memory AP access, so the only
//! way back in is to request a mass erase through this AP while holding the
//! core in reset.

use crate::arm::ApAddress;
use crate::arm::register::{ApRegister, ReadableRegister, RegisterDescriptor, WritableRegister};
use crate::{register_data_r, register_data_rw};
use core::fmt;

/// MDM-AP Status register descriptor (read-only)
pub struct MdmStatusRegister;

impl RegisterDescriptor for MdmStatusRegister {
    const ADDRESS: u8 = 0x00;
    type Value = MdmStatus;
}

impl ReadableRegister for MdmStatusRegister {}
impl ApRegister for MdmStatusRegister {
    const AP_ADDRESS: ApAddress = ApAddress::new(0x0100);
}

/// MDM-AP Status register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MdmStatus(u32);

register_data_r!(MdmStatus);

impl MdmStatus {
    const MASS_ERASE_ACK: u32 = 1 << 0;
    const FLASH_READY: u32 = 1 << 1;
    const SYSTEM_SECURITY: u32 = 1 << 2;
    const MASS_ERASE_ENABLE: u32 = 1 << 5;

    /// Flash controller has finished initialisation and can accept a mass
    /// erase request
    pub fn flash_ready(&self) -> bool {
        self.0 & Self::FLASH_READY != 0
    }

    /// Mass erase is permitted on this part
    pub fn mass_erase_enable(&self) -> bool {
        self.0 & Self::MASS_ERASE_ENABLE != 0
    }

    /// Part is secured, memory AP access is blocked
    pub fn system_security(&self) -> bool {
        self.0 & Self::SYSTEM_SECURITY != 0
    }

    /// Flash controller has acknowledged a mass erase
    pub fn mass_erase_ack(&self) -> bool {
        self.0 & Self::MASS_ERASE_ACK != 0
    }
}

/// MDM-AP Control register descriptor (read-write)
pub struct MdmControlRegister;

impl RegisterDescriptor for MdmControlRegister {
    const ADDRESS: u8 = 0x04;
    type Value = MdmControl;
}

impl ReadableRegister for MdmControlRegister {}
impl WritableRegister for MdmControlRegister {}
impl ApRegister for MdmControlRegister {
    const AP_ADDRESS: ApAddress = ApAddress::new(0x0104);
}

/// MDM-AP Control register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MdmControl(u32);

register_data_rw!(MdmControl);

impl MdmControl {
    const MASS_ERASE_REQUEST: u32 = 1 << 0;
    const DEBUG_REQUEST: u32 = 1 << 2;
    const RESET_REQUEST: u32 = 1 << 3;

    /// Hold the system in reset
    pub const fn hold_reset() -> Self {
        MdmControl(Self::RESET_REQUEST)
    }

    /// Request a mass erase while holding the system in reset
    pub const fn erase_in_reset() -> Self {
        MdmControl(Self::RESET_REQUEST | Self::MASS_ERASE_REQUEST)
    }

    /// Mass erase request bit.  Stays set while the erase is in progress
    /// and self-clears on completion.
    pub fn mass_erase_request(&self) -> bool {
        self.0 & Self::MASS_ERASE_REQUEST != 0
    }

    /// Debug request bit
    pub fn debug_request(&self) -> bool {
        self.0 & Self::DEBUG_REQUEST != 0
    }

    /// System reset request bit
    pub fn reset_request(&self) -> bool {
        self.0 & Self::RESET_REQUEST != 0
    }

    /// Set mass erase request
    pub fn set_mass_erase_request(&mut self, enable: bool) {
        if enable {
            self.0 |= Self::MASS_ERASE_REQUEST;
        } else {
            self.0 &= !Self::MASS_ERASE_REQUEST;
        }
    }

    /// Set system reset request
    pub fn set_reset_request(&mut self, enable: bool) {
        if enable {
            self.0 |= Self::RESET_REQUEST;
        } else {
            self.0 &= !Self::RESET_REQUEST;
        }
    }
}

/// MDM-AP IDR register descriptor (read-only)
pub struct MdmIdrRegister;

impl RegisterDescriptor for MdmIdrRegister {
    const ADDRESS: u8 = 0xFC;
    type Value = MdmIdr;
}

impl ReadableRegister for MdmIdrRegister {}
impl ApRegister for MdmIdrRegister {
    const AP_ADDRESS: ApAddress = ApAddress::new(0x01FC);
}

/// MDM-AP IDR register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MdmIdr(u32);

register_data_r!(MdmIdr);

impl MdmIdr {
    /// IDR value reported by Kinetis MDM-APs
    pub const KINETIS: u32 = 0x001C_0000;

    pub fn data(&self) -> u32 {
        self.0
    }

    /// Check this looks like a Kinetis MDM-AP
    pub fn is_kinetis(&self) -> bool {
        self.0 == Self::KINETIS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_values() {
        assert_eq!(u32::from(MdmControl::hold_reset()), 0x08);
        assert_eq!(u32::from(MdmControl::erase_in_reset()), 0x09);
        assert!(MdmControl::erase_in_reset().mass_erase_request());
    }

    #[test]
    fn status_bits() {
        let status = MdmStatus::from(0x22);
        assert!(status.flash_ready());
        assert!(status.mass_erase_enable());
        assert!(!status.system_security());
    }
}
