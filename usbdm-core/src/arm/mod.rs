// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM debug concepts used by the SWD side of the pod.
//!
//! Targets on the SWD side are addressed through a Debug Port (DP) and one
//! or more Access Ports (AP).  [`dp`] defines the DP registers, [`mdm`] the
//! Kinetis MDM-AP used for mass erase recovery, and [`register`] the traits
//! tying register descriptors to their data types.

pub mod dp;
pub mod mdm;
pub mod register;

use core::fmt;

/// Compact AP register address.
///
/// Packs everything needed to reach one AP register into 16 bits:
///
/// ```text
///   [15:8]  AP number (DP SELECT APSEL)
///   [7:4]   register bank (DP SELECT APBANKSEL)
///   [3:2]   register within the bank (SWD request A[3:2])
///   [1:0]   always zero, registers are word aligned
/// ```
///
/// `0x013C` is therefore register `0x3C` of AP 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApAddress(u16);

impl ApAddress {
    pub const fn new(addr: u16) -> Self {
        ApAddress(addr)
    }

    /// AP number, for DP SELECT bits 31:24
    pub fn ap(&self) -> u8 {
        (self.0 >> 8) as u8
    }

    /// Register bank, for DP SELECT bits 7:4
    pub fn bank(&self) -> u8 {
        ((self.0 >> 4) & 0xF) as u8
    }

    /// Register address within the selected bank, already shifted into the
    /// A[3:2] position of an SWD request
    pub fn reg(&self) -> u8 {
        (self.0 & 0x0C) as u8
    }
}

impl From<u16> for ApAddress {
    fn from(addr: u16) -> Self {
        ApAddress(addr)
    }
}

impl fmt::Display for ApAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AP{} reg 0x{:02X}", self.ap(), self.0 & 0xFF)
    }
}
