// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! HCS12 family engine.
//!
//! Memory on HCS12 is word-oriented on the BDM side: byte accesses move a
//! whole word with the byte in the lane selected by address parity.  The
//! engine aligns transfers by peeling an odd leading byte, moving the bulk
//! as words and finishing with a trailing byte when the count is odd.
//!
//! Two bulk paths exist.  The fast path seeds the X register and uses the
//! auto-incrementing READ_NEXT/WRITE_NEXT commands, one opcode per word.
//! It must not be used inside the 0xFFxx page where the BDM firmware
//! itself lives, so transfers that reach it fall back to the addressed
//! word commands.
//!
//! Addresses above 64K are reached through the BDMPPR page register,
//! selected by the GLOBAL memory space flag and cached in the cable state.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use usbdm_core::bdm::hc12;
use usbdm_core::{memory_space, Error};

use crate::{BdmDriver, BdmLink};

/// Reads a byte from the BDM firmware's own address space.
pub fn bd_read_byte<D: BdmDriver>(link: &mut BdmLink<D>, addr: u16) -> Result<u8, Error> {
    link.require_speed()?;
    let mut rx = [0u8; 2];
    let a = addr.to_be_bytes();
    link.driver
        .transact(&[hc12::READ_BD_BYTE, a[0], a[1]], &mut rx)?;
    Ok(rx[(addr & 1) as usize])
}

/// Writes a byte into the BDM firmware's own address space.
pub fn bd_write_byte<D: BdmDriver>(
    link: &mut BdmLink<D>,
    addr: u16,
    value: u8,
) -> Result<(), Error> {
    link.require_speed()?;
    let a = addr.to_be_bytes();
    // The byte is carried in both lanes; the target takes the one the
    // address parity selects
    link.driver
        .transact(&[hc12::WRITE_BD_BYTE, a[0], a[1], value, value], &mut [])
}

/// Programs BDMPPR for the access, or clears it for non-global accesses.
/// The cable state caches the last value written so repeated accesses to
/// the same page cost nothing.
fn set_bdmppr<D: BdmDriver>(link: &mut BdmLink<D>, space: u8, addr: u32) -> Result<(), Error> {
    let page = if space & memory_space::GLOBAL != 0 {
        hc12::BDMPPR_BPAE | ((addr >> 16) as u8 & 0x0F)
    } else {
        0
    };
    if link.state.bdmppr != page {
        bd_write_byte(link, hc12::BDMPPR_ADDR, page)?;
        link.state.bdmppr = page;
    }
    Ok(())
}

fn read_single<D: BdmDriver>(link: &mut BdmLink<D>, addr: u16) -> Result<u8, Error> {
    let mut rx = [0u8; 2];
    let a = addr.to_be_bytes();
    link.driver
        .transact(&[hc12::READ_BYTE, a[0], a[1]], &mut rx)?;
    Ok(rx[(addr & 1) as usize])
}

fn write_single<D: BdmDriver>(link: &mut BdmLink<D>, addr: u16, value: u8) -> Result<(), Error> {
    let a = addr.to_be_bytes();
    link.driver
        .transact(&[hc12::WRITE_BYTE, a[0], a[1], value, value], &mut [])
}

// The fast path must not run inside the 0xFFxx page
fn in_firmware_page(addr: u16) -> bool {
    addr & 0xFF00 == 0xFF00
}

/// Reads `buf.len()` bytes starting at `addr`.
pub fn read_mem<D: BdmDriver>(
    link: &mut BdmLink<D>,
    space: u8,
    addr: u32,
    buf: &mut [u8],
) -> Result<(), Error> {
    link.require_speed()?;
    trace!("Exec:  HCS12 read {} bytes @0x{addr:06X}", buf.len());
    set_bdmppr(link, space, addr)?;

    let mut addr = addr as u16;
    let mut done = 0;

    // Peel an odd leading byte so the bulk is word aligned
    if addr & 1 != 0 && !buf.is_empty() {
        buf[0] = read_single(link, addr)?;
        addr = addr.wrapping_add(1);
        done = 1;
    }

    if space & memory_space::FAST != 0 && buf.len() - done > 1 && !in_firmware_page(addr) {
        // READ_NEXT pre-increments X by 2, so seed it two short
        let x = addr.wrapping_sub(2).to_be_bytes();
        link.driver
            .transact(&[hc12::WRITE_X, x[0], x[1]], &mut [])?;
        while buf.len() - done > 1 && !in_firmware_page(addr) {
            let mut rx = [0u8; 2];
            link.driver.transact(&[hc12::READ_NEXT], &mut rx)?;
            buf[done..done + 2].copy_from_slice(&rx);
            addr = addr.wrapping_add(2);
            done += 2;
        }
    }

    while buf.len() - done > 1 {
        let a = addr.to_be_bytes();
        let mut rx = [0u8; 2];
        link.driver
            .transact(&[hc12::READ_WORD, a[0], a[1]], &mut rx)?;
        buf[done..done + 2].copy_from_slice(&rx);
        addr = addr.wrapping_add(2);
        done += 2;
    }

    if done < buf.len() {
        buf[done] = read_single(link, addr)?;
    }
    Ok(())
}

/// Writes `data` starting at `addr`.
pub fn write_mem<D: BdmDriver>(
    link: &mut BdmLink<D>,
    space: u8,
    addr: u32,
    data: &[u8],
) -> Result<(), Error> {
    link.require_speed()?;
    trace!("Exec:  HCS12 write {} bytes @0x{addr:06X}", data.len());
    set_bdmppr(link, space, addr)?;

    let mut addr = addr as u16;
    let mut data = data;

    if addr & 1 != 0 && !data.is_empty() {
        write_single(link, addr, data[0])?;
        addr = addr.wrapping_add(1);
        data = &data[1..];
    }

    if space & memory_space::FAST != 0 && data.len() > 1 && !in_firmware_page(addr) {
        let x = addr.wrapping_sub(2).to_be_bytes();
        link.driver
            .transact(&[hc12::WRITE_X, x[0], x[1]], &mut [])?;
        while data.len() > 1 && !in_firmware_page(addr) {
            link.driver
                .transact(&[hc12::WRITE_NEXT, data[0], data[1]], &mut [])?;
            addr = addr.wrapping_add(2);
            data = &data[2..];
        }
    }

    while data.len() > 1 {
        let a = addr.to_be_bytes();
        link.driver
            .transact(&[hc12::WRITE_WORD, a[0], a[1], data[0], data[1]], &mut [])?;
        addr = addr.wrapping_add(2);
        data = &data[2..];
    }

    if !data.is_empty() {
        write_single(link, addr, data[0])?;
    }
    Ok(())
}

/// Reads a core register.
pub fn read_reg<D: BdmDriver>(link: &mut BdmLink<D>, reg: hc12::Reg) -> Result<u16, Error> {
    link.require_speed()?;
    let mut rx = [0u8; 2];
    link.driver
        .transact(&[hc12::READ_REG | reg as u8], &mut rx)?;
    Ok(u16::from_be_bytes(rx))
}

/// Writes a core register.
pub fn write_reg<D: BdmDriver>(
    link: &mut BdmLink<D>,
    reg: hc12::Reg,
    value: u16,
) -> Result<(), Error> {
    link.require_speed()?;
    let v = value.to_be_bytes();
    link.driver
        .transact(&[hc12::WRITE_REG | reg as u8, v[0], v[1]], &mut [])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBdm;
    use usbdm_core::TargetFamily;

    fn connected_link() -> BdmLink<SimBdm> {
        let mut sim = SimBdm::new(TargetFamily::Hcs12);
        sim.status = hc12::BDMSTS_ENBDM;
        for (i, b) in sim.memory.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(7).wrapping_add(3);
        }
        let mut link = BdmLink::new(sim, TargetFamily::Hcs12);
        link.connect().unwrap();
        link
    }

    #[test]
    fn reads_agree_for_all_lengths_and_parities() {
        for space in [0u8, memory_space::FAST] {
            for start in [0x1000u32, 0x1001] {
                for len in 0..16usize {
                    let mut link = connected_link();
                    let mut buf = [0u8; 16];
                    read_mem(&mut link, space, start, &mut buf[..len]).unwrap();
                    let expect =
                        &link.driver_mut().memory[start as usize..start as usize + len];
                    assert_eq!(&buf[..len], expect, "space {space:#X} start {start:#X} len {len}");
                }
            }
        }
    }

    #[test]
    fn writes_agree_for_all_lengths_and_parities() {
        for space in [0u8, memory_space::FAST] {
            for start in [0x2000u32, 0x2001] {
                for len in 0..16usize {
                    let mut link = connected_link();
                    let data: [u8; 16] = core::array::from_fn(|i| 0xA0 | i as u8);
                    write_mem(&mut link, space, start, &data[..len]).unwrap();
                    let written =
                        &link.driver_mut().memory[start as usize..start as usize + len];
                    assert_eq!(written, &data[..len], "space {space:#X} start {start:#X} len {len}");
                }
            }
        }
    }

    #[test]
    fn fast_path_avoids_firmware_page() {
        let mut link = connected_link();
        let mut buf = [0u8; 0x20];
        read_mem(&mut link, memory_space::FAST, 0xFEF0, &mut buf).unwrap();

        let expect = &link.driver_mut().memory[0xFEF0..0xFF10];
        assert_eq!(&buf[..], expect);
        assert_eq!(link.driver_mut().next_ops_in_ff_page, 0);
    }

    #[test]
    fn global_access_programs_bdmppr() {
        let mut link = connected_link();
        let mut buf = [0u8; 4];

        read_mem(&mut link, memory_space::GLOBAL, 0x04_0800, &mut buf).unwrap();
        assert_eq!(link.driver_mut().bdmppr, hc12::BDMPPR_BPAE | 0x04);

        // Same page again: the cached value is reused, no rewrite
        link.driver_mut().bdmppr = 0xEE;
        read_mem(&mut link, memory_space::GLOBAL, 0x04_0900, &mut buf).unwrap();
        assert_eq!(link.driver_mut().bdmppr, 0xEE);

        // Leaving global space clears the page register
        read_mem(&mut link, 0, 0x1000, &mut buf).unwrap();
        assert_eq!(link.driver_mut().bdmppr, 0);
        assert_eq!(link.state().bdmppr, 0);
    }

    #[test]
    fn register_round_trip() {
        let mut link = connected_link();

        write_reg(&mut link, hc12::Reg::Pc, 0xC012).unwrap();
        assert_eq!(link.driver_mut().reg(3), 0xC012);

        link.driver_mut().set_reg(7, 0x3F80);
        assert_eq!(read_reg(&mut link, hc12::Reg::Sp).unwrap(), 0x3F80);
    }
}
