// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! HCS08 and RS08 family engine.
//!
//! Both families are byte-addressed with a flat 64K space, so memory
//! access is simpler than HCS12: no lane selection and no page register.
//! The fast path seeds H:X and streams bytes with the auto-incrementing
//! READ_NEXT/WRITE_NEXT commands; the slow path sends the address with
//! every byte.
//!
//! RS08 reuses this engine unchanged for memory; its reduced register set
//! is enforced where host register numbers are decoded, in
//! [`hc08::Reg::from_byte`].

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use usbdm_core::bdm::hc08;
use usbdm_core::{memory_space, Error};

use crate::{BdmDriver, BdmLink};

/// Reads `buf.len()` bytes starting at `addr`.
pub fn read_mem<D: BdmDriver>(
    link: &mut BdmLink<D>,
    space: u8,
    addr: u32,
    buf: &mut [u8],
) -> Result<(), Error> {
    link.require_speed()?;
    trace!("Exec:  HCS08 read {} bytes @0x{addr:04X}", buf.len());
    let addr = addr as u16;

    if space & memory_space::FAST != 0 && buf.len() > 1 {
        // READ_NEXT post-increments before the access, seed one short
        let hx = addr.wrapping_sub(1).to_be_bytes();
        link.driver
            .transact(&[hc08::WRITE_HX, hx[0], hx[1]], &mut [])?;
        for b in buf.iter_mut() {
            let mut rx = [0u8; 1];
            link.driver.transact(&[hc08::READ_NEXT], &mut rx)?;
            *b = rx[0];
        }
        return Ok(());
    }

    for (i, b) in buf.iter_mut().enumerate() {
        let a = addr.wrapping_add(i as u16).to_be_bytes();
        let mut rx = [0u8; 1];
        link.driver
            .transact(&[hc08::READ_BYTE, a[0], a[1]], &mut rx)?;
        *b = rx[0];
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
    trace!("Exec:  HCS08 write {} bytes @0x{addr:04X}", data.len());
    let addr = addr as u16;

    if space & memory_space::FAST != 0 && data.len() > 1 {
        let hx = addr.wrapping_sub(1).to_be_bytes();
        link.driver
            .transact(&[hc08::WRITE_HX, hx[0], hx[1]], &mut [])?;
        for b in data {
            link.driver.transact(&[hc08::WRITE_NEXT, *b], &mut [])?;
        }
        return Ok(());
    }

    for (i, b) in data.iter().enumerate() {
        let a = addr.wrapping_add(i as u16).to_be_bytes();
        link.driver
            .transact(&[hc08::WRITE_BYTE, a[0], a[1], *b], &mut [])?;
    }
    Ok(())
}

/// Reads a core register.  PC, HX and SP are 16 bits; A and CCR are 8.
pub fn read_reg<D: BdmDriver>(link: &mut BdmLink<D>, reg: hc08::Reg) -> Result<u16, Error> {
    link.require_speed()?;
    if reg.is_word() {
        let mut rx = [0u8; 2];
        link.driver.transact(&[reg.read_opcode()], &mut rx)?;
        Ok(u16::from_be_bytes(rx))
    } else {
        let mut rx = [0u8; 1];
        link.driver.transact(&[reg.read_opcode()], &mut rx)?;
        Ok(rx[0] as u16)
    }
}

/// Writes a core register.
pub fn write_reg<D: BdmDriver>(
    link: &mut BdmLink<D>,
    reg: hc08::Reg,
    value: u16,
) -> Result<(), Error> {
    link.require_speed()?;
    if reg.is_word() {
        let v = value.to_be_bytes();
        link.driver
            .transact(&[reg.write_opcode(), v[0], v[1]], &mut [])
    } else {
        link.driver
            .transact(&[reg.write_opcode(), value as u8], &mut [])
    }
}

/// Reads the BDC hardware breakpoint register.
pub fn read_bkpt<D: BdmDriver>(link: &mut BdmLink<D>) -> Result<u16, Error> {
    link.require_speed()?;
    let mut rx = [0u8; 2];
    link.driver.transact(&[hc08::READ_BKPT], &mut rx)?;
    Ok(u16::from_be_bytes(rx))
}

/// Writes the BDC hardware breakpoint register.
pub fn write_bkpt<D: BdmDriver>(link: &mut BdmLink<D>, value: u16) -> Result<(), Error> {
    link.require_speed()?;
    let v = value.to_be_bytes();
    link.driver
        .transact(&[hc08::WRITE_BKPT, v[0], v[1]], &mut [])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBdm;
    use usbdm_core::TargetFamily;

    fn connected_link() -> BdmLink<SimBdm> {
        let mut sim = SimBdm::new(TargetFamily::Hcs08);
        sim.status = hc08::BDCSCR_ENBDM;
        for (i, b) in sim.memory.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(13).wrapping_add(1);
        }
        let mut link = BdmLink::new(sim, TargetFamily::Hcs08);
        link.connect().unwrap();
        link
    }

    #[test]
    fn fast_and_slow_reads_agree() {
        for space in [0u8, memory_space::FAST] {
            for len in 0..8usize {
                let mut link = connected_link();
                let mut buf = [0u8; 8];
                read_mem(&mut link, space, 0x8100, &mut buf[..len]).unwrap();
                let expect = &link.driver_mut().memory[0x8100..0x8100 + len];
                assert_eq!(&buf[..len], expect, "space {space:#X} len {len}");
            }
        }
    }

    #[test]
    fn fast_and_slow_writes_agree() {
        for space in [0u8, memory_space::FAST] {
            let mut link = connected_link();
            let data = [0xDE, 0xAD, 0xBE, 0xEF, 0x55];
            write_mem(&mut link, space, 0x0080, &data).unwrap();
            assert_eq!(&link.driver_mut().memory[0x80..0x85], &data);
        }
    }

    #[test]
    fn byte_and_word_registers() {
        let mut link = connected_link();

        write_reg(&mut link, hc08::Reg::A, 0x5A).unwrap();
        assert_eq!(link.driver_mut().reg(8), 0x5A);

        write_reg(&mut link, hc08::Reg::Pc, 0xFC00).unwrap();
        assert_eq!(link.driver_mut().reg(0xB), 0xFC00);

        link.driver_mut().set_reg(0xF, 0x00FF);
        assert_eq!(read_reg(&mut link, hc08::Reg::Sp).unwrap(), 0x00FF);
    }

    #[test]
    fn breakpoint_register_round_trip() {
        let mut link = connected_link();

        write_bkpt(&mut link, 0xE123).unwrap();
        assert_eq!(link.driver_mut().bkpt(), 0xE123);
        assert_eq!(read_bkpt(&mut link).unwrap(), 0xE123);
    }
}
