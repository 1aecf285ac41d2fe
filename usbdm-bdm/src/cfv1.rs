// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ColdFire V1 family engine.
//!
//! CFV1 memory commands are sized: byte, word or longword, with the size
//! encoded in the host's memory space byte.  Word and long accesses must
//! be naturally aligned.  The first element of a transfer carries the
//! full 32-bit address; subsequent elements use the DUMP/FILL commands,
//! which continue from the target's internal address pointer.
//!
//! Register access comes in three flavours: the core register file
//! (D0-D7/A0-A7), control registers (VBR, CPUCR, SR, PC) addressed by a
//! 16-bit selector, and debug registers.  Debug register numbers 0x100
//! and up are routed to the byte-wide CSR2/CSR3/XCSR commands.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use usbdm_core::bdm::cfv1;
use usbdm_core::{memory_space, Error};

use crate::{BdmDriver, BdmLink};

// CSR is debug register 0; bit 4 is the single-step mode enable
const CSR_DREG: u16 = 0x00;
const CSR_SSM: u32 = 0x0000_0010;

/// Debug register numbers at or above this are byte-wide status registers
const STATUS_DREG_BASE: u16 = 0x100;

fn element_size(space: u8) -> Result<usize, Error> {
    match space & memory_space::SIZE {
        1 => Ok(1),
        2 => Ok(2),
        4 => Ok(4),
        _ => Err(Error::IllegalParams),
    }
}

fn check_alignment(size: usize, addr: u32, len: usize) -> Result<(), Error> {
    if addr as usize % size != 0 || len % size != 0 {
        return Err(Error::IllegalParams);
    }
    Ok(())
}

// Sized opcode families, indexed as (byte, word, long)
fn sized(size: usize, ops: (u8, u8, u8)) -> u8 {
    match size {
        1 => ops.0,
        2 => ops.1,
        _ => ops.2,
    }
}

/// Reads `buf.len()` bytes starting at `addr`, in elements sized per the
/// memory space byte.
pub fn read_mem<D: BdmDriver>(
    link: &mut BdmLink<D>,
    space: u8,
    addr: u32,
    buf: &mut [u8],
) -> Result<(), Error> {
    link.require_speed()?;
    let size = element_size(space)?;
    check_alignment(size, addr, buf.len())?;
    trace!("Exec:  CFV1 read {} bytes @0x{addr:08X}", buf.len());

    let read_op = sized(size, (cfv1::READ_MEM_B, cfv1::READ_MEM_W, cfv1::READ_MEM_L));
    let dump_op = sized(size, (cfv1::DUMP_MEM_B, cfv1::DUMP_MEM_W, cfv1::DUMP_MEM_L));

    let mut first = true;
    for chunk in buf.chunks_mut(size) {
        if first {
            let a = addr.to_be_bytes();
            link.driver
                .transact(&[read_op, a[0], a[1], a[2], a[3]], chunk)?;
            first = false;
        } else {
            link.driver.transact(&[dump_op], chunk)?;
        }
    }
    Ok(())
}

/// Writes `data` starting at `addr`, in elements sized per the memory
/// space byte.
pub fn write_mem<D: BdmDriver>(
    link: &mut BdmLink<D>,
    space: u8,
    addr: u32,
    data: &[u8],
) -> Result<(), Error> {
    link.require_speed()?;
    let size = element_size(space)?;
    check_alignment(size, addr, data.len())?;
    trace!("Exec:  CFV1 write {} bytes @0x{addr:08X}", data.len());

    let write_op = sized(
        size,
        (cfv1::WRITE_MEM_B, cfv1::WRITE_MEM_W, cfv1::WRITE_MEM_L),
    );
    let fill_op = sized(
        size,
        (cfv1::FILL_MEM_B, cfv1::FILL_MEM_W, cfv1::FILL_MEM_L),
    );

    let mut tx = [0u8; 9];
    let mut first = true;
    for chunk in data.chunks(size) {
        if first {
            tx[0] = write_op;
            tx[1..5].copy_from_slice(&addr.to_be_bytes());
            tx[5..5 + size].copy_from_slice(chunk);
            link.driver.transact(&tx[..5 + size], &mut [])?;
            first = false;
        } else {
            tx[0] = fill_op;
            tx[1..1 + size].copy_from_slice(chunk);
            link.driver.transact(&tx[..1 + size], &mut [])?;
        }
    }
    Ok(())
}

/// Reads a core register, D0-D7 as 0-7 and A0-A7 as 8-15.
pub fn read_reg<D: BdmDriver>(link: &mut BdmLink<D>, reg: u8) -> Result<u32, Error> {
    link.require_speed()?;
    if reg > 0x0F {
        return Err(Error::IllegalParams);
    }
    let mut rx = [0u8; 4];
    link.driver.transact(&[cfv1::READ_REG | reg], &mut rx)?;
    Ok(u32::from_be_bytes(rx))
}

/// Writes a core register.
pub fn write_reg<D: BdmDriver>(link: &mut BdmLink<D>, reg: u8, value: u32) -> Result<(), Error> {
    link.require_speed()?;
    if reg > 0x0F {
        return Err(Error::IllegalParams);
    }
    let v = value.to_be_bytes();
    link.driver
        .transact(&[cfv1::WRITE_REG | reg, v[0], v[1], v[2], v[3]], &mut [])
}

/// Reads a control register by its 16-bit selector.
pub fn read_creg<D: BdmDriver>(link: &mut BdmLink<D>, reg: u16) -> Result<u32, Error> {
    link.require_speed()?;
    let r = reg.to_be_bytes();
    let mut rx = [0u8; 4];
    link.driver
        .transact(&[cfv1::READ_CREG, r[0], r[1]], &mut rx)?;
    Ok(u32::from_be_bytes(rx))
}

/// Writes a control register by its 16-bit selector.
pub fn write_creg<D: BdmDriver>(link: &mut BdmLink<D>, reg: u16, value: u32) -> Result<(), Error> {
    link.require_speed()?;
    let r = reg.to_be_bytes();
    let v = value.to_be_bytes();
    link.driver.transact(
        &[cfv1::WRITE_CREG, r[0], r[1], v[0], v[1], v[2], v[3]],
        &mut [],
    )
}

/// Reads a debug register.  Numbers from 0x100 map to the byte-wide
/// CSR2/CSR3/XCSR status registers.
pub fn read_dreg<D: BdmDriver>(link: &mut BdmLink<D>, reg: u16) -> Result<u32, Error> {
    link.require_speed()?;
    if reg >= STATUS_DREG_BASE {
        let status = cfv1::StatusReg::from_byte((reg - STATUS_DREG_BASE) as u8)?;
        let mut rx = [0u8; 1];
        link.driver.transact(&[status.read_opcode()], &mut rx)?;
        return Ok(rx[0] as u32);
    }
    let mut rx = [0u8; 4];
    link.driver
        .transact(&[cfv1::READ_DREG, reg as u8], &mut rx)?;
    Ok(u32::from_be_bytes(rx))
}

/// Writes a debug register, with the same 0x100 mapping as
/// [`read_dreg`].
pub fn write_dreg<D: BdmDriver>(link: &mut BdmLink<D>, reg: u16, value: u32) -> Result<(), Error> {
    link.require_speed()?;
    if reg >= STATUS_DREG_BASE {
        let status = cfv1::StatusReg::from_byte((reg - STATUS_DREG_BASE) as u8)?;
        return link
            .driver
            .transact(&[status.write_opcode(), value as u8], &mut []);
    }
    let v = value.to_be_bytes();
    link.driver.transact(
        &[cfv1::WRITE_DREG, reg as u8, v[0], v[1], v[2], v[3]],
        &mut [],
    )
}

/// Executes one instruction by pulsing the single-step mode bit in CSR
/// around a GO.
pub fn step<D: BdmDriver>(link: &mut BdmLink<D>) -> Result<(), Error> {
    let csr = read_dreg(link, CSR_DREG)?;
    write_dreg(link, CSR_DREG, csr | CSR_SSM)?;
    link.driver.transact(&[cfv1::GO], &mut [])?;
    let csr = read_dreg(link, CSR_DREG)?;
    write_dreg(link, CSR_DREG, csr & !CSR_SSM)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBdm;
    use usbdm_core::TargetFamily;

    fn connected_link() -> BdmLink<SimBdm> {
        let mut sim = SimBdm::new(TargetFamily::Cfv1);
        sim.status = cfv1::XCSR_ENBDM;
        for (i, b) in sim.memory.iter_mut().enumerate() {
            *b = (i as u8) ^ 0x5C;
        }
        let mut link = BdmLink::new(sim, TargetFamily::Cfv1);
        link.connect().unwrap();
        link
    }

    #[test]
    fn sized_reads_agree_with_memory() {
        for (space, len) in [(1u8, 5usize), (2, 6), (4, 8)] {
            let mut link = connected_link();
            let mut buf = [0u8; 8];
            read_mem(&mut link, space, 0x3000, &mut buf[..len]).unwrap();
            let expect = &link.driver_mut().memory[0x3000..0x3000 + len];
            assert_eq!(&buf[..len], expect, "space {space} len {len}");
        }
    }

    #[test]
    fn sized_writes_agree_with_memory() {
        for (space, len) in [(1u8, 3usize), (2, 4), (4, 8)] {
            let mut link = connected_link();
            let data: [u8; 8] = core::array::from_fn(|i| 0x30 + i as u8);
            write_mem(&mut link, space, 0x4000, &data[..len]).unwrap();
            assert_eq!(&link.driver_mut().memory[0x4000..0x4000 + len], &data[..len]);
        }
    }

    #[test]
    fn misaligned_access_rejected() {
        let mut link = connected_link();
        let mut buf = [0u8; 4];

        assert_eq!(
            read_mem(&mut link, 2, 0x3001, &mut buf),
            Err(Error::IllegalParams)
        );
        assert_eq!(
            read_mem(&mut link, 4, 0x3002, &mut buf),
            Err(Error::IllegalParams)
        );
        // Length not a multiple of the element size
        assert_eq!(
            read_mem(&mut link, 4, 0x3000, &mut buf[..2]),
            Err(Error::IllegalParams)
        );
        // Unknown element size
        assert_eq!(
            read_mem(&mut link, 3, 0x3000, &mut buf),
            Err(Error::IllegalParams)
        );
    }

    #[test]
    fn core_and_control_registers() {
        let mut link = connected_link();

        write_reg(&mut link, 2, 0x1122_3344).unwrap();
        assert_eq!(link.driver_mut().reg(2), 0x1122_3344);
        assert_eq!(read_reg(&mut link, 2).unwrap(), 0x1122_3344);
        assert_eq!(read_reg(&mut link, 0x10), Err(Error::IllegalParams));

        write_creg(&mut link, 0x080F, 0x8000_0400).unwrap();
        assert_eq!(link.driver_mut().creg(0xF), 0x8000_0400);
        assert_eq!(read_creg(&mut link, 0x080F).unwrap(), 0x8000_0400);
    }

    #[test]
    fn high_dreg_numbers_hit_status_registers() {
        let mut link = connected_link();

        write_dreg(&mut link, 0x102, cfv1::XCSR_ENBDM as u32).unwrap();
        assert_eq!(link.driver_mut().status, cfv1::XCSR_ENBDM);
        assert_eq!(
            read_dreg(&mut link, 0x102).unwrap(),
            cfv1::XCSR_ENBDM as u32
        );
        assert_eq!(write_dreg(&mut link, 0x103, 0), Err(Error::IllegalParams));

        write_dreg(&mut link, 5, 0xA5A5_0000).unwrap();
        assert_eq!(link.driver_mut().dreg(5), 0xA5A5_0000);
    }

    #[test]
    fn step_pulses_single_step_mode() {
        let mut link = connected_link();
        link.driver_mut().set_dreg(0, 0x0080_0000);

        step(&mut link).unwrap();

        assert_eq!(link.driver_mut().gos, 1);
        assert_eq!(link.driver_mut().dreg(0), 0x0080_0000);
    }
}
