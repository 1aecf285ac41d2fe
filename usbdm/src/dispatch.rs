// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Command dispatch.
//!
//! One handler per host command.  Handlers validate parameters, call into
//! the engine for the active target family and write reply data straight
//! into the frame.  Commands that don't apply to the active family fail
//! with `IllegalCommand`, the same code an unknown command byte gets.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use usbdm_bdm::{cfv1, hcs08, hcs12, BdmDriver, BdmLink};
use usbdm_bin::{
    Command, CommandFrame, MAX_READ_BYTES, MAX_WRITE_BYTES, MEM_ADDR_OFFSET, MEM_COUNT_OFFSET,
    MEM_DATA_OFFSET, MEM_SPACE_OFFSET, PARAM_OFFSET, REG_NO_OFFSET, REG_VALUE_OFFSET,
    REPLY_DATA_OFFSET,
};
use usbdm_core::bdm::{hc08, hc12};
use usbdm_core::{Error, ResetMethod, ResetMode, TargetFamily};
use usbdm_swd::{SwdDriver, SwdInterface};

/// Routes host commands to the SWD or BDM engine.
///
/// No target is selected at construction; everything except SET_TARGET is
/// rejected until the host picks a family.
pub struct Dispatcher<S: SwdDriver, B: BdmDriver> {
    swd: SwdInterface<S>,
    bdm: BdmLink<B>,
    target: Option<TargetFamily>,
}

impl<S: SwdDriver, B: BdmDriver> Dispatcher<S, B> {
    pub fn new(swd: SwdInterface<S>, bdm: BdmLink<B>) -> Self {
        Dispatcher {
            swd,
            bdm,
            target: None,
        }
    }

    /// Currently selected target family.
    pub fn target(&self) -> Option<TargetFamily> {
        self.target
    }

    /// The SWD engine, for host surfaces that drive it directly.
    pub fn swd_mut(&mut self) -> &mut SwdInterface<S> {
        &mut self.swd
    }

    /// The BDM link, for host surfaces that drive it directly.
    pub fn bdm_mut(&mut self) -> &mut BdmLink<B> {
        &mut self.bdm
    }

    /// Executes one command frame in place and returns the response slice
    /// from the same buffer.
    ///
    /// A buffer that can't hold even a result code produces an empty
    /// response; the transport has nothing useful to send for it.
    pub fn dispatch<'a>(&mut self, buf: &'a mut [u8]) -> &'a [u8] {
        match CommandFrame::new(buf) {
            Ok(mut frame) => {
                let result = self.run(&mut frame);
                if let Err(e) = result {
                    warn!("Error: {e}");
                }
                frame.finish(result)
            }
            Err(_) => {
                error!("Error: unusable command buffer");
                &[]
            }
        }
    }

    fn run(&mut self, frame: &mut CommandFrame) -> Result<(), Error> {
        let cmd = frame.command()?;
        trace!("Exec:  {cmd}");

        if cmd == Command::SetTarget {
            let family = TargetFamily::from_byte(frame.u8_at(PARAM_OFFSET)?)?;
            info!("Info:  Target set to {family}");
            self.target = Some(family);
            if family.is_bdm() {
                self.bdm.select_family(family);
            }
            return Ok(());
        }

        match self.target.ok_or(Error::IllegalCommand)? {
            TargetFamily::ArmSwd => self.run_arm(cmd, frame),
            family => self.run_bdm(family, cmd, frame),
        }
    }

    /// ARM SWD commands.  The SWD engine exists for Kinetis recovery, so
    /// the surface is deliberately narrow: connect, raw DP register
    /// access and the mass erase sequence.
    fn run_arm(&mut self, cmd: Command, frame: &mut CommandFrame) -> Result<(), Error> {
        match cmd {
            Command::Connect => {
                let idcode = self.swd.connect()?;
                self.swd.power_up_debug_domain()?;
                frame.set_u32(REPLY_DATA_OFFSET, idcode.data())?;
                frame.set_response_len(REPLY_DATA_OFFSET + 4);
                Ok(())
            }
            Command::ReadDreg => {
                let addr = frame.u16_at(REG_NO_OFFSET)? as u8;
                let value = self.swd.read_dp(addr)?;
                frame.set_u32(REPLY_DATA_OFFSET, value)?;
                frame.set_response_len(REPLY_DATA_OFFSET + 4);
                Ok(())
            }
            Command::WriteDreg => {
                let addr = frame.u16_at(REG_NO_OFFSET)? as u8;
                let value = frame.u32_at(REG_VALUE_OFFSET)?;
                self.swd.write_dp(addr, value)
            }
            Command::MassErase => {
                let control = self.swd.reset_capture_mass_erase()?;
                frame.set_u32(REPLY_DATA_OFFSET, control)?;
                frame.set_response_len(REPLY_DATA_OFFSET + 4);
                Ok(())
            }
            _ => Err(Error::IllegalCommand),
        }
    }

    fn run_bdm(
        &mut self,
        family: TargetFamily,
        cmd: Command,
        frame: &mut CommandFrame,
    ) -> Result<(), Error> {
        match cmd {
            Command::Connect => self.bdm.connect(),
            Command::SetSpeed => {
                let sync_length = frame.u16_at(PARAM_OFFSET)?;
                self.bdm.set_speed(sync_length)
            }
            Command::GetSpeed => {
                frame.set_u16(REPLY_DATA_OFFSET, self.bdm.sync_length())?;
                frame.set_response_len(REPLY_DATA_OFFSET + 2);
                Ok(())
            }
            Command::ReadStatusReg => {
                let status = self.bdm.read_status()?;
                frame.set_u8(REPLY_DATA_OFFSET, status)?;
                frame.set_response_len(REPLY_DATA_OFFSET + 1);
                Ok(())
            }
            Command::WriteControlReg => {
                let value = frame.u8_at(PARAM_OFFSET)?;
                self.bdm.write_control(value)
            }
            Command::TargetReset => {
                let byte = frame.u8_at(PARAM_OFFSET)?;
                self.bdm
                    .reset(ResetMethod::from_byte(byte)?, ResetMode::from_byte(byte))
            }
            Command::TargetStep => self.bdm.step(),
            Command::TargetGo => self.bdm.go(),
            Command::TargetHalt => self.bdm.halt(),
            Command::ReadReg => self.read_reg(family, frame),
            Command::WriteReg => self.write_reg(family, frame),
            Command::ReadDreg => self.read_dreg(family, frame),
            Command::WriteDreg => self.write_dreg(family, frame),
            Command::ReadMem => self.read_mem(family, frame),
            Command::WriteMem => self.write_mem(family, frame),
            _ => Err(Error::IllegalCommand),
        }
    }

    fn read_reg(&mut self, family: TargetFamily, frame: &mut CommandFrame) -> Result<(), Error> {
        let reg_no = frame.u16_at(REG_NO_OFFSET)?;
        let value = match family {
            TargetFamily::Hcs12 => {
                let reg = hc12::Reg::from_byte(reg_no as u8)?;
                hcs12::read_reg(&mut self.bdm, reg)? as u32
            }
            TargetFamily::Hcs08 | TargetFamily::Rs08 => {
                let reg = hc08::Reg::from_byte(reg_no as u8, family == TargetFamily::Rs08)?;
                hcs08::read_reg(&mut self.bdm, reg)? as u32
            }
            TargetFamily::Cfv1 => cfv1::read_reg(&mut self.bdm, reg_no as u8)?,
            TargetFamily::ArmSwd => return Err(Error::IllegalCommand),
        };
        frame.set_u32(REPLY_DATA_OFFSET, value)?;
        frame.set_response_len(REPLY_DATA_OFFSET + 4);
        Ok(())
    }

    fn write_reg(&mut self, family: TargetFamily, frame: &mut CommandFrame) -> Result<(), Error> {
        let reg_no = frame.u16_at(REG_NO_OFFSET)?;
        let value = frame.u32_at(REG_VALUE_OFFSET)?;
        match family {
            TargetFamily::Hcs12 => {
                let reg = hc12::Reg::from_byte(reg_no as u8)?;
                hcs12::write_reg(&mut self.bdm, reg, value as u16)
            }
            TargetFamily::Hcs08 | TargetFamily::Rs08 => {
                let reg = hc08::Reg::from_byte(reg_no as u8, family == TargetFamily::Rs08)?;
                hcs08::write_reg(&mut self.bdm, reg, value as u16)
            }
            TargetFamily::Cfv1 => cfv1::write_reg(&mut self.bdm, reg_no as u8, value),
            TargetFamily::ArmSwd => Err(Error::IllegalCommand),
        }
    }

    // Debug registers: the BDM firmware's own byte registers on HCS12,
    // the BDC breakpoint pair on HCS08/RS08, the debug module on CFV1.
    fn read_dreg(&mut self, family: TargetFamily, frame: &mut CommandFrame) -> Result<(), Error> {
        let reg_no = frame.u16_at(REG_NO_OFFSET)?;
        let value = match family {
            TargetFamily::Hcs12 => hcs12::bd_read_byte(&mut self.bdm, reg_no)? as u32,
            TargetFamily::Hcs08 | TargetFamily::Rs08 => {
                hcs08::read_bkpt(&mut self.bdm)? as u32
            }
            TargetFamily::Cfv1 => cfv1::read_dreg(&mut self.bdm, reg_no)?,
            TargetFamily::ArmSwd => return Err(Error::IllegalCommand),
        };
        frame.set_u32(REPLY_DATA_OFFSET, value)?;
        frame.set_response_len(REPLY_DATA_OFFSET + 4);
        Ok(())
    }

    fn write_dreg(&mut self, family: TargetFamily, frame: &mut CommandFrame) -> Result<(), Error> {
        let reg_no = frame.u16_at(REG_NO_OFFSET)?;
        let value = frame.u32_at(REG_VALUE_OFFSET)?;
        match family {
            TargetFamily::Hcs12 => hcs12::bd_write_byte(&mut self.bdm, reg_no, value as u8),
            TargetFamily::Hcs08 | TargetFamily::Rs08 => {
                hcs08::write_bkpt(&mut self.bdm, value as u16)
            }
            TargetFamily::Cfv1 => cfv1::write_dreg(&mut self.bdm, reg_no, value),
            TargetFamily::ArmSwd => Err(Error::IllegalCommand),
        }
    }

    fn read_mem(&mut self, family: TargetFamily, frame: &mut CommandFrame) -> Result<(), Error> {
        let space = frame.u8_at(MEM_SPACE_OFFSET)?;
        let count = frame.u8_at(MEM_COUNT_OFFSET)? as usize;
        let addr = frame.u32_at(MEM_ADDR_OFFSET)?;
        if count > MAX_READ_BYTES {
            return Err(Error::IllegalParams);
        }
        let buf = frame.bytes_mut(REPLY_DATA_OFFSET, count)?;
        match family {
            TargetFamily::Hcs12 => hcs12::read_mem(&mut self.bdm, space, addr, buf)?,
            TargetFamily::Hcs08 | TargetFamily::Rs08 => {
                hcs08::read_mem(&mut self.bdm, space, addr, buf)?
            }
            TargetFamily::Cfv1 => cfv1::read_mem(&mut self.bdm, space, addr, buf)?,
            TargetFamily::ArmSwd => return Err(Error::IllegalCommand),
        }
        frame.set_response_len(REPLY_DATA_OFFSET + count);
        Ok(())
    }

    fn write_mem(&mut self, family: TargetFamily, frame: &mut CommandFrame) -> Result<(), Error> {
        let space = frame.u8_at(MEM_SPACE_OFFSET)?;
        let count = frame.u8_at(MEM_COUNT_OFFSET)? as usize;
        let addr = frame.u32_at(MEM_ADDR_OFFSET)?;
        if count > MAX_WRITE_BYTES {
            return Err(Error::IllegalParams);
        }
        let data = frame.bytes(MEM_DATA_OFFSET, count)?;
        match family {
            TargetFamily::Hcs12 => hcs12::write_mem(&mut self.bdm, space, addr, data),
            TargetFamily::Hcs08 | TargetFamily::Rs08 => {
                hcs08::write_mem(&mut self.bdm, space, addr, data)
            }
            TargetFamily::Cfv1 => cfv1::write_mem(&mut self.bdm, space, addr, data),
            TargetFamily::ArmSwd => Err(Error::IllegalCommand),
        }
    }
}
