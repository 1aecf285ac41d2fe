// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! End-to-end dispatcher tests: host command frames in, response frames
//! out, over the simulated SWD and BDM targets.

use usbdm::Dispatcher;
use usbdm_bin::{
    CMD_CONNECT, CMD_GET_SPEED, CMD_MASS_ERASE, CMD_READ_DREG, CMD_READ_MEM, CMD_READ_REG,
    CMD_SET_SPEED, CMD_SET_TARGET, CMD_TARGET_RESET, CMD_WRITE_DREG, CMD_WRITE_MEM,
    CMD_WRITE_REG, MAX_COMMAND_SIZE, RSP_OK,
};
use usbdm_bdm::sim::SimBdm;
use usbdm_bdm::BdmLink;
use usbdm_core::bdm::{hc08, hc12};
use usbdm_core::{Error, SpeedStatus, TargetFamily};
use usbdm_swd::sim::{SimTarget, SIM_IDCODE};
use usbdm_swd::{SwdInterface, SwdProtocol};

fn dispatcher() -> Dispatcher<SimTarget, SimBdm> {
    dispatcher_for(TargetFamily::Hcs08)
}

fn dispatcher_for(family: TargetFamily) -> Dispatcher<SimTarget, SimBdm> {
    let swd = SwdInterface::new(SwdProtocol::new(SimTarget::new()));
    let mut sim = SimBdm::new(family);
    sim.status = match family {
        TargetFamily::Hcs12 => hc12::BDMSTS_ENBDM,
        _ => hc08::BDCSCR_ENBDM,
    };
    let bdm = BdmLink::new(sim, family);
    Dispatcher::new(swd, bdm)
}

/// Builds a frame, runs it and returns the response as a Vec.
fn run(dispatcher: &mut Dispatcher<SimTarget, SimBdm>, request: &[u8]) -> Vec<u8> {
    let mut buf = [0u8; MAX_COMMAND_SIZE];
    buf[..request.len()].copy_from_slice(request);
    dispatcher.dispatch(&mut buf).to_vec()
}

fn set_target(dispatcher: &mut Dispatcher<SimTarget, SimBdm>, family: TargetFamily) {
    let response = run(dispatcher, &[CMD_SET_TARGET, 0, family.to_byte()]);
    assert_eq!(response, &[RSP_OK]);
}

#[test]
fn commands_rejected_until_target_selected() {
    let mut d = dispatcher();
    let response = run(&mut d, &[CMD_CONNECT]);
    assert_eq!(response, &[Error::IllegalCommand.code()]);
}

#[test]
fn unknown_command_byte_rejected() {
    let mut d = dispatcher();
    let response = run(&mut d, &[0xEE, 0, 0]);
    assert_eq!(response, &[Error::IllegalCommand.code()]);
}

#[test]
fn arm_connect_reports_idcode() {
    let mut d = dispatcher();
    set_target(&mut d, TargetFamily::ArmSwd);

    let response = run(&mut d, &[CMD_CONNECT]);

    assert_eq!(response[0], RSP_OK);
    assert_eq!(
        u32::from_be_bytes([response[1], response[2], response[3], response[4]]),
        SIM_IDCODE
    );
}

#[test]
fn arm_mass_erase_runs_recovery_sequence() {
    let mut d = dispatcher();
    set_target(&mut d, TargetFamily::ArmSwd);

    let response = run(&mut d, &[CMD_MASS_ERASE]);

    assert_eq!(response[0], RSP_OK);
    assert_eq!(response.len(), 5);
    assert!(d.swd_mut().protocol_mut().driver_mut().erase_requested);
}

#[test]
fn hcs08_memory_round_trip_over_frames() {
    let mut d = dispatcher();
    set_target(&mut d, TargetFamily::Hcs08);
    assert_eq!(run(&mut d, &[CMD_CONNECT]), &[RSP_OK]);

    // [2] space, [3] count, [4..8] address, [8..] data
    let mut write = vec![CMD_WRITE_MEM, 0, 0, 4, 0x00, 0x00, 0x12, 0x80];
    write.extend_from_slice(&[0xCA, 0xFE, 0xBA, 0xBE]);
    assert_eq!(run(&mut d, &write), &[RSP_OK]);

    let read = [CMD_READ_MEM, 0, 0, 4, 0x00, 0x00, 0x12, 0x80];
    let response = run(&mut d, &read);
    assert_eq!(response, &[RSP_OK, 0xCA, 0xFE, 0xBA, 0xBE]);
}

#[test]
fn oversized_read_count_rejected() {
    let mut d = dispatcher();
    set_target(&mut d, TargetFamily::Hcs08);
    assert_eq!(run(&mut d, &[CMD_CONNECT]), &[RSP_OK]);

    let read = [CMD_READ_MEM, 0, 0, 0xFF, 0x00, 0x00, 0x10, 0x00];
    let response = run(&mut d, &read);
    assert_eq!(response, &[Error::IllegalParams.code()]);
}

#[test]
fn hcs12_register_access_over_frames() {
    let mut d = dispatcher_for(TargetFamily::Hcs12);
    set_target(&mut d, TargetFamily::Hcs12);
    assert_eq!(run(&mut d, &[CMD_CONNECT]), &[RSP_OK]);

    // [2..4] register number, [4..8] value
    let write = [CMD_WRITE_REG, 0, 0x00, 0x07, 0x00, 0x00, 0x3F, 0x80];
    assert_eq!(run(&mut d, &write), &[RSP_OK]);
    assert_eq!(d.bdm_mut().driver_mut().reg(7), 0x3F80);

    let response = run(&mut d, &[CMD_READ_REG, 0, 0x00, 0x07]);
    assert_eq!(response, &[RSP_OK, 0x00, 0x00, 0x3F, 0x80]);
}

#[test]
fn hcs12_debug_registers_reach_bd_space() {
    let mut d = dispatcher_for(TargetFamily::Hcs12);
    set_target(&mut d, TargetFamily::Hcs12);
    assert_eq!(run(&mut d, &[CMD_CONNECT]), &[RSP_OK]);

    // BDMPPR lives in the firmware's own byte space at 0xFF08
    let write = [CMD_WRITE_DREG, 0, 0xFF, 0x08, 0x00, 0x00, 0x00, 0x84];
    assert_eq!(run(&mut d, &write), &[RSP_OK]);
    assert_eq!(d.bdm_mut().driver_mut().bdmppr, 0x84);

    let response = run(&mut d, &[CMD_READ_DREG, 0, 0xFF, 0x08]);
    assert_eq!(response, &[RSP_OK, 0x00, 0x00, 0x00, 0x84]);
}

#[test]
fn rs08_register_restrictions_enforced() {
    let mut d = dispatcher_for(TargetFamily::Rs08);
    set_target(&mut d, TargetFamily::Rs08);
    assert_eq!(run(&mut d, &[CMD_CONNECT]), &[RSP_OK]);

    // HX doesn't exist on RS08
    let write = [CMD_WRITE_REG, 0, 0x00, 0x0C, 0x00, 0x00, 0x01, 0x00];
    assert_eq!(run(&mut d, &write), &[Error::IllegalParams.code()]);

    // PC does
    let write = [CMD_WRITE_REG, 0, 0x00, 0x0B, 0x00, 0x00, 0x3F, 0x00];
    assert_eq!(run(&mut d, &write), &[RSP_OK]);
}

#[test]
fn speed_commands_round_trip() {
    let mut d = dispatcher();
    set_target(&mut d, TargetFamily::Hcs08);

    assert_eq!(run(&mut d, &[CMD_SET_SPEED, 0, 0x04, 0x56]), &[RSP_OK]);
    let response = run(&mut d, &[CMD_GET_SPEED]);
    assert_eq!(response, &[RSP_OK, 0x04, 0x56]);
}

#[test]
fn reset_invalidates_measured_speed() {
    let mut d = dispatcher();
    set_target(&mut d, TargetFamily::Hcs08);
    assert_eq!(run(&mut d, &[CMD_CONNECT]), &[RSP_OK]);
    assert_eq!(d.bdm_mut().state().speed, SpeedStatus::Sync);

    // Hardware reset, normal mode
    assert_eq!(run(&mut d, &[CMD_TARGET_RESET, 0, 0x05]), &[RSP_OK]);

    assert_eq!(d.bdm_mut().state().speed, SpeedStatus::NoInfo);
    assert_eq!(d.bdm_mut().driver_mut().resets.len(), 1);
}

#[test]
fn family_switch_discards_cable_state() {
    let mut d = dispatcher();
    set_target(&mut d, TargetFamily::Hcs08);
    assert_eq!(run(&mut d, &[CMD_CONNECT]), &[RSP_OK]);
    assert!(d.bdm_mut().state().has_speed());

    set_target(&mut d, TargetFamily::Hcs12);
    assert_eq!(d.bdm_mut().state().family, TargetFamily::Hcs12);
    assert!(!d.bdm_mut().state().has_speed());
}
