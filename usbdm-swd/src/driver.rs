// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD pin driver trait.
//!
//! [`SwdProtocol`](crate::SwdProtocol) is written entirely against this
//! trait, so the same engine runs over a GPIO bit-bang driver
//! ([`bitbang::BitBang`](crate::bitbang::BitBang)), a hardware assisted
//! port, or a simulated target in tests.

/// Shifts raw bits on the SWD pins.
///
/// Bits are always transferred LSB-first, clocked on SWCLK.  The protocol
/// layer is responsible for calling [`swdio_output`](SwdDriver::swdio_output)
/// / [`swdio_input`](SwdDriver::swdio_input) around turnaround cycles; the
/// driver only has to obey the current direction.
pub trait SwdDriver {
    /// Drive SWDIO from the pod
    fn swdio_output(&mut self);

    /// Release SWDIO so the target can drive it
    fn swdio_input(&mut self);

    /// Clock out `count` bits of `data`, LSB first.  `count` is at most 64.
    fn write_bits(&mut self, count: usize, data: u64);

    /// Clock in `count` bits, LSB first.  `count` is at most 64.
    fn read_bits(&mut self, count: usize) -> u64;

    /// Busy wait.  Used by the mass erase sequence while the flash
    /// controller works.
    fn delay_ms(&mut self, ms: u32);
}
