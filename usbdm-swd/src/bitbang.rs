// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! GPIO bit-bang implementation of [`SwdDriver`].
//!
//! Works with any `embedded-hal` 1.0 pins.  The SWDIO pin must be
//! configured open-drain with a pull-up, so that "releasing" the line for
//! target turnaround is just driving it high.  Clock timing is a simple
//! half-period delay per edge; pass `delay_ns = 0` to run flat out on slow
//! MCUs.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::driver::SwdDriver;

/// Bit-bang SWD driver over `embedded-hal` pins.
pub struct BitBang<Io, Clk, D> {
    swdio: Io,
    swclk: Clk,
    delay: D,
    half_period_ns: u32,
}

impl<Io, Clk, D> BitBang<Io, Clk, D>
where
    Io: InputPin + OutputPin,
    Clk: OutputPin,
    D: DelayNs,
{
    /// Creates the driver.  `clock_khz` of 0 means no deliberate delay
    /// between edges.
    pub fn new(swdio: Io, swclk: Clk, delay: D, clock_khz: u32) -> Self {
        let half_period_ns = if clock_khz == 0 {
            0
        } else {
            500_000 / clock_khz
        };
        debug!("BitBang SWD driver created, half period {half_period_ns}ns");
        BitBang {
            swdio,
            swclk,
            delay,
            half_period_ns,
        }
    }

    /// Releases the pins
    pub fn release(self) -> (Io, Clk, D) {
        (self.swdio, self.swclk, self.delay)
    }

    #[inline]
    fn half_period(&mut self) {
        if self.half_period_ns > 0 {
            self.delay.delay_ns(self.half_period_ns);
        }
    }

    #[inline]
    fn write_bit(&mut self, bit: bool) {
        if bit {
            self.swdio.set_high().ok();
        } else {
            self.swdio.set_low().ok();
        }
        self.swclk.set_low().ok();
        self.half_period();
        self.swclk.set_high().ok();
        self.half_period();
    }

    #[inline]
    fn read_bit(&mut self) -> bool {
        self.swclk.set_low().ok();
        self.half_period();

        // Sample before the rising edge - the target holds the bit until
        // the clock goes high again
        let bit = self.swdio.is_high().unwrap_or(false);

        self.swclk.set_high().ok();
        self.half_period();
        bit
    }
}

impl<Io, Clk, D> SwdDriver for BitBang<Io, Clk, D>
where
    Io: InputPin + OutputPin,
    Clk: OutputPin,
    D: DelayNs,
{
    fn swdio_output(&mut self) {
        // Nothing to reconfigure - the pin is open-drain, output levels
        // are applied per bit
    }

    fn swdio_input(&mut self) {
        // Release the line so the target can pull it low
        self.swdio.set_high().ok();
    }

    fn write_bits(&mut self, count: usize, data: u64) {
        trace!("Info:  Writing {count} bits: 0x{data:0X}");
        let mut data = data;
        for _ in 0..count {
            self.write_bit(data & 1 == 1);
            data >>= 1;
        }
        self.swclk.set_low().ok();
    }

    fn read_bits(&mut self, count: usize) -> u64 {
        let mut data = 0u64;
        for ii in 0..count {
            if self.read_bit() {
                data |= 1 << ii;
            }
        }
        self.swclk.set_low().ok();
        data
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
