// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! usbdm - USBDM debug pod command dispatcher.
//!
//! Ties the protocol engines together behind the host command set.  A
//! transport (USB endpoint, TCP socket) hands each received frame to
//! [`Dispatcher::dispatch`] and sends back the slice it returns.
//!
//! ```text
//!        host frame in [cmd, params..]
//!                  |
//!             Dispatcher ---- SET_TARGET selects the active engine
//!             /        \
//!     SwdInterface    BdmLink + family engines
//!     (usbdm-swd)     (usbdm-bdm)
//!                  |
//!        response out [result, data..]
//! ```
//!
//! The dispatcher is generic over the two pin drivers, so the same code
//! runs against real hardware and against the simulated targets in the
//! engine crates' test suites.

#![no_std]

pub mod dispatch;

#[doc(inline)]
pub use crate::dispatch::Dispatcher;
