//! A bit-banged two-wire (I2C style) bus master.
//!
//! The engine toggles two open-drain lines through [`embedded_hal`] digital
//! pins. Setting a pin high releases the line to its pull-up, setting it low
//! drives the line low, and sampling reads the electrical level. A software
//! delay of half a bus clock period follows every transition.

#![no_std]

#[macro_use]
mod fmt;

mod bus;
mod config;
mod error;
mod i2c;
#[cfg(test)]
mod sim;

pub use bus::{Ack, Bus, Direction};
pub use config::{ArbitrationPolicy, BusConfig};
pub use error::Error;

/// Clock pulses issued at most while recovering a stuck bus.
pub const RECOVERY_PULSES: u32 = 9;
