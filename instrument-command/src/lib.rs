//! Host command firmware for a measurement instrument.
//!
//! Requests arrive as packets over any [`embedded_io_async`] byte stream.
//! The [`CommandProcessor`] answers identity queries itself and forwards
//! register and reset requests to an [`Instrument`], typically a
//! [`RegisterDevice`] on a bit-banged two-wire bus.

#![no_std]

#[macro_use]
mod fmt;

pub mod byte_queue;
pub mod channel;
pub mod command_processor;
pub mod framing;
pub mod identity;
pub mod instrument;
#[cfg(test)]
mod mock;
pub mod request;

pub use command_processor::{CommandProcessor, Config};
pub use framing::{Framer, Timeout, Transport};
pub use identity::{BuildInfo, Identity, SiliconSerial};
pub use instrument::{Instrument, RegisterDevice};
pub use request::Request;
