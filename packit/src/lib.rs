//! Wire format for the instrument command protocol.
//!
//! A packet is a four byte header followed by up to 250 bytes of payload:
//!
//! ```text
//! offset 0: length   (1 byte)  total packet size including the header
//! offset 1: kind     (1 byte)  command/response code
//! offset 2: checksum (2 bytes) little endian
//! offset 4: payload  (0..250 bytes)
//! ```
//!
//! Payloads are encoded through the [`Payload`] trait, which can be derived.

#![no_std]

extern crate self as packit;

pub mod checksum;
mod iter;
pub mod kind;
pub mod messages;
pub mod packet;
pub mod payload;

pub use checksum::{ChecksumProvider, Crc16, Fletcher16};
pub use kind::Kind;
pub use macros::Payload;
pub use packet::{Packet, Strictness};
pub use payload::Payload;

/// Size of the fixed packet header.
pub const HEADER_SIZE: usize = 4;
/// Largest payload a packet can carry.
pub const PAYLOAD_CAPACITY: usize = 250;
/// Largest value the length byte may hold.
pub const PACKET_CAPACITY: usize = HEADER_SIZE + PAYLOAD_CAPACITY;

pub mod error {
    /// The medium ran out before the value was fully encoded or decoded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct EndOfInput;

    /// The bytes do not describe a valid value.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct Invalid;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Error {
        EndOfInput,
        Invalid,
    }

    impl From<EndOfInput> for Error {
        fn from(_: EndOfInput) -> Self {
            Self::EndOfInput
        }
    }

    impl From<Invalid> for Error {
        fn from(_: Invalid) -> Self {
            Self::Invalid
        }
    }
}
