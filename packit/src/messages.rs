//! Typed payloads of the command protocol.

use heapless::Vec;

use crate::{
    error,
    payload::{FixedText, Text},
    Payload, PAYLOAD_CAPACITY,
};

/// Slot size of the build hash: seven hash characters and the terminator.
pub const BUILD_HASH_SLOT: usize = 8;
/// Largest build description, terminator included.
pub const BUILD_INFO_CAPACITY: usize = 220;
/// Most serial number words any hardware variant reports.
pub const MAX_SERIAL_WORDS: usize = 4;
/// Length of the derived fingerprint.
pub const FINGERPRINT_LEN: usize = 6;
/// Most register values one transfer can carry.
pub const MAX_REGISTER_VALUES: usize = PAYLOAD_CAPACITY - 2;

/// Response to an `Id` command.
#[derive(Debug, Clone, PartialEq, Eq, Payload)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdResponse {
    pub product_id: u8,
    /// Bumped whenever this payload layout changes.
    pub protocol_version: u8,
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub firmware_build: u16,
    pub build_hash: FixedText<BUILD_HASH_SLOT>,
    pub build_info: Text<BUILD_INFO_CAPACITY>,
}

/// Response to an `Ssn` command: the raw silicon serial number.
///
/// Only `count` words are transmitted, so the encoded size is
/// `4 + 4 * count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SsnResponse {
    count: u8,
    words: [u32; MAX_SERIAL_WORDS],
}

impl SsnResponse {
    /// Build a response from the low-order-first serial number words.
    ///
    /// Words beyond [`MAX_SERIAL_WORDS`] are dropped.
    pub fn new(serial: &[u32]) -> Self {
        let count = serial.len().min(MAX_SERIAL_WORDS);
        let mut words = [0; MAX_SERIAL_WORDS];
        words[..count].copy_from_slice(&serial[..count]);

        Self {
            count: count as u8,
            words,
        }
    }

    pub fn words(&self) -> &[u32] {
        &self.words[..self.count as usize]
    }
}

impl Payload for SsnResponse {
    fn write_to<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), error::EndOfInput> {
        let mut dst = dst.into_iter();

        self.count.write_to(&mut dst)?;
        [0u8; 3].write_to(&mut dst)?;

        for word in self.words() {
            word.write_to(&mut dst)?;
        }

        Ok(())
    }

    fn read_from<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
        let mut src = src.into_iter();

        let count = u8::read_from(&mut src)?;
        if count as usize > MAX_SERIAL_WORDS {
            return Err(error::Invalid.into());
        }
        <[u8; 3]>::read_from(&mut src)?;

        let mut words = [0; MAX_SERIAL_WORDS];
        for word in words.iter_mut().take(count as usize) {
            *word = u32::read_from(&mut src)?;
        }

        Ok(Self { count, words })
    }
}

/// Response to a `Uid` command: the truncated digest of the serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Payload)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UidResponse(pub [u8; FINGERPRINT_LEN]);

/// A run of consecutive registers: start address, count, and values.
///
/// Carried by `WriteReg` requests and by `ReadReg` responses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterBlock {
    pub reg: u8,
    pub values: Vec<u8, MAX_REGISTER_VALUES>,
}

impl Payload for RegisterBlock {
    fn write_to<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), error::EndOfInput> {
        let mut dst = dst.into_iter();

        self.reg.write_to(&mut dst)?;
        (self.values.len() as u8).write_to(&mut dst)?;
        self.values.write_to(&mut dst)
    }

    fn read_from<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
        let mut src = src.into_iter();

        let reg = u8::read_from(&mut src)?;
        let count = u8::read_from(&mut src)? as usize;
        if count == 0 || count > MAX_REGISTER_VALUES {
            return Err(error::Invalid.into());
        }

        let mut values = Vec::new();
        for _ in 0..count {
            // count is within capacity
            let _ = values.push(u8::read_from(&mut src)?);
        }

        Ok(Self { reg, values })
    }
}

/// Body of a `ReadReg` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Payload)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegisterQuery {
    pub reg: u8,
    /// Number of registers, at least one.
    pub count: u8,
}
