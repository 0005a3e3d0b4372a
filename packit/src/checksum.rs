//! Packet checksums.
//!
//! The checksum covers the length and kind bytes followed by the payload.
//! The checksum field itself is never part of the computation.

use crc::{Crc, Digest, CRC_16_XMODEM};

/// Describes types that can provide
/// a streaming 16-bit checksum.
pub trait ChecksumProvider {
    /// Start a new computation.
    fn reset(&mut self);

    fn update(&mut self, word: u8);

    /// Produce the checksum of everything fed since the last reset.
    fn finalize(&mut self) -> u16;

    /// Checksum of `words` from a fresh state.
    fn compute<'a>(&mut self, words: impl IntoIterator<Item = &'a u8>) -> u16 {
        self.reset();

        for word in words {
            self.update(*word);
        }

        self.finalize()
    }
}

/// Fletcher-16: two running sums modulo 255.
///
/// The result packs the second sum in the high byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fletcher16 {
    sum1: u16,
    sum2: u16,
}

impl Fletcher16 {
    pub const fn new() -> Self {
        Self { sum1: 0, sum2: 0 }
    }
}

impl ChecksumProvider for Fletcher16 {
    fn reset(&mut self) {
        *self = Self::new();
    }

    fn update(&mut self, word: u8) {
        self.sum1 += word as u16;
        if self.sum1 > 254 {
            self.sum1 -= 255;
        }

        self.sum2 += self.sum1;
        if self.sum2 > 254 {
            self.sum2 -= 255;
        }
    }

    fn finalize(&mut self) -> u16 {
        (self.sum2 << 8) | self.sum1
    }
}

static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC-16/XMODEM.
pub struct Crc16 {
    digest: Digest<'static, u16>,
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc16 {
    pub fn new() -> Self {
        Self {
            digest: CRC16.digest(),
        }
    }
}

impl ChecksumProvider for Crc16 {
    fn reset(&mut self) {
        self.digest = CRC16.digest();
    }

    fn update(&mut self, word: u8) {
        self.digest.update(&[word]);
    }

    fn finalize(&mut self) -> u16 {
        core::mem::replace(&mut self.digest, CRC16.digest()).finalize()
    }
}
