//! Payload encoding.
//!
//! Values are written to and read from byte iterators so the same code
//! serves packet buffers, slices, and chained sources alike. Numbers are
//! little endian.

use fill_array::fill;
use heapless::Vec;

use crate::error;

/// Types that can be carried in a packet payload.
pub trait Payload: Sized {
    /// Encode the value into the destination medium.
    fn write_to<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), error::EndOfInput>;

    /// Decode a value from the source medium.
    fn read_from<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error>;
}

macro_rules! impl_number {
    ($TYPE:ty, $SIZE:expr) => {
        impl Payload for $TYPE {
            fn write_to<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), error::EndOfInput> {
                let mut dst = dst.into_iter();

                for byte in self.to_le_bytes() {
                    *dst.next().ok_or(error::EndOfInput)? = byte;
                }

                Ok(())
            }

            fn read_from<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
                let mut src = src.into_iter();

                let bytes = fill![*src.next().ok_or(error::EndOfInput)?; $SIZE];

                Ok(Self::from_le_bytes(bytes))
            }
        }
    };
}

impl_number!(u8, 1);
impl_number!(u16, 2);
impl_number!(u32, 4);
impl_number!(u64, 8);
impl_number!(i8, 1);
impl_number!(i16, 2);
impl_number!(i32, 4);

impl Payload for bool {
    fn write_to<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), error::EndOfInput> {
        u8::from(*self).write_to(dst)
    }

    fn read_from<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
        match u8::read_from(src)? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(error::Invalid)?,
        }
    }
}

impl<T: Payload + Default + Copy, const N: usize> Payload for [T; N] {
    fn write_to<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), error::EndOfInput> {
        let mut dst = dst.into_iter();

        for item in self {
            item.write_to(&mut dst)?;
        }

        Ok(())
    }

    fn read_from<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
        let mut src = src.into_iter();
        let mut result = [T::default(); N];

        for value in result.iter_mut() {
            *value = T::read_from(&mut src)?;
        }

        Ok(result)
    }
}

/// Raw trailing bytes. Reading consumes the rest of the source.
impl<const N: usize> Payload for Vec<u8, N> {
    fn write_to<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), error::EndOfInput> {
        let mut dst = dst.into_iter();

        for &byte in self {
            *dst.next().ok_or(error::EndOfInput)? = byte;
        }

        Ok(())
    }

    fn read_from<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
        let mut result = Vec::new();

        for &byte in src {
            result.push(byte).map_err(|_| error::Invalid)?;
        }

        Ok(result)
    }
}

/// NUL terminated text carried in a fixed slot of `N` bytes.
///
/// Encoded as a length byte (text plus terminator) followed by exactly
/// `N` bytes, zero padded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FixedText<const N: usize> {
    bytes: Vec<u8, N>,
}

/// NUL terminated text of up to `N` bytes, terminator included.
///
/// Encoded as a length byte (text plus terminator) followed by that many
/// bytes. Unlike [`FixedText`] the slot is not padded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Text<const N: usize> {
    bytes: Vec<u8, N>,
}

/// Copy as much of `text` as fits in front of a terminator.
fn truncated<const N: usize>(text: &str) -> Vec<u8, N> {
    let keep = text.len().min(N.saturating_sub(1));
    let mut bytes = Vec::new();
    // cannot fail, `keep` < N
    let _ = bytes.extend_from_slice(&text.as_bytes()[..keep]);
    bytes
}

/// Read `declared` bytes of which the last must be the terminator.
fn read_terminated<'a, const N: usize>(
    src: &mut impl Iterator<Item = &'a u8>,
    declared: usize,
) -> Result<Vec<u8, N>, error::Error> {
    if declared == 0 || declared > N {
        return Err(error::Invalid.into());
    }

    let mut bytes = Vec::new();
    for _ in 0..declared - 1 {
        let byte = *src.next().ok_or(error::EndOfInput)?;
        // declared <= N so there is always room
        let _ = bytes.push(byte);
    }

    match src.next() {
        Some(0) => Ok(bytes),
        Some(_) => Err(error::Invalid)?,
        None => Err(error::EndOfInput)?,
    }
}

macro_rules! impl_text_accessors {
    ($TYPE:ident) => {
        impl<const N: usize> $TYPE<N> {
            const FITS_LENGTH_BYTE: () = assert!(
                N >= 1 && N <= u8::MAX as usize,
                "text slots hold 1 to 255 bytes"
            );

            /// Wrap `text`, truncating it to leave room for the terminator.
            pub fn new(text: &str) -> Self {
                #[allow(clippy::let_unit_value)]
                let () = Self::FITS_LENGTH_BYTE;

                Self {
                    bytes: truncated(text),
                }
            }

            /// Text bytes without the terminator.
            pub fn as_bytes(&self) -> &[u8] {
                &self.bytes
            }

            /// The text, if it is valid UTF-8.
            pub fn as_str(&self) -> Option<&str> {
                core::str::from_utf8(&self.bytes).ok()
            }

            /// Value of the encoded length byte.
            pub fn encoded_len(&self) -> u8 {
                #[allow(clippy::let_unit_value)]
                let () = Self::FITS_LENGTH_BYTE;

                // bytes.len() < N <= 255
                (self.bytes.len() + 1) as u8
            }
        }
    };
}

impl_text_accessors!(FixedText);
impl_text_accessors!(Text);

impl<const N: usize> Payload for FixedText<N> {
    fn write_to<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), error::EndOfInput> {
        let mut dst = dst.into_iter();

        self.encoded_len().write_to(&mut dst)?;

        let padded = self.bytes.iter().copied().chain(core::iter::repeat(0));
        for byte in padded.take(N) {
            *dst.next().ok_or(error::EndOfInput)? = byte;
        }

        Ok(())
    }

    fn read_from<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
        #[allow(clippy::let_unit_value)]
        let () = Self::FITS_LENGTH_BYTE;

        let mut src = src.into_iter();

        let declared = u8::read_from(&mut src)? as usize;
        let slot: [u8; N] = <[u8; N]>::read_from(&mut src)?;

        let bytes = read_terminated(&mut slot.iter(), declared)?;

        Ok(Self { bytes })
    }
}

impl<const N: usize> Payload for Text<N> {
    fn write_to<'a>(&self, dst: impl IntoIterator<Item = &'a mut u8>) -> Result<(), error::EndOfInput> {
        let mut dst = dst.into_iter();

        self.encoded_len().write_to(&mut dst)?;

        for &byte in self.bytes.iter().chain(core::iter::once(&0)) {
            *dst.next().ok_or(error::EndOfInput)? = byte;
        }

        Ok(())
    }

    fn read_from<'a>(src: impl IntoIterator<Item = &'a u8>) -> Result<Self, error::Error> {
        #[allow(clippy::let_unit_value)]
        let () = Self::FITS_LENGTH_BYTE;

        let mut src = src.into_iter();

        let declared = u8::read_from(&mut src)? as usize;
        let bytes = read_terminated(&mut src, declared)?;

        Ok(Self { bytes })
    }
}
