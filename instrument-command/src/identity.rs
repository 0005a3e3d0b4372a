//! Who the instrument is: build metadata and the silicon serial number.

use core::marker::PhantomData;

use md5::{Digest, Md5};
use packit::{
    messages::{
        IdResponse, SsnResponse, UidResponse, BUILD_HASH_SLOT, FINGERPRINT_LEN, MAX_SERIAL_WORDS,
    },
    payload::{FixedText, Text},
};

/// Parse leading decimal digits, stopping at the first other character.
const fn parse_decimal(text: &str) -> u16 {
    let bytes = text.as_bytes();
    let mut value: u16 = 0;
    let mut i = 0;

    while i < bytes.len() && bytes[i].is_ascii_digit() {
        value = value.wrapping_mul(10).wrapping_add((bytes[i] - b'0') as u16);
        i += 1;
    }

    value
}

const fn env_or(value: Option<&'static str>, fallback: &'static str) -> &'static str {
    match value {
        Some(value) => value,
        None => fallback,
    }
}

/// Version and build details reported by the `Id` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BuildInfo {
    pub product_id: u8,
    pub protocol_version: u8,
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub firmware_build: u16,
    /// Abbreviated source revision.
    pub hash: &'static str,
    pub info: &'static str,
}

impl BuildInfo {
    /// Metadata of this build, taken from `INSTRUMENT_BUILD_NUMBER`,
    /// `INSTRUMENT_BUILD_HASH` and `INSTRUMENT_BUILD_INFO` at compile time.
    pub const CURRENT: Self = Self {
        product_id: 1,
        protocol_version: 1,
        firmware_major: 1,
        firmware_minor: 15,
        firmware_build: parse_decimal(env_or(option_env!("INSTRUMENT_BUILD_NUMBER"), "0")),
        hash: env_or(option_env!("INSTRUMENT_BUILD_HASH"), "0000000"),
        info: env_or(option_env!("INSTRUMENT_BUILD_INFO"), "unversioned"),
    };
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Source of the hardware unique identifier.
pub trait SiliconSerial {
    /// Number of 32-bit words in the identifier, between 1 and 4.
    const WORDS: usize;

    type Error;

    /// Fill `words`, low-order word first. `words` is exactly
    /// [`WORDS`](Self::WORDS) long.
    fn read(&mut self, words: &mut [u32]) -> Result<(), Self::Error>;
}

/// Builds the identity responses. `D` digests the serial number into the
/// fingerprint.
pub struct Identity<S, D = Md5> {
    serial: S,
    build: BuildInfo,
    _digest: PhantomData<D>,
}

impl<S, D> Identity<S, D>
where
    S: SiliconSerial,
    D: Digest,
{
    const WORDS_IN_RANGE: () = assert!(
        S::WORDS >= 1 && S::WORDS <= MAX_SERIAL_WORDS,
        "silicon serial numbers are 1 to 4 words long"
    );

    pub fn new(serial: S) -> Self {
        Self::with_build(serial, BuildInfo::CURRENT)
    }

    pub fn with_build(serial: S, build: BuildInfo) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::WORDS_IN_RANGE;

        Self {
            serial,
            build,
            _digest: PhantomData,
        }
    }

    pub fn build(&self) -> &BuildInfo {
        &self.build
    }

    pub fn id(&self) -> IdResponse {
        let build = &self.build;

        IdResponse {
            product_id: build.product_id,
            protocol_version: build.protocol_version,
            firmware_major: build.firmware_major,
            firmware_minor: build.firmware_minor,
            firmware_build: build.firmware_build,
            build_hash: FixedText::<BUILD_HASH_SLOT>::new(build.hash),
            build_info: Text::new(build.info),
        }
    }

    fn serial_words(&mut self) -> Result<[u32; MAX_SERIAL_WORDS], S::Error> {
        let mut words = [0; MAX_SERIAL_WORDS];

        self.serial.read(&mut words[..S::WORDS])?;

        Ok(words)
    }

    pub fn ssn(&mut self) -> Result<SsnResponse, S::Error> {
        let words = self.serial_words()?;

        Ok(SsnResponse::new(&words[..S::WORDS]))
    }

    /// Leading bytes of the digest of the serial number, words in little
    /// endian order. Computed on every call.
    pub fn fingerprint(&mut self) -> Result<[u8; FINGERPRINT_LEN], S::Error> {
        let words = self.serial_words()?;

        let mut digest = D::new();
        for word in &words[..S::WORDS] {
            digest.update(word.to_le_bytes());
        }
        let output = digest.finalize();

        let mut fingerprint = [0; FINGERPRINT_LEN];
        let take = output.len().min(FINGERPRINT_LEN);
        fingerprint[..take].copy_from_slice(&output[..take]);

        Ok(fingerprint)
    }

    pub fn uid(&mut self) -> Result<UidResponse, S::Error> {
        self.fingerprint().map(UidResponse)
    }
}
