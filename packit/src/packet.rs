use crate::{
    checksum::ChecksumProvider, error as codec, iter::Counting, Kind, Payload, HEADER_SIZE,
    PACKET_CAPACITY, PAYLOAD_CAPACITY,
};

const LEN: usize = 0;
const KIND: usize = 1;
const CHECKSUM: core::ops::Range<usize> = 2..4;

pub mod error {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Error {
        /// The length byte cannot describe a packet.
        Malformed(u8),
        Checksum { expected: u16, found: u16 },
    }
}

pub use error::Error;

/// How the checksum field is treated.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Strictness {
    /// Always write zero and never check. Hosts built against the
    /// reserved field expect this.
    #[default]
    Compatible,
    /// Compute on write, reject mismatches on read.
    Strict,
}

/// A single packet buffer, reused across dispatch cycles.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    buf: [u8; PACKET_CAPACITY],
}

impl Default for Packet {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Packet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Packet")
            .field("len", &self.buf[LEN])
            .field("kind", &self.buf[KIND])
            .field("checksum", &self.checksum())
            .field("payload", &self.payload())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Packet {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Packet {{ len: {}, kind: {}, payload: {=[u8]} }}",
            self.buf[LEN],
            self.buf[KIND],
            self.payload()
        )
    }
}

impl Packet {
    pub const fn new() -> Self {
        Self {
            buf: [0; PACKET_CAPACITY],
        }
    }

    /// Zero the whole buffer.
    pub fn clear(&mut self) {
        self.buf.fill(0);
    }

    /// The declared total length, header included.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf[LEN] as usize
    }

    #[inline]
    pub fn kind_byte(&self) -> u8 {
        self.buf[KIND]
    }

    pub fn kind(&self) -> Result<Kind, codec::Invalid> {
        Kind::try_from(self.kind_byte())
    }

    pub fn checksum(&self) -> u16 {
        u16::from_le_bytes([self.buf[CHECKSUM.start], self.buf[CHECKSUM.start + 1]])
    }

    /// Check the length byte before it is trusted as a read count.
    ///
    /// Returns the total packet length.
    pub fn validate_header(&self) -> Result<usize, Error> {
        let len = self.len();

        if (HEADER_SIZE..=PACKET_CAPACITY).contains(&len) {
            Ok(len)
        } else {
            Err(Error::Malformed(self.buf[LEN]))
        }
    }

    /// The declared payload. Empty when the header is malformed.
    pub fn payload(&self) -> &[u8] {
        match self.validate_header() {
            Ok(len) => &self.buf[HEADER_SIZE..len],
            Err(_) => &[],
        }
    }

    /// The whole payload area, regardless of the declared length.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.buf[HEADER_SIZE..]
    }

    pub fn header_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..HEADER_SIZE]
    }

    /// The declared packet bytes, header included.
    pub fn as_bytes(&self) -> &[u8] {
        match self.validate_header() {
            Ok(len) => &self.buf[..len],
            Err(_) => &[],
        }
    }

    pub fn set_kind(&mut self, kind: Kind) {
        self.buf[KIND] = kind.into();
    }

    /// Set the length byte for a payload of `size` bytes.
    pub fn set_len_for_payload(&mut self, size: usize) -> Result<(), codec::EndOfInput> {
        if size > PAYLOAD_CAPACITY {
            return Err(codec::EndOfInput);
        }

        self.buf[LEN] = (HEADER_SIZE + size) as u8;

        Ok(())
    }

    /// Turn the packet into a header-only response.
    pub fn reply(&mut self, kind: Kind) {
        self.set_kind(kind);
        self.buf[LEN] = HEADER_SIZE as u8;
    }

    /// Encode `payload` and size the packet to fit it.
    pub fn put_payload(&mut self, payload: &impl Payload) -> Result<(), codec::EndOfInput> {
        let mut dst = Counting::new(self.payload_mut().iter_mut());

        payload.write_to(&mut dst)?;

        let written = dst.consumed();
        self.set_len_for_payload(written)
    }

    fn compute_checksum(&self, provider: &mut impl ChecksumProvider) -> u16 {
        provider.compute(self.buf[..CHECKSUM.start].iter().chain(self.payload()))
    }

    /// Fill the checksum field for the current contents.
    pub fn seal(&mut self, strictness: Strictness, provider: &mut impl ChecksumProvider) {
        let checksum = match strictness {
            Strictness::Compatible => 0,
            Strictness::Strict => self.compute_checksum(provider),
        };

        self.buf[CHECKSUM].copy_from_slice(&checksum.to_le_bytes());
    }

    /// Check the checksum field against the current contents.
    pub fn verify(
        &self,
        strictness: Strictness,
        provider: &mut impl ChecksumProvider,
    ) -> Result<(), Error> {
        if strictness == Strictness::Compatible {
            return Ok(());
        }

        let expected = self.compute_checksum(provider);
        let found = self.checksum();

        if expected == found {
            Ok(())
        } else {
            Err(Error::Checksum { expected, found })
        }
    }
}

impl AsRef<[u8]> for Packet {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{messages::RegisterQuery, Crc16, Fletcher16};

    fn echo(payload: &[u8]) -> Packet {
        let mut packet = Packet::new();

        packet.set_kind(Kind::Echo);
        packet.payload_mut()[..payload.len()].copy_from_slice(payload);
        packet.set_len_for_payload(payload.len()).unwrap();

        packet
    }

    mod header {
        use super::*;

        #[test]
        fn length_bounds() {
            let mut packet = Packet::new();

            for len in 0..HEADER_SIZE as u8 {
                packet.header_mut()[0] = len;
                assert_eq!(Err(Error::Malformed(len)), packet.validate_header());
                assert!(packet.as_bytes().is_empty());
            }

            packet.header_mut()[0] = 255;
            assert_eq!(Err(Error::Malformed(255)), packet.validate_header());

            packet.header_mut()[0] = 254;
            assert_eq!(Ok(254), packet.validate_header());
            assert_eq!(PAYLOAD_CAPACITY, packet.payload().len());
        }

        #[test]
        fn reply_is_header_only() {
            let mut packet = echo(&[1, 2, 3]);

            packet.reply(Kind::Nak);

            assert_eq!(4, packet.len());
            assert_eq!(Ok(Kind::Nak), packet.kind());
            assert!(packet.payload().is_empty());
        }

        #[test]
        fn unknown_kind() {
            let mut packet = Packet::new();
            packet.header_mut()[1] = 0x42;

            assert_eq!(0x42, packet.kind_byte());
            assert!(packet.kind().is_err());
        }

        #[test]
        fn oversized_payload() {
            let mut packet = Packet::new();

            assert!(packet.set_len_for_payload(PAYLOAD_CAPACITY).is_ok());
            assert_eq!(Err(codec::EndOfInput), packet.set_len_for_payload(PAYLOAD_CAPACITY + 1));
        }
    }

    mod payload {
        use super::*;

        #[test]
        fn put_sets_length() {
            let mut packet = Packet::new();

            packet
                .put_payload(&RegisterQuery { reg: 0x20, count: 3 })
                .unwrap();

            assert_eq!(6, packet.len());
            assert_eq!(&[0x20, 3], packet.payload());
        }

        #[test]
        fn clear_zeroes() {
            let mut packet = echo(&[0xff; 10]);

            packet.clear();

            assert_eq!(Packet::new(), packet);
        }
    }

    mod checksum {
        use super::*;

        #[test]
        fn compatible_is_always_zero() {
            let mut packet = echo(b"hello");

            packet.header_mut()[2] = 0xaa;
            packet.seal(Strictness::Compatible, &mut Fletcher16::new());

            assert_eq!(0, packet.checksum());

            packet.header_mut()[3] = 0x55;
            assert!(packet.verify(Strictness::Compatible, &mut Fletcher16::new()).is_ok());
        }

        #[test]
        fn strict_covers_header_and_payload() {
            let mut packet = echo(b"abc");

            packet.seal(Strictness::Strict, &mut Fletcher16::new());

            let expected = Fletcher16::new().compute(&[7, 6, b'a', b'b', b'c']);
            assert_eq!(expected, packet.checksum());
            assert_eq!(expected.to_le_bytes(), packet.as_bytes()[2..4]);

            assert!(packet.verify(Strictness::Strict, &mut Fletcher16::new()).is_ok());
        }

        #[test]
        fn strict_rejects_corruption() {
            let mut crc = Crc16::new();
            let mut packet = echo(&[0x10, 0x20]);

            packet.seal(Strictness::Strict, &mut crc);
            let found = packet.checksum();

            packet.payload_mut()[1] = 0x21;

            match packet.verify(Strictness::Strict, &mut crc) {
                Err(Error::Checksum { expected, found: f }) => {
                    assert_ne!(expected, f);
                    assert_eq!(found, f);
                }
                other => panic!("unexpected {:?}", other),
            }
        }
    }
}
