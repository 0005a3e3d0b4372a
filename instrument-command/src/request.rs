use core::iter;

use packit::{
    error,
    messages::{RegisterBlock, RegisterQuery},
    Packet, Payload,
};

/// A host request, decoded from the kind byte followed by the payload.
///
/// Tags match [`packit::Kind`]. Payload bytes are only interpreted once the
/// tag selects a variant that carries any.
#[derive(Debug, Clone, PartialEq, Eq, Payload)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Request {
    Ack = 0,
    Nak,
    Reset,
    Id,
    WriteReg(RegisterBlock),
    ReadReg(RegisterQuery),
    /// The payload is returned untouched, so it is not decoded.
    Echo,
    Ssn,
    Uid,
    Opt,
    Isn,
    Diag,
}

impl Request {
    pub fn decode(packet: &Packet) -> Result<Self, error::Error> {
        let kind = packet.kind_byte();

        Self::read_from(iter::once(&kind).chain(packet.payload()))
    }
}
