use crate::{error, Payload};

/// Command and response codes carried in the second header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Payload)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Kind {
    Ack = 0,
    Nak,
    Reset,
    Id,
    WriteReg,
    ReadReg,
    Echo,
    /// Silicon serial number.
    Ssn,
    /// Fingerprint derived from the silicon serial number.
    Uid,
    /// Licensed options.
    Opt,
    /// Instrument serial number.
    Isn,
    /// Diagnostic self test.
    Diag,
}

impl TryFrom<u8> for Kind {
    type Error = error::Invalid;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::read_from([value].iter()).map_err(|_| error::Invalid)
    }
}

impl From<Kind> for u8 {
    fn from(kind: Kind) -> Self {
        kind as u8
    }
}
