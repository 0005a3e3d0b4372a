use embedded_hal::{
    digital,
    i2c::{self, NoAcknowledgeSource},
};

/// Bus failures. The first four keep the status codes hosts already know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The target did not acknowledge its address.
    AddressNak,
    /// The target did not acknowledge the register address.
    RegisterNak,
    /// The target did not acknowledge a data byte.
    WriteNak,
    /// The clock line was held low past the stretch limit.
    ClockStretch,
    ArbitrationLost,
    /// The lines stayed low through every recovery pulse.
    BusStuck,
    Pin(digital::ErrorKind),
}

impl Error {
    /// Numeric status reported to hosts.
    pub const fn code(&self) -> u8 {
        match self {
            Self::AddressNak => 1,
            Self::RegisterNak => 2,
            Self::WriteNak => 3,
            Self::ClockStretch => 4,
            Self::ArbitrationLost => 5,
            Self::BusStuck => 6,
            Self::Pin(_) => 7,
        }
    }

    pub(crate) fn pin(error: impl digital::Error) -> Self {
        Self::Pin(error.kind())
    }
}

impl i2c::Error for Error {
    fn kind(&self) -> i2c::ErrorKind {
        match self {
            Self::AddressNak => i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            Self::RegisterNak | Self::WriteNak => {
                i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
            }
            Self::ArbitrationLost => i2c::ErrorKind::ArbitrationLoss,
            Self::ClockStretch | Self::BusStuck => i2c::ErrorKind::Bus,
            Self::Pin(_) => i2c::ErrorKind::Other,
        }
    }
}
