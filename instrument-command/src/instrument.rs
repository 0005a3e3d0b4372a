//! The hardware the dispatcher acts on.

use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};
use twowire::Bus;

/// Actions the host may request of the instrument.
pub trait Instrument {
    type Error;

    /// Bring the instrument back to a known state.
    fn reset(&mut self) -> Result<(), Self::Error>;

    fn write_registers(&mut self, reg: u8, values: &[u8]) -> Result<(), Self::Error>;

    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error>;
}

/// An instrument whose state lives in the registers of one two-wire target.
pub struct RegisterDevice<SCL, SDA, D> {
    bus: Bus<SCL, SDA, D>,
    address: u8,
}

impl<SCL, SDA, D> RegisterDevice<SCL, SDA, D>
where
    SCL: InputPin + OutputPin,
    SDA: InputPin + OutputPin,
    D: DelayNs,
{
    /// `address` is the 7-bit target address.
    pub fn new(bus: Bus<SCL, SDA, D>, address: u8) -> Self {
        Self { bus, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn bus(&mut self) -> &mut Bus<SCL, SDA, D> {
        &mut self.bus
    }

    pub fn release(self) -> Bus<SCL, SDA, D> {
        self.bus
    }
}

impl<SCL, SDA, D> Instrument for RegisterDevice<SCL, SDA, D>
where
    SCL: InputPin + OutputPin,
    SDA: InputPin + OutputPin,
    D: DelayNs,
{
    type Error = twowire::Error;

    fn reset(&mut self) -> Result<(), Self::Error> {
        let pulses = self.bus.recover()?;

        if pulses > 0 {
            info!("reset released the bus after {} pulses", pulses);
        }

        Ok(())
    }

    fn write_registers(&mut self, reg: u8, values: &[u8]) -> Result<(), Self::Error> {
        self.bus
            .write_registers(self.address, reg, values)
            .inspect_err(|error| debug!("register write failed with code {}", error.code()))
    }

    fn read_registers(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.bus
            .read_registers(self.address, reg, buf)
            .inspect_err(|error| debug!("register read failed with code {}", error.code()))
    }
}
