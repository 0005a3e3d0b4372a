use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
};

use crate::{ArbitrationPolicy, BusConfig, Error, RECOVERY_PULSES};

/// Acknowledge bit following every byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ack {
    /// Data line held low by the receiver.
    Ack,
    /// Data line left released.
    Nak,
}

impl Ack {
    fn from_bit(released: bool) -> Self {
        if released {
            Self::Nak
        } else {
            Self::Ack
        }
    }
}

/// Transfer direction encoded in the address byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

/// Two-wire bus master over a pair of open-drain pins.
///
/// Each instance carries its own "transaction open" state, so one engine
/// maps to one physical bus. It is not meant to be shared between tasks.
pub struct Bus<SCL, SDA, D> {
    scl: SCL,
    sda: SDA,
    delay: D,
    config: BusConfig,
    started: bool,
    arbitration_losses: u32,
}

impl<SCL, SDA, D> Bus<SCL, SDA, D>
where
    SCL: InputPin + OutputPin,
    SDA: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(scl: SCL, sda: SDA, delay: D, config: BusConfig) -> Self {
        Self {
            scl,
            sda,
            delay,
            config,
            started: false,
            arbitration_losses: 0,
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Whether a start has been issued without a matching stop.
    pub fn is_open(&self) -> bool {
        self.started
    }

    /// Times another driver was seen on the data line.
    pub fn arbitration_losses(&self) -> u32 {
        self.arbitration_losses
    }

    pub fn release(self) -> (SCL, SDA, D) {
        (self.scl, self.sda, self.delay)
    }

    #[inline]
    fn half_period(&mut self) {
        let ns = self.config.half_period_ns();
        self.delay.delay_ns(ns);
    }

    /// Release the clock line and sample it.
    fn read_scl(&mut self) -> Result<bool, Error> {
        self.scl.set_high().map_err(Error::pin)?;
        self.scl.is_high().map_err(Error::pin)
    }

    /// Release the data line and sample it.
    fn read_sda(&mut self) -> Result<bool, Error> {
        self.sda.set_high().map_err(Error::pin)?;
        self.sda.is_high().map_err(Error::pin)
    }

    fn clear_scl(&mut self) -> Result<(), Error> {
        self.scl.set_low().map_err(Error::pin)
    }

    fn clear_sda(&mut self) -> Result<(), Error> {
        self.sda.set_low().map_err(Error::pin)
    }

    /// Release the clock and wait for targets to let it rise.
    fn wait_for_clock(&mut self) -> Result<(), Error> {
        let mut waited = 0;

        while !self.read_scl()? {
            if waited >= self.config.stretch_timeout_us {
                warn!("clock held low for {} us", waited);
                return Err(Error::ClockStretch);
            }

            self.delay.delay_us(1);
            waited += 1;
        }

        Ok(())
    }

    /// Invoked whenever the data line is low although the engine released it.
    fn arbitration_lost(&mut self) -> Result<(), Error> {
        self.arbitration_losses = self.arbitration_losses.wrapping_add(1);

        match self.config.arbitration {
            ArbitrationPolicy::Ignore => {
                warn!("arbitration lost, ignored");
                Ok(())
            }
            ArbitrationPolicy::Abort => Err(Error::ArbitrationLost),
        }
    }

    /// Bring the bus to idle.
    ///
    /// Releases both lines and recovers the bus if a target is holding
    /// either of them. Returns the number of clock pulses issued.
    pub fn init(&mut self) -> Result<u32, Error> {
        self.started = false;
        self.recover()
    }

    /// Clock out a target stuck mid-transfer.
    ///
    /// Issues up to [`RECOVERY_PULSES`] clock pulses, stopping as soon as
    /// both lines read high. Returns the number of pulses issued.
    pub fn recover(&mut self) -> Result<u32, Error> {
        self.started = false;

        if self.read_scl()? && self.read_sda()? {
            return Ok(0);
        }

        for pulse in 1..=RECOVERY_PULSES {
            self.half_period();
            self.clear_scl()?;
            self.half_period();

            let scl = self.read_scl()?;
            let sda = self.read_sda()?;

            if scl && sda {
                debug!("bus recovered after {} pulses", pulse);
                return Ok(pulse);
            }
        }

        warn!("bus stuck after {} pulses", RECOVERY_PULSES);
        Err(Error::BusStuck)
    }

    /// Issue a start condition, or a repeated start when a transaction
    /// is already open.
    pub fn start(&mut self) -> Result<(), Error> {
        if self.started {
            self.read_sda()?;
            self.half_period();
            self.wait_for_clock()?;
            // repeated start setup time
            self.half_period();
        }

        if !self.read_sda()? {
            self.arbitration_lost()?;
        }

        // data falls while the clock is high
        self.clear_sda()?;
        self.half_period();
        self.clear_scl()?;
        self.started = true;

        Ok(())
    }

    /// Issue a stop condition, closing the transaction.
    pub fn stop(&mut self) -> Result<(), Error> {
        self.clear_sda()?;
        self.half_period();
        self.wait_for_clock()?;
        // stop setup time
        self.half_period();

        // data rises while the clock is high
        let released = self.read_sda()?;
        self.started = false;
        if !released {
            self.arbitration_lost()?;
        }
        self.half_period();

        Ok(())
    }

    pub fn write_bit(&mut self, bit: bool) -> Result<(), Error> {
        if bit {
            self.read_sda()?;
        } else {
            self.clear_sda()?;
        }
        self.half_period();
        self.wait_for_clock()?;

        // data is valid, make sure nobody else drives it
        if bit && !self.read_sda()? {
            self.arbitration_lost()?;
        }
        self.half_period();
        self.clear_scl()
    }

    pub fn read_bit(&mut self) -> Result<bool, Error> {
        // let the target drive data
        self.read_sda()?;
        self.half_period();
        self.wait_for_clock()?;

        let bit = self.read_sda()?;
        self.half_period();
        self.clear_scl()?;

        Ok(bit)
    }

    /// Shift out a byte, most significant bit first, and return the
    /// receiver's acknowledge.
    pub fn write_byte(&mut self, byte: u8) -> Result<Ack, Error> {
        for bit in (0..8).rev() {
            self.write_bit(byte & (1 << bit) != 0)?;
        }

        Ok(Ack::from_bit(self.read_bit()?))
    }

    /// Shift in a byte and answer with `ack`.
    pub fn read_byte(&mut self, ack: Ack) -> Result<u8, Error> {
        let mut byte = 0;

        for _ in 0..8 {
            byte = (byte << 1) | self.read_bit()? as u8;
        }

        self.write_bit(ack == Ack::Nak)?;

        Ok(byte)
    }

    /// Open a transaction (or restart one) addressed to `address`.
    pub(crate) fn select(&mut self, address: u8, direction: Direction) -> Result<(), Error> {
        if !self.started && !(self.read_scl()? && self.read_sda()?) {
            self.recover()?;
        }

        self.start()?;

        match self.write_byte((address << 1) | direction as u8)? {
            Ack::Ack => Ok(()),
            Ack::Nak => Err(Error::AddressNak),
        }
    }

    pub(crate) fn write_all(&mut self, bytes: &[u8]) -> Result<(), Error> {
        for &byte in bytes {
            if self.write_byte(byte)? == Ack::Nak {
                return Err(Error::WriteNak);
            }
        }

        Ok(())
    }

    /// Fill `buf`, acknowledging every byte except the last when `last` is set.
    pub(crate) fn read_into(&mut self, buf: &mut [u8], last: bool) -> Result<(), Error> {
        let final_index = buf.len().wrapping_sub(1);

        for (i, slot) in buf.iter_mut().enumerate() {
            let ack = if last && i == final_index {
                Ack::Nak
            } else {
                Ack::Ack
            };

            *slot = self.read_byte(ack)?;
        }

        Ok(())
    }

    fn write_register_address(&mut self, reg: u8) -> Result<(), Error> {
        match self.write_byte(reg)? {
            Ack::Ack => Ok(()),
            Ack::Nak => Err(Error::RegisterNak),
        }
    }

    /// Release the bus after a failed transfer and hand the error back.
    pub(crate) fn abort(&mut self, error: Error) -> Error {
        debug!("transfer aborted: {}", error);

        let released = match error {
            Error::ArbitrationLost => self.recover().map(drop),
            _ => self.stop(),
        };
        if let Err(release) = released {
            warn!("bus not released after {}: {}", error, release);
        }
        self.started = false;

        error
    }

    /// Write `values` to consecutive registers starting at `reg`.
    pub fn write_registers(&mut self, address: u8, reg: u8, values: &[u8]) -> Result<(), Error> {
        self.try_write_registers(address, reg, values)
            .map_err(|error| self.abort(error))
    }

    fn try_write_registers(&mut self, address: u8, reg: u8, values: &[u8]) -> Result<(), Error> {
        self.select(address, Direction::Write)?;
        self.write_register_address(reg)?;
        self.write_all(values)?;
        self.stop()
    }

    /// Read consecutive registers starting at `reg` into `buf`.
    ///
    /// The register address is written first, then a repeated start
    /// turns the bus around for the read.
    pub fn read_registers(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), Error> {
        self.try_read_registers(address, reg, buf)
            .map_err(|error| self.abort(error))
    }

    fn try_read_registers(&mut self, address: u8, reg: u8, buf: &mut [u8]) -> Result<(), Error> {
        self.select(address, Direction::Write)?;
        self.write_register_address(reg)?;

        if !buf.is_empty() {
            self.select(address, Direction::Read)?;
            self.read_into(buf, true)?;
        }

        self.stop()
    }
}
