use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    i2c::{ErrorType, I2c, Operation, SevenBitAddress},
};

use crate::{bus::Direction, Bus, Error};

impl<SCL, SDA, D> ErrorType for Bus<SCL, SDA, D>
where
    SCL: InputPin + OutputPin,
    SDA: InputPin + OutputPin,
    D: DelayNs,
{
    type Error = Error;
}

impl<SCL, SDA, D> Bus<SCL, SDA, D>
where
    SCL: InputPin + OutputPin,
    SDA: InputPin + OutputPin,
    D: DelayNs,
{
    fn try_transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        let mut direction = None;

        for i in 0..operations.len() {
            let read_follows = matches!(
                operations[i + 1..].iter().find(|operation| !is_empty_read(operation)),
                Some(Operation::Read(_))
            );

            match &mut operations[i] {
                Operation::Write(bytes) => {
                    if direction != Some(Direction::Write) {
                        self.select(address, Direction::Write)?;
                        direction = Some(Direction::Write);
                    }

                    self.write_all(bytes)?;
                }
                // nothing to clock in, and no reason to turn the bus around
                Operation::Read(buf) if buf.is_empty() => {}
                Operation::Read(buf) => {
                    if direction != Some(Direction::Read) {
                        self.select(address, Direction::Read)?;
                        direction = Some(Direction::Read);
                    }

                    self.read_into(buf, !read_follows)?;
                }
            }
        }

        if direction.is_some() {
            self.stop()?;
        }

        Ok(())
    }
}

fn is_empty_read(operation: &Operation<'_>) -> bool {
    matches!(operation, Operation::Read(buf) if buf.is_empty())
}

/// Adjacent operations of the same kind are merged into one phase. A change
/// of direction issues a repeated start.
impl<SCL, SDA, D> I2c<SevenBitAddress> for Bus<SCL, SDA, D>
where
    SCL: InputPin + OutputPin,
    SDA: InputPin + OutputPin,
    D: DelayNs,
{
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.try_transaction(address, operations)
            .map_err(|error| self.abort(error))
    }
}
