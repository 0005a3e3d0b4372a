//! Packets over a byte stream.
//!
//! The header is always read first. Its length byte is validated before it
//! is trusted as the count of bytes still to come. Short reads and writes
//! are retried until the packet is complete or the deadline passes.

use embassy_futures::{
    select::{select, Either},
    yield_now,
};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorType, Read, Write};
use packit::{Packet, HEADER_SIZE};

/// How long a framing call may wait on the transport.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Timeout {
    #[default]
    Never,
    Millis(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// The deadline passed before the packet was complete.
    TimedOut,
    /// The header declared an impossible length.
    Malformed(u8),
    Io(E),
}

/// A byte stream that may need to come up before it can carry packets.
#[allow(async_fn_in_trait)]
pub trait Transport: Read + Write {
    /// Resolves once the link is usable.
    async fn ready(&mut self) {}
}

pub struct Framer<Port, Delay> {
    port: Port,
    delay: Delay,
}

impl<Port, Delay> Framer<Port, Delay>
where
    Port: Read + Write,
    Delay: DelayNs,
{
    pub const fn new(port: Port, delay: Delay) -> Self {
        Self { port, delay }
    }

    pub fn port(&mut self) -> &mut Port {
        &mut self.port
    }

    pub fn release(self) -> (Port, Delay) {
        (self.port, self.delay)
    }

    /// Receive one packet into `packet`.
    ///
    /// Returns the number of bytes received, which equals the declared
    /// length.
    pub async fn read_packet(
        &mut self,
        packet: &mut Packet,
        timeout: Timeout,
    ) -> Result<usize, Error<<Port as ErrorType>::Error>> {
        let Self { port, delay } = self;

        match timeout {
            Timeout::Never => receive(port, packet).await,
            Timeout::Millis(ms) => match select(receive(port, packet), delay.delay_ms(ms)).await {
                Either::First(result) => result,
                Either::Second(()) => Err(Error::TimedOut),
            },
        }
    }

    /// Send the declared bytes of `packet`.
    ///
    /// Returns the number of bytes handed to the transport. When the
    /// deadline passes first the count is short, which is not an error.
    pub async fn write_packet(
        &mut self,
        packet: &Packet,
        timeout: Timeout,
    ) -> Result<usize, Error<<Port as ErrorType>::Error>> {
        let len = packet.validate_header().map_err(|_| Error::Malformed(packet.len() as u8))?;
        let bytes = &packet.as_bytes()[..len];

        let Self { port, delay } = self;
        let mut written = 0;

        match timeout {
            Timeout::Never => send(port, bytes, &mut written).await?,
            Timeout::Millis(ms) => {
                if let Either::First(result) =
                    select(send(port, bytes, &mut written), delay.delay_ms(ms)).await
                {
                    result?;
                }
            }
        }

        if written < len {
            debug!("write deadline passed after {} of {} bytes", written, len);
        }

        Ok(written)
    }
}

/// Fill `buf` completely, retrying short reads.
async fn fill<P: Read>(port: &mut P, buf: &mut [u8]) -> Result<(), Error<P::Error>> {
    let mut filled = 0;

    while filled < buf.len() {
        match port.read(&mut buf[filled..]).await.map_err(Error::Io)? {
            0 => yield_now().await,
            n => filled += n,
        }
    }

    Ok(())
}

async fn receive<P: Read>(port: &mut P, packet: &mut Packet) -> Result<usize, Error<P::Error>> {
    fill(port, packet.header_mut()).await?;

    let len = packet
        .validate_header()
        .map_err(|_| Error::Malformed(packet.len() as u8))?;

    fill(port, &mut packet.payload_mut()[..len - HEADER_SIZE]).await?;

    trace!("received {} bytes", len);

    Ok(len)
}

async fn send<P: Write>(
    port: &mut P,
    bytes: &[u8],
    written: &mut usize,
) -> Result<(), Error<P::Error>> {
    while *written < bytes.len() {
        match port.write(&bytes[*written..]).await.map_err(Error::Io)? {
            0 => yield_now().await,
            n => *written += n,
        }
    }

    Ok(())
}
