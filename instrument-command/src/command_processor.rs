use embedded_hal_async::delay::DelayNs;
use embedded_io_async::ErrorType;
use heapless::Vec;
use md5::{Digest, Md5};
use packit::{
    messages::{RegisterBlock, MAX_REGISTER_VALUES},
    ChecksumProvider, Fletcher16, Kind, Packet, Payload, Strictness,
};

use crate::{
    framing::{self, Framer, Timeout, Transport},
    identity::{Identity, SiliconSerial},
    instrument::Instrument,
    request::Request,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    pub read_timeout: Timeout,
    pub write_timeout: Timeout,
    pub strictness: Strictness,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            read_timeout: Timeout::Never,
            write_timeout: Timeout::Never,
            strictness: Strictness::Compatible,
        }
    }

    pub const fn read_timeout(mut self, timeout: Timeout) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub const fn write_timeout(mut self, timeout: Timeout) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub const fn strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }
}

/// Answers host requests, one packet at a time.
pub struct CommandProcessor<Port, Delay, Instr, Serial, Dig = Md5, Check = Fletcher16> {
    framer: Framer<Port, Delay>,
    instrument: Instr,
    identity: Identity<Serial, Dig>,
    checksum: Check,
    config: Config,
    packet: Packet,
}

impl<Port, Delay, Instr, Serial, Dig> CommandProcessor<Port, Delay, Instr, Serial, Dig, Fletcher16>
where
    Port: Transport,
    Delay: DelayNs,
    Instr: Instrument,
    Serial: SiliconSerial,
    Dig: Digest,
{
    pub fn new(
        port: Port,
        delay: Delay,
        instrument: Instr,
        identity: Identity<Serial, Dig>,
        config: Config,
    ) -> Self {
        Self::with_checksum(port, delay, instrument, identity, Fletcher16::new(), config)
    }
}

impl<Port, Delay, Instr, Serial, Dig, Check> CommandProcessor<Port, Delay, Instr, Serial, Dig, Check>
where
    Port: Transport,
    Delay: DelayNs,
    Instr: Instrument,
    Serial: SiliconSerial,
    Dig: Digest,
    Check: ChecksumProvider,
{
    pub fn with_checksum(
        port: Port,
        delay: Delay,
        instrument: Instr,
        identity: Identity<Serial, Dig>,
        checksum: Check,
        config: Config,
    ) -> Self {
        Self {
            framer: Framer::new(port, delay),
            instrument,
            identity,
            checksum,
            config,
            packet: Packet::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn instrument(&mut self) -> &mut Instr {
        &mut self.instrument
    }

    pub fn port(&mut self) -> &mut Port {
        self.framer.port()
    }

    /// Wait for the transport, then serve requests forever.
    ///
    /// Timeouts and malformed packets are dropped and the loop carries on.
    pub async fn run(&mut self) -> ! {
        self.framer.port().ready().await;
        info!("transport ready, serving requests");

        loop {
            match self.poll_once().await {
                Ok(_) => {}
                Err(framing::Error::TimedOut) => trace!("no request before the deadline"),
                Err(framing::Error::Malformed(len)) => {
                    warn!("dropped packet declaring {} bytes", len)
                }
                Err(framing::Error::Io(_)) => warn!("transport failed"),
            }
        }
    }

    /// Receive one request and send its response.
    ///
    /// Returns the kind of the response that was sent.
    pub async fn poll_once(&mut self) -> Result<Kind, framing::Error<<Port as ErrorType>::Error>> {
        self.packet.clear();

        let received = self
            .framer
            .read_packet(&mut self.packet, self.config.read_timeout)
            .await?;

        let kind = match self.packet.verify(self.config.strictness, &mut self.checksum) {
            Ok(()) => self.dispatch(received),
            Err(error) => {
                warn!("rejected request: {}", error);
                self.packet.reply(Kind::Nak);
                Kind::Nak
            }
        };

        self.packet.seal(self.config.strictness, &mut self.checksum);

        let written = self
            .framer
            .write_packet(&self.packet, self.config.write_timeout)
            .await?;

        if written < self.packet.len() {
            warn!("response cut short at {} of {} bytes", written, self.packet.len());
        }

        Ok(kind)
    }

    /// Turn the request in the packet buffer into its response, in place.
    fn dispatch(&mut self, received: usize) -> Kind {
        let request = match Request::decode(&self.packet) {
            Ok(request) => request,
            Err(error) => {
                debug!("undecodable request {}: {}", self.packet.kind_byte(), error);
                self.packet.reply(Kind::Nak);
                return Kind::Nak;
            }
        };

        trace!("dispatching {}", request);

        let packet = &mut self.packet;

        match request {
            // a host NAK is answered as if it had been an ACK
            Request::Ack | Request::Nak => {
                packet.reply(Kind::Ack);
                Kind::Ack
            }
            Request::Reset => status(packet, self.instrument.reset().is_ok()),
            Request::Id => respond(packet, Ok::<_, ()>(self.identity.id())),
            Request::Ssn => respond(packet, self.identity.ssn()),
            Request::Uid => respond(packet, self.identity.uid()),
            Request::Echo if received > 0 => {
                packet.set_kind(Kind::Ack);
                Kind::Ack
            }
            Request::WriteReg(block) => status(
                packet,
                self.instrument
                    .write_registers(block.reg, &block.values)
                    .is_ok(),
            ),
            Request::ReadReg(query) => {
                respond(packet, read_block(&mut self.instrument, query.reg, query.count))
            }
            Request::Echo | Request::Opt | Request::Isn | Request::Diag => {
                packet.reply(Kind::Nak);
                Kind::Nak
            }
        }
    }

    pub fn release(self) -> (Port, Delay, Instr) {
        let (port, delay) = self.framer.release();

        (port, delay, self.instrument)
    }
}

fn read_block<I: Instrument>(instrument: &mut I, reg: u8, count: u8) -> Result<RegisterBlock, ()> {
    let count = count as usize;

    if count == 0 || count > MAX_REGISTER_VALUES {
        return Err(());
    }

    let mut values = Vec::new();
    values.resize(count, 0)?;

    instrument.read_registers(reg, &mut values).map_err(drop)?;

    Ok(RegisterBlock { reg, values })
}

/// Header-only response.
fn status(packet: &mut Packet, ok: bool) -> Kind {
    let kind = if ok { Kind::Ack } else { Kind::Nak };

    packet.reply(kind);

    kind
}

/// Acknowledge with `payload`, or refuse when it could not be produced.
fn respond<P: Payload, E>(packet: &mut Packet, payload: Result<P, E>) -> Kind {
    let encoded = match payload {
        Ok(payload) => packet.put_payload(&payload).is_ok(),
        Err(_) => false,
    };

    if encoded {
        packet.set_kind(Kind::Ack);
        Kind::Ack
    } else {
        status(packet, false)
    }
}
