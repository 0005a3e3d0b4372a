//! Byte stream channels multiplexed over one packet endpoint.
//!
//! Each channel owns its queues and transfer flags. Hardware completion
//! events carry the id of the channel they belong to and are routed to it
//! by [`Router`], so any number of channels can share the endpoint.
//!
//! Deciding to start a transfer and marking the direction busy happen in
//! one critical section. The endpoint is called after the lock is dropped.

use core::{cell::RefCell, convert::Infallible};

use embassy_sync::{
    blocking_mutex::{raw::RawMutex, Mutex},
    signal::Signal,
};
use embedded_io_async::{ErrorType, Read, Write};

use crate::{byte_queue::ByteQueue, framing::Transport};

/// Largest packet any endpoint may move in one transfer.
pub const MAX_PACKET: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelId(pub u8);

/// The packet hardware shared by all channels.
///
/// Methods take `&self` since both tasks and the event handler reach the
/// endpoint. Completion is reported back through [`Router::handle`].
pub trait Endpoint {
    /// Packet size of the bulk endpoints, at most [`MAX_PACKET`].
    fn max_packet(&self) -> usize;

    /// Arm the endpoint to receive one packet for `channel`.
    fn start_receive(&self, channel: ChannelId);

    /// Send one packet for `channel`. `data` may be empty.
    fn start_transmit(&self, channel: ChannelId, data: &[u8]);
}

/// Hardware notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event<'d> {
    /// The host selected a configuration, all channels may transfer.
    Configured,
    /// The host went away, pending data is discarded.
    Deconfigured,
    Received { channel: ChannelId, data: &'d [u8] },
    Transmitted { channel: ChannelId, len: usize },
}

struct State<const N: usize> {
    rx: ByteQueue<N>,
    tx: ByteQueue<N>,
    rx_armed: bool,
    tx_busy: bool,
    configured: bool,
}

impl<const N: usize> State<N> {
    const fn new() -> Self {
        Self {
            rx: ByteQueue::new(),
            tx: ByteQueue::new(),
            rx_armed: false,
            tx_busy: false,
            configured: false,
        }
    }

    /// Claim the receive side if a whole packet still fits.
    fn claim_receive(&mut self, max: usize) -> bool {
        if self.configured && !self.rx_armed && self.rx.free() >= max {
            self.rx_armed = true;
            true
        } else {
            false
        }
    }

    /// Claim the transmit side and move the next packet into `chunk`.
    fn claim_transmit(&mut self, chunk: &mut [u8]) -> Option<usize> {
        if !self.configured || self.tx_busy || self.tx.is_empty() {
            return None;
        }

        self.tx_busy = true;

        Some(self.tx.drain_into(chunk))
    }
}

/// What to ask of the endpoint once the lock is released.
struct Kick {
    receive: bool,
    transmit: Option<usize>,
    chunk: [u8; MAX_PACKET],
}

impl Kick {
    const fn new() -> Self {
        Self {
            receive: false,
            transmit: None,
            chunk: [0; MAX_PACKET],
        }
    }
}

/// One byte stream over the endpoint, with `N` bytes of queue each way.
pub struct Channel<M: RawMutex, const N: usize> {
    id: ChannelId,
    state: Mutex<M, RefCell<State<N>>>,
    rx_ready: Signal<M, ()>,
    tx_ready: Signal<M, ()>,
    configured: Signal<M, ()>,
}

impl<M: RawMutex, const N: usize> Channel<M, N> {
    pub const fn new(id: ChannelId) -> Self {
        Self {
            id,
            state: Mutex::new(RefCell::new(State::new())),
            rx_ready: Signal::new(),
            tx_ready: Signal::new(),
            configured: Signal::new(),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn port<'a, E: Endpoint>(&'a self, endpoint: &'a E) -> Port<'a, M, E, N> {
        Port {
            channel: self,
            endpoint,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.with_state(|state| state.configured)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State<N>) -> R) -> R {
        self.state.lock(|state| f(&mut state.borrow_mut()))
    }

    /// Run `f` under the lock, then start whatever transfers it claimed.
    fn update<E: Endpoint>(&self, endpoint: &E, f: impl FnOnce(&mut State<N>, &mut Kick)) {
        let mut kick = Kick::new();

        self.with_state(|state| f(state, &mut kick));

        if kick.receive {
            endpoint.start_receive(self.id);
        }

        if let Some(len) = kick.transmit {
            endpoint.start_transmit(self.id, &kick.chunk[..len]);
        }
    }

    fn on_configured<E: Endpoint>(&self, endpoint: &E) {
        let max = packet_size(endpoint);

        self.update(endpoint, |state, kick| {
            state.configured = true;
            kick.receive = state.claim_receive(max);
            kick.transmit = state.claim_transmit(&mut kick.chunk[..max]);
        });

        self.configured.signal(());
    }

    fn on_deconfigured(&self) {
        self.with_state(|state| *state = State::new());

        // wake writers blocked on a full queue
        self.tx_ready.signal(());
    }

    fn on_received<E: Endpoint>(&self, endpoint: &E, data: &[u8]) {
        let max = packet_size(endpoint);

        self.update(endpoint, |state, kick| {
            state.rx_armed = false;

            if state.rx.ingest(data).is_err() {
                warn!("channel {} dropped received bytes", self.id.0);
            }

            kick.receive = state.claim_receive(max);
        });

        self.rx_ready.signal(());
    }

    fn on_transmitted<E: Endpoint>(&self, endpoint: &E, len: usize) {
        let max = packet_size(endpoint);

        self.update(endpoint, |state, kick| {
            state.tx_busy = false;
            kick.transmit = state.claim_transmit(&mut kick.chunk[..max]);

            // a full packet must be followed by a short one to end the transfer
            if kick.transmit.is_none() && state.configured && len > 0 && len == max {
                state.tx_busy = true;
                kick.transmit = Some(0);
            }
        });

        self.tx_ready.signal(());
    }
}

fn packet_size<E: Endpoint>(endpoint: &E) -> usize {
    endpoint.max_packet().clamp(1, MAX_PACKET)
}

/// Dispatches endpoint events to the channel named in each event.
pub struct Router<'a, M: RawMutex, E, const N: usize> {
    endpoint: &'a E,
    channels: &'a [&'a Channel<M, N>],
}

impl<'a, M: RawMutex, E: Endpoint, const N: usize> Router<'a, M, E, N> {
    pub const fn new(endpoint: &'a E, channels: &'a [&'a Channel<M, N>]) -> Self {
        Self { endpoint, channels }
    }

    fn find(&self, id: ChannelId) -> Option<&'a Channel<M, N>> {
        self.channels.iter().copied().find(|channel| channel.id == id)
    }

    pub fn handle(&self, event: Event<'_>) {
        trace!("endpoint event {}", event);

        match event {
            Event::Configured => {
                for channel in self.channels {
                    channel.on_configured(self.endpoint);
                }
            }
            Event::Deconfigured => {
                for channel in self.channels {
                    channel.on_deconfigured();
                }
            }
            Event::Received { channel, data } => match self.find(channel) {
                Some(owner) => owner.on_received(self.endpoint, data),
                None => warn!("dropped {} bytes for unknown channel {}", data.len(), channel.0),
            },
            Event::Transmitted { channel, len } => match self.find(channel) {
                Some(owner) => owner.on_transmitted(self.endpoint, len),
                None => warn!("transmit completion for unknown channel {}", channel.0),
            },
        }
    }
}

/// Task side of a channel.
pub struct Port<'a, M: RawMutex, E, const N: usize> {
    channel: &'a Channel<M, N>,
    endpoint: &'a E,
}

impl<M: RawMutex, E: Endpoint, const N: usize> ErrorType for Port<'_, M, E, N> {
    type Error = Infallible;
}

impl<M: RawMutex, E: Endpoint, const N: usize> Read for Port<'_, M, E, N> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        let max = packet_size(self.endpoint);

        loop {
            let mut read = 0;

            self.channel.update(self.endpoint, |state, kick| {
                read = state.rx.drain_into(&mut buf[..]);
                kick.receive = state.claim_receive(max);
            });

            if read > 0 {
                return Ok(read);
            }

            self.channel.rx_ready.wait().await;
        }
    }
}

impl<M: RawMutex, E: Endpoint, const N: usize> Write for Port<'_, M, E, N> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }

        let max = packet_size(self.endpoint);

        loop {
            let mut written = 0;

            self.channel.update(self.endpoint, |state, kick| {
                written = buf.len().min(state.tx.free());
                // fits by construction
                let _ = state.tx.ingest(&buf[..written]);
                kick.transmit = state.claim_transmit(&mut kick.chunk[..max]);
            });

            if written > 0 {
                return Ok(written);
            }

            self.channel.tx_ready.wait().await;
        }
    }

    /// Resolves once everything queued has left the endpoint.
    async fn flush(&mut self) -> Result<(), Self::Error> {
        loop {
            let drained = self
                .channel
                .with_state(|state| state.tx.is_empty() && !state.tx_busy);

            if drained {
                return Ok(());
            }

            self.channel.tx_ready.wait().await;
        }
    }
}

impl<M: RawMutex, E: Endpoint, const N: usize> Transport for Port<'_, M, E, N> {
    async fn ready(&mut self) {
        while !self.channel.is_configured() {
            self.channel.configured.wait().await;
        }
    }
}
