//! Test doubles for transports, time and hardware.

use core::{
    cell::Cell,
    convert::Infallible,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use embedded_hal::digital::{self, InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_io_async::{ErrorType, Read, Write};
use heapless::{Deque, Vec};
use packit::{Packet, PACKET_CAPACITY};

use crate::framing::Transport;

/// Simulated time in milliseconds. Advances only while a delay is polled.
pub struct Clock(Cell<u32>);

impl Clock {
    pub const fn new() -> Self {
        Self(Cell::new(0))
    }

    pub fn now(&self) -> u32 {
        self.0.get()
    }
}

struct Until<'a> {
    clock: &'a Clock,
    at: u32,
}

impl Future for Until<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.clock.now() >= self.at {
            Poll::Ready(())
        } else {
            self.clock.0.set(self.clock.now() + 1);
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

pub struct TickDelay<'a> {
    clock: &'a Clock,
}

impl<'a> TickDelay<'a> {
    pub fn new(clock: &'a Clock) -> Self {
        Self { clock }
    }
}

impl DelayNs for TickDelay<'_> {
    async fn delay_ns(&mut self, ns: u32) {
        self.delay_ms(ns.div_ceil(1_000_000)).await
    }

    async fn delay_ms(&mut self, ms: u32) {
        Until {
            clock: self.clock,
            at: self.clock.now().saturating_add(ms),
        }
        .await
    }
}

/// Everything written comes back out, `chunk` bytes per call at most.
pub struct Loopback {
    buf: Deque<u8, 1024>,
    chunk: usize,
    allowance: Option<usize>,
}

impl Loopback {
    pub fn new(chunk: usize) -> Self {
        Self {
            buf: Deque::new(),
            chunk,
            allowance: None,
        }
    }

    /// Accepts `allowance` bytes, then no more.
    pub fn stalled_after(allowance: usize) -> Self {
        Self {
            allowance: Some(allowance),
            ..Self::new(64)
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.buf.push_back(byte).unwrap();
        }
    }

    /// Pop the next complete packet, if one is queued.
    pub fn pop_packet(&mut self) -> Option<Packet> {
        let len = *self.buf.front()? as usize;
        if self.buf.len() < len || len < packit::HEADER_SIZE {
            return None;
        }

        let mut packet = Packet::new();
        for byte in packet.header_mut() {
            *byte = self.buf.pop_front().unwrap();
        }
        for byte in &mut packet.payload_mut()[..len - packit::HEADER_SIZE] {
            *byte = self.buf.pop_front().unwrap();
        }

        Some(packet)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

impl ErrorType for Loopback {
    type Error = Infallible;
}

impl Read for Loopback {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut n = 0;

        while n < buf.len().min(self.chunk) {
            match self.buf.pop_front() {
                Some(byte) => buf[n] = byte,
                None => break,
            }
            n += 1;
        }

        Ok(n)
    }
}

impl Write for Loopback {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let mut n = buf.len().min(self.chunk);

        if let Some(allowance) = &mut self.allowance {
            n = n.min(*allowance);
            *allowance -= n;
        }

        self.push(&buf[..n]);

        Ok(n)
    }
}

impl Transport for Loopback {}

/// Delivers one packet, but only once the clock reaches `available_at`.
pub struct Starving<'a> {
    clock: &'a Clock,
    available_at: u32,
    data: Vec<u8, PACKET_CAPACITY>,
    pos: usize,
}

impl<'a> Starving<'a> {
    pub fn new(clock: &'a Clock, available_at: u32, packet: &Packet) -> Self {
        Self {
            clock,
            available_at,
            data: Vec::from_slice(packet.as_bytes()).unwrap(),
            pos: 0,
        }
    }
}

impl ErrorType for Starving<'_> {
    type Error = Infallible;
}

impl Read for Starving<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.clock.now() < self.available_at {
            return Ok(0);
        }

        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;

        Ok(n)
    }
}

impl Write for Starving<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }
}

/// Blocking delay that returns at once.
pub struct NoDelay;

impl embedded_hal::delay::DelayNs for NoDelay {
    fn delay_ns(&mut self, _: u32) {}
}

/// An open-drain line with nothing but a pull-up, or shorted to ground.
pub struct Line {
    shorted: bool,
    driven_low: bool,
}

impl Line {
    pub fn pulled_up() -> Self {
        Self {
            shorted: false,
            driven_low: false,
        }
    }

    pub fn grounded() -> Self {
        Self {
            shorted: true,
            driven_low: false,
        }
    }
}

impl digital::ErrorType for Line {
    type Error = Infallible;
}

impl OutputPin for Line {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.driven_low = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.driven_low = false;
        Ok(())
    }
}

impl InputPin for Line {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!(self.shorted || self.driven_low))
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|high| !high)
    }
}
