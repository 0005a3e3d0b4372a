//! A simulated register target wired to the engine through fake pins.
//!
//! Every pin write re-evaluates the wired-AND line levels and steps the
//! target's state machine on clock edges and start/stop conditions.

use core::{cell::RefCell, convert::Infallible};

use embedded_hal::{
    delay::DelayNs,
    digital::{ErrorType, InputPin, OutputPin},
};

use crate::{Bus, BusConfig};

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Line {
    Scl,
    Sda,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Stage {
    Address,
    Register,
    Data,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Phase {
    Idle,
    Receive { stage: Stage, bits: u8, byte: u8 },
    Acking { stage: Stage, byte: u8, ack: bool },
    Transmit { sent: u8, byte: u8 },
    AwaitAck { acked: bool },
}

struct Wire {
    address: u8,
    registers: [u8; 256],
    pointer: u8,

    master_scl_low: bool,
    master_sda_low: bool,
    target_sda_low: bool,
    held_sda_low: bool,
    hold_sda_at: Option<u32>,
    stuck_until: u32,
    stretch: u32,

    nak_register: bool,
    nak_data_after: Option<usize>,

    phase: Phase,
    prev_scl: bool,
    prev_sda: bool,
    data_bytes: usize,

    clock_pulls: u32,
    acks: usize,
    master_naks: usize,
    starts: usize,
    stops: usize,
}

impl Wire {
    fn stuck(&self) -> bool {
        self.clock_pulls < self.stuck_until
    }

    fn level(&self, line: Line) -> bool {
        let held = self.held_sda_low || self.hold_sda_at.is_some_and(|at| self.clock_pulls >= at);

        match line {
            Line::Scl => !(self.master_scl_low || self.stuck()),
            Line::Sda => !(self.master_sda_low || self.target_sda_low || held || self.stuck()),
        }
    }

    fn drive(&mut self, line: Line, low: bool) {
        match line {
            Line::Scl => {
                if low {
                    self.clock_pulls += 1;
                }
                self.master_scl_low = low;
            }
            Line::Sda => self.master_sda_low = low,
        }

        self.step();
    }

    fn sample(&mut self, line: Line) -> bool {
        let level = self.level(line);

        if line == Line::Scl && level && self.stretch > 0 {
            self.stretch -= 1;
            return false;
        }

        level
    }

    fn load(&mut self) -> u8 {
        let byte = self.registers[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        byte
    }

    fn put_bit(&mut self, byte: u8, index: u8) {
        self.target_sda_low = byte & (0x80 >> index) == 0;
    }

    fn step(&mut self) {
        let scl = self.level(Line::Scl);
        let sda = self.level(Line::Sda);

        if scl && self.prev_scl && sda != self.prev_sda {
            self.target_sda_low = false;
            if sda {
                self.stops += 1;
                self.phase = Phase::Idle;
            } else {
                self.starts += 1;
                self.phase = Phase::Receive {
                    stage: Stage::Address,
                    bits: 0,
                    byte: 0,
                };
            }
        } else if scl && !self.prev_scl {
            self.rising(sda);
        } else if !scl && self.prev_scl {
            self.falling();
        }

        self.prev_scl = self.level(Line::Scl);
        self.prev_sda = self.level(Line::Sda);
    }

    fn rising(&mut self, sda: bool) {
        match &mut self.phase {
            Phase::Receive { bits, byte, .. } if *bits < 8 => {
                *byte = (*byte << 1) | sda as u8;
                *bits += 1;
            }
            Phase::AwaitAck { acked } => *acked = !sda,
            _ => {}
        }
    }

    fn falling(&mut self) {
        match self.phase {
            Phase::Receive {
                stage,
                bits: 8,
                byte,
            } => {
                let ack = match stage {
                    Stage::Address => byte >> 1 == self.address,
                    Stage::Register => !self.nak_register,
                    Stage::Data => self.nak_data_after.map_or(true, |n| self.data_bytes < n),
                };

                if ack {
                    self.acks += 1;
                    if stage == Stage::Data {
                        self.registers[self.pointer as usize] = byte;
                        self.pointer = self.pointer.wrapping_add(1);
                        self.data_bytes += 1;
                    }
                }

                self.target_sda_low = ack;
                self.phase = Phase::Acking { stage, byte, ack };
            }
            Phase::Acking { stage, byte, ack } => {
                self.target_sda_low = false;

                self.phase = match (ack, stage) {
                    (false, _) => Phase::Idle,
                    (true, Stage::Address) if byte & 1 == 1 => {
                        let byte = self.load();
                        self.put_bit(byte, 0);
                        Phase::Transmit { sent: 0, byte }
                    }
                    (true, Stage::Address) => Phase::Receive {
                        stage: Stage::Register,
                        bits: 0,
                        byte: 0,
                    },
                    (true, Stage::Register) => {
                        self.pointer = byte;
                        self.data_bytes = 0;
                        Phase::Receive {
                            stage: Stage::Data,
                            bits: 0,
                            byte: 0,
                        }
                    }
                    (true, Stage::Data) => Phase::Receive {
                        stage: Stage::Data,
                        bits: 0,
                        byte: 0,
                    },
                };
            }
            Phase::Transmit { sent, byte } => {
                let sent = sent + 1;

                if sent == 8 {
                    self.target_sda_low = false;
                    self.phase = Phase::AwaitAck { acked: false };
                } else {
                    self.put_bit(byte, sent);
                    self.phase = Phase::Transmit { sent, byte };
                }
            }
            Phase::AwaitAck { acked: true } => {
                let byte = self.load();
                self.put_bit(byte, 0);
                self.phase = Phase::Transmit { sent: 0, byte };
            }
            Phase::AwaitAck { acked: false } => {
                self.master_naks += 1;
                self.target_sda_low = false;
                self.phase = Phase::Idle;
            }
            _ => {}
        }
    }
}

/// A register file answering at one address.
pub struct Target {
    wire: RefCell<Wire>,
}

impl Target {
    pub fn new(address: u8) -> Self {
        Self {
            wire: RefCell::new(Wire {
                address,
                registers: [0; 256],
                pointer: 0,
                master_scl_low: false,
                master_sda_low: false,
                target_sda_low: false,
                held_sda_low: false,
                hold_sda_at: None,
                stuck_until: 0,
                stretch: 0,
                nak_register: false,
                nak_data_after: None,
                phase: Phase::Idle,
                prev_scl: true,
                prev_sda: true,
                data_bytes: 0,
                clock_pulls: 0,
                acks: 0,
                master_naks: 0,
                starts: 0,
                stops: 0,
            }),
        }
    }

    /// Refuse data bytes once `count` have been accepted.
    pub fn nak_data_after(self, count: usize) -> Self {
        self.wire.borrow_mut().nak_data_after = Some(count);
        self
    }

    pub fn nak_register(self) -> Self {
        self.wire.borrow_mut().nak_register = true;
        self
    }

    /// Hold the clock low for the next `polls` samples.
    pub fn stretch(self, polls: u32) -> Self {
        self.wire.borrow_mut().stretch = polls;
        self
    }

    /// Hold both lines low until the master has pulled the clock `pulls` times.
    pub fn stuck_for(self, pulls: u32) -> Self {
        {
            let mut wire = self.wire.borrow_mut();
            wire.stuck_until = pulls;
            wire.prev_scl = false;
            wire.prev_sda = false;
        }
        self
    }

    pub fn hold_data_low(&self, held: bool) {
        let mut wire = self.wire.borrow_mut();
        wire.held_sda_low = held;
        wire.step();
    }

    /// Start holding the data line once the clock has been pulled `pulls` times.
    pub fn hold_data_low_after_pulls(&self, pulls: u32) {
        self.wire.borrow_mut().hold_sda_at = Some(pulls);
    }

    pub fn bus(&self, config: BusConfig) -> Bus<SimPin<'_>, SimPin<'_>, NoDelay> {
        Bus::new(
            SimPin {
                line: Line::Scl,
                wire: &self.wire,
            },
            SimPin {
                line: Line::Sda,
                wire: &self.wire,
            },
            NoDelay,
            config,
        )
    }

    pub fn registers(&self) -> [u8; 256] {
        self.wire.borrow().registers
    }

    /// Bytes the target acknowledged.
    pub fn acks(&self) -> usize {
        self.wire.borrow().acks
    }

    /// Read transfers the master ended with a NAK.
    pub fn master_naks(&self) -> usize {
        self.wire.borrow().master_naks
    }

    pub fn starts(&self) -> usize {
        self.wire.borrow().starts
    }

    pub fn stops(&self) -> usize {
        self.wire.borrow().stops
    }

    pub fn clock_pulls(&self) -> u32 {
        self.wire.borrow().clock_pulls
    }

    pub fn idle(&self) -> bool {
        let wire = self.wire.borrow();
        wire.phase == Phase::Idle && !wire.target_sda_low
    }
}

pub struct SimPin<'a> {
    line: Line,
    wire: &'a RefCell<Wire>,
}

impl ErrorType for SimPin<'_> {
    type Error = Infallible;
}

impl OutputPin for SimPin<'_> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.wire.borrow_mut().drive(self.line, true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.wire.borrow_mut().drive(self.line, false);
        Ok(())
    }
}

impl InputPin for SimPin<'_> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.wire.borrow_mut().sample(self.line))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.is_high()?)
    }
}
