/// What to do when another driver holds the data line low while the
/// engine expects it released.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArbitrationPolicy {
    /// Count it, log it and carry on.
    #[default]
    Ignore,
    /// Fail the current operation with [`Error::ArbitrationLost`](crate::Error::ArbitrationLost).
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    /// Target bus clock rate.
    pub frequency_hz: u32,
    /// Longest time a target may hold the clock low.
    pub stretch_timeout_us: u32,
    pub arbitration: ArbitrationPolicy,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BusConfig {
    pub const fn new() -> Self {
        Self {
            frequency_hz: 100_000,
            stretch_timeout_us: 10_000,
            arbitration: ArbitrationPolicy::Ignore,
        }
    }

    pub const fn frequency_hz(mut self, frequency_hz: u32) -> Self {
        self.frequency_hz = frequency_hz;
        self
    }

    pub const fn stretch_timeout_us(mut self, stretch_timeout_us: u32) -> Self {
        self.stretch_timeout_us = stretch_timeout_us;
        self
    }

    pub const fn arbitration(mut self, arbitration: ArbitrationPolicy) -> Self {
        self.arbitration = arbitration;
        self
    }

    /// Delay following each line transition.
    pub const fn half_period_ns(&self) -> u32 {
        let frequency_hz = if self.frequency_hz == 0 {
            1
        } else {
            self.frequency_hz
        };

        500_000_000 / frequency_hz
    }
}
