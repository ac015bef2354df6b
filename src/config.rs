//! High-level configuration of a sweep in terms of physical quantities.

/// Step generator output driven into the device under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepSource {
    #[default]
    Voltage,
    Current,
}

/// Collector supply polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    #[default]
    Positive,
    Negative,
}

/// Collector supply peak power limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeakPower {
    W3,
    W30,
    #[default]
    W300,
    W3000,
}

impl PeakPower {
    pub fn watts(self) -> u32 {
        match self {
            Self::W3    => 3,
            Self::W30   => 30,
            Self::W300  => 300,
            Self::W3000 => 3000,
        }
    }

    pub fn from_watts(watts: u32) -> Option<Self> {
        match watts {
            3    => Some(Self::W3),
            30   => Some(Self::W30),
            300  => Some(Self::W300),
            3000 => Some(Self::W3000),
            _    => None,
        }
    }

    /// The high power ranges share one step current range, the low power ranges another.
    pub(crate) fn is_high_power(self) -> bool {
        matches!(self, Self::W300 | Self::W3000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SweepMode {
    #[default]
    Sweep,
    SlowSweep,
}

/// Conversion of a raw 10-bit curve coordinate into volts or amperes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelScale {
    /// Physical units per code.
    pub multiplier: f64,
    /// Code corresponding to zero.
    pub offset: i32,
}

impl Default for ChannelScale {
    fn default() -> Self {
        Self { multiplier: 1.0, offset: 0 }
    }
}

impl ChannelScale {
    pub fn apply(&self, code: u16) -> f64 {
        (code as i32 - self.offset) as f64 * self.multiplier
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepConfiguration {
    pub source: StepSource,
    /// Volts per step for [`StepSource::Voltage`], amperes per step for [`StepSource::Current`].
    pub step_amplitude: f64,
    /// Number of curve points captured by the sweep.
    pub step_count: u16,
    /// Number of steps the step generator outputs per sweep, 0..=5. Zero traces a single curve.
    pub step_number: u8,
    /// Step generator offset, in multiples of the step amplitude, 0.0..=5.0.
    pub step_offset: f64,
    pub polarity: Polarity,
    pub peak_power: PeakPower,
    /// Collector supply level in percent of the peak power range.
    pub collector_supply: f32,
    /// Horizontal graticule, collector volts per division.
    pub horizontal_sensitivity: f64,
    /// Vertical graticule, collector amperes per division.
    pub vertical_sensitivity: f64,
    pub mode: SweepMode,
    pub horizontal: ChannelScale,
    pub vertical: ChannelScale,
}

impl Default for SweepConfiguration {
    fn default() -> Self {
        Self {
            source: StepSource::Voltage,
            step_amplitude: 0.2,
            step_count: 1024,
            step_number: 0,
            step_offset: 0.0,
            polarity: Polarity::Positive,
            peak_power: PeakPower::W300,
            collector_supply: 100.0,
            horizontal_sensitivity: 1.0,
            vertical_sensitivity: 1.0,
            mode: SweepMode::Sweep,
            horizontal: ChannelScale::default(),
            vertical: ChannelScale::default(),
        }
    }
}
