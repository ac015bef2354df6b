//! Encoding of sweep configurations into the 371 command language, and decoding of the short
//! text responses that do not carry status.
//!
//! Commands are ASCII lines of the form `HEADER[ ARGS]`. Numbers in scientific notation use
//! the NR3 form `1.00E+00`.

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};
use crate::config::{ChannelScale, PeakPower, Polarity, StepSource, SweepConfiguration, SweepMode};

pub const MAX_POINTS: u16 = 1024;
pub const MAX_CODE: u16 = 1023;

const VOLTAGE_STEPS: [f64; 5] = [0.2, 0.5, 1.0, 2.0, 5.0];
const CURRENT_RANGE_HIGH_POWER: (f64, f64) = (1.0e-3, 2.0);
const CURRENT_RANGE_LOW_POWER: (f64, f64) = (1.0e-6, 2.0e-3);
const MAX_STEP_NUMBER: u8 = 5;
const MAX_STEP_OFFSET: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Initialize,
    PeakPower(PeakPower),
    CollectorPolarity(Polarity),
    CollectorSupply(f32),
    StepVoltage(f64),
    StepCurrent(f64),
    StepNumber(u8),
    StepOffset(f64),
    StepOutput(bool),
    Horizontal(f64),
    Vertical(f64),
    StoreDisplay,
    WaveformLength(u16),
    OperationComplete(bool),
    ServiceRequest(bool),
    Measure(SweepMode),
}

fn on_off(value: bool) -> &'static str {
    if value { "ON" } else { "OFF" }
}

fn nr3(value: f64) -> String {
    let formatted = format!("{:.2E}", value);
    match formatted.split_once('E') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exponent) => format!("{}E{:+03}", mantissa, exponent),
            Err(_) => formatted,
        },
        None => formatted,
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Initialize =>
                write!(f, "INI"),
            Self::PeakPower(power) =>
                write!(f, "PKP {}", power.watts()),
            Self::CollectorPolarity(Polarity::Positive) =>
                write!(f, "CSP POS"),
            Self::CollectorPolarity(Polarity::Negative) =>
                write!(f, "CSP NEG"),
            Self::CollectorSupply(percent) =>
                write!(f, "VCS {:.1}", percent),
            Self::StepVoltage(volts) =>
                write!(f, "STP VOL:{}", nr3(volts)),
            Self::StepCurrent(amperes) =>
                write!(f, "STP CUR:{}", nr3(amperes)),
            Self::StepNumber(steps) =>
                write!(f, "STP NUM:{}", steps),
            Self::StepOffset(multiple) =>
                write!(f, "STP OFF:{:.2}", multiple),
            Self::StepOutput(enabled) =>
                write!(f, "STP OUT:{}", on_off(enabled)),
            Self::Horizontal(volts_per_div) =>
                write!(f, "HOR COL:{}", nr3(volts_per_div)),
            Self::Vertical(amperes_per_div) =>
                write!(f, "VER COL:{}", nr3(amperes_per_div)),
            Self::StoreDisplay =>
                write!(f, "DIS STO"),
            Self::WaveformLength(points) =>
                write!(f, "WFM NR.PT:{}", points),
            Self::OperationComplete(enabled) =>
                write!(f, "OPC {}", on_off(enabled)),
            Self::ServiceRequest(enabled) =>
                write!(f, "RQS {}", on_off(enabled)),
            Self::Measure(SweepMode::Sweep) =>
                write!(f, "MEA SWE"),
            Self::Measure(SweepMode::SlowSweep) =>
                write!(f, "MEA SSW"),
        }
    }
}

fn parse_on_off(text: &str) -> Option<bool> {
    match text {
        "ON" => Some(true),
        "OFF" => Some(false),
        _ => None,
    }
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let (header, args) = line.split_once(' ').unwrap_or((line, ""));
        let args = args.trim();
        let command = match (header, args) {
            ("INI", "") =>
                Some(Self::Initialize),
            ("PKP", watts) =>
                watts.parse().ok().and_then(PeakPower::from_watts).map(Self::PeakPower),
            ("CSP", "POS" | "NPN") =>
                Some(Self::CollectorPolarity(Polarity::Positive)),
            ("CSP", "NEG" | "PNP") =>
                Some(Self::CollectorPolarity(Polarity::Negative)),
            ("VCS", percent) =>
                percent.parse().ok().map(Self::CollectorSupply),
            ("STP", args) => match args.split_once(':') {
                Some(("VOL", volts)) => volts.parse().ok().map(Self::StepVoltage),
                Some(("CUR", amperes)) => amperes.parse().ok().map(Self::StepCurrent),
                Some(("NUM", steps)) => steps.parse().ok().map(Self::StepNumber),
                Some(("OFF", multiple)) => multiple.parse().ok().map(Self::StepOffset),
                Some(("OUT", mode)) => parse_on_off(mode).map(Self::StepOutput),
                _ => None,
            },
            ("HOR", args) => match args.split_once(':') {
                Some(("COL", volts)) => volts.parse().ok().map(Self::Horizontal),
                _ => None,
            },
            ("VER", args) => match args.split_once(':') {
                Some(("COL", amperes)) => amperes.parse().ok().map(Self::Vertical),
                _ => None,
            },
            ("DIS", "STO") =>
                Some(Self::StoreDisplay),
            ("WFM", args) => match args.split_once(':') {
                Some(("NR.PT", points)) => points.parse().ok().map(Self::WaveformLength),
                _ => None,
            },
            ("OPC", mode) =>
                parse_on_off(mode).map(Self::OperationComplete),
            ("RQS", mode) =>
                parse_on_off(mode).map(Self::ServiceRequest),
            ("MEA", "SWE") =>
                Some(Self::Measure(SweepMode::Sweep)),
            ("MEA", "SSW") =>
                Some(Self::Measure(SweepMode::SlowSweep)),
            _ => None,
        };
        command.ok_or_else(|| Error::Protocol(format!("unrecognized command {:?}", line)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Identify,
    Event,
    Curve,
    Preamble,
    SelfTest,
}

impl Query {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Identify => "ID?",
            Self::Event    => "EVE?",
            Self::Curve    => "CUR?",
            Self::Preamble => "WFM?",
            Self::SelfTest => "TES?",
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn invalid(reason: String) -> Error {
    Error::InvalidConfiguration(reason)
}

fn validate_scale(name: &str, scale: &ChannelScale) -> Result<()> {
    if !scale.multiplier.is_finite() || scale.multiplier == 0.0 {
        return Err(invalid(format!("{} multiplier {} must be finite and non-zero",
                                   name, scale.multiplier)))
    }
    if !(0..=MAX_CODE as i32).contains(&scale.offset) {
        return Err(invalid(format!("{} offset {} outside 0..={}", name, scale.offset, MAX_CODE)))
    }
    Ok(())
}

/// Whether `value` is a positive 1-2-5 sequence value such as 0.2, 5 or 50.
fn is_one_two_five(value: f64) -> bool {
    if !(value.is_finite() && value > 0.0) {
        return false
    }
    let mantissa = value / 10f64.powf(value.log10().floor());
    [1.0, 2.0, 5.0, 10.0].iter().any(|&step| (mantissa - step).abs() <= 1e-6)
}

/// Collector volts per division the horizontal amplifier offers at a peak power range.
fn horizontal_range(peak_power: PeakPower) -> (f64, f64) {
    if peak_power.is_high_power() { (1.0e-1, 5.0) } else { (5.0e1, 5.0e2) }
}

/// Collector amperes per division the vertical amplifier offers at a peak power range.
fn vertical_range(peak_power: PeakPower) -> (f64, f64) {
    match peak_power {
        PeakPower::W3000 => (1.0, 5.0e1),
        PeakPower::W300  => (5.0e-1, 5.0),
        PeakPower::W30   => (1.0e-4, 5.0e-3),
        PeakPower::W3    => (1.0e-5, 5.0e-4),
    }
}

fn validate_sensitivity(name: &str, unit: &str, value: f64, (min, max): (f64, f64),
                        peak_power: PeakPower) -> Result<()> {
    if !is_one_two_five(value) || value < min * (1.0 - 1e-6) || value > max * (1.0 + 1e-6) {
        return Err(invalid(format!(
            "{} sensitivity {} {}/div is not a 1-2-5 step within {}..={} at {} W peak power",
            name, value, unit, min, max, peak_power.watts())))
    }
    Ok(())
}

fn validate(config: &SweepConfiguration) -> Result<()> {
    if !(1..=MAX_POINTS).contains(&config.step_count) {
        return Err(invalid(format!("step count {} outside 1..={}", config.step_count, MAX_POINTS)))
    }
    let amplitude = config.step_amplitude;
    match config.source {
        StepSource::Voltage => {
            if !VOLTAGE_STEPS.iter().any(|&step| (amplitude - step).abs() <= step * 1e-6) {
                return Err(invalid(format!(
                    "step voltage {} V is not one of {:?} V", amplitude, VOLTAGE_STEPS)))
            }
        }
        StepSource::Current => {
            let (min, max) = if config.peak_power.is_high_power() {
                CURRENT_RANGE_HIGH_POWER
            } else {
                CURRENT_RANGE_LOW_POWER
            };
            if !(amplitude >= min && amplitude <= max) {
                return Err(invalid(format!(
                    "step current {} A outside {}..={} A at {} W peak power",
                    amplitude, min, max, config.peak_power.watts())))
            }
        }
    }
    if config.step_number > MAX_STEP_NUMBER {
        return Err(invalid(format!("step number {} outside 0..={}",
                                   config.step_number, MAX_STEP_NUMBER)))
    }
    if !(0.0..=MAX_STEP_OFFSET).contains(&config.step_offset) {
        return Err(invalid(format!("step offset {} outside 0..={} steps",
                                   config.step_offset, MAX_STEP_OFFSET)))
    }
    validate_sensitivity("horizontal", "V", config.horizontal_sensitivity,
                         horizontal_range(config.peak_power), config.peak_power)?;
    validate_sensitivity("vertical", "A", config.vertical_sensitivity,
                         vertical_range(config.peak_power), config.peak_power)?;
    if !(0.0..=100.0).contains(&config.collector_supply) {
        return Err(invalid(format!("collector supply {}% outside 0..=100%",
                                   config.collector_supply)))
    }
    validate_scale("horizontal", &config.horizontal)?;
    validate_scale("vertical", &config.vertical)?;
    Ok(())
}

/// The commands that program `config` into the instrument, in the order they must be sent.
///
/// The trigger command is not included; see [`Command::Measure`].
pub(crate) fn sweep_commands(config: &SweepConfiguration) -> Result<Vec<Command>> {
    validate(config)?;
    let step = match config.source {
        StepSource::Voltage => Command::StepVoltage(config.step_amplitude),
        StepSource::Current => Command::StepCurrent(config.step_amplitude),
    };
    Ok(vec![
        Command::PeakPower(config.peak_power),
        Command::CollectorPolarity(config.polarity),
        Command::StepNumber(config.step_number),
        step,
        Command::StepOffset(config.step_offset),
        Command::StepOutput(true),
        Command::Horizontal(config.horizontal_sensitivity),
        Command::Vertical(config.vertical_sensitivity),
        Command::CollectorSupply(config.collector_supply),
        Command::StoreDisplay,
        Command::WaveformLength(config.step_count),
        Command::OperationComplete(true),
        Command::ServiceRequest(true),
    ])
}

/// Encode `config` as command lines. Deterministic; fails before any I/O if the configuration
/// is outside the instrument's documented ranges.
pub fn encode(config: &SweepConfiguration) -> Result<Vec<String>> {
    Ok(sweep_commands(config)?.iter().map(Command::to_string).collect())
}

fn strip_header<'a>(response: &'a str, header: &str) -> &'a str {
    let response = response.trim();
    match response.strip_prefix(header) {
        Some(rest) if rest.starts_with(' ') => rest.trim_start(),
        _ => response,
    }
}

/// Split on commas that are not inside a double-quoted string.
fn split_fields(text: &str) -> Vec<&str> {
    let mut fields = Vec::new();
    let mut quoted = false;
    let mut start = 0;
    for (index, ch) in text.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            ',' if !quoted => {
                fields.push(&text[start..index]);
                start = index + 1;
            }
            _ => ()
        }
    }
    fields.push(&text[start..]);
    fields
}

/// Waveform preamble, as returned by `WFM?`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preamble {
    pub points: u16,
    pub x_mult: f64,
    pub x_off: i32,
    pub y_mult: f64,
    pub y_off: i32,
}

impl Preamble {
    pub fn horizontal_scale(&self) -> ChannelScale {
        ChannelScale { multiplier: self.x_mult, offset: self.x_off }
    }

    pub fn vertical_scale(&self) -> ChannelScale {
        ChannelScale { multiplier: self.y_mult, offset: self.y_off }
    }
}

fn preamble_field<T: FromStr>(fields: &[&str], key: &str) -> Result<T> {
    let value = fields.iter()
        .filter_map(|field| field.split_once(':'))
        .find(|(name, _)| name.trim() == key)
        .map(|(_, value)| value.trim())
        .ok_or_else(|| Error::Protocol(format!("preamble lacks {}", key)))?;
    value.parse().map_err(|_| Error::Protocol(format!("preamble {} is {:?}", key, value)))
}

pub fn decode_preamble(response: &str) -> Result<Preamble> {
    let fields = split_fields(strip_header(response, "WFMPRE"));
    Ok(Preamble {
        points: preamble_field(&fields, "NR.PT")?,
        x_mult: preamble_field(&fields, "XMULT")?,
        x_off:  preamble_field(&fields, "XOFF")?,
        y_mult: preamble_field(&fields, "YMULT")?,
        y_off:  preamble_field(&fields, "YOFF")?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub model: String,
    pub firmware: String,
}

pub fn decode_identity(response: &str) -> Result<Identity> {
    let body = response.trim().strip_prefix("ID ")
        .ok_or_else(|| Error::Protocol(format!("unexpected identification {:?}", response)))?;
    match body.split_once(',') {
        Some((model, firmware)) if !model.trim().is_empty() =>
            Ok(Identity { model: model.trim().to_owned(), firmware: firmware.trim().to_owned() }),
        _ => Err(Error::Protocol(format!("unexpected identification {:?}", response))),
    }
}

/// Result of the ROM and RAM self test. Zero codes mean no error was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTest {
    pub rom: u16,
    pub ram: u16,
}

impl SelfTest {
    pub fn passed(&self) -> bool {
        self.rom == 0 && self.ram == 0
    }
}

pub fn decode_self_test(response: &str) -> Result<SelfTest> {
    let body = strip_header(response, "TEST");
    let mut rom = None;
    let mut ram = None;
    for field in body.split(',') {
        let (name, code) = field.split_once(':')
            .ok_or_else(|| Error::Protocol(format!("unexpected self test {:?}", response)))?;
        let code = u16::from_str_radix(code.trim(), 16)
            .map_err(|_| Error::Protocol(format!("unexpected self test {:?}", response)))?;
        match name.trim() {
            "ROM" => rom = Some(code),
            "RAM" => ram = Some(code),
            _ => return Err(Error::Protocol(format!("unexpected self test {:?}", response))),
        }
    }
    match (rom, ram) {
        (Some(rom), Some(ram)) => Ok(SelfTest { rom, ram }),
        _ => Err(Error::Protocol(format!("unexpected self test {:?}", response))),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ErrorKind;

    fn config(step_count: u16, step_amplitude: f64) -> SweepConfiguration {
        SweepConfiguration { step_count, step_amplitude, ..Default::default() }
    }

    #[test]
    fn test_nr3() {
        assert_eq!(nr3(1.0), "1.00E+00");
        assert_eq!(nr3(0.2), "2.00E-01");
        assert_eq!(nr3(1.5e-6), "1.50E-06");
        assert_eq!(nr3(2000.0), "2.00E+03");
    }

    #[test]
    fn test_encode_order() {
        let commands = encode(&config(10, 1.0)).unwrap();
        assert_eq!(commands, [
            "PKP 300",
            "CSP POS",
            "STP NUM:0",
            "STP VOL:1.00E+00",
            "STP OFF:0.00",
            "STP OUT:ON",
            "HOR COL:1.00E+00",
            "VER COL:1.00E+00",
            "VCS 100.0",
            "DIS STO",
            "WFM NR.PT:10",
            "OPC ON",
            "RQS ON",
        ]);
    }

    #[test]
    fn test_encode_deterministic() {
        let config = SweepConfiguration {
            source: StepSource::Current,
            step_amplitude: 5.0e-3,
            polarity: Polarity::Negative,
            collector_supply: 42.5,
            ..Default::default()
        };
        assert_eq!(encode(&config).unwrap(), encode(&config).unwrap());
    }

    #[test]
    fn test_encode_round_trip() {
        let configs = [
            config(1, 0.2),
            config(10, 1.0),
            config(1024, 5.0),
            SweepConfiguration {
                source: StepSource::Current,
                step_amplitude: 2.0e-3,
                peak_power: PeakPower::W30,
                step_count: 333,
                step_number: 5,
                step_offset: 2.5,
                horizontal_sensitivity: 100.0,
                vertical_sensitivity: 2.0e-4,
                ..Default::default()
            },
            SweepConfiguration {
                source: StepSource::Current,
                step_amplitude: 1.0,
                peak_power: PeakPower::W3000,
                horizontal_sensitivity: 0.2,
                vertical_sensitivity: 20.0,
                ..Default::default()
            },
        ];
        for config in configs {
            let mut amplitude = None;
            let mut step_count = None;
            let mut step_number = None;
            let mut step_offset = None;
            let mut horizontal = None;
            let mut vertical = None;
            for line in encode(&config).unwrap() {
                match line.parse::<Command>().unwrap() {
                    Command::StepVoltage(volts) => amplitude = Some(volts),
                    Command::StepCurrent(amperes) => amplitude = Some(amperes),
                    Command::WaveformLength(points) => step_count = Some(points),
                    Command::StepNumber(steps) => step_number = Some(steps),
                    Command::StepOffset(multiple) => step_offset = Some(multiple),
                    Command::Horizontal(volts) => horizontal = Some(volts),
                    Command::Vertical(amperes) => vertical = Some(amperes),
                    _ => ()
                }
            }
            let close = |decoded: Option<f64>, expected: f64| {
                let decoded = decoded.unwrap();
                assert!((decoded - expected).abs() <= expected.abs() * 1e-9,
                        "{} != {}", decoded, expected);
            };
            close(amplitude, config.step_amplitude);
            close(step_offset, config.step_offset);
            close(horizontal, config.horizontal_sensitivity);
            close(vertical, config.vertical_sensitivity);
            assert_eq!(step_count, Some(config.step_count));
            assert_eq!(step_number, Some(config.step_number));
        }
    }

    #[test]
    fn test_parse_command() {
        assert_eq!("MEA SWE".parse::<Command>().unwrap(), Command::Measure(SweepMode::Sweep));
        assert_eq!("CSP PNP".parse::<Command>().unwrap(),
                   Command::CollectorPolarity(Polarity::Negative));
        assert_eq!("PKP 3000".parse::<Command>().unwrap(), Command::PeakPower(PeakPower::W3000));
        assert_eq!("INI\n".parse::<Command>().unwrap(), Command::Initialize);
        assert_eq!("STP OFF:1.50".parse::<Command>().unwrap(), Command::StepOffset(1.5));
        assert_eq!("HOR COL:2.00E-01".parse::<Command>().unwrap(), Command::Horizontal(0.2));
        assert_eq!("VER COL:5.00E+00".parse::<Command>().unwrap(), Command::Vertical(5.0));
        assert_eq!("HOR STP:1.00E+00".parse::<Command>().unwrap_err().kind(), ErrorKind::Protocol);
        assert_eq!("PKP 301".parse::<Command>().unwrap_err().kind(), ErrorKind::Protocol);
        assert_eq!("CURS OFF".parse::<Command>().unwrap_err().kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_invalid_step_count() {
        for step_count in [0, MAX_POINTS + 1] {
            let error = encode(&config(step_count, 1.0)).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidConfiguration);
        }
    }

    #[test]
    fn test_invalid_amplitude() {
        for volts in [0.1, 0.3, 10.0, -1.0, f64::NAN] {
            let error = encode(&config(10, volts)).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidConfiguration, "{}", volts);
        }
        let low_power = SweepConfiguration {
            source: StepSource::Current,
            step_amplitude: 1.0e-2,
            peak_power: PeakPower::W3,
            ..Default::default()
        };
        assert_eq!(encode(&low_power).unwrap_err().kind(), ErrorKind::InvalidConfiguration);
        let high_power = SweepConfiguration { peak_power: PeakPower::W300, ..low_power };
        assert!(encode(&high_power).is_ok());
    }

    #[test]
    fn test_invalid_step_generator() {
        for config in [
            SweepConfiguration { step_number: 6, ..Default::default() },
            SweepConfiguration { step_offset: -0.5, ..Default::default() },
            SweepConfiguration { step_offset: 5.5, ..Default::default() },
            SweepConfiguration { step_offset: f64::NAN, ..Default::default() },
        ] {
            let error = encode(&config).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidConfiguration, "{:?}", config);
        }
        let config = SweepConfiguration { step_number: 5, step_offset: 5.0, ..Default::default() };
        assert!(encode(&config).is_ok());
    }

    #[test]
    fn test_invalid_sensitivity() {
        for (peak_power, horizontal, vertical) in [
            (PeakPower::W300, 0.05, 1.0),
            (PeakPower::W300, 10.0, 1.0),
            (PeakPower::W300, 0.3, 1.0),
            (PeakPower::W300, 1.0, 0.2),
            (PeakPower::W300, 1.0, 10.0),
            (PeakPower::W3000, 1.0, 0.5),
            (PeakPower::W30, 1.0, 1.0e-3),
            (PeakPower::W30, 100.0, 1.0e-2),
            (PeakPower::W3, 100.0, 1.0e-3),
            (PeakPower::W300, f64::INFINITY, 1.0),
            (PeakPower::W300, 1.0, -1.0),
        ] {
            let config = SweepConfiguration {
                peak_power,
                horizontal_sensitivity: horizontal,
                vertical_sensitivity: vertical,
                ..Default::default()
            };
            let error = encode(&config).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidConfiguration,
                       "{:?} {} {}", peak_power, horizontal, vertical);
        }
        for (peak_power, horizontal, vertical) in [
            (PeakPower::W300, 0.2, 5.0),
            (PeakPower::W300, 5.0, 0.5),
            (PeakPower::W3000, 0.1, 50.0),
            (PeakPower::W30, 500.0, 1.0e-4),
            (PeakPower::W3, 50.0, 5.0e-4),
        ] {
            let config = SweepConfiguration {
                peak_power,
                horizontal_sensitivity: horizontal,
                vertical_sensitivity: vertical,
                ..Default::default()
            };
            assert!(encode(&config).is_ok(), "{:?} {} {}", peak_power, horizontal, vertical);
        }
    }

    #[test]
    fn test_invalid_scale() {
        let config = SweepConfiguration {
            vertical: ChannelScale { multiplier: 0.0, offset: 0 },
            ..Default::default()
        };
        assert_eq!(encode(&config).unwrap_err().kind(), ErrorKind::InvalidConfiguration);
        let config = SweepConfiguration {
            horizontal: ChannelScale { multiplier: 1.0, offset: 1024 },
            ..Default::default()
        };
        assert_eq!(encode(&config).unwrap_err().kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn test_decode_preamble() {
        let preamble = decode_preamble(concat!(
            "WFMPRE WFID:\"INDEX 0/VERT 5.00E+0/HORIZ 2.00E-1/STEP 2.00E-1/OFFSET 0.00E+0",
            "/BGM 0/VCS 100.0/TEXT a,b/HSNS VCE\",ENCDG:BIN,NR.PT:10,PT.FMT:XY,",
            "XMULT:2.00E-3,XZERO:0,XOFF:12,XUNIT:V,YMULT:5.00E-2,YZERO:0,YOFF:3,YUNIT:A,",
            "BYT/NR:2,BN.FMT:RP,BIT/NR:10,CRVCHK:CHKSM0,LN.FMT:VECTOR\n")).unwrap();
        assert_eq!(preamble, Preamble { points: 10, x_mult: 2.0e-3, x_off: 12,
                                        y_mult: 5.0e-2, y_off: 3 });
        assert_eq!(preamble.horizontal_scale(), ChannelScale { multiplier: 2.0e-3, offset: 12 });
        assert_eq!(preamble.vertical_scale(), ChannelScale { multiplier: 5.0e-2, offset: 3 });
    }

    #[test]
    fn test_decode_preamble_missing_field() {
        let error = decode_preamble("WFMPRE ENCDG:BIN,NR.PT:10,XMULT:1.0").unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_decode_identity() {
        assert_eq!(decode_identity("ID SONY_TEK/371,V81.1F 1.08\n").unwrap(), Identity {
            model: "SONY_TEK/371".to_owned(),
            firmware: "V81.1F 1.08".to_owned(),
        });
        assert_eq!(decode_identity("EVENT 000").unwrap_err().kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_decode_self_test() {
        let result = decode_self_test("TEST ROM:0000,RAM:0000").unwrap();
        assert!(result.passed());
        let result = decode_self_test("TEST ROM:0000,RAM:00A1").unwrap();
        assert_eq!(result, SelfTest { rom: 0, ram: 0xa1 });
        assert!(!result.passed());
        assert_eq!(decode_self_test("TEST ROM:0000").unwrap_err().kind(), ErrorKind::Protocol);
    }
}
