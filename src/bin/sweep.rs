use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use tek371::{ChannelScale, PeakPower, Polarity, StepSource, SweepConfiguration, SweepMode};
use tek371::sys::visa::VisaTransport;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Source {
    Voltage,
    Current,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Sign {
    Positive,
    Negative,
}

fn parse_peak_power(text: &str) -> Result<PeakPower, String> {
    text.parse::<u32>().ok()
        .and_then(PeakPower::from_watts)
        .ok_or_else(|| format!("{} is not one of 3, 30, 300, 3000", text))
}

/// Run one sweep on a Tek 371 and save the captured curve as CSV.
#[derive(Parser, Debug)]
#[command(name = "tek371-sweep", version)]
struct Args {
    /// VISA resource of the curve tracer
    #[arg(long, default_value = "GPIB0::23::INSTR")]
    resource: String,

    /// Number of curve points
    #[arg(long, default_value_t = 1024)]
    steps: u16,

    #[arg(long, value_enum, default_value_t = Source::Voltage)]
    source: Source,

    /// Step amplitude, in volts or amperes depending on the source
    #[arg(long, default_value_t = 0.2)]
    amplitude: f64,

    /// Number of steps output by the step generator, 0 to 5
    #[arg(long, default_value_t = 0)]
    step_number: u8,

    /// Step generator offset, in steps
    #[arg(long, default_value_t = 0.0)]
    step_offset: f64,

    /// Horizontal sensitivity, collector volts per division
    #[arg(long, default_value_t = 1.0)]
    horizontal: f64,

    /// Vertical sensitivity, collector amperes per division
    #[arg(long, default_value_t = 1.0)]
    vertical: f64,

    #[arg(long, value_enum, default_value_t = Sign::Positive)]
    polarity: Sign,

    /// Peak power range, in watts
    #[arg(long, value_parser = parse_peak_power, default_value = "300")]
    peak_power: PeakPower,

    /// Collector supply, in percent
    #[arg(long, default_value_t = 100.0)]
    collector_supply: f32,

    /// Use the slow sweep trigger
    #[arg(long)]
    slow: bool,

    /// Seconds to wait for the sweep to complete
    #[arg(long, default_value_t = 60)]
    timeout: u64,

    /// Volts per horizontal code; read from the waveform preamble after the sweep if omitted
    #[arg(long)]
    x_mult: Option<f64>,

    #[arg(long, default_value_t = 0)]
    x_off: i32,

    /// Amperes per vertical code; read from the waveform preamble after the sweep if omitted
    #[arg(long)]
    y_mult: Option<f64>,

    #[arg(long, default_value_t = 0)]
    y_off: i32,

    #[arg(short, long, default_value = "curve.csv")]
    output: PathBuf,
}

fn main() -> tek371::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let transport = VisaTransport::open(&args.resource)?;
    let mut device = tek371::Device::new(transport)
        .with_signal_timeout(Duration::from_secs(args.timeout));
    let identity = device.identify()?;
    println!("connected to {} (firmware {})", identity.model, identity.firmware);

    // without explicit factors the curve is captured as raw codes and scaled afterwards, once
    // the preamble reflects the graticule programmed for this sweep
    let horizontal = args.x_mult.map(|multiplier| ChannelScale { multiplier, offset: args.x_off });
    let vertical = args.y_mult.map(|multiplier| ChannelScale { multiplier, offset: args.y_off });
    let config = SweepConfiguration {
        source: match args.source {
            Source::Voltage => StepSource::Voltage,
            Source::Current => StepSource::Current,
        },
        step_amplitude: args.amplitude,
        step_count: args.steps,
        step_number: args.step_number,
        step_offset: args.step_offset,
        polarity: match args.polarity {
            Sign::Positive => Polarity::Positive,
            Sign::Negative => Polarity::Negative,
        },
        peak_power: args.peak_power,
        collector_supply: args.collector_supply,
        horizontal_sensitivity: args.horizontal,
        vertical_sensitivity: args.vertical,
        mode: if args.slow { SweepMode::SlowSweep } else { SweepMode::Sweep },
        horizontal: horizontal.unwrap_or_default(),
        vertical: vertical.unwrap_or_default(),
    };

    device.configure_sweep(&config)?;
    let mut points = device.run_sweep()?;
    if horizontal.is_none() || vertical.is_none() {
        let preamble = device.read_preamble()?;
        log::info!("scale factors from preamble: {:?}", preamble);
        for point in points.iter_mut() {
            if horizontal.is_none() {
                point.voltage = preamble.horizontal_scale().apply(point.voltage as u16);
            }
            if vertical.is_none() {
                point.current = preamble.vertical_scale().apply(point.current as u16);
            }
        }
    }
    device.disable_service_requests()?;

    tek371::write_csv(BufWriter::new(File::create(&args.output)?), &points)?;
    println!("saved {} points to {}", points.len(), args.output.display());
    Ok(())
}
