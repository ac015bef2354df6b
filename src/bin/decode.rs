use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::Parser;

use tek371::{ChannelScale, CurveBuffer, SweepConfiguration};

/// Decode a saved `CUR?` response into CSV.
#[derive(Parser, Debug)]
#[command(name = "tek371-decode", version)]
struct Args {
    /// File holding the raw curve block
    input: PathBuf,

    /// Number of points the sweep was configured for
    #[arg(long)]
    steps: u16,

    /// Volts per horizontal code
    #[arg(long, default_value_t = 1.0)]
    x_mult: f64,

    #[arg(long, default_value_t = 0)]
    x_off: i32,

    /// Amperes per vertical code
    #[arg(long, default_value_t = 1.0)]
    y_mult: f64,

    #[arg(long, default_value_t = 0)]
    y_off: i32,

    /// Write CSV here instead of standard output
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> tek371::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let buffer = CurveBuffer::new(std::fs::read(&args.input)?);
    log::debug!("read {} bytes from {}", buffer.len(), args.input.display());
    let config = SweepConfiguration {
        step_count: args.steps,
        horizontal: ChannelScale { multiplier: args.x_mult, offset: args.x_off },
        vertical: ChannelScale { multiplier: args.y_mult, offset: args.y_off },
        ..Default::default()
    };
    let points = tek371::decode(&buffer, &config)?;

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(std::fs::File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    tek371::write_csv(BufWriter::new(writer), &points)?;
    log::info!("decoded {} points", points.len());
    Ok(())
}
