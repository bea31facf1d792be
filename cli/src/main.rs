use std::fs::File;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use hound::{SampleFormat, WavSpec};
use log::info;
use sonicmodem_core::{decode_all, encode, Mode};

const SAMPLE_RATE: u32 = 16_000;

#[derive(Parser)]
#[command(name = "sonicmodem")]
#[command(about = "Acoustic modem: encode files to WAV tone bursts and decode them back")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Phone,
    Wideband,
}

impl From<ModeArg> for Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Phone => Mode::Phone,
            ModeArg::Wideband => Mode::Wideband,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a binary file to a WAV file of tone bursts.
    Encode {
        /// Input binary file.
        input: PathBuf,
        /// Output WAV file.
        output: PathBuf,
        /// Modulation mode.
        #[arg(short, long, value_enum, default_value_t = ModeArg::Wideband)]
        mode: ModeArg,
        /// Encrypt the payload with a password.
        #[arg(short, long)]
        password: Option<String>,
        /// Use rate-2/3 puncturing for higher throughput at lower robustness.
        #[arg(long)]
        puncture: bool,
    },
    /// Decode a WAV file back to the original binary file.
    Decode {
        /// Input WAV file.
        input: PathBuf,
        /// Output binary file.
        output: PathBuf,
        /// Decryption password, if the payload was encrypted.
        #[arg(short, long)]
        password: Option<String>,
        /// Must match whether the encoder used puncturing.
        #[arg(long)]
        puncture: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Encode { input, output, mode, password, puncture } => {
            encode_command(&input, &output, mode.into(), puncture, password.as_deref())
        }
        Commands::Decode { input, output, password, puncture } => {
            decode_command(&input, &output, puncture, password.as_deref())
        }
    }
}

fn encode_command(
    input: &PathBuf,
    output: &PathBuf,
    mode: Mode,
    puncture: bool,
    password: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input)?;
    info!("read {} bytes from {}", data.len(), input.display());

    let samples = encode(&data, mode, puncture, password)?;
    info!("encoded to {} audio samples", samples.len());

    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let file = File::create(output)?;
    let mut writer = hound::WavWriter::new(file, spec)?;
    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    println!("wrote {}", output.display());
    Ok(())
}

fn decode_command(
    input: &PathBuf,
    output: &PathBuf,
    puncture: bool,
    password: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(input)?;
    let spec = reader.spec();
    info!(
        "read WAV: {} Hz, {} channel(s), {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(|v| v as f32 / (1i32 << (spec.bits_per_sample - 1)) as f32))
            .collect::<Result<_, _>>()?,
        SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
    };

    let samples = if spec.channels > 1 {
        samples
            .chunks(spec.channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        samples
    };

    let data = decode_all(&samples, puncture, password)?;
    info!("decoded {} bytes", data.len());
    std::fs::write(output, &data)?;
    println!("wrote {}", output.display());
    Ok(())
}
