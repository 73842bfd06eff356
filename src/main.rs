use std::process::exit;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use oscillo_rs::{ChannelDescriptor, ElementType, ScopeLink, BAUD_RATE};

#[derive(Parser, Debug)]
#[command(name = "oscillo-demo", about = "Connect to a device and stream channel samples")]
struct Args {
    /// Serial port path (e.g., /dev/ttyUSB0)
    port: String,
    /// Channels to capture, as name:address:type (e.g., current:0x20000010:i16)
    #[arg(required = true)]
    channels: Vec<String>,
    /// Baud rate
    #[arg(long, default_value_t = BAUD_RATE)]
    baud: u32,
    /// Device sampling period in milliseconds
    #[arg(long, default_value_t = 10)]
    cycle: u32,
    /// Number of sample vectors to print before stopping
    #[arg(long, default_value_t = 100)]
    count: usize,
}

fn main() {
    oscillo_rs::logging::init_logging();
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let channels = args
        .channels
        .iter()
        .map(|spec| parse_channel(spec))
        .collect::<Result<Vec<_>>>()?;

    println!("Opening {} at {} baud...", args.port, args.baud);
    let mut link = ScopeLink::connect_serial(&args.port, args.baud)?;

    println!(
        "Starting capture: {} channels, cycle {}ms",
        channels.len(),
        args.cycle
    );
    link.start(channels, args.cycle)?;

    let mut printed = 0usize;
    while printed < args.count {
        match link.pump() {
            Ok(Some(sample)) => {
                println!("[{printed:4}] {sample:?}");
                printed += 1;
            }
            Ok(None) => {}
            Err(e) => {
                eprintln!("Capture halted: {e}");
                break;
            }
        }
    }

    println!("Stopping...");
    link.stop()?;

    for (i, buffer) in link.buffers().iter().enumerate() {
        if let Some(limits) = buffer.axis_limits() {
            println!(
                "channel {i}: {} samples, value range [{}, {}]",
                buffer.len(),
                limits.value_min,
                limits.value_max
            );
        }
    }
    println!("Done.");
    Ok(())
}

/// Parse a `name:address:type` channel spec; addresses accept 0x prefixes.
fn parse_channel(spec: &str) -> Result<ChannelDescriptor> {
    let parts: Vec<&str> = spec.split(':').collect();
    let &[name, address, ty] = parts.as_slice() else {
        return Err(anyhow!("channel spec must be name:address:type, got {spec:?}"));
    };
    let address = if let Some(hex) = address.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else {
        address.parse()
    }
    .with_context(|| format!("invalid address in {spec:?}"))?;
    let element_type = match ty.to_ascii_lowercase().as_str() {
        "bool" => ElementType::Bool,
        "char" => ElementType::Char,
        "i8" => ElementType::I8,
        "u8" => ElementType::U8,
        "i16" => ElementType::I16,
        "u16" => ElementType::U16,
        "i32" => ElementType::I32,
        "u32" => ElementType::U32,
        "i64" => ElementType::I64,
        "u64" => ElementType::U64,
        "f32" => ElementType::F32,
        "f64" => ElementType::F64,
        other => return Err(anyhow!("unknown element type {other:?} in {spec:?}")),
    };
    Ok(ChannelDescriptor::new(name, address, element_type))
}
