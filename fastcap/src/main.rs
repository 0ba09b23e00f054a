//! Fastcap command line entry point.

use capfile::reader::ReaderSet;
use clap::{Args, Parser, Subcommand};
use fastcap::config::CaptureConfig;
use fastcap::logging::{self, LogLevel};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "fastcap",
    version,
    about = "High-throughput packet capture with deferred PCAPNG assembly"
)]
struct Cli {
    /// Logging level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// File to write logs to (stdout if not specified)
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Capture traffic from a network interface into capture files
    Capture(CaptureArgs),
    /// Post-process capture files into a single PCAPNG file
    Build(BuildArgs),
}

#[derive(Args)]
struct CaptureArgs {
    /// Interface from which to capture network traffic
    interface: String,

    /// Output filename
    output: String,

    /// Number of parallel files to write
    #[arg(short = 'c', long = "file-count", default_value_t = 1,
          value_parser = clap::value_parser!(u32).range(1..))]
    file_count: u32,

    /// Seconds between statistics records (default: once at end of capture)
    #[arg(short = 't', long = "stats-interval", value_parser = parse_stats_interval)]
    stats_interval: Option<f32>,

    /// Packet snapshot length in bytes
    #[arg(short = 's', long, default_value_t = 65536,
          value_parser = clap::value_parser!(i32).range(1..))]
    snaplen: i32,

    /// Buffer size in MiB for capturing packets
    #[arg(short = 'b', long = "bufsize", default_value_t = 256,
          value_parser = clap::value_parser!(u32).range(1..=2048))]
    bufsize: u32,

    /// Record timestamps with nanosecond precision
    #[arg(short = 'n', long)]
    nano: bool,

    /// Enable promiscuous mode on the interface
    #[arg(short = 'p', long = "promisc")]
    promisc: bool,

    /// Enable monitor mode on the interface
    #[arg(short = 'm', long = "rfmon")]
    rfmon: bool,

    /// Write packets as they arrive instead of batching
    #[arg(short = 'i', long)]
    immediate: bool,

    /// Capture filter expression
    #[arg(short = 'f', long, default_value = "")]
    filter: String,
}

#[derive(Args)]
struct BuildArgs {
    /// PCAPNG file to write
    pcapng: PathBuf,

    /// Capture files to process
    #[arg(required = true)]
    captures: Vec<PathBuf>,
}

fn parse_stats_interval(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if !value.is_finite() || value < 0.0 {
        return Err("statistics interval must be non-negative".to_string());
    }
    Ok(value)
}

fn main() {
    let cli = Cli::parse();
    let _log_guard = logging::init(cli.log_level, cli.log_file.as_deref());

    let result = match cli.command {
        Command::Capture(args) => run_capture(args),
        Command::Build(args) => run_build(args),
    };
    if let Err(e) = result {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn run_capture(args: CaptureArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = CaptureConfig {
        iface: args.interface,
        output: args.output,
        filter: args.filter,
        buffer_bytes: (args.bufsize as usize) << 20,
        snaplen: args.snaplen,
        file_count: args.file_count as usize,
        stats_interval: args.stats_interval,
        nano: args.nano,
        promisc: args.promisc,
        rfmon: args.rfmon,
        immediate: args.immediate,
    };

    // The session runs on its own thread; this one only waits, keeping the
    // signal handler's view of the world simple.
    let worker = std::thread::Builder::new()
        .name("capture".to_string())
        .spawn(move || fastcap::capture::run(config))?;
    worker
        .join()
        .map_err(|_| "capture thread panicked")??;
    Ok(())
}

fn run_build(args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut readers = ReaderSet::open(&args.captures)?;
    pcapng_writer::write_file(&args.pcapng, &mut readers)?;
    Ok(())
}
