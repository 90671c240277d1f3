use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use hitl_link::LinkConfig;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod emulate;
pub mod ports;
pub mod reset;
pub mod run;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serial ports visible on this host.
    Ports(PortsArgs),
    /// Reset the flight computer and wait for its ready marker.
    Reset(ResetArgs),
    /// Run the telemetry/command tick loop against the flight computer.
    Run(RunArgs),
    /// Act as the flight computer on a serial port (bench testing).
    Emulate(EmulateArgs),
    /// Decode a hex-encoded telemetry or command frame.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Ports(args) => ports::run(args, format),
        Command::Reset(args) => reset::run(args, format),
        Command::Run(args) => run::run(args, format),
        Command::Emulate(args) => emulate::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Serial port selection shared by every command that opens the link.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Serial port (e.g. /dev/ttyACM0, COM3).
    #[arg(env = "HITL_PORT")]
    pub port: String,
    /// Baud rate.
    #[arg(long, env = "HITL_BAUD", default_value_t = hitl_transport::DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Poll the port until it can be opened (device still enumerating).
    #[arg(long)]
    pub wait_port: bool,
}

impl LinkArgs {
    pub fn config(&self) -> LinkConfig {
        LinkConfig {
            baud_rate: self.baud,
            wait_for_port: self.wait_port,
            ..LinkConfig::default()
        }
    }
}

#[derive(Args, Debug, Default)]
pub struct PortsArgs {}

#[derive(Args, Debug)]
pub struct ResetArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// How long to wait for the ready marker (e.g. 10s, 500ms).
    #[arg(long, default_value = "10s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Telemetry frames as JSON lines; one frame is sent per tick.
    /// Without it, all-default frames with advancing simulation time are sent.
    #[arg(long, value_name = "FILE")]
    pub telemetry: Option<PathBuf>,
    /// Stop after N ticks.
    #[arg(long)]
    pub count: Option<u64>,
    /// Simulation time step for generated frames, in seconds.
    #[arg(long, default_value_t = 0.1, conflicts_with = "telemetry")]
    pub dt: f32,
    /// Minimum wall-clock time between ticks (e.g. 100ms).
    #[arg(long)]
    pub period: Option<String>,
    /// How long to wait for each command frame (e.g. 1s, 250ms).
    #[arg(long, default_value = "1s")]
    pub reply_timeout: String,
    /// Skip the reset handshake before the first tick.
    #[arg(long)]
    pub no_reset: bool,
    /// How long to wait for the ready marker (e.g. 10s).
    #[arg(long, default_value = "10s")]
    pub reset_timeout: String,
}

#[derive(Args, Debug)]
pub struct EmulateArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Delay between a reset frame and the ready banner, in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub boot_delay_ms: u64,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame bytes as hex (152 digits for a command, 216 for telemetry).
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
