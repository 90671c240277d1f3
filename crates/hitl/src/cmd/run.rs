use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hitl_frame::TelemetryFrame;
use tracing::{debug, info, warn};

use crate::cmd::{parse_duration, RunArgs};
use crate::exit::{
    io_error, link_error, CliError, CliResult, DATA_INVALID, INTERNAL, SUCCESS, TIMEOUT,
};
use crate::output::{print_command, OutputFormat};

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let reply_timeout = parse_duration(&args.reply_timeout)?;
    let reset_timeout = parse_duration(&args.reset_timeout)?;
    let period = args.period.as_deref().map(parse_duration).transpose()?;

    let mut source = match &args.telemetry {
        Some(path) => TelemetrySource::from_file(path)?,
        None => {
            debug!(dt = args.dt, "generating zero telemetry");
            TelemetrySource::generated(args.dt)
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut link = hitl_link::open_with_config(&args.link.port, args.link.config())
        .map_err(|err| link_error("open failed", err))?;

    if !args.no_reset {
        let ready = link
            .reset(reset_timeout)
            .map_err(|err| link_error("reset failed", err))?;
        if !ready {
            return Err(CliError::new(
                TIMEOUT,
                format!(
                    "flight computer on {} did not report ready within {reset_timeout:?}",
                    args.link.port
                ),
            ));
        }
    }

    let mut tick = 0u64;
    let mut missed = 0u64;
    while running.load(Ordering::SeqCst) {
        if args.count.is_some_and(|count| tick >= count) {
            break;
        }
        let Some(frame) = source.next_frame()? else {
            break;
        };

        let started = Instant::now();
        link.send(&frame)
            .map_err(|err| link_error("send failed", err))?;
        match link
            .receive_timeout(reply_timeout)
            .map_err(|err| link_error("receive failed", err))?
        {
            Some(command) => print_command(tick, frame.sim_time, &command, format),
            None => {
                missed += 1;
                warn!(tick, timeout = ?reply_timeout, "no command frame");
            }
        }
        tick += 1;

        if let Some(period) = period {
            let elapsed = started.elapsed();
            if elapsed < period {
                thread::sleep(period - elapsed);
            }
        }
    }

    info!(ticks = tick, missed, stats = ?link.stats(), "run finished");
    link.close().map_err(|err| link_error("close failed", err))?;
    run_outcome(tick, missed, reply_timeout)
}

/// A run where no tick got a reply fails, so scripts can spot a silent device.
fn run_outcome(ticks: u64, missed: u64, reply_timeout: Duration) -> CliResult<i32> {
    if ticks > 0 && missed == ticks {
        return Err(CliError::new(
            TIMEOUT,
            format!("no command frame within {reply_timeout:?} on any of {ticks} ticks"),
        ));
    }
    Ok(SUCCESS)
}

enum TelemetrySource {
    File {
        lines: Lines<BufReader<File>>,
        line_no: usize,
    },
    Generated {
        next_time: f32,
        dt: f32,
    },
}

impl TelemetrySource {
    fn from_file(path: &Path) -> CliResult<Self> {
        let file = File::open(path)
            .map_err(|err| io_error(&format!("cannot open {}", path.display()), err))?;
        Ok(Self::File {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }

    fn generated(dt: f32) -> Self {
        Self::Generated { next_time: 0.0, dt }
    }

    fn next_frame(&mut self) -> CliResult<Option<TelemetryFrame>> {
        match self {
            Self::File { lines, line_no } => {
                for line in lines.by_ref() {
                    *line_no += 1;
                    let line = line.map_err(|err| io_error("telemetry read failed", err))?;
                    if let Some(frame) = parse_telemetry_line(&line, *line_no)? {
                        return Ok(Some(frame));
                    }
                }
                Ok(None)
            }
            Self::Generated { next_time, dt } => {
                let frame = TelemetryFrame {
                    sim_time: *next_time,
                    ..TelemetryFrame::default()
                };
                *next_time += *dt;
                Ok(Some(frame))
            }
        }
    }
}

/// Blank lines and `#` comments are skipped.
fn parse_telemetry_line(line: &str, line_no: usize) -> CliResult<Option<TelemetryFrame>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some).map_err(|err| {
        CliError::new(
            DATA_INVALID,
            format!("telemetry line {line_no} is not a valid frame: {err}"),
        )
    })
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
