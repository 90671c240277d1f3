use std::time::Instant;

use crate::cmd::{parse_duration, ResetArgs};
use crate::exit::{link_error, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_reset, OutputFormat};

pub fn run(args: ResetArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut link = hitl_link::open_with_config(&args.link.port, args.link.config())
        .map_err(|err| link_error("open failed", err))?;

    let started = Instant::now();
    let ready = link
        .reset(timeout)
        .map_err(|err| link_error("reset failed", err))?;
    print_reset(&args.link.port, ready, started.elapsed().as_millis(), format);

    link.close().map_err(|err| link_error("close failed", err))?;
    Ok(if ready { SUCCESS } else { TIMEOUT })
}
