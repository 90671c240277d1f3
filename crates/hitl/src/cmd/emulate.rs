use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hitl_link::{mirror_command, DeviceEmulator};
use hitl_transport::SerialLink;
use tracing::info;

use crate::cmd::EmulateArgs;
use crate::exit::{link_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;

pub fn run(args: EmulateArgs, _format: OutputFormat) -> CliResult<i32> {
    let config = args.link.config();
    if config.wait_for_port {
        hitl_link::wait_for_port(&args.link.port, &config)
            .map_err(|err| link_error("port wait failed", err))?;
    }

    let link = SerialLink::open_with_timeout(&args.link.port, config.baud_rate, config.io_timeout)
        .map_err(|err| transport_error("open failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;

    info!(port = %args.link.port, baud_rate = config.baud_rate, "emulating flight computer");
    let mut emulator =
        DeviceEmulator::new(link).with_boot_delay(Duration::from_millis(args.boot_delay_ms));
    let answered = emulator
        .run(&running, mirror_command)
        .map_err(|err| link_error("emulator failed", err))?;

    info!(answered, stats = ?emulator.stats(), "emulator stopped");
    Ok(SUCCESS)
}
