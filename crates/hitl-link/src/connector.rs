use std::thread;
use std::time::Duration;

use hitl_transport::{probe_port, SerialLink};
use tracing::{debug, info, warn};

use crate::config::LinkConfig;
use crate::driver::LinkDriver;
use crate::error::{LinkError, Result};

/// Open the link on `port` at `baud_rate`.
///
/// With `wait_for_port`, the port is probed until it opens (the flight
/// computer may still be enumerating), then the link settles before the real
/// open. Boot chatter already queued on the port is discarded.
pub fn open(port: &str, baud_rate: u32, wait_for_port: bool) -> Result<LinkDriver> {
    let config = LinkConfig {
        baud_rate,
        wait_for_port,
        ..LinkConfig::default()
    };
    open_with_config(port, config)
}

/// Open the link with explicit configuration.
pub fn open_with_config(port: &str, config: LinkConfig) -> Result<LinkDriver> {
    if config.wait_for_port {
        wait_for_port(port, &config)?;
        if !config.settle_delay.is_zero() {
            debug!(port, delay = ?config.settle_delay, "letting port settle");
            thread::sleep(config.settle_delay);
        }
    }

    let link = SerialLink::open_with_timeout(port, config.baud_rate, config.io_timeout)?;
    link.clear_input()?;
    info!(port, baud_rate = config.baud_rate, "link open");
    Ok(LinkDriver::with_config(link, config))
}

/// Probe `port` until an open succeeds or the probe budget runs out.
pub fn wait_for_port(port: &str, config: &LinkConfig) -> Result<()> {
    let baud_rate = config.baud_rate;
    retry_probe(port, config.probe_attempts, config.probe_interval, || {
        probe_port(port, baud_rate)
    })
}

fn retry_probe<F>(port: &str, attempts: usize, interval: Duration, mut probe: F) -> Result<()>
where
    F: FnMut() -> hitl_transport::Result<()>,
{
    let attempts = attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match probe() {
            Ok(()) => {
                debug!(port, attempt, "port available");
                return Ok(());
            }
            Err(err) => {
                debug!(port, attempt, error = %err, "port not available yet");
                last_error = Some(err);
            }
        }
        if attempt < attempts {
            thread::sleep(interval);
        }
    }

    warn!(port, attempts, "giving up on port");
    Err(LinkError::LinkUnavailable {
        port: port.to_string(),
        attempts,
        reason: last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "no probe made".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use std::io;

    use hitl_transport::TransportError;

    use super::*;

    fn not_found() -> TransportError {
        TransportError::Io(io::Error::new(io::ErrorKind::NotFound, "no such device"))
    }

    #[test]
    fn retry_succeeds_after_failures() {
        let mut calls = 0;
        let result = retry_probe("/dev/ttyTEST0", 5, Duration::ZERO, || {
            calls += 1;
            if calls < 3 {
                Err(not_found())
            } else {
                Ok(())
            }
        });

        assert!(result.is_ok());
        assert_eq!(calls, 3);
    }

    #[test]
    fn retry_exhausts_budget() {
        let mut calls = 0;
        let err = retry_probe("/dev/ttyTEST0", 4, Duration::ZERO, || {
            calls += 1;
            Err(not_found())
        })
        .unwrap_err();

        assert_eq!(calls, 4);
        match err {
            LinkError::LinkUnavailable {
                port,
                attempts,
                reason,
            } => {
                assert_eq!(port, "/dev/ttyTEST0");
                assert_eq!(attempts, 4);
                assert!(reason.contains("no such device"));
            }
            other => panic!("expected LinkUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn retry_makes_at_least_one_attempt() {
        let mut calls = 0;
        let result = retry_probe("/dev/ttyTEST0", 0, Duration::ZERO, || {
            calls += 1;
            Ok(())
        });

        assert!(result.is_ok());
        assert_eq!(calls, 1);
    }

    #[test]
    fn open_missing_port_fails() {
        let err = open("/dev/hitl-link-does-not-exist", 115_200, false).unwrap_err();
        assert!(matches!(err, LinkError::Transport(_)));
    }

    #[test]
    fn wait_for_missing_port_reports_unavailable() {
        let config = LinkConfig {
            probe_attempts: 2,
            probe_interval: Duration::from_millis(1),
            ..LinkConfig::default()
        };
        let err = wait_for_port("/dev/hitl-link-does-not-exist", &config).unwrap_err();
        assert!(matches!(
            err,
            LinkError::LinkUnavailable { attempts: 2, .. }
        ));
    }
}
