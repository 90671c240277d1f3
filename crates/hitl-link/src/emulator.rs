//! Flight-computer side of the link, for tests and bench runs without hardware.
//!
//! The emulator answers the all-zero reset frame with the ready banner and
//! every valid telemetry frame with one command frame built by the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use bytes::BytesMut;
use hitl_frame::{
    encode_command_into, AssemblerStats, CommandFrame, ReceiveAssembler, TelemetryFrame,
    MAX_FRAME_SIZE, TELEMETRY_FRAME_SIZE,
};
use hitl_transport::ByteStream;
use tracing::{debug, info, trace};

use crate::config::DEFAULT_POLL_INTERVAL;
use crate::driver::{is_transient, write_frame};
use crate::error::Result;

/// Line printed after a reset.
pub const READY_BANNER: &[u8] = b"ADCS_READY\n";

const EMULATOR_READ_CHUNK: usize = 256;

/// What the emulator did in response to incoming bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A reset frame arrived and the banner was sent.
    Reset,
    /// A telemetry frame arrived and was answered.
    Telemetry(TelemetryFrame),
}

/// Command that holds identity attitude and echoes the measured rates.
pub fn mirror_command(telemetry: &TelemetryFrame) -> CommandFrame {
    CommandFrame {
        attitude: [1.0, 0.0, 0.0, 0.0],
        angular_velocity: telemetry.angular_velocity,
        ..CommandFrame::default()
    }
}

/// Emulated flight computer over any [`ByteStream`].
pub struct DeviceEmulator<S> {
    stream: S,
    assembler: ReceiveAssembler<TelemetryFrame>,
    zero_run: usize,
    banner: Vec<u8>,
    boot_delay: Duration,
    poll_interval: Duration,
    scratch: BytesMut,
}

impl<S: ByteStream> DeviceEmulator<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            assembler: ReceiveAssembler::new(),
            zero_run: 0,
            banner: READY_BANNER.to_vec(),
            boot_delay: Duration::ZERO,
            poll_interval: DEFAULT_POLL_INTERVAL,
            scratch: BytesMut::with_capacity(MAX_FRAME_SIZE),
        }
    }

    /// Replace the text sent after a reset.
    pub fn with_banner(mut self, banner: impl Into<Vec<u8>>) -> Self {
        self.banner = banner.into();
        self
    }

    /// Pause between seeing a reset and printing the banner.
    pub fn with_boot_delay(mut self, delay: Duration) -> Self {
        self.boot_delay = delay;
        self
    }

    /// Sleep used by [`run`](Self::run) while the line is quiet.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Process whatever bytes are waiting. Never blocks on a quiet line.
    pub fn step<F>(&mut self, respond: &mut F) -> Result<Vec<DeviceEvent>>
    where
        F: FnMut(&TelemetryFrame) -> CommandFrame,
    {
        let mut events = Vec::new();
        let available = self.stream.bytes_available()?;
        if available == 0 {
            return Ok(events);
        }

        let mut chunk = [0u8; EMULATOR_READ_CHUNK];
        let want = available.min(chunk.len());
        let read = match self.stream.read(&mut chunk[..want]) {
            Ok(n) => n,
            Err(err) if is_transient(&err) => return Ok(events),
            Err(err) => return Err(err.into()),
        };

        let mut segment_start = 0;
        for (i, &byte) in chunk[..read].iter().enumerate() {
            if byte != 0 {
                self.zero_run = 0;
                continue;
            }
            self.zero_run += 1;
            if self.zero_run < TELEMETRY_FRAME_SIZE {
                continue;
            }

            // Frames completed before the reset are still answered.
            self.assembler.ingest(&chunk[segment_start..=i]);
            self.answer_frames(respond, &mut events)?;
            self.reboot()?;
            events.push(DeviceEvent::Reset);
            segment_start = i + 1;
        }

        self.assembler.ingest(&chunk[segment_start..read]);
        self.answer_frames(respond, &mut events)?;
        Ok(events)
    }

    /// Step until `running` is cleared. Returns the number of telemetry frames answered.
    pub fn run<F>(&mut self, running: &AtomicBool, mut respond: F) -> Result<u64>
    where
        F: FnMut(&TelemetryFrame) -> CommandFrame,
    {
        let mut answered = 0u64;
        while running.load(Ordering::SeqCst) {
            let events = self.step(&mut respond)?;
            answered += events
                .iter()
                .filter(|event| matches!(event, DeviceEvent::Telemetry(_)))
                .count() as u64;
            if events.is_empty() && self.stream.bytes_available()? == 0 {
                thread::sleep(self.poll_interval);
            }
        }
        debug!(answered, stats = ?self.assembler.stats(), "emulator stopped");
        Ok(answered)
    }

    pub fn stats(&self) -> AssemblerStats {
        self.assembler.stats()
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }

    fn answer_frames<F>(&mut self, respond: &mut F, events: &mut Vec<DeviceEvent>) -> Result<()>
    where
        F: FnMut(&TelemetryFrame) -> CommandFrame,
    {
        while let Some(telemetry) = self.assembler.try_extract() {
            let command = respond(&telemetry);
            self.scratch.clear();
            encode_command_into(&command, &mut self.scratch);
            write_frame(&mut self.stream, &self.scratch, self.poll_interval)?;
            trace!(sim_time = telemetry.sim_time, "answered telemetry frame");
            events.push(DeviceEvent::Telemetry(telemetry));
        }
        Ok(())
    }

    fn reboot(&mut self) -> Result<()> {
        info!("reset frame received");
        self.assembler.reset();
        self.zero_run = 0;
        if !self.boot_delay.is_zero() {
            thread::sleep(self.boot_delay);
        }
        write_frame(&mut self.stream, &self.banner, self.poll_interval)
    }
}

impl<S> std::fmt::Debug for DeviceEmulator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceEmulator")
            .field("assembler", &self.assembler)
            .field("zero_run", &self.zero_run)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use hitl_frame::{decode_command, encode_telemetry, COMMAND_FRAME_SIZE, RESET_SENTINEL};

    use super::*;
    use crate::testing::MockStream;

    fn telemetry(t: f32) -> TelemetryFrame {
        TelemetryFrame {
            sim_time: t,
            angular_velocity: [0.25, -0.5, t],
            ..TelemetryFrame::default()
        }
    }

    fn step(emu: &mut DeviceEmulator<MockStream>) -> Vec<DeviceEvent> {
        emu.step(&mut mirror_command).unwrap()
    }

    #[test]
    fn quiet_line_yields_nothing() {
        let mut emu = DeviceEmulator::new(MockStream::default());
        assert!(step(&mut emu).is_empty());
        assert!(emu.get_ref().written.is_empty());
    }

    #[test]
    fn reset_frame_prints_banner() {
        let mut emu = DeviceEmulator::new(MockStream::with_incoming(&RESET_SENTINEL));

        let mut events = Vec::new();
        while !emu.get_ref().incoming.is_empty() {
            events.extend(step(&mut emu));
        }

        assert_eq!(events, vec![DeviceEvent::Reset]);
        assert_eq!(emu.get_ref().written, READY_BANNER);
    }

    #[test]
    fn custom_banner() {
        let mut emu =
            DeviceEmulator::new(MockStream::with_incoming(&RESET_SENTINEL)).with_banner("UP\n");
        while !emu.get_ref().incoming.is_empty() {
            step(&mut emu);
        }
        assert_eq!(emu.get_ref().written, b"UP\n");
    }

    #[test]
    fn telemetry_answered_with_command() {
        let frame = telemetry(3.0);
        let mut emu = DeviceEmulator::new(MockStream::with_incoming(&encode_telemetry(&frame)));

        assert_eq!(step(&mut emu), vec![DeviceEvent::Telemetry(frame)]);

        let written = &emu.get_ref().written;
        assert_eq!(written.len(), COMMAND_FRAME_SIZE);
        let bytes: [u8; COMMAND_FRAME_SIZE] = written[..].try_into().unwrap();
        assert_eq!(decode_command(&bytes).unwrap(), mirror_command(&frame));
    }

    #[test]
    fn frame_before_reset_in_same_chunk_is_answered() {
        let frame = telemetry(1.0);
        let mut wire = encode_telemetry(&frame).to_vec();
        wire.extend_from_slice(&RESET_SENTINEL);
        let mut emu = DeviceEmulator::new(MockStream::with_incoming(&wire));

        let events = step(&mut emu);

        assert_eq!(events, vec![DeviceEvent::Telemetry(frame), DeviceEvent::Reset]);
        let written = &emu.get_ref().written;
        assert_eq!(written.len(), COMMAND_FRAME_SIZE + READY_BANNER.len());
        assert!(written.ends_with(READY_BANNER));
    }

    #[test]
    fn stream_of_telemetry_never_looks_like_reset() {
        let mut wire = Vec::new();
        for tick in 0..20 {
            wire.extend_from_slice(&encode_telemetry(&TelemetryFrame {
                sim_time: tick as f32,
                ..TelemetryFrame::default()
            }));
        }
        let mut emu = DeviceEmulator::new(MockStream::with_incoming(&wire));

        let mut events = Vec::new();
        while !emu.get_ref().incoming.is_empty() {
            events.extend(step(&mut emu));
        }

        assert_eq!(events.len(), 20);
        assert!(events
            .iter()
            .all(|event| matches!(event, DeviceEvent::Telemetry(_))));
    }

    #[test]
    fn reset_discards_partial_frame() {
        let frame = telemetry(2.0);
        let encoded = encode_telemetry(&frame);
        let mut wire = encoded[..50].to_vec();
        wire.extend_from_slice(&RESET_SENTINEL);
        wire.extend_from_slice(&encoded);
        let mut emu = DeviceEmulator::new(MockStream::with_incoming(&wire));

        let mut events = Vec::new();
        while !emu.get_ref().incoming.is_empty() {
            events.extend(step(&mut emu));
        }

        assert_eq!(events, vec![DeviceEvent::Reset, DeviceEvent::Telemetry(frame)]);
    }

    #[test]
    fn run_stops_when_flag_cleared() {
        let running = AtomicBool::new(false);
        let mut emu = DeviceEmulator::new(MockStream::with_incoming(&RESET_SENTINEL));
        assert_eq!(emu.run(&running, mirror_command).unwrap(), 0);
        assert_eq!(emu.get_ref().incoming.len(), RESET_SENTINEL.len());
    }

    #[test]
    fn run_answers_behind_noise_without_sleeping() {
        let frame = telemetry(4.0);
        let mut wire = vec![0x55; 600];
        wire.extend_from_slice(&encode_telemetry(&frame));

        let running = AtomicBool::new(true);
        let mut emu = DeviceEmulator::new(MockStream::with_incoming(&wire))
            .with_poll_interval(Duration::from_millis(400));
        let started = std::time::Instant::now();

        let answered = emu
            .run(&running, |telemetry| {
                running.store(false, Ordering::SeqCst);
                mirror_command(telemetry)
            })
            .unwrap();

        assert_eq!(answered, 1);
        assert!(started.elapsed() < Duration::from_millis(200));
        assert_eq!(emu.get_ref().written.len(), COMMAND_FRAME_SIZE);
    }

    #[cfg(unix)]
    #[test]
    fn drives_a_full_session_over_socket_pair() {
        use std::os::unix::net::UnixStream;
        use std::sync::Arc;

        use crate::driver::LinkDriver;

        let (sim, device) = UnixStream::pair().unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let emulator = thread::spawn(move || {
            DeviceEmulator::new(device)
                .with_boot_delay(Duration::from_millis(5))
                .run(&flag, mirror_command)
        });

        let mut driver = LinkDriver::new(sim);
        assert!(driver.reset(Duration::from_secs(5)).unwrap());
        for tick in 0..10 {
            let frame = telemetry(tick as f32 * 0.01);
            driver.send(&frame).unwrap();
            let reply = driver.receive_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(reply, Some(mirror_command(&frame)));
        }

        running.store(false, Ordering::SeqCst);
        assert_eq!(emulator.join().unwrap().unwrap(), 10);
        assert_eq!(driver.stats().frames, 10);
    }
}
