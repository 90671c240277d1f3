use bytes::{Buf, BufMut, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, Result};

/// Marker opening every telemetry frame (simulator → flight computer).
pub const TELEMETRY_MARKER: [u8; 2] = *b"SS";

/// Marker opening every command frame (flight computer → simulator).
pub const COMMAND_MARKER: [u8; 2] = *b"AA";

/// Telemetry frame wire size.
pub const TELEMETRY_FRAME_SIZE: usize = 108;

/// Command frame wire size.
pub const COMMAND_FRAME_SIZE: usize = 76;

/// Size of the larger frame kind; outbound scratch buffers are sized to this.
pub const MAX_FRAME_SIZE: usize = if TELEMETRY_FRAME_SIZE > COMMAND_FRAME_SIZE {
    TELEMETRY_FRAME_SIZE
} else {
    COMMAND_FRAME_SIZE
};

/// Number of raw sun-sensor channels in a telemetry frame.
pub const SUN_SENSOR_COUNT: usize = 16;

/// Telemetry-sized all-zero frame. The flight computer treats it as "return
/// to initial state".
pub const RESET_SENTINEL: [u8; TELEMETRY_FRAME_SIZE] = [0; TELEMETRY_FRAME_SIZE];

const MARKER_SIZE: usize = 2;
const CHECKSUM_SIZE: usize = 2;
const PAD_SIZE: usize = 2;
const HEADER_SIZE: usize = MARKER_SIZE + PAD_SIZE;
const TRAILER_SIZE: usize = CHECKSUM_SIZE + PAD_SIZE;

const TELEMETRY_PAYLOAD_SIZE: usize = 4 + 12 + 12 + 2 * SUN_SENSOR_COUNT + 16 + 12 + 12;
const COMMAND_PAYLOAD_SIZE: usize = 16 + 12 + 12 + 12 + 16;

const _: () = assert!(HEADER_SIZE + TELEMETRY_PAYLOAD_SIZE + TRAILER_SIZE == TELEMETRY_FRAME_SIZE);
const _: () = assert!(HEADER_SIZE + COMMAND_PAYLOAD_SIZE + TRAILER_SIZE == COMMAND_FRAME_SIZE);

/// GPS receiver solution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsFix {
    pub latitude: f32,
    pub longitude: f32,
    pub altitude: f32,
    pub time: f32,
}

/// UTC calendar date, carried as floats on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UtcDate {
    pub year: f32,
    pub month: f32,
    pub day: f32,
}

/// Electrical power system readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusPower {
    pub power: f32,
    pub voltage: f32,
    pub current: f32,
}

/// Sensor readings sent to the flight computer once per simulation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryFrame {
    /// Simulation time in seconds.
    pub sim_time: f32,
    /// Body-frame angular velocity (x, y, z).
    pub angular_velocity: [f32; 3],
    /// Local magnetic field (x, y, z).
    pub magnetic_field: [f32; 3],
    /// Raw sun-sensor ADC counts.
    pub sun_sensors: [u16; SUN_SENSOR_COUNT],
    pub gps: GpsFix,
    pub utc: UtcDate,
    pub power: BusPower,
}

/// Attitude estimate and actuator requests returned by the flight computer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandFrame {
    /// Attitude quaternion estimate.
    pub attitude: [f32; 4],
    /// Angular velocity estimate.
    pub angular_velocity: [f32; 3],
    /// Sun direction estimate in the body/principal frame.
    pub sun_direction: [f32; 3],
    /// Requested magnetorquer dipole.
    pub magnetic_dipole: [f32; 3],
    /// Reaction wheel speed commands.
    pub wheel_speeds: [f32; 4],
}

/// A fixed-size frame kind with its own marker.
///
/// Lets the receive assembler work on either direction of the link.
pub trait WireFrame: Sized {
    /// Two-byte marker at offset 0.
    const MARKER: [u8; 2];
    /// Exact wire size, header and trailer included.
    const SIZE: usize;

    /// Append the wire encoding to `dst`.
    fn encode_into(&self, dst: &mut BytesMut);

    /// Validate and decode exactly one frame.
    fn decode(window: &[u8]) -> Result<Self>;
}

impl WireFrame for TelemetryFrame {
    const MARKER: [u8; 2] = TELEMETRY_MARKER;
    const SIZE: usize = TELEMETRY_FRAME_SIZE;

    fn encode_into(&self, dst: &mut BytesMut) {
        encode_telemetry_into(self, dst);
    }

    fn decode(window: &[u8]) -> Result<Self> {
        decode_telemetry(exact_window(window)?)
    }
}

impl WireFrame for CommandFrame {
    const MARKER: [u8; 2] = COMMAND_MARKER;
    const SIZE: usize = COMMAND_FRAME_SIZE;

    fn encode_into(&self, dst: &mut BytesMut) {
        encode_command_into(self, dst);
    }

    fn decode(window: &[u8]) -> Result<Self> {
        decode_command(exact_window(window)?)
    }
}

/// Unsigned 16-bit, mod-65536 sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |sum, &byte| sum.wrapping_add(u16::from(byte)))
}

/// Encode a telemetry frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────┬─────┬──────┬────────┬────────┬──────────┬──────┬──────┬───────┬──────────┬─────┐
/// │ "SS"   │ pad │ time │ ω xyz  │ B xyz  │ sun ×16  │ GPS  │ UTC  │ power │ checksum │ pad │
/// │ 2B     │ 2B  │ f32  │ 3×f32  │ 3×f32  │ 16×u16   │ 4×f32│ 3×f32│ 3×f32 │ u16 LE   │ 2B  │
/// └────────┴─────┴──────┴────────┴────────┴──────────┴──────┴──────┴───────┴──────────┴─────┘
/// ```
pub fn encode_telemetry(frame: &TelemetryFrame) -> [u8; TELEMETRY_FRAME_SIZE] {
    let mut buf = BytesMut::with_capacity(TELEMETRY_FRAME_SIZE);
    encode_telemetry_into(frame, &mut buf);
    let mut out = [0u8; TELEMETRY_FRAME_SIZE];
    out.copy_from_slice(&buf);
    out
}

/// Append the telemetry wire encoding to `dst`.
pub fn encode_telemetry_into(frame: &TelemetryFrame, dst: &mut BytesMut) {
    let start = dst.len();
    dst.reserve(TELEMETRY_FRAME_SIZE);

    put_header(dst, TELEMETRY_MARKER);
    dst.put_f32_le(frame.sim_time);
    put_f32s(dst, &frame.angular_velocity);
    put_f32s(dst, &frame.magnetic_field);
    for &reading in &frame.sun_sensors {
        dst.put_u16_le(reading);
    }
    put_f32s(
        dst,
        &[
            frame.gps.latitude,
            frame.gps.longitude,
            frame.gps.altitude,
            frame.gps.time,
        ],
    );
    put_f32s(dst, &[frame.utc.year, frame.utc.month, frame.utc.day]);
    put_f32s(
        dst,
        &[frame.power.power, frame.power.voltage, frame.power.current],
    );
    put_trailer(dst, start);

    debug_assert_eq!(dst.len() - start, TELEMETRY_FRAME_SIZE);
}

/// Validate and decode a telemetry frame.
pub fn decode_telemetry(src: &[u8; TELEMETRY_FRAME_SIZE]) -> Result<TelemetryFrame> {
    verify(src, TELEMETRY_MARKER)?;

    let mut payload = &src[HEADER_SIZE..TELEMETRY_FRAME_SIZE - TRAILER_SIZE];
    let sim_time = payload.get_f32_le();
    let angular_velocity = get_f32s(&mut payload);
    let magnetic_field = get_f32s(&mut payload);
    let sun_sensors = std::array::from_fn(|_| payload.get_u16_le());
    let [latitude, longitude, altitude, time] = get_f32s(&mut payload);
    let [year, month, day] = get_f32s(&mut payload);
    let [power, voltage, current] = get_f32s(&mut payload);

    Ok(TelemetryFrame {
        sim_time,
        angular_velocity,
        magnetic_field,
        sun_sensors,
        gps: GpsFix {
            latitude,
            longitude,
            altitude,
            time,
        },
        utc: UtcDate { year, month, day },
        power: BusPower {
            power,
            voltage,
            current,
        },
    })
}

/// Encode a command frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────┬─────┬────────┬────────┬────────┬────────┬──────────┬──────────┬─────┐
/// │ "AA"   │ pad │ q      │ ω est  │ sun    │ dipole │ wheels   │ checksum │ pad │
/// │ 2B     │ 2B  │ 4×f32  │ 3×f32  │ 3×f32  │ 3×f32  │ 4×f32    │ u16 LE   │ 2B  │
/// └────────┴─────┴────────┴────────┴────────┴────────┴──────────┴──────────┴─────┘
/// ```
pub fn encode_command(frame: &CommandFrame) -> [u8; COMMAND_FRAME_SIZE] {
    let mut buf = BytesMut::with_capacity(COMMAND_FRAME_SIZE);
    encode_command_into(frame, &mut buf);
    let mut out = [0u8; COMMAND_FRAME_SIZE];
    out.copy_from_slice(&buf);
    out
}

/// Append the command wire encoding to `dst`.
pub fn encode_command_into(frame: &CommandFrame, dst: &mut BytesMut) {
    let start = dst.len();
    dst.reserve(COMMAND_FRAME_SIZE);

    put_header(dst, COMMAND_MARKER);
    put_f32s(dst, &frame.attitude);
    put_f32s(dst, &frame.angular_velocity);
    put_f32s(dst, &frame.sun_direction);
    put_f32s(dst, &frame.magnetic_dipole);
    put_f32s(dst, &frame.wheel_speeds);
    put_trailer(dst, start);

    debug_assert_eq!(dst.len() - start, COMMAND_FRAME_SIZE);
}

/// Validate and decode a command frame.
///
/// The marker is checked first, then the checksum over bytes 0..72. Nothing
/// is decoded unless both pass.
pub fn decode_command(src: &[u8; COMMAND_FRAME_SIZE]) -> Result<CommandFrame> {
    verify(src, COMMAND_MARKER)?;

    let mut payload = &src[HEADER_SIZE..COMMAND_FRAME_SIZE - TRAILER_SIZE];
    Ok(CommandFrame {
        attitude: get_f32s(&mut payload),
        angular_velocity: get_f32s(&mut payload),
        sun_direction: get_f32s(&mut payload),
        magnetic_dipole: get_f32s(&mut payload),
        wheel_speeds: get_f32s(&mut payload),
    })
}

fn exact_window<const N: usize>(window: &[u8]) -> Result<&[u8; N]> {
    window.try_into().map_err(|_| DecodeError::Length {
        expected: N,
        actual: window.len(),
    })
}

fn verify(src: &[u8], marker: [u8; 2]) -> Result<()> {
    let found = [src[0], src[1]];
    if found != marker {
        return Err(DecodeError::BadMarker {
            expected: marker,
            found,
        });
    }

    let body_len = src.len() - TRAILER_SIZE;
    let wire = u16::from_le_bytes([src[body_len], src[body_len + 1]]);
    let computed = checksum(&src[..body_len]);
    if wire != computed {
        return Err(DecodeError::BadChecksum { wire, computed });
    }

    Ok(())
}

fn put_header(dst: &mut BytesMut, marker: [u8; 2]) {
    dst.put_slice(&marker);
    dst.put_bytes(0, PAD_SIZE);
}

fn put_trailer(dst: &mut BytesMut, start: usize) {
    let sum = checksum(&dst[start..]);
    dst.put_u16_le(sum);
    dst.put_bytes(0, PAD_SIZE);
}

fn put_f32s(dst: &mut BytesMut, values: &[f32]) {
    for &value in values {
        dst.put_f32_le(value);
    }
}

fn get_f32s<const N: usize>(src: &mut &[u8]) -> [f32; N] {
    std::array::from_fn(|_| src.get_f32_le())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_telemetry() -> TelemetryFrame {
        TelemetryFrame {
            sim_time: 1234.5,
            angular_velocity: [0.01, -0.02, 0.03],
            magnetic_field: [2.1e-5, -1.7e-5, 4.4e-5],
            sun_sensors: std::array::from_fn(|i| (i as u16) * 1000 + 7),
            gps: GpsFix {
                latitude: 51.5,
                longitude: -0.12,
                altitude: 500_000.0,
                time: 86_399.5,
            },
            utc: UtcDate {
                year: 2024.0,
                month: 3.0,
                day: 21.0,
            },
            power: BusPower {
                power: 12.5,
                voltage: 7.4,
                current: 1.69,
            },
        }
    }

    fn sample_command() -> CommandFrame {
        CommandFrame {
            attitude: [0.7071, 0.0, 0.7071, 0.0],
            angular_velocity: [0.001, 0.002, -0.003],
            sun_direction: [0.0, 0.6, 0.8],
            magnetic_dipole: [0.1, -0.2, 0.05],
            wheel_speeds: [100.0, -250.0, 0.0, 3000.0],
        }
    }

    #[test]
    fn telemetry_concrete_scenario() {
        let frame = TelemetryFrame {
            sim_time: 60000.0,
            angular_velocity: [0.1, 0.2, 0.3],
            ..TelemetryFrame::default()
        };
        let wire = encode_telemetry(&frame);

        assert_eq!(wire.len(), TELEMETRY_FRAME_SIZE);
        assert_eq!(&wire[..2], b"SS");
        assert_eq!(&wire[106..], &[0x00, 0x00]);
        assert_eq!(&wire[4..8], &60000.0f32.to_le_bytes());
        assert_eq!(&wire[8..12], &0.1f32.to_le_bytes());
    }

    #[test]
    fn telemetry_field_offsets() {
        let frame = sample_telemetry();
        let wire = encode_telemetry(&frame);

        assert_eq!(&wire[2..4], &[0, 0]);
        assert_eq!(&wire[20..24], &frame.magnetic_field[0].to_le_bytes());
        assert_eq!(&wire[32..34], &frame.sun_sensors[0].to_le_bytes());
        assert_eq!(&wire[62..64], &frame.sun_sensors[15].to_le_bytes());
        assert_eq!(&wire[64..68], &frame.gps.latitude.to_le_bytes());
        assert_eq!(&wire[80..84], &frame.utc.year.to_le_bytes());
        assert_eq!(&wire[100..104], &frame.power.current.to_le_bytes());

        let sum = u16::from_le_bytes([wire[104], wire[105]]);
        assert_eq!(sum, checksum(&wire[..104]));
    }

    #[test]
    fn telemetry_roundtrip_is_bit_exact() {
        let frame = sample_telemetry();
        let decoded = decode_telemetry(&encode_telemetry(&frame)).unwrap();

        assert_eq!(decoded, frame);
        assert_eq!(decoded.gps.time.to_bits(), frame.gps.time.to_bits());
        assert_eq!(
            decoded.magnetic_field.map(f32::to_bits),
            frame.magnetic_field.map(f32::to_bits)
        );
    }

    #[test]
    fn telemetry_roundtrip_preserves_special_floats() {
        let frame = TelemetryFrame {
            sim_time: f32::MAX,
            angular_velocity: [-0.0, f32::MIN_POSITIVE, f32::INFINITY],
            ..TelemetryFrame::default()
        };
        let decoded = decode_telemetry(&encode_telemetry(&frame)).unwrap();

        assert_eq!(decoded.sim_time, f32::MAX);
        assert_eq!(
            decoded.angular_velocity.map(f32::to_bits),
            frame.angular_velocity.map(f32::to_bits)
        );
    }

    #[test]
    fn zero_command_frame_decodes() {
        let mut wire = [0u8; COMMAND_FRAME_SIZE];
        wire[..2].copy_from_slice(b"AA");
        wire[72..74].copy_from_slice(&0x0082u16.to_le_bytes());

        let frame = decode_command(&wire).unwrap();
        assert_eq!(frame, CommandFrame::default());
    }

    #[test]
    fn zero_command_checksum_is_marker_sum() {
        let wire = encode_command(&CommandFrame::default());
        assert_eq!(u16::from_le_bytes([wire[72], wire[73]]), 0x0082);
        assert_eq!(&wire[74..], &[0, 0]);
    }

    #[test]
    fn command_roundtrip() {
        let frame = sample_command();
        let wire = encode_command(&frame);
        assert_eq!(&wire[..2], b"AA");
        assert_eq!(&wire[56..60], &100.0f32.to_le_bytes());
        assert_eq!(decode_command(&wire).unwrap(), frame);
    }

    #[test]
    fn command_bad_marker() {
        let mut wire = encode_command(&sample_command());
        wire[1] = b'B';
        let err = decode_command(&wire).unwrap_err();
        assert_eq!(
            err,
            DecodeError::BadMarker {
                expected: *b"AA",
                found: *b"AB"
            }
        );
    }

    #[test]
    fn telemetry_marker_is_not_a_command() {
        let wire = encode_telemetry(&sample_telemetry());
        let err = CommandFrame::decode(&wire[..COMMAND_FRAME_SIZE]).unwrap_err();
        assert!(matches!(err, DecodeError::BadMarker { .. }));
    }

    #[test]
    fn any_single_bit_flip_is_rejected() {
        let clean = encode_command(&sample_command());

        for byte in 0..72 {
            for bit in 0..8 {
                let mut wire = clean;
                wire[byte] ^= 1 << bit;
                let err = decode_command(&wire).unwrap_err();
                if byte < 2 {
                    assert!(matches!(err, DecodeError::BadMarker { .. }));
                } else {
                    assert!(
                        matches!(err, DecodeError::BadChecksum { .. }),
                        "flip at byte {byte} bit {bit} gave {err:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn trailing_pad_is_not_checked() {
        let mut wire = encode_command(&sample_command());
        wire[74] = 0xFF;
        wire[75] = 0xEE;
        assert!(decode_command(&wire).is_ok());
    }

    #[test]
    fn wire_frame_decode_checks_length() {
        let wire = encode_command(&sample_command());
        let err = CommandFrame::decode(&wire[..75]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Length {
                expected: 76,
                actual: 75
            }
        );
    }

    #[test]
    fn wire_frame_encode_appends() {
        let mut buf = BytesMut::from(&b"xx"[..]);
        sample_command().encode_into(&mut buf);
        assert_eq!(buf.len(), 2 + CommandFrame::SIZE);
        assert_eq!(&buf[2..4], &CommandFrame::MARKER);
        assert!(CommandFrame::decode(&buf[2..]).is_ok());
    }

    #[test]
    fn checksum_wraps() {
        assert_eq!(checksum(&[0xFF; 257]), 0xFFFF);
        assert_eq!(checksum(&[0xFF; 258]), 0x00FE);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn telemetry_json_fills_missing_fields() {
        let frame: TelemetryFrame =
            serde_json::from_str(r#"{"sim_time": 1.5, "gps": {"altitude": 400000.0}}"#).unwrap();
        assert_eq!(frame.sim_time, 1.5);
        assert_eq!(frame.gps.altitude, 400000.0);
        assert_eq!(frame.sun_sensors, [0; SUN_SENSOR_COUNT]);
    }
}
