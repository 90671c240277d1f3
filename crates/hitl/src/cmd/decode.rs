use hitl_frame::{decode_command, decode_telemetry, COMMAND_FRAME_SIZE, TELEMETRY_FRAME_SIZE};

use crate::cmd::DecodeArgs;
use crate::exit::{decode_error, CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_decoded_command, print_decoded_telemetry, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    match parse_frame(&args.hex)? {
        Decoded::Command(bytes) => {
            let command = decode_command(&bytes).map_err(|err| decode_error("decode failed", err))?;
            print_decoded_command(&command, format);
        }
        Decoded::Telemetry(bytes) => {
            let telemetry =
                decode_telemetry(&bytes).map_err(|err| decode_error("decode failed", err))?;
            print_decoded_telemetry(&telemetry, format);
        }
    }
    Ok(SUCCESS)
}

#[derive(Debug)]
enum Decoded {
    Command([u8; COMMAND_FRAME_SIZE]),
    Telemetry(Box<[u8; TELEMETRY_FRAME_SIZE]>),
}

/// Whitespace and `:` separators are ignored.
fn parse_frame(input: &str) -> CliResult<Decoded> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .collect();
    let bytes = hex::decode(&digits)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex: {err}")))?;

    match bytes.len() {
        COMMAND_FRAME_SIZE => {
            let mut frame = [0u8; COMMAND_FRAME_SIZE];
            frame.copy_from_slice(&bytes);
            Ok(Decoded::Command(frame))
        }
        TELEMETRY_FRAME_SIZE => {
            let mut frame = Box::new([0u8; TELEMETRY_FRAME_SIZE]);
            frame.copy_from_slice(&bytes);
            Ok(Decoded::Telemetry(frame))
        }
        other => Err(CliError::new(
            USAGE,
            format!(
                "expected {COMMAND_FRAME_SIZE} (command) or {TELEMETRY_FRAME_SIZE} (telemetry) bytes, got {other}"
            ),
        )),
    }
}
