use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use hitl_frame::{encode_command, encode_telemetry, CommandFrame, TelemetryFrame};
use hitl_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    tick: u64,
    sim_time: f32,
    command: &'a CommandFrame,
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    description: Option<&'a str>,
}

#[derive(Serialize)]
struct ResetOutput<'a> {
    port: &'a str,
    ready: bool,
    elapsed_ms: u128,
}

pub fn print_command(tick: u64, sim_time: f32, command: &CommandFrame, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&CommandOutput {
            tick,
            sim_time,
            command,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["TICK", "SIM TIME", "FIELD", "VALUE"]);
            for (field, value) in command_fields(command) {
                table.add_row(vec![
                    tick.to_string(),
                    sim_time.to_string(),
                    field.to_string(),
                    value,
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "tick={tick} t={sim_time} q={:?} w={:?} sun={:?} m={:?} wheels={:?}",
                command.attitude,
                command.angular_velocity,
                command.sun_direction,
                command.magnetic_dipole,
                command.wheel_speeds
            );
        }
        OutputFormat::Raw => print_raw(&encode_command(command)),
    }
}

pub fn print_decoded_command(command: &CommandFrame, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(command),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            for (field, value) in command_fields(command) {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (field, value) in command_fields(command) {
                println!("{field}: {value}");
            }
        }
        OutputFormat::Raw => print_raw(&encode_command(command)),
    }
}

pub fn print_decoded_telemetry(telemetry: &TelemetryFrame, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(telemetry),
        OutputFormat::Table => {
            let mut table = new_table(vec!["FIELD", "VALUE"]);
            for (field, value) in telemetry_fields(telemetry) {
                table.add_row(vec![field.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for (field, value) in telemetry_fields(telemetry) {
                println!("{field}: {value}");
            }
        }
        OutputFormat::Raw => print_raw(&encode_telemetry(telemetry)),
    }
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|port| PortOutput {
                    name: &port.name,
                    kind: port.kind,
                    description: port.description.as_deref(),
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "TYPE", "DESCRIPTION"]);
            for port in ports {
                table.add_row(vec![
                    port.name.clone(),
                    port.kind.to_string(),
                    port.description.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for port in ports {
                match &port.description {
                    Some(description) => println!("{} ({}, {description})", port.name, port.kind),
                    None => println!("{} ({})", port.name, port.kind),
                }
            }
        }
    }
}

pub fn print_reset(port: &str, ready: bool, elapsed_ms: u128, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ResetOutput {
            port,
            ready,
            elapsed_ms,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["PORT", "READY", "ELAPSED"]);
            table.add_row(vec![
                port.to_string(),
                ready.to_string(),
                format!("{elapsed_ms} ms"),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            let state = if ready { "ready" } else { "no ready marker" };
            println!("{port}: {state} after {elapsed_ms} ms");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn command_fields(command: &CommandFrame) -> Vec<(&'static str, String)> {
    vec![
        ("attitude", format!("{:?}", command.attitude)),
        ("angular_velocity", format!("{:?}", command.angular_velocity)),
        ("sun_direction", format!("{:?}", command.sun_direction)),
        ("magnetic_dipole", format!("{:?}", command.magnetic_dipole)),
        ("wheel_speeds", format!("{:?}", command.wheel_speeds)),
    ]
}

fn telemetry_fields(telemetry: &TelemetryFrame) -> Vec<(&'static str, String)> {
    vec![
        ("sim_time", telemetry.sim_time.to_string()),
        ("angular_velocity", format!("{:?}", telemetry.angular_velocity)),
        ("magnetic_field", format!("{:?}", telemetry.magnetic_field)),
        ("sun_sensors", format!("{:?}", telemetry.sun_sensors)),
        (
            "gps",
            format!(
                "lat={} lon={} alt={} time={}",
                telemetry.gps.latitude,
                telemetry.gps.longitude,
                telemetry.gps.altitude,
                telemetry.gps.time
            ),
        ),
        (
            "utc",
            format!(
                "{:04}-{:02}-{:02}",
                telemetry.utc.year, telemetry.utc.month, telemetry.utc.day
            ),
        ),
        (
            "power",
            format!(
                "{} W, {} V, {} A",
                telemetry.power.power, telemetry.power.voltage, telemetry.power.current
            ),
        ),
    ]
}
