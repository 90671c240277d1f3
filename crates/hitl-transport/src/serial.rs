use std::fmt;
use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort, SerialPortInfo, SerialPortType};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::ByteStream;

/// Baud rate used by the flight computer firmware unless told otherwise.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Per-call read/write timeout on the OS handle.
///
/// The link layer never reads without checking `bytes_available` first, so
/// this only bounds writes into a full OS buffer and stray blocking reads.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial port transport to the flight computer.
pub struct SerialLink {
    port: Box<dyn SerialPort>,
    name: String,
    baud_rate: u32,
}

impl SerialLink {
    /// Open a serial port with the default I/O timeout.
    pub fn open(name: &str, baud_rate: u32) -> Result<Self> {
        Self::open_with_timeout(name, baud_rate, DEFAULT_IO_TIMEOUT)
    }

    /// Open a serial port with an explicit I/O timeout.
    pub fn open_with_timeout(name: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let port = serialport::new(name, baud_rate)
            .timeout(timeout)
            .open()
            .map_err(|source| TransportError::Open {
                port: name.to_string(),
                source,
            })?;

        info!(port = name, baud_rate, "opened serial port");

        Ok(Self {
            port,
            name: name.to_string(),
            baud_rate,
        })
    }

    /// The OS identifier this link was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured baud rate.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Drop anything sitting in the OS receive buffer.
    pub fn clear_input(&self) -> Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}

impl Read for SerialLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for SerialLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl ByteStream for SerialLink {
    fn bytes_available(&self) -> io::Result<usize> {
        let waiting = self.port.bytes_to_read().map_err(io::Error::from)?;
        Ok(waiting as usize)
    }

    fn try_clone_stream(&self) -> io::Result<Self> {
        let port = self.port.try_clone().map_err(io::Error::from)?;
        Ok(Self {
            port,
            name: self.name.clone(),
            baud_rate: self.baud_rate,
        })
    }
}

impl fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialLink")
            .field("name", &self.name)
            .field("baud_rate", &self.baud_rate)
            .finish()
    }
}

/// Open the port and immediately close it again.
///
/// Succeeds once the device has enumerated and its port accepts an open.
pub fn probe_port(name: &str, baud_rate: u32) -> Result<()> {
    let port = serialport::new(name, baud_rate)
        .timeout(DEFAULT_IO_TIMEOUT)
        .open()
        .map_err(|source| TransportError::Open {
            port: name.to_string(),
            source,
        })?;
    drop(port);
    debug!(port = name, "port probe succeeded");
    Ok(())
}

/// A serial port visible on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// OS identifier to pass to [`SerialLink::open`].
    pub name: String,
    /// Bus kind: `usb`, `pci`, `bluetooth` or `unknown`.
    pub kind: &'static str,
    /// Human-readable detail, when the OS provides one.
    pub description: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (kind, description) = match info.port_type {
            SerialPortType::UsbPort(usb) => {
                let mut detail = format!("{:04x}:{:04x}", usb.vid, usb.pid);
                if let Some(product) = usb.product {
                    detail.push(' ');
                    detail.push_str(&product);
                }
                ("usb", Some(detail))
            }
            SerialPortType::PciPort => ("pci", None),
            SerialPortType::BluetoothPort => ("bluetooth", None),
            SerialPortType::Unknown => ("unknown", None),
        };
        Self {
            name: info.port_name,
            kind,
            description,
        }
    }
}

/// Enumerate the serial ports on this host.
pub fn available_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(TransportError::Enumerate)?;
    Ok(ports.into_iter().map(PortInfo::from).collect())
}
