// SPDX-License-Identifier: Apache-2.0

//! Serial-port backend: opens a USB/TTY device, decodes its USB ids for
//! [`crate::gateway::classify`], and drives the line-reassembly + write
//! pacing pipeline over a `tokio_serial::SerialStream`.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialPortInfo, SerialStream};
use tracing::{debug, trace};

use crate::error::TransportSerialError;
use crate::gateway::{self, GatewayKind, UsbIds};

/// Default baud rate for both HGI80 and evofw3-family dongles.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// An opened serial connection plus the gateway kind it was classified as.
pub struct SerialPort {
    port: SerialStream,
    read_buf: [u8; 512],
    /// Which firmware family the port was classified as on open.
    pub kind: GatewayKind,
}

fn usb_ids_for(port_name: &str) -> Option<UsbIds> {
    let ports = tokio_serial::available_ports().ok()?;
    let info: &SerialPortInfo = ports.iter().find(|p| p.port_name == port_name)?;
    match &info.port_type {
        tokio_serial::SerialPortType::UsbPort(usb) => Some(UsbIds { vid: usb.vid, pid: usb.pid }),
        _ => None,
    }
}

impl SerialPort {
    /// Open `path` at `baud` (spec.md §6 `port_config.baud`: 115200 or
    /// 57600) and classify its gateway kind.
    ///
    /// # Errors
    /// Returns [`TransportSerialError::OpenFailed`] if the OS refuses to
    /// open the port (permissions, nonexistent device, already in use).
    pub fn open(path: &str, baud: u32) -> Result<Self, TransportSerialError> {
        let port = tokio_serial::new(path, baud).open_native_async().map_err(|e| {
            TransportSerialError::OpenFailed {
                port: path.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            }
        })?;

        let kind = gateway::classify(path, usb_ids_for(path));
        debug!(port = path, baud, ?kind, "serial port opened");
        Ok(Self { port, read_buf: [0u8; 512], kind })
    }

    /// Read whatever bytes are currently available, feeding them to `reader`.
    /// Blocks (asynchronously) until at least one byte arrives.
    ///
    /// # Errors
    /// Propagates the underlying read error.
    pub async fn read_into(
        &mut self,
        reader: &mut crate::line::LineReader,
    ) -> Result<(), TransportSerialError> {
        let n = self.port.read(&mut self.read_buf).await?;
        if n == 0 {
            return Ok(());
        }
        trace!(bytes = n, "serial read");
        reader.feed(&self.read_buf[..n]);
        Ok(())
    }

    /// Write one already-paced frame line (with trailing `\r\n`).
    ///
    /// # Errors
    /// Propagates the underlying write error.
    pub async fn write_line(&mut self, line: &str) -> Result<(), TransportSerialError> {
        self.port.write_all(line.as_bytes()).await?;
        self.port.write_all(b"\r\n").await?;
        self.port.flush().await?;
        Ok(())
    }
}

