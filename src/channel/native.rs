//! Native serial channel implementation using the `serialport` crate.
//!
//! This module provides the byte channel for native platforms
//! (Linux, macOS, Windows, FreeBSD, etc.).

use {
    crate::{
        channel::{ByteChannel, PortConfig},
        error::{Error, Result},
    },
    log::trace,
    serialport::ClearBuffer,
    std::{
        io::{Read, Write},
        time::Duration,
    },
};

/// Read timeout for handshake-phase polling reads.
const POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Serial byte channel for native platforms.
///
/// The port is opened 8N1 without flow control, the settings the target
/// MCU console expects before the bootloader takes over.
pub struct SerialChannel {
    port: Option<Box<dyn serialport::SerialPort>>,
    name: String,
}

impl SerialChannel {
    /// Create a channel in the closed state.
    pub fn new() -> Self {
        Self {
            port: None,
            name: String::new(),
        }
    }

    /// Name of the most recently opened port.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for SerialChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteChannel for SerialChannel {
    fn open(&mut self, config: &PortConfig) -> Result<()> {
        if self.port.is_some() {
            return Ok(());
        }

        let port = serialport::new(&config.name, config.baud_rate)
            .timeout(POLL_TIMEOUT)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()?;

        self.name = config.name.clone();
        self.port = Some(port);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn close(&mut self) -> Result<()> {
        // Take ownership of the port and let it drop (close)
        self.port.take();
        Ok(())
    }

    fn write_byte(&mut self, byte: u8) -> Result<usize> {
        let port = self.port.as_mut().ok_or_else(closed_error)?;
        Ok(port.write(&[byte])?)
    }

    fn wait_for_write_completion(&mut self, _timeout: Duration) -> Result<()> {
        // Note: actual timeout handling depends on the port implementation.
        // flush() blocks until the OS transmit buffer has drained, which the
        // serialport crate bounds internally.
        let port = self.port.as_mut().ok_or_else(closed_error)?;
        port.flush()?;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<()> {
        if let Some(ref mut p) = self.port {
            p.clear(ClearBuffer::All)?;
        }
        Ok(())
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let port = self.port.as_mut().ok_or_else(closed_error)?;
        match port.read(buf) {
            Ok(n) => {
                trace!("received {n} bytes");
                Ok(n)
            },
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn closed_error() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::NotConnected,
        "port closed",
    ))
}
