//! Byte channel abstraction for the handshake phase.
//!
//! The orchestrator only needs a duplex byte stream to trigger the
//! bootloader: write single command bytes, wait for them to drain, and poll
//! for whatever the MCU sends back. Keeping that behind a trait separates
//! the state machine from the transport:
//!
//! ```text
//! +----------------------+
//! | UpgradeOrchestrator  |
//! +----------+-----------+
//!            |
//!            v
//! +----------+-----------+
//! |  ByteChannel trait   |
//! +----------+-----------+
//!            |
//!            v
//! +----------+-----------+
//! |   SerialChannel      |
//! |    (serialport)      |
//! +----------------------+
//! ```
//!
//! The channel is only held during the handshake; once the bootloader
//! answers, it is closed and the port belongs to the transfer engine.

#[cfg(feature = "native")]
pub mod native;

use std::time::Duration;

use crate::error::Result;

/// Serial port parameters for an upgrade session.
///
/// Immutable for the session's duration; the transfer engine receives the
/// same name and baud rate when the port is handed over.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortConfig {
    /// Port name/path (e.g., "/dev/ttyUSB0", "COM3").
    pub name: String,
    /// Baud rate, matching the MCU console UART.
    pub baud_rate: u32,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            baud_rate: 115200,
        }
    }
}

impl PortConfig {
    /// Create a configuration with port name and baud rate.
    pub fn new(name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            name: name.into(),
            baud_rate,
        }
    }
}

/// Duplex byte channel used while triggering the bootloader.
///
/// Incoming data is delivered by polling [`read_available`] from the
/// dispatcher loop rather than through a callback; the orchestrator feeds
/// whatever arrives into its `on_bytes_received` handler.
///
/// [`read_available`]: ByteChannel::read_available
pub trait ByteChannel {
    /// Open the channel with the given configuration.
    ///
    /// Opening an already-open channel is a no-op.
    fn open(&mut self, config: &PortConfig) -> Result<()>;

    /// Whether the channel is currently open.
    fn is_open(&self) -> bool;

    /// Close the channel and release the underlying port.
    fn close(&mut self) -> Result<()>;

    /// Write a single byte, returning the number of bytes accepted.
    fn write_byte(&mut self, byte: u8) -> Result<usize>;

    /// Block until the previous write has drained, up to `timeout`.
    fn wait_for_write_completion(&mut self, timeout: Duration) -> Result<()>;

    /// Discard any buffered inbound and outbound bytes.
    fn clear_buffers(&mut self) -> Result<()>;

    /// Read whatever bytes have arrived, returning `Ok(0)` when none did
    /// within the channel's own polling interval.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;
}

// Re-export the native implementation when available
#[cfg(feature = "native")]
pub use native::SerialChannel;
