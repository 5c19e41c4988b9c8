//! Error types for serialupgrade.

use std::io;
use thiserror::Error;

/// Result type for serialupgrade operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for upgrade operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, log file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Empty firmware path, or an upgrade session is already active.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The serial port could not be opened for the handshake phase.
    #[error("Failed to open port: {0}")]
    PortOpenFailure(String),

    /// A single-byte command write did not report exactly one byte written.
    #[error("Write failed at command byte {byte_index}")]
    WriteFailure {
        /// Zero-based index of the command byte that failed.
        byte_index: usize,
    },

    /// The bootloader-ready signal did not arrive within the wait budget.
    #[error("Timed out waiting for bootloader handshake")]
    HandshakeTimeout,

    /// The file transmitter refused to start after the hand-off.
    #[error("Transfer failed to start: {0}")]
    TransferStartFailure(String),

    /// The transfer was aborted before the image was delivered.
    #[error("Transfer aborted")]
    TransferAborted,

    /// The transfer stalled and timed out.
    #[error("Transfer timed out")]
    TransferTimeout,

    /// The transmitter reported an unclassified failure.
    #[error("Transfer error: {0}")]
    TransferError(String),
}
