//! File-transfer engine contract.
//!
//! The upgrade core does not implement the transfer wire protocol. It
//! configures an engine with the image path and port parameters, starts and
//! stops it, and relays the engine's progress and status events upward.
//! YMODEM receivers are the usual peer on HiSilicon-style bootloaders, but
//! any engine satisfying this contract works.

use crate::error::Result;

/// Progress/status events emitted by a [`FileTransmitter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEvent {
    /// Percent of the image delivered so far (0..=100).
    Progress(u8),
    /// Transfer lifecycle change.
    Status(TransferStatus),
}

/// Lifecycle states reported by a transfer engine.
///
/// Every value maps to a definite session outcome; there is no
/// unknown/other catch-all, so consumers match exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferStatus {
    /// Link negotiation with the receiver is in progress.
    Establishing,
    /// Data blocks are being sent.
    InProgress,
    /// The whole image was delivered and acknowledged.
    Finished,
    /// The transfer was cancelled by either side.
    Aborted,
    /// The receiver stopped responding mid-transfer.
    TimedOut,
    /// Any other engine-reported failure.
    Error,
}

/// A file-transfer engine pushing the firmware image to the bootloader.
///
/// The engine owns the serial port for the duration of the transfer; the
/// orchestrator closes its own channel before calling [`start`](Self::start)
/// so the two never hold the port simultaneously.
pub trait FileTransmitter {
    /// Supply the image path and port parameters for the next transfer.
    fn configure(&mut self, file_path: &str, port_name: &str, baud_rate: u32);

    /// Begin the transfer.
    fn start(&mut self) -> Result<()>;

    /// Request the transfer stop. Completion is reported through a
    /// subsequent [`TransferStatus`] event, not synchronously.
    fn stop(&mut self);

    /// Next pending progress/status event, if any.
    ///
    /// The dispatcher drains these and feeds them into the orchestrator's
    /// `on_transfer_progress`/`on_transfer_status` handlers.
    fn poll_event(&mut self) -> Option<TransferEvent>;
}
