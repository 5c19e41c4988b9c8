//! # serialupgrade
//!
//! A library for upgrading MCU firmware over a serial link.
//!
//! The running firmware is asked to drop into its bootloader with a paced
//! textual command; once the bootloader answers with its ready signal, the
//! port is handed to a file-transfer engine that pushes the image. This
//! crate provides:
//!
//! - The upgrade orchestration state machine (command pacing, handshake
//!   detection, timeout and cancellation handling)
//! - A serial byte channel for the handshake phase
//! - A timestamped transcript log of each upgrade session
//!
//! The file-transfer wire protocol itself (typically YMODEM) is not part
//! of this crate; any engine implementing [`FileTransmitter`] plugs in.
//!
//! ## Supported Platforms
//!
//! - **Native** (default): Linux, macOS, Windows via the `serialport` crate
//!
//! ## Features
//!
//! - `native` (default): Native serial port support
//! - `serde`: Serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! use serialupgrade::{
//!     FileTransmitter, PortConfig, Result, TransferEvent, UpgradeOrchestrator,
//! };
//!
//! // Stand-in for a real YMODEM sender.
//! struct Sender;
//!
//! impl FileTransmitter for Sender {
//!     fn configure(&mut self, _file_path: &str, _port_name: &str, _baud_rate: u32) {}
//!     fn start(&mut self) -> Result<()> {
//!         Ok(())
//!     }
//!     fn stop(&mut self) {}
//!     fn poll_event(&mut self) -> Option<TransferEvent> {
//!         None
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     #[cfg(feature = "native")]
//!     {
//!         let channel = serialupgrade::SerialChannel::new();
//!         let mut upgrade = UpgradeOrchestrator::new(channel, Sender)
//!             .with_observer(|event| println!("{event:?}"));
//!
//!         upgrade.start_upgrade("firmware.bin", PortConfig::new("/dev/ttyUSB0", 115200))?;
//!         let outcome = upgrade.run();
//!         println!("upgrade ended in {outcome:?}");
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod channel;
pub mod error;
pub mod logging;
pub mod transfer;
pub mod upgrade;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker consulted by the dispatcher loop.
///
/// The checker should return `true` when the current upgrade should be
/// cancelled (for example after receiving Ctrl-C in CLI applications).
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn is_interrupt_requested() -> bool {
    INTERRUPT_CHECKER.get().is_some_and(|checker| checker())
}

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use channel::SerialChannel;
pub use {
    channel::{ByteChannel, PortConfig},
    error::{Error, Result},
    logging::{FileLogSink, LogSink, NullSink},
    transfer::{FileTransmitter, TransferEvent, TransferStatus},
    upgrade::{
        ResponseClass, SessionState, UPGRADE_COMMAND, UpgradeEvent, UpgradeOrchestrator,
        UpgradeSession, UpgradeTiming, classify_response,
    },
};
