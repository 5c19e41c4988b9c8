//! Upgrade session bookkeeping.

use crate::channel::PortConfig;
use std::time::{Duration, Instant};

/// The textual command that asks the running firmware to drop into its
/// bootloader, sent one byte at a time.
pub const UPGRADE_COMMAND: &[u8] = b"upgrade\r\n";

/// Gap between consecutive command bytes; the MCU polls its UART slowly
/// before the bootloader takes over, and back-to-back bytes get lost.
pub(crate) const INTER_BYTE_DELAY: Duration = Duration::from_millis(10);

/// Budget for a single command byte to drain out of the transmitter.
pub(crate) const WRITE_COMPLETION_TIMEOUT: Duration = Duration::from_millis(100);

/// Total wait for the bootloader-ready signal after the command is sent.
pub(crate) const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after the last command byte so the MCU can parse the line and
/// reboot into the bootloader.
pub(crate) const COMMAND_SETTLE_DELAY: Duration = Duration::from_millis(1000);

/// Lifecycle states of an upgrade session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SessionState {
    /// No upgrade requested yet.
    Idle,
    /// The trigger command is being written byte by byte.
    SendingCommand,
    /// Command sent; the handshake timer is armed.
    WaitingForBootloader,
    /// The transfer engine owns the port and is pushing the image.
    Transmitting,
    /// The image was delivered and acknowledged.
    Completed,
    /// The transfer was aborted.
    Aborted,
    /// The handshake or the transfer timed out.
    TimedOut,
    /// The session failed (write error, transfer start failure, ...).
    Failed,
    /// The caller cancelled while waiting for the bootloader.
    Cancelled,
}

impl SessionState {
    /// Whether this state ends the session. Terminal states are absorbing:
    /// only a new `start_upgrade` leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Aborted | Self::TimedOut | Self::Failed | Self::Cancelled
        )
    }

    /// Whether an upgrade is in progress.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::SendingCommand | Self::WaitingForBootloader | Self::Transmitting
        )
    }
}

/// Timing knobs for the handshake sequence.
///
/// The defaults match the target MCU's UART behaviour; tests shrink them to
/// keep the blocking command-send phase fast.
#[derive(Debug, Clone)]
pub struct UpgradeTiming {
    /// Gap between consecutive command bytes.
    pub inter_byte_delay: Duration,
    /// Per-byte write-completion budget.
    pub write_timeout: Duration,
    /// Total bootloader-ready wait after the command is sent.
    pub handshake_timeout: Duration,
    /// Pause between the last command byte and arming the handshake timer.
    pub settle_delay: Duration,
}

impl Default for UpgradeTiming {
    fn default() -> Self {
        Self {
            inter_byte_delay: INTER_BYTE_DELAY,
            write_timeout: WRITE_COMPLETION_TIMEOUT,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            settle_delay: COMMAND_SETTLE_DELAY,
        }
    }
}

/// The single unit of work owned by the orchestrator.
///
/// Created by `start_upgrade`, mutated only in response to timer, channel
/// and transfer events, and left in a terminal state until the next
/// `start_upgrade` replaces it.
#[derive(Debug, Clone)]
pub struct UpgradeSession {
    state: SessionState,
    file_path: String,
    port: PortConfig,
    deadline: Option<Instant>,
}

impl UpgradeSession {
    pub(crate) fn idle() -> Self {
        Self {
            state: SessionState::Idle,
            file_path: String::new(),
            port: PortConfig::default(),
            deadline: None,
        }
    }

    pub(crate) fn begin(file_path: &str, port: PortConfig) -> Self {
        Self {
            state: SessionState::SendingCommand,
            file_path: file_path.to_string(),
            port,
            deadline: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Firmware image path for this session.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Serial parameters for this session.
    pub fn port(&self) -> &PortConfig {
        &self.port
    }

    /// Handshake deadline, `Some` exactly while the timer is armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub(crate) fn arm(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + timeout);
    }

    pub(crate) fn disarm(&mut self) {
        self.deadline = None;
    }
}
