//! Upgrade orchestration state machine.
//!
//! This module drives a firmware upgrade end to end: it paces the textual
//! trigger command onto the wire, waits for the bootloader's ready signal,
//! and hands the port over to a file-transfer engine once the signal
//! arrives.
//!
//! ```text
//!                 start_upgrade
//!      Idle ----------------------> SendingCommand
//!                                        |
//!                  all 9 bytes written   |   write failure
//!              +-------------------------+--------------+
//!              v                                        v
//!      WaitingForBootloader                           Failed
//!        |        |        |
//!   'C'  |        | timer  | cancel
//!        v        v        v
//!  Transmitting TimedOut Cancelled
//!        |
//!        |  transfer status
//!        v
//!  Completed / Aborted / TimedOut / Failed
//! ```
//!
//! Terminal states are absorbing; only a new `start_upgrade` leaves them.
//!
//! The command-send phase deliberately blocks its caller: each of the nine
//! bytes gets up to 100 ms to drain plus a 10 ms gap before the next, so
//! `start_upgrade` can occupy the calling thread for roughly a second
//! before settling into `WaitingForBootloader`. The target MCU polls its
//! UART slowly until the bootloader takes over, and nothing useful can
//! happen mid-handshake anyway.
//!
//! Event dispatch is single-threaded. The embedding application either
//! calls the `on_*` handlers itself from its own event loop, or lets
//! [`UpgradeOrchestrator::poll`]/[`UpgradeOrchestrator::run`] poll the
//! channel and the transfer engine. A received chunk and a timer
//! expiration are never processed concurrently, so whichever is dispatched
//! first owns the transition.

pub mod classify;
pub mod session;

use crate::{
    channel::{ByteChannel, PortConfig},
    error::{Error, Result},
    logging::{LogSink, NullSink},
    transfer::{FileTransmitter, TransferEvent, TransferStatus},
};
use log::{debug, trace, warn};
use std::{
    thread,
    time::{Duration, Instant},
};

pub use classify::{ResponseClass, classify_response};
pub use session::{SessionState, UPGRADE_COMMAND, UpgradeSession, UpgradeTiming};

/// Pause between dispatcher iterations while the transfer engine works.
const RUN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Notifications the orchestrator sends to the embedding application.
///
/// These are the upgrade's externally visible milestones; the embedding
/// shell typically turns them into progress bars and dialogs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UpgradeEvent {
    /// The command went out and the handshake timer is armed. A cancel
    /// affordance makes sense from here on.
    WaitingForBootloader,
    /// Percent of the image delivered (0..=100), relayed from the engine.
    Progress(u8),
    /// The image was delivered and acknowledged.
    Completed,
    /// The transfer was aborted.
    Aborted,
    /// The handshake or the transfer timed out.
    TimedOut,
    /// The caller cancelled while waiting for the bootloader.
    Cancelled,
    /// The session failed, with a human-readable reason.
    Failed(String),
}

/// Drives the handshake over a [`ByteChannel`] and delegates the image
/// transfer to a [`FileTransmitter`].
///
/// Owns the single [`UpgradeSession`]; a second `start_upgrade` while one
/// is active is rejected. The channel is exclusively held during the
/// handshake and closed before the transfer engine opens the port, so the
/// two never own it at the same time.
pub struct UpgradeOrchestrator<C: ByteChannel, T: FileTransmitter> {
    channel: C,
    transmitter: T,
    session: UpgradeSession,
    timing: UpgradeTiming,
    sink: Box<dyn LogSink>,
    observer: Box<dyn FnMut(UpgradeEvent)>,
}

impl<C: ByteChannel, T: FileTransmitter> UpgradeOrchestrator<C, T> {
    /// Create an orchestrator with default timing, no transcript sink and
    /// no observer.
    pub fn new(channel: C, transmitter: T) -> Self {
        Self {
            channel,
            transmitter,
            session: UpgradeSession::idle(),
            timing: UpgradeTiming::default(),
            sink: Box::new(NullSink),
            observer: Box::new(|_| {}),
        }
    }

    /// Replace the handshake timing knobs.
    #[must_use]
    pub fn with_timing(mut self, timing: UpgradeTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Attach a transcript sink receiving one composed line per milestone.
    #[must_use]
    pub fn with_log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// Attach an observer receiving [`UpgradeEvent`] notifications.
    #[must_use]
    pub fn with_observer(mut self, observer: impl FnMut(UpgradeEvent) + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The current session.
    pub fn session(&self) -> &UpgradeSession {
        &self.session
    }

    /// Handshake deadline, `Some` exactly while the timer is armed.
    pub fn handshake_deadline(&self) -> Option<Instant> {
        self.session.deadline()
    }

    /// The byte channel used for the handshake phase.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// The transfer engine.
    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    /// Mutable access to the transfer engine, for embeddings that feed
    /// engine events from their own loop instead of [`poll`](Self::poll).
    pub fn transmitter_mut(&mut self) -> &mut T {
        &mut self.transmitter
    }

    /// Start a new upgrade session.
    ///
    /// Validates the input, opens the channel if needed, clears stale
    /// inbound bytes and sends the trigger command byte by byte. Returns
    /// once the session reached `WaitingForBootloader` (handshake timer
    /// armed) or a failure state; see the module docs for the blocking
    /// budget.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if `file_path` is empty or a session is
    ///   already active (the active session is left untouched).
    /// - [`Error::PortOpenFailure`] if the channel cannot be opened; the
    ///   session resets to `Idle`.
    /// - [`Error::WriteFailure`] if a command byte does not go out whole;
    ///   the session ends in `Failed`.
    pub fn start_upgrade(&mut self, file_path: &str, port: PortConfig) -> Result<()> {
        if file_path.is_empty() {
            return Err(Error::InvalidInput("firmware file path is empty".into()));
        }
        if self.session.state().is_active() {
            return Err(Error::InvalidInput(
                "an upgrade session is already active".into(),
            ));
        }

        self.session = UpgradeSession::begin(file_path, port);
        self.note("=== starting firmware upgrade ===");

        if !self.channel.is_open() {
            let config = self.session.port().clone();
            self.note(&format!(
                "opening port {} at {} baud",
                config.name, config.baud_rate
            ));
            if let Err(e) = self.channel.open(&config) {
                self.note(&format!("error: failed to open port {}", config.name));
                self.session = UpgradeSession::idle();
                return Err(Error::PortOpenFailure(format!("{}: {e}", config.name)));
            }
        }

        if let Err(e) = self.send_command() {
            self.note("error: sending the upgrade command failed");
            self.session.set_state(SessionState::Failed);
            return Err(e);
        }

        // Give the MCU a moment to parse the line and reboot into the
        // bootloader before the wait clock starts.
        thread::sleep(self.timing.settle_delay);

        self.session.set_state(SessionState::WaitingForBootloader);
        self.session.arm(self.timing.handshake_timeout);
        self.note("waiting for MCU to enter bootloader mode...");
        debug!(
            "handshake timer armed for {} ms",
            self.timing.handshake_timeout.as_millis()
        );
        self.emit(UpgradeEvent::WaitingForBootloader);

        Ok(())
    }

    /// Write the trigger command one byte at a time with inter-byte gaps.
    fn send_command(&mut self) -> Result<()> {
        self.channel.clear_buffers()?;
        self.note(&format!(
            "sending upgrade command byte by byte ({} ms gaps)...",
            self.timing.inter_byte_delay.as_millis()
        ));

        for (index, &byte) in UPGRADE_COMMAND.iter().enumerate() {
            let written = match self.channel.write_byte(byte) {
                Ok(n) => n,
                Err(e) => {
                    warn!("write of command byte {index} failed: {e}");
                    0
                },
            };
            if written != 1 {
                self.note(&format!("error: command byte {} was not sent", index + 1));
                return Err(Error::WriteFailure { byte_index: index });
            }
            if let Err(e) = self
                .channel
                .wait_for_write_completion(self.timing.write_timeout)
            {
                warn!("command byte {index} did not drain: {e}");
                self.note(&format!("error: command byte {} was not sent", index + 1));
                return Err(Error::WriteFailure { byte_index: index });
            }
            trace!("sent command byte {}/{}: 0x{byte:02X}", index + 1, UPGRADE_COMMAND.len());

            if index < UPGRADE_COMMAND.len() - 1 {
                thread::sleep(self.timing.inter_byte_delay);
            }
        }

        self.note(&format!(
            "command sent, {} bytes total",
            UPGRADE_COMMAND.len()
        ));
        Ok(())
    }

    /// Handle a chunk of bytes received on the channel.
    ///
    /// Only meaningful while waiting for the bootloader; anything arriving
    /// in other states belongs to the transfer phase and is discarded. The
    /// `'C'` ready signal wins over every other recognizable content in
    /// the same chunk.
    pub fn on_bytes_received(&mut self, bytes: &[u8]) {
        if self.session.state() != SessionState::WaitingForBootloader || bytes.is_empty() {
            return;
        }

        match classify_response(bytes) {
            ResponseClass::BootloaderReady => {
                debug!("received bootloader ready signal 'C'");
                self.session.disarm();
                self.note("bootloader ready signal 'C' detected, starting firmware transfer...");
                self.hand_off();
            },
            ResponseClass::Acknowledged => {
                self.note("MCU replied OK, still waiting for the bootloader signal...");
            },
            ResponseClass::Rejected => {
                warn!("MCU replied ERROR to the upgrade command");
                self.note("MCU replied ERROR, the upgrade command may not be recognized");
            },
            ResponseClass::CommandEcho => {
                self.note("MCU acknowledged the upgrade command, waiting for the bootloader...");
            },
            ResponseClass::Unrecognized => {
                self.note(&format!("received while waiting: {}", hex_dump(bytes)));
            },
        }
    }

    /// Close the handshake channel and start the transfer engine.
    fn hand_off(&mut self) {
        if let Err(e) = self.channel.close() {
            warn!("closing the handshake channel failed: {e}");
        }
        self.note("handshake port closed, handing the port to the transfer engine");

        let file_path = self.session.file_path().to_string();
        let port = self.session.port().clone();
        self.transmitter
            .configure(&file_path, &port.name, port.baud_rate);
        self.session.set_state(SessionState::Transmitting);

        self.note(&format!("starting transfer of {file_path}"));
        if let Err(e) = self.transmitter.start() {
            self.note("error: the transfer engine failed to start");
            self.session.set_state(SessionState::Failed);
            self.emit(UpgradeEvent::Failed(format!(
                "transfer failed to start: {e}"
            )));
        }
    }

    /// Handle expiration of the handshake timer.
    ///
    /// A no-op unless the session is still waiting; a timer that fires
    /// late, after a handshake or a cancellation, changes nothing.
    pub fn on_timeout(&mut self) {
        if self.session.state() != SessionState::WaitingForBootloader {
            return;
        }

        self.session.disarm();
        self.session.set_state(SessionState::TimedOut);
        warn!("timed out waiting for the bootloader ready signal");
        self.note("timeout: MCU did not enter bootloader mode");
        self.note(
            "possible causes: no MCU connected, command not recognized, \
             or firmware without upgrade support",
        );
        self.emit(UpgradeEvent::TimedOut);
    }

    /// Cancel the session.
    ///
    /// While waiting for the bootloader this disarms the timer and ends
    /// the session immediately. During the transfer it only forwards the
    /// stop request; the engine's own status event drives the terminal
    /// transition. In any other state this is a no-op.
    pub fn cancel(&mut self) {
        match self.session.state() {
            SessionState::WaitingForBootloader => {
                self.session.disarm();
                self.session.set_state(SessionState::Cancelled);
                self.note("upgrade cancelled while waiting for the bootloader");
                self.emit(UpgradeEvent::Cancelled);
            },
            SessionState::Transmitting => {
                self.note("stop requested, waiting for the transfer engine to wind down");
                self.transmitter.stop();
            },
            _ => {},
        }
    }

    /// Relay a transfer progress report.
    pub fn on_transfer_progress(&mut self, percent: u8) {
        if self.session.state() != SessionState::Transmitting {
            return;
        }
        self.emit(UpgradeEvent::Progress(percent));
    }

    /// Handle a transfer engine status change.
    pub fn on_transfer_status(&mut self, status: TransferStatus) {
        if self.session.state() != SessionState::Transmitting {
            return;
        }

        match status {
            TransferStatus::Establishing | TransferStatus::InProgress => {},
            TransferStatus::Finished => {
                self.session.set_state(SessionState::Completed);
                self.note("=== firmware upgrade complete ===");
                self.emit(UpgradeEvent::Completed);
            },
            TransferStatus::Aborted => {
                self.session.set_state(SessionState::Aborted);
                self.note("firmware upgrade aborted");
                self.emit(UpgradeEvent::Aborted);
            },
            TransferStatus::TimedOut => {
                self.session.set_state(SessionState::TimedOut);
                self.note("firmware upgrade timed out");
                self.emit(UpgradeEvent::TimedOut);
            },
            TransferStatus::Error => {
                self.session.set_state(SessionState::Failed);
                self.note("firmware upgrade failed");
                self.emit(UpgradeEvent::Failed(
                    "transfer engine reported an error".into(),
                ));
            },
        }
    }

    /// One cooperative dispatcher step.
    ///
    /// While waiting for the bootloader: checks the interrupt hook, polls
    /// the channel for received bytes, then checks the handshake deadline.
    /// While transmitting: checks the interrupt hook and drains the
    /// engine's pending events. Otherwise does nothing.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if reading the channel fails; the
    /// session ends in `Failed`.
    pub fn poll(&mut self) -> Result<()> {
        match self.session.state() {
            SessionState::WaitingForBootloader => {
                if crate::is_interrupt_requested() {
                    self.cancel();
                    return Ok(());
                }

                let mut buf = [0u8; 512];
                let received = match self.channel.read_available(&mut buf) {
                    Ok(n) => n,
                    Err(e) => {
                        self.session.disarm();
                        self.session.set_state(SessionState::Failed);
                        self.note("error: reading the port failed while waiting for the bootloader");
                        return Err(e);
                    },
                };
                if received > 0 {
                    self.on_bytes_received(&buf[..received]);
                }

                // Received bytes win over a deadline expiring in the same
                // step; a successful handshake above already disarmed it.
                if self.session.state() == SessionState::WaitingForBootloader
                    && self
                        .session
                        .deadline()
                        .is_some_and(|deadline| Instant::now() >= deadline)
                {
                    self.on_timeout();
                }
                Ok(())
            },
            SessionState::Transmitting => {
                if crate::is_interrupt_requested() {
                    self.cancel();
                }
                while let Some(event) = self.transmitter.poll_event() {
                    match event {
                        TransferEvent::Progress(percent) => self.on_transfer_progress(percent),
                        TransferEvent::Status(status) => self.on_transfer_status(status),
                    }
                    if self.session.state().is_terminal() {
                        break;
                    }
                }
                Ok(())
            },
            _ => Ok(()),
        }
    }

    /// Poll until the session reaches a terminal state.
    ///
    /// Returns the terminal state (or `Idle` if no session was started).
    /// Embeddings with their own event loop can dispatch to the `on_*`
    /// handlers directly instead.
    pub fn run(&mut self) -> SessionState {
        while self.session.state().is_active() {
            if self.poll().is_err() {
                break;
            }
            if self.session.state() == SessionState::Transmitting {
                thread::sleep(RUN_POLL_INTERVAL);
            }
        }
        self.session.state()
    }

    fn note(&mut self, line: &str) {
        self.sink.append(line);
    }

    fn emit(&mut self, event: UpgradeEvent) {
        (self.observer)(event);
    }
}

/// Space-separated hex rendering of a received chunk for the transcript.
fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}
