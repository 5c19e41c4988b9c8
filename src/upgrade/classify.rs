//! Classification of bytes received while waiting for the bootloader.
//!
//! The pre-bootloader firmware may echo the command, print OK/ERROR lines,
//! or emit arbitrary console noise before the bootloader's YMODEM receiver
//! starts polling with `'C'`. Only the `'C'` byte changes the session
//! state; everything else is informational.

/// The ready signal a transfer receiver polls with once the bootloader is
/// prepared to accept the image.
pub(crate) const READY_SIGNAL: u8 = b'C';

/// What a received chunk means while waiting for the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// The chunk carries the `'C'` ready signal; the transfer may begin.
    BootloaderReady,
    /// The firmware accepted the command ("OK"); keep waiting.
    Acknowledged,
    /// The firmware printed "ERROR"; the command may not be recognized.
    Rejected,
    /// An echo of the upgrade command itself.
    CommandEcho,
    /// Anything else; logged raw for diagnostics.
    Unrecognized,
}

/// Classify a received chunk.
///
/// `'C'` takes precedence over every other match: a chunk carrying both a
/// command echo and a trailing `'C'` still starts the transfer. The textual
/// matches are case-insensitive.
pub fn classify_response(bytes: &[u8]) -> ResponseClass {
    if bytes.contains(&READY_SIGNAL) {
        ResponseClass::BootloaderReady
    } else if contains_ignore_ascii_case(bytes, b"ok") {
        ResponseClass::Acknowledged
    } else if contains_ignore_ascii_case(bytes, b"error") {
        ResponseClass::Rejected
    } else if contains_ignore_ascii_case(bytes, b"upgrade") {
        ResponseClass::CommandEcho
    } else {
        ResponseClass::Unrecognized
    }
}

/// Case-insensitive ASCII substring search over raw bytes.
fn contains_ignore_ascii_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack
        .windows(needle.len())
        .any(|window| window.eq_ignore_ascii_case(needle))
}
