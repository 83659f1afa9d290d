//! Error and status types for reader transactions.

/// Failures surfaced by the protocol engine.
///
/// Only listen-window acquisition retries internally; every other failure
/// propagates to the host operation that started the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Error {
    /// A pulse measurement exceeded the timeout, or no listen window was
    /// found within the retry limit.
    #[error("pulse measurement or listen-window search timed out")]
    Timeout,
    /// The tag answered with fewer bits than the command expects.
    #[error("received {got} bits, expected {expected}")]
    ShortRead {
        /// Bits actually decoded before the stream ended.
        got: u8,
        /// Bits the command was expecting.
        expected: u8,
    },
    /// The ACK detector observed a non-ACK pulse pair.
    #[error("tag answered NAK")]
    Nak,
    /// No signal above the noise threshold; no tag in the field.
    #[error("no signal above noise threshold")]
    NoSignal,
    /// A command bitstream failed its internal shape check. Never expected
    /// in the field.
    #[error("malformed command bitstream")]
    Validation,
    /// The host or operator requested an abort.
    #[error("operation aborted")]
    Aborted,
    /// A key sweep exhausted its candidate range without a hit.
    #[error("key not found in the searched range")]
    KeyNotFound,
}

/// Status code reported to the host alongside each reply payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub enum Status {
    /// The operation completed.
    Ok,
    /// The operation failed in a recoverable way; see the trace.
    SoftError,
    /// The operation was aborted on request.
    Aborted,
    /// The operation is not implemented for this tag variant.
    NotImplemented,
}

impl From<Error> for Status {
    fn from(e: Error) -> Self {
        match e {
            Error::Aborted => Status::Aborted,
            _ => Status::SoftError,
        }
    }
}
