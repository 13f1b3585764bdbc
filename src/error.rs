//! Error types for the KNXnet/IP core.
//!
//! Every operation in this crate returns a typed [`KnxError`] instead of
//! panicking. Panics are reserved for codec invariant violations (a
//! precondition the caller is expected to have already checked, such as
//! slicing a buffer whose length was validated one line above).

use std::fmt;
use std::net::AddrParseError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KnxError>;

/// Which phase of a timed operation expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    /// Waiting for a `TUNNELING_ACK` / FT1.2 acknowledgement byte.
    Ack,
    /// Waiting for an `L_Data.con` confirmation.
    Con,
    /// Waiting for a `CONNECTIONSTATE_RESPONSE` heartbeat reply.
    Heartbeat,
    /// Waiting for a bus/interface reset to complete.
    Reset,
}

impl fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ack => "ack",
            Self::Con => "con",
            Self::Heartbeat => "heartbeat",
            Self::Reset => "reset",
        };
        f.write_str(s)
    }
}

/// Who initiated the tear-down of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseInitiator {
    /// The local side called `disconnect()`.
    Local,
    /// The peer sent a `DISCONNECT_REQUEST` or closed the transport.
    Remote,
}

impl fmt::Display for CloseInitiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
        })
    }
}

/// Top-level error type returned by every fallible operation in this crate.
#[derive(Debug)]
pub enum KnxError {
    /// A frame could not be decoded; `reason` is a short, stable description
    /// of what was wrong (never user-facing prose with variable field values
    /// baked in, to keep it matchable in tests).
    MalformedFrame { reason: &'static str },
    /// A timed wait expired.
    Timeout { phase: TimeoutPhase },
    /// The peer rejected a request with a non-zero status code.
    Rejected { status: u8 },
    /// The local endpoint (socket/serial port) is closed.
    PortClosed { reason: &'static str },
    /// The connection was torn down.
    ConnectionClosed {
        initiator: CloseInitiator,
        reason: &'static str,
    },
    /// The operation is not valid in the current state (e.g. `send()` on a
    /// session that is not `Open`, or on a busmon TP-UART link).
    IllegalState,
    /// An underlying I/O operation (socket, serial port) failed.
    IoError(std::io::Error),
    /// A tunnelling/device-management sequence counter did not match the
    /// expected value.
    SequenceMismatch { expected: u8, actual: u8 },
    /// An address component (area/line/device, main/middle/sub) is outside
    /// its valid bit range.
    AddressOutOfRange { reason: &'static str },
    /// A provided buffer was too small to hold the encoded/decoded value.
    BufferTooSmall,
    /// A DPT-level value was outside the representable range for its type.
    ValueOutOfRange,
    /// No translator is registered for the requested `(main, dpt)` pair.
    UnknownTranslator { main_number: u16 },
}

impl KnxError {
    #[must_use]
    pub const fn malformed(reason: &'static str) -> Self {
        Self::MalformedFrame { reason }
    }

    #[must_use]
    pub const fn timeout(phase: TimeoutPhase) -> Self {
        Self::Timeout { phase }
    }

    #[must_use]
    pub const fn rejected(status: u8) -> Self {
        Self::Rejected { status }
    }

    #[must_use]
    pub const fn port_closed(reason: &'static str) -> Self {
        Self::PortClosed { reason }
    }

    #[must_use]
    pub const fn connection_closed(initiator: CloseInitiator, reason: &'static str) -> Self {
        Self::ConnectionClosed { initiator, reason }
    }

    #[must_use]
    pub const fn sequence_mismatch(expected: u8, actual: u8) -> Self {
        Self::SequenceMismatch { expected, actual }
    }

    #[must_use]
    pub const fn address_out_of_range(reason: &'static str) -> Self {
        Self::AddressOutOfRange { reason }
    }
}

impl fmt::Display for KnxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedFrame { reason } => write!(f, "malformed frame: {reason}"),
            Self::Timeout { phase } => write!(f, "timed out waiting for {phase}"),
            Self::Rejected { status } => write!(f, "request rejected with status 0x{status:02x}"),
            Self::PortClosed { reason } => write!(f, "port closed: {reason}"),
            Self::ConnectionClosed { initiator, reason } => {
                write!(f, "connection closed by {initiator}: {reason}")
            }
            Self::IllegalState => write!(f, "operation not valid in the current state"),
            Self::IoError(e) => write!(f, "i/o error: {e}"),
            Self::SequenceMismatch { expected, actual } => {
                write!(f, "sequence mismatch: expected {expected}, got {actual}")
            }
            Self::AddressOutOfRange { reason } => write!(f, "address out of range: {reason}"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::ValueOutOfRange => write!(f, "value out of range for datapoint type"),
            Self::UnknownTranslator { main_number } => {
                write!(f, "no translator registered for main number {main_number}")
            }
        }
    }
}

impl std::error::Error for KnxError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for KnxError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e)
    }
}

impl From<serialport::Error> for KnxError {
    fn from(e: serialport::Error) -> Self {
        Self::IoError(std::io::Error::other(e))
    }
}

impl From<AddrParseError> for KnxError {
    fn from(_: AddrParseError) -> Self {
        Self::malformed("invalid ip address literal")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_field_values() {
        let e = KnxError::rejected(0x22);
        assert_eq!(e.to_string(), "request rejected with status 0x22");
    }

    #[test]
    fn sequence_mismatch_reports_both_values() {
        let e = KnxError::sequence_mismatch(5, 7);
        assert_eq!(e.to_string(), "sequence mismatch: expected 5, got 7");
    }

    #[test]
    fn io_error_roundtrips_through_from() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "boom");
        let e: KnxError = io.into();
        assert!(matches!(e, KnxError::IoError(_)));
    }
}
