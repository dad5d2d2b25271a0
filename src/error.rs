//! Error types for the relay library
//!
//! All fallible operations return [`Result`], with [`Error`] covering
//! transport, wire protocol, and registry failures. Cancellation is a
//! distinct variant so callers can tell "the peer went away" apart from
//! "the caller asked us to stop".

use crate::registry::{RegistryError, SubscriberId};

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for relay operations
#[derive(Debug)]
pub enum Error {
    /// Socket-level I/O failure
    Io(std::io::Error),
    /// Wire protocol violation
    Protocol(ProtocolError),
    /// Registry rejected an operation
    Registry(RegistryError),
    /// A subscriber's outbound channel was closed by its transport.
    /// This is the terminal error a failed delivery reports back to the
    /// subscriber's session.
    ChannelClosed(SubscriberId),
    /// The caller's cancellation signal fired before the operation finished
    Cancelled,
    /// The operation did not complete within its deadline
    Timeout,
}

impl Error {
    /// True when the error came from a cancellation signal rather than a
    /// transport or protocol failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Protocol(err) => write!(f, "Protocol error: {}", err),
            Error::Registry(err) => write!(f, "Registry error: {}", err),
            Error::ChannelClosed(id) => {
                write!(f, "Outbound channel closed for subscriber {}", id)
            }
            Error::Cancelled => write!(f, "Operation cancelled"),
            Error::Timeout => write!(f, "Operation timed out"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Protocol(err) => Some(err),
            Error::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        Error::Protocol(err)
    }
}

impl From<RegistryError> for Error {
    fn from(err: RegistryError) -> Self {
        Error::Registry(err)
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        Error::Timeout
    }
}

/// Violations of the relay wire format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame marker byte not recognized
    UnknownMarker(u8),
    /// Declared frame length exceeds the configured maximum
    FrameTooLarge { size: usize, max: usize },
    /// Frame payload ended before all declared fields were read
    Truncated,
    /// A string field was not valid UTF-8
    InvalidUtf8,
    /// Peer sent a frame that is not valid at this point in the exchange
    UnexpectedFrame(&'static str),
    /// Stream ended in the middle of a frame
    UnexpectedEof,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolError::UnknownMarker(marker) => {
                write!(f, "Unknown frame marker: 0x{:02x}", marker)
            }
            ProtocolError::FrameTooLarge { size, max } => {
                write!(f, "Frame of {} bytes exceeds maximum of {}", size, max)
            }
            ProtocolError::Truncated => write!(f, "Frame payload truncated"),
            ProtocolError::InvalidUtf8 => write!(f, "String field is not valid UTF-8"),
            ProtocolError::UnexpectedFrame(context) => {
                write!(f, "Unexpected frame: {}", context)
            }
            ProtocolError::UnexpectedEof => write!(f, "Stream ended mid-frame"),
        }
    }
}

impl std::error::Error for ProtocolError {}
