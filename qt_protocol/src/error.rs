use std::io;
use thiserror::Error;

/// Failure to establish the connection to the clustering server
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Could not resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("No usable address found for {0}")]
    NoAddress(String),

    #[error("Could not connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },
}

/// I/O or framing failure on an established connection
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("IO error: {0}")]
    Io(io::Error),

    #[error("Connection closed by peer")]
    Closed,

    #[error("Timed out waiting for the server")]
    TimedOut,

    #[error("Unsupported frame version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid value tag: {0:#04x}")]
    InvalidTag(u8),

    #[error("Invalid payload size {size} for {tag} value")]
    InvalidPayloadSize { tag: &'static str, size: u32 },

    #[error("Invalid string encoding")]
    InvalidString,

    #[error("Expected {expected} value, received {found}")]
    UnexpectedValue {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Connection out of step after an earlier failure")]
    OutOfStep,
}

impl From<io::Error> for ChannelError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ChannelError::Closed,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ChannelError::TimedOut,
            _ => ChannelError::Io(err),
        }
    }
}

/// Non-success status returned by the server, carried verbatim
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Server error: {status}")]
pub struct ProtocolError {
    status: String,
}

impl ProtocolError {
    pub(crate) fn from_status(status: String) -> Self {
        Self { status }
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}

/// Error returned by the client operations
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Radius must be a positive number, got {0}")]
    InvalidRadius(f64),
}

impl ClientError {
    /// True when the connection can no longer be used for further requests.
    ///
    /// Any channel failure may leave part of a reply unread or arrive late, so
    /// only a server status or a rejected radius leaves the connection usable.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Channel(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_classification() {
        let eof: ChannelError = io::Error::from(io::ErrorKind::UnexpectedEof).into();
        assert!(matches!(eof, ChannelError::Closed));

        let timeout: ChannelError = io::Error::from(io::ErrorKind::WouldBlock).into();
        assert!(matches!(timeout, ChannelError::TimedOut));

        let other: ChannelError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(matches!(other, ChannelError::Io(_)));
    }

    #[test]
    fn test_every_channel_failure_is_fatal() {
        let failures = [
            ChannelError::Closed,
            ChannelError::TimedOut,
            ChannelError::InvalidTag(0x7f),
            ChannelError::InvalidString,
            ChannelError::UnexpectedValue {
                expected: "int",
                found: "text",
            },
        ];
        for failure in failures {
            assert!(ClientError::from(failure).is_fatal());
        }

        let status = ProtocolError::from_status("no table loaded".to_string());
        assert!(!ClientError::from(status).is_fatal());
        assert!(!ClientError::InvalidRadius(0.0).is_fatal());
    }

    #[test]
    fn test_protocol_error_keeps_status_verbatim() {
        let err = ProtocolError::from_status("table not found".to_string());
        assert_eq!(err.status(), "table not found");
        assert_eq!(err.to_string(), "Server error: table not found");
    }
}
