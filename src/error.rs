// src/error.rs

//! Error types for the delivery pipeline.

use std::io;
use std::net::Ipv4Addr;

/// Errors raised while configuring or feeding the panel wall.
///
/// `Config` and `NoRoute` are fatal at startup and need an operator to fix
/// the configuration. `ShortWrite` and `Io` are transient: the scheduler
/// logs them, backs off and keeps going.
#[derive(Debug)]
pub enum WallError {
    /// The configuration cannot describe a working wall.
    Config(String),
    /// No local interface is in the same subnet as the panels.
    NoRoute(Ipv4Addr),
    /// A datagram was only partially written.
    ShortWrite { sent: usize, expected: usize },
    /// A socket operation failed.
    Io(io::Error),
}

impl WallError {
    /// Whether the scheduler may retry after this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, WallError::ShortWrite { .. } | WallError::Io(_))
    }
}

impl std::fmt::Display for WallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WallError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            WallError::NoRoute(ip) => write!(f, "found no interface for {}", ip),
            WallError::ShortWrite { sent, expected } => {
                write!(f, "not all bytes sent: {} of {}", sent, expected)
            }
            WallError::Io(e) => write!(f, "socket error: {}", e),
        }
    }
}

impl std::error::Error for WallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WallError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WallError {
    fn from(e: io::Error) -> Self {
        WallError::Io(e)
    }
}

impl From<nix::Error> for WallError {
    fn from(e: nix::Error) -> Self {
        WallError::Io(io::Error::from(e))
    }
}

pub type WallResult<T> = Result<T, WallError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_send_failures_are_transient() {
        assert!(WallError::ShortWrite { sent: 1, expected: 2 }.is_transient());
        assert!(WallError::Io(io::Error::other("boom")).is_transient());
        assert!(!WallError::Config("x".into()).is_transient());
        assert!(!WallError::NoRoute(Ipv4Addr::LOCALHOST).is_transient());
    }

    #[test]
    fn messages_name_the_offending_value() {
        let e = WallError::NoRoute(Ipv4Addr::new(192, 168, 3, 6));
        assert_eq!(e.to_string(), "found no interface for 192.168.3.6");
        let e = WallError::ShortWrite { sent: 10, expected: 1112 };
        assert_eq!(e.to_string(), "not all bytes sent: 10 of 1112");
    }
}
