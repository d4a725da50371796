//! Message bus seam.
//!
//! The dispatcher only ever talks to [`MessageBus`]; production deployments
//! plug in a broker client (NATS, Kafka, RabbitMQ), while tests and
//! single-process setups use [`InMemoryBus`] or [`EmitterBus`].

mod emitter;
mod in_memory;

pub use emitter::EmitterBus;
pub use in_memory::InMemoryBus;

use std::error::Error;
use std::fmt;

/// Error type for publish operations.
#[derive(Debug)]
pub enum PublishError {
    /// Connection to the bus failed
    ConnectionFailed(String),
    /// Timeout waiting for acknowledgment
    Timeout,
    /// The bus rejected the event
    Rejected(String),
    /// Other error
    Other(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::ConnectionFailed(msg) => write!(f, "connection failed: {}", msg),
            PublishError::Timeout => write!(f, "publish timeout"),
            PublishError::Rejected(msg) => write!(f, "event rejected: {}", msg),
            PublishError::Other(err) => write!(f, "publish error: {}", err),
        }
    }
}

impl Error for PublishError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PublishError::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Trait for publishing raw payloads to a subject.
///
/// `is_connected` is a cheap liveness probe: the dispatcher skips a whole
/// drain cycle when the bus is known-down rather than burning retry budget
/// on a connection that cannot succeed.
pub trait MessageBus: Send + Sync {
    /// Publish a single payload to the given subject.
    fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), PublishError>;

    /// Whether the bus connection is currently believed to be up.
    fn is_connected(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_error_display() {
        assert_eq!(PublishError::Timeout.to_string(), "publish timeout");
        assert_eq!(
            PublishError::ConnectionFailed("refused".to_string()).to_string(),
            "connection failed: refused"
        );
    }
}
