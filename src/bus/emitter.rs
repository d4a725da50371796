//! Bus backed by an in-process event emitter.
//!
//! Useful when the consuming service (e.g. mail dispatch) runs in the same
//! process: subscribers register per subject and receive the raw payload as
//! a string, no broker required.

use std::sync::Mutex;

use event_emitter_rs::EventEmitter;

use super::{MessageBus, PublishError};

/// A bus that emits published payloads to in-process subscribers.
pub struct EmitterBus {
    emitter: Mutex<EventEmitter>,
}

impl Default for EmitterBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EmitterBus {
    pub fn new() -> Self {
        Self {
            emitter: Mutex::new(EventEmitter::new()),
        }
    }

    /// Subscribe to payloads published on `subject`.
    ///
    /// Returns the listener id, or an error if the emitter lock is
    /// poisoned.
    pub fn on<F>(&self, subject: &str, handler: F) -> Result<String, PublishError>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| PublishError::Rejected("emitter lock poisoned".to_string()))?;
        Ok(emitter.on(subject, handler))
    }
}

impl MessageBus for EmitterBus {
    fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), PublishError> {
        // The emitter deserializes into the subscriber's type; payloads are
        // JSON text, so hand them over as a string.
        let payload = String::from_utf8_lossy(payload).into_owned();
        let mut emitter = self
            .emitter
            .lock()
            .map_err(|_| PublishError::Rejected("emitter lock poisoned".to_string()))?;
        emitter.emit(subject, payload);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }
}
