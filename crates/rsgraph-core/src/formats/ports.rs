//! # Distribution Ports
//!
//! Byte-oriented endpoints decoupling update serialization from the
//! transport. An [`OutputPort`] consumes encoded updates on the origin
//! side; an [`InputPort`] receives them on the replica side. Transports
//! (sockets, message queues) implement these traits; the in-process
//! [`LoopbackBridge`] closes the loop for tests and single-process
//! replication.

use std::sync::{Arc, Mutex};

use crate::types::SceneGraphError;

/// Origin-side endpoint: accepts one encoded update per call.
pub trait OutputPort: Send {
    /// Write one complete update message. Returns the bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize, SceneGraphError>;
}

/// Replica-side endpoint: receives one encoded update per call.
pub trait InputPort: Send {
    /// Deliver one complete update message. Returns the bytes consumed.
    fn write(&mut self, data: &[u8]) -> Result<usize, SceneGraphError>;
}

/// Output port that forwards every message directly into an input
/// port, without buffering or reordering.
pub struct LoopbackBridge {
    input: Arc<Mutex<dyn InputPort>>,
}

impl LoopbackBridge {
    #[must_use]
    pub fn new(input: Arc<Mutex<dyn InputPort>>) -> Self {
        Self { input }
    }
}

impl OutputPort for LoopbackBridge {
    fn write(&mut self, data: &[u8]) -> Result<usize, SceneGraphError> {
        let mut input = self
            .input
            .lock()
            .map_err(|_| SceneGraphError::IoError("input port poisoned".to_string()))?;
        input.write(data)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Sink {
        received: Vec<Vec<u8>>,
    }

    impl InputPort for Sink {
        fn write(&mut self, data: &[u8]) -> Result<usize, SceneGraphError> {
            self.received.push(data.to_vec());
            Ok(data.len())
        }
    }

    #[test]
    fn bridge_forwards_messages_in_order() {
        let sink = Arc::new(Mutex::new(Sink::default()));
        let mut bridge = LoopbackBridge::new(sink.clone());

        assert_eq!(bridge.write(b"first").expect("write"), 5);
        assert_eq!(bridge.write(b"second").expect("write"), 6);

        let sink = sink.lock().expect("lock");
        assert_eq!(sink.received, vec![b"first".to_vec(), b"second".to_vec()]);
    }
}
