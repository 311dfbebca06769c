//! In-memory transport that records everything the device facade sends.
//!
//! Used by the test suites.
//! The log is shared, so a test can keep a [`TransportLog`] handle after the
//! transport itself has been moved into a session.

use crate::error::{Error, Result};
use crate::hardware::Transport;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    Frame(Vec<u8>),
}

/// Shared handle onto the events recorded by a [`RecordingTransport`].
#[derive(Debug, Clone, Default)]
pub struct TransportLog {
    events: Arc<Mutex<Vec<TransportEvent>>>,
    failing: Arc<AtomicBool>,
}

impl TransportLog {
    pub fn events(&self) -> Vec<TransportEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }

    /// While set, every send fails with [`Error::Transport`] and nothing is
    /// recorded.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, event: TransportEvent) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::Transport("link down".to_string()));
        }
        self.events
            .lock()
            .map_err(|_| Error::Transport("transport log poisoned".to_string()))?
            .push(event);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingTransport {
    log: TransportLog,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> TransportLog {
        self.log.clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_text(&mut self, command: &str) -> Result<()> {
        // Give other tasks a chance to run so missing locking shows up as
        // interleaved events.
        tokio::task::yield_now().await;
        self.log.record(TransportEvent::Text(command.to_string()))
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        tokio::task::yield_now().await;
        self.log.record(TransportEvent::Frame(frame.to_vec()))
    }
}
