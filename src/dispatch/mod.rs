// src/dispatch/mod.rs - Request line -> session command -> reply line
pub mod format;
pub mod parser;

pub use parser::{parse, Command};

use crate::error::Result;
use crate::session::Session;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const ERROR_PREFIX: &str = "ERROR:";

/// Shared entry point for every connection.
///
/// Cloning is cheap; all clones serialize on the same session lock, which
/// is held for the full execution of one command.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    session: Arc<Mutex<Session>>,
}

impl Dispatcher {
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    pub fn session(&self) -> Arc<Mutex<Session>> {
        self.session.clone()
    }

    /// Handle one request line and produce the reply line (no terminator).
    /// Failures come back as `ERROR:<description>`.
    pub async fn dispatch(&self, line: &str) -> String {
        match self.try_dispatch(line).await {
            Ok(reply) => {
                tracing::debug!("'{}' -> '{}'", line, reply);
                reply
            }
            Err(e) => {
                tracing::debug!("'{}' failed: {}", line, e);
                format!("{}{}", ERROR_PREFIX, e)
            }
        }
    }

    async fn try_dispatch(&self, line: &str) -> Result<String> {
        let command = parse(line.trim())?;
        self.execute(command).await
    }

    pub async fn execute(&self, command: Command) -> Result<String> {
        let mut session = self.session.lock().await;
        session.execute(command).await
    }
}
