//! Saving: the save collaborator trait and the periodic autosave task.
//!
//! DESIGN
//! ======
//! A save is two-phase. The document is captured under the engine lock,
//! written with the lock released, and the outcome is reported back under
//! the lock. Edits made while a write is in flight land after the captured
//! state, so they keep the session dirty.
//!
//! ERROR HANDLING
//! ==============
//! The saved marker moves only when the sink reports success. A failed
//! autosave is logged and retried on the next tick; the session stays dirty
//! in the meantime.

#[cfg(test)]
#[path = "autosave_test.rs"]
mod autosave_test;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::EngineCore;
use crate::persist::{PersistError, PersistedDocument};

/// Errors reported by a save.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("document error: {0}")]
    Document(#[from] PersistError),
    #[error("save rejected: {0}")]
    Rejected(String),
}

/// Destination for saved documents. Enables mocking in tests.
#[async_trait::async_trait]
pub trait DocumentSink: Send + Sync {
    /// Persist `document`.
    ///
    /// # Errors
    ///
    /// Returns a [`SaveError`] when the document could not be stored.
    async fn save(&self, document: &PersistedDocument) -> Result<(), SaveError>;
}

/// Writes the document as pretty JSON to a file, replacing it atomically.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl DocumentSink for FileSink {
    async fn save(&self, document: &PersistedDocument) -> Result<(), SaveError> {
        let body = document.to_json()?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "document written");
        Ok(())
    }
}

/// Save the session if it is dirty.
///
/// Returns `Ok(false)` when there was nothing to save.
///
/// # Errors
///
/// Returns the sink's error, or a document error when the session cannot be
/// serialized. The session stays dirty either way.
pub async fn save_now(engine: &Mutex<EngineCore>, sink: &dyn DocumentSink) -> Result<bool, SaveError> {
    let ticket = {
        let mut core = engine.lock().await;
        if !core.is_dirty() {
            return Ok(false);
        }
        core.prepare_save()?
    };
    let result = sink.save(&ticket.document).await;
    engine.lock().await.complete_save(&ticket, &result);
    result.map(|()| true)
}

/// Autosave period from the session config.
#[must_use]
pub fn autosave_period(config: &EngineConfig) -> Duration {
    Duration::from_millis(config.autosave_interval_ms.max(1))
}

/// Spawn the periodic autosave task. Returns a handle for shutdown.
pub fn spawn_autosave_task(
    engine: Arc<Mutex<EngineCore>>,
    sink: Arc<dyn DocumentSink>,
    period: Duration,
) -> JoinHandle<()> {
    info!(?period, "autosave configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match save_now(&engine, sink.as_ref()).await {
                Ok(true) => debug!("autosaved"),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "autosave failed; will retry"),
            }
        }
    })
}
