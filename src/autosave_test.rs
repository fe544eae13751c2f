use std::sync::atomic::{AtomicBool, Ordering};

use super::*;
use crate::input::{PointerEvent, PointerPhase};

// =========================================================================
// MockSink
// =========================================================================

#[derive(Default)]
struct MockSink {
    saved: Mutex<Vec<PersistedDocument>>,
    failing: AtomicBool,
}

impl MockSink {
    fn failing() -> Self {
        Self { failing: AtomicBool::new(true), ..Self::default() }
    }

    async fn count(&self) -> usize {
        self.saved.lock().await.len()
    }
}

#[async_trait::async_trait]
impl DocumentSink for MockSink {
    async fn save(&self, document: &PersistedDocument) -> Result<(), SaveError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SaveError::Rejected("offline".to_owned()));
        }
        self.saved.lock().await.push(document.clone());
        Ok(())
    }
}

fn dirty_engine() -> EngineCore {
    let mut engine = EngineCore::default();
    engine.on_pointer(&PointerEvent::pen(1, PointerPhase::Down, 100.0, 100.0, 0));
    engine.on_pointer(&PointerEvent::pen(1, PointerPhase::Move, 150.0, 150.0, 10));
    engine.on_pointer(&PointerEvent::pen(1, PointerPhase::Up, 150.0, 150.0, 20));
    assert!(engine.is_dirty());
    engine
}

// =========================================================================
// save_now
// =========================================================================

#[tokio::test]
async fn save_now_skips_clean_session() {
    let engine = Mutex::new(EngineCore::default());
    let sink = MockSink::default();
    assert!(!save_now(&engine, &sink).await.unwrap());
    assert_eq!(sink.count().await, 0);
}

#[tokio::test]
async fn save_now_writes_and_marks_clean() {
    let engine = Mutex::new(dirty_engine());
    let sink = MockSink::default();
    assert!(save_now(&engine, &sink).await.unwrap());
    assert!(!engine.lock().await.is_dirty());
    let saved = sink.saved.lock().await;
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].objects.len(), 2);
}

#[tokio::test]
async fn failed_save_keeps_session_dirty() {
    let engine = Mutex::new(dirty_engine());
    let sink = MockSink::failing();
    let err = save_now(&engine, &sink).await.unwrap_err();
    assert!(matches!(err, SaveError::Rejected(_)));
    assert!(engine.lock().await.is_dirty());
}

// =========================================================================
// Autosave task
// =========================================================================

#[tokio::test(start_paused = true)]
async fn autosave_saves_once_per_dirty_period() {
    let engine = Arc::new(Mutex::new(dirty_engine()));
    let sink = Arc::new(MockSink::default());
    let handle = spawn_autosave_task(engine.clone(), sink.clone(), Duration::from_secs(7));

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(sink.count().await, 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.count().await, 1);
    assert!(!engine.lock().await.is_dirty());

    tokio::time::sleep(Duration::from_secs(14)).await;
    assert_eq!(sink.count().await, 1);
    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn autosave_retries_after_failure() {
    let engine = Arc::new(Mutex::new(dirty_engine()));
    let sink = Arc::new(MockSink::failing());
    let handle = spawn_autosave_task(engine.clone(), sink.clone(), Duration::from_secs(7));

    tokio::time::sleep(Duration::from_secs(8)).await;
    assert!(engine.lock().await.is_dirty());

    sink.failing.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(sink.count().await, 1);
    assert!(!engine.lock().await.is_dirty());
    handle.abort();
}

#[test]
fn period_follows_config() {
    let config = EngineConfig { autosave_interval_ms: 2500, ..EngineConfig::default() };
    assert_eq!(autosave_period(&config), Duration::from_millis(2500));
}

// =========================================================================
// FileSink
// =========================================================================

#[tokio::test]
async fn file_sink_round_trips_document() {
    let path = std::env::temp_dir().join(format!("inkpage-{}.json", uuid::Uuid::new_v4()));
    let sink = FileSink::new(&path);
    let document = EngineCore::default().to_document().unwrap();
    sink.save(&document).await.unwrap();

    let raw = tokio::fs::read_to_string(&path).await.unwrap();
    assert_eq!(PersistedDocument::from_json(&raw).unwrap(), document);
    assert!(!path.with_extension("tmp").exists());
    tokio::fs::remove_file(&path).await.unwrap();
}

#[tokio::test]
async fn file_sink_reports_missing_directory() {
    let path = std::env::temp_dir().join(uuid::Uuid::new_v4().to_string()).join("doc.json");
    let document = EngineCore::default().to_document().unwrap();
    let err = FileSink::new(path).save(&document).await.unwrap_err();
    assert!(matches!(err, SaveError::Io(_)));
}
