use crate::Result;
use crate::correlator::{CorrelatorStats, RequestCorrelator};
use crate::event::NetworkEvent;
use crate::record::RequestRecord;
use crate::session::{SessionInfo, SessionStorage, SessionSummary, SessionWriter};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Checkpoint cadence of a running capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Time-based checkpoint period; zero disables it
    pub flush_interval: Duration,
    /// Records appended before a checkpoint is forced; zero disables it
    pub flush_threshold: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(5),
            flush_threshold: 100,
        }
    }
}

/// Final accounting of a sealed capture
#[derive(Debug, Clone)]
pub struct CaptureReport {
    pub session: SessionSummary,
    pub stats: CorrelatorStats,
    pub events: usize,
    pub checkpoints: usize,
}

/// Owns the correlator and the session writer of one capture session.
///
/// Events arrive through a single channel, so every mutation of request
/// state and every append happens on the task running [`run`]. Closing
/// the channel ends the capture: open requests are flushed as abandoned
/// and the session is sealed.
///
/// [`run`]: CapturePipeline::run
pub struct CapturePipeline {
    correlator: RequestCorrelator,
    writer: SessionWriter,
    config: CaptureConfig,
    events: usize,
    checkpoints: usize,
}

impl CapturePipeline {
    pub fn new(info: SessionInfo, storage: impl SessionStorage + 'static, config: CaptureConfig) -> Self {
        let correlator = RequestCorrelator::new(info.session_id.clone());
        let writer = SessionWriter::new(info, storage);
        Self {
            correlator,
            writer,
            config,
            events: 0,
            checkpoints: 0,
        }
    }

    pub fn writer(&self) -> &SessionWriter {
        &self.writer
    }

    pub fn correlator(&self) -> &RequestCorrelator {
        &self.correlator
    }

    /// Apply one event and buffer the record it completes, if any
    pub fn ingest(&mut self, event: NetworkEvent) -> Result<()> {
        self.events += 1;
        if let Some(record) = self.correlator.apply(event) {
            self.append(record)?;
        }
        Ok(())
    }

    fn append(&mut self, record: RequestRecord) -> Result<()> {
        tracing::debug!(
            "Request {} finished: {} {} ({:?})",
            record.request_id,
            record.method,
            record.url,
            record.outcome()
        );
        self.writer.append(record)?;

        if self.config.flush_threshold > 0 && self.writer.pending() >= self.config.flush_threshold {
            self.checkpoint();
        }
        Ok(())
    }

    /// Persist a snapshot; a failed checkpoint is retried by the next one or by seal
    fn checkpoint(&mut self) {
        if self.writer.pending() == 0 {
            return;
        }
        match self.writer.checkpoint() {
            Ok(_) => self.checkpoints += 1,
            Err(e) => tracing::warn!("Checkpoint failed, will retry: {}", e),
        }
    }

    /// Consume events until the sender side closes, then flush and seal
    pub async fn run(mut self, mut events: mpsc::Receiver<NetworkEvent>) -> Result<CaptureReport> {
        tracing::info!(
            "Capture pipeline started for session {}",
            self.writer.session_id()
        );

        let mut ticker = (!self.config.flush_interval.is_zero()).then(|| {
            let period = self.config.flush_interval;
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.ingest(event)?,
                    None => break,
                },
                _ = next_tick(ticker.as_mut()) => self.checkpoint(),
            }
        }

        tracing::info!(
            "Capture intake closed after {} events, {} requests still open",
            self.events,
            self.correlator.in_flight()
        );
        self.finish()
    }

    /// Flush open requests and seal the session
    pub fn finish(mut self) -> Result<CaptureReport> {
        for record in self.correlator.flush() {
            self.writer.append(record)?;
        }

        let session = self.writer.seal()?;
        let stats = self.correlator.stats().clone();

        if stats.ignored_unknown > 0 || stats.ignored_late > 0 {
            tracing::debug!(
                "Ignored {} events for unknown requests and {} late events",
                stats.ignored_unknown,
                stats.ignored_late
            );
        }

        Ok(CaptureReport {
            session,
            stats,
            events: self.events,
            checkpoints: self.checkpoints,
        })
    }
}

async fn next_tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Run a capture pipeline over `events` until the channel closes
pub async fn run_capture(
    info: SessionInfo,
    storage: impl SessionStorage + 'static,
    config: CaptureConfig,
    events: mpsc::Receiver<NetworkEvent>,
) -> Result<CaptureReport> {
    CapturePipeline::new(info, storage, config).run(events).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::record::{RequestOutcome, ResourceType};
    use crate::session::{SessionDocument, SessionId};
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct MemoryStorage {
        published: Arc<Mutex<Vec<SessionDocument>>>,
    }

    impl SessionStorage for MemoryStorage {
        fn publish(&self, document: &SessionDocument) -> Result<()> {
            self.published.lock().unwrap().push(document.clone());
            Ok(())
        }
    }

    struct FailingStorage;

    impl SessionStorage for FailingStorage {
        fn publish(&self, _document: &SessionDocument) -> Result<()> {
            Err(Error::Io(std::io::Error::other("read-only")))
        }
    }

    fn info() -> SessionInfo {
        SessionInfo {
            session_id: SessionId::new("20240101_120000"),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    fn quiet() -> CaptureConfig {
        CaptureConfig {
            flush_interval: Duration::ZERO,
            flush_threshold: 0,
        }
    }

    #[tokio::test]
    async fn test_pipeline_correlates_and_seals() {
        let storage = MemoryStorage::default();
        let (tx, rx) = mpsc::channel(16);

        let handle = tokio::spawn(run_capture(info(), storage.clone(), quiet(), rx));

        tx.send(NetworkEvent::request_sent("1", 0.0, "GET", "https://a.com/x", ResourceType::Script))
            .await
            .unwrap();
        tx.send(NetworkEvent::response_received("1", 50.0, 200, Some("text/javascript"), None))
            .await
            .unwrap();
        tx.send(NetworkEvent::body_received("1", 120.0, Some(1000)))
            .await
            .unwrap();
        tx.send(NetworkEvent::request_sent("2", 10.0, "GET", "https://b.com/", ResourceType::Document))
            .await
            .unwrap();
        drop(tx);

        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.events, 4);
        assert_eq!(report.stats.completed, 1);
        assert_eq!(report.stats.abandoned, 1);
        assert_eq!(report.session.total_records, 2);
        assert!(report.session.info.ended_at.is_some());

        let published = storage.published.lock().unwrap();
        let a = published.iter().find(|d| d.domain == "a.com").unwrap();
        assert_eq!(a.records[0].duration_ms, Some(120.0));
        assert_eq!(a.records[0].status_code, Some(200));
        assert_eq!(a.records[0].encoded_body_size, Some(1000));

        let b = published.iter().find(|d| d.domain == "b.com").unwrap();
        assert_eq!(b.records[0].outcome(), RequestOutcome::Abandoned);
        assert!(published.iter().all(|d| d.ended_at.is_some()));
    }

    #[tokio::test]
    async fn test_threshold_triggers_checkpoint_before_seal() {
        let storage = MemoryStorage::default();
        let (tx, rx) = mpsc::channel(16);
        let config = CaptureConfig {
            flush_interval: Duration::ZERO,
            flush_threshold: 2,
        };

        for id in ["1", "2"] {
            tx.send(NetworkEvent::request_sent(id, 0.0, "GET", "https://a.com/", ResourceType::Fetch))
                .await
                .unwrap();
            tx.send(NetworkEvent::load_failed(id, 5.0, "net::ERR_ABORTED"))
                .await
                .unwrap();
        }
        drop(tx);

        let report = run_capture(info(), storage.clone(), config, rx).await.unwrap();
        assert_eq!(report.checkpoints, 1);
        assert_eq!(report.stats.failed, 2);

        let published = storage.published.lock().unwrap();
        // one checkpoint plus the seal
        assert_eq!(published.len(), 2);
        assert!(published[0].ended_at.is_none());
        assert!(published[1].ended_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_checkpoint() {
        let storage = MemoryStorage::default();
        let (tx, rx) = mpsc::channel(16);
        let config = CaptureConfig {
            flush_interval: Duration::from_secs(1),
            flush_threshold: 0,
        };

        let handle = tokio::spawn(run_capture(info(), storage.clone(), config, rx));
        tx.send(NetworkEvent::request_sent("1", 0.0, "GET", "https://a.com/", ResourceType::Fetch))
            .await
            .unwrap();
        tx.send(NetworkEvent::body_received("1", 5.0, Some(3)))
            .await
            .unwrap();

        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(storage.published.lock().unwrap().len(), 1);

        drop(tx);
        let report = handle.await.unwrap().unwrap();
        assert_eq!(report.checkpoints, 1);
        assert_eq!(storage.published.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_seal_failure_is_reported() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(NetworkEvent::request_sent("1", 0.0, "GET", "https://a.com/", ResourceType::Fetch))
            .await
            .unwrap();
        drop(tx);

        let err = run_capture(info(), FailingStorage, quiet(), rx).await.unwrap_err();
        assert!(matches!(err, Error::SessionWrite { .. }));
    }

    #[tokio::test]
    async fn test_empty_capture_seals_nothing() {
        let storage = MemoryStorage::default();
        let (tx, rx) = mpsc::channel::<NetworkEvent>(1);
        drop(tx);

        let report = run_capture(info(), storage.clone(), quiet(), rx).await.unwrap();
        assert_eq!(report.session.total_records, 0);
        assert!(storage.published.lock().unwrap().is_empty());
    }
}
