use super::storage::SessionStorage;
use super::types::{SessionDocument, SessionId, SessionInfo};
use crate::record::RequestRecord;
use crate::{Error, Result};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of sealing a session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub info: SessionInfo,
    pub total_records: usize,
    pub domains: Vec<(String, usize)>,
}

/// Buffers the records of the active session, partitioned by domain.
///
/// The writer is the single mutation point for a session's records. Once
/// sealed it rejects further appends.
pub struct SessionWriter {
    info: SessionInfo,
    storage: Box<dyn SessionStorage>,
    partitions: BTreeMap<String, Vec<RequestRecord>>,
    dirty: BTreeSet<String>,
    appended_since_checkpoint: usize,
    sealed: bool,
}

impl SessionWriter {
    pub fn new(info: SessionInfo, storage: impl SessionStorage + 'static) -> Self {
        Self {
            info,
            storage: Box::new(storage),
            partitions: BTreeMap::new(),
            dirty: BTreeSet::new(),
            appended_since_checkpoint: 0,
            sealed: false,
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn session_id(&self) -> &SessionId {
        &self.info.session_id
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Total buffered records across all domains
    pub fn record_count(&self) -> usize {
        self.partitions.values().map(Vec::len).sum()
    }

    /// Records appended since the last checkpoint or seal
    pub fn pending(&self) -> usize {
        self.appended_since_checkpoint
    }

    pub fn partition(&self, domain: &str) -> Option<&[RequestRecord]> {
        self.partitions.get(domain).map(Vec::as_slice)
    }

    /// Buffer a finished record in its domain partition
    pub fn append(&mut self, record: RequestRecord) -> Result<()> {
        if self.sealed {
            return Err(Error::InvalidState(format!(
                "session {} is sealed; cannot append request {}",
                self.info.session_id, record.request_id
            )));
        }
        if record.session_id != self.info.session_id {
            return Err(Error::InvalidState(format!(
                "request {} belongs to session {}, not {}",
                record.request_id, record.session_id, self.info.session_id
            )));
        }

        self.dirty.insert(record.domain.clone());
        self.partitions
            .entry(record.domain.clone())
            .or_default()
            .push(record);
        self.appended_since_checkpoint += 1;
        Ok(())
    }

    /// Persist partitions changed since the last checkpoint without sealing.
    ///
    /// Returns the number of partitions written.
    pub fn checkpoint(&mut self) -> Result<usize> {
        if self.sealed {
            return Err(Error::InvalidState(format!(
                "session {} is sealed",
                self.info.session_id
            )));
        }

        let dirty: Vec<String> = self.dirty.iter().cloned().collect();
        for domain in &dirty {
            self.publish_partition(domain)?;
            self.dirty.remove(domain);
        }

        if !dirty.is_empty() {
            tracing::debug!(
                "Checkpointed {} partitions of session {}",
                dirty.len(),
                self.info.session_id
            );
        }
        self.appended_since_checkpoint = 0;
        Ok(dirty.len())
    }

    /// Persist every partition with the session end time and mark the
    /// session immutable.
    ///
    /// On failure the session stays unsealed; partitions already published
    /// remain complete on disk.
    pub fn seal(&mut self) -> Result<SessionSummary> {
        if self.sealed {
            return Err(Error::InvalidState(format!(
                "session {} is already sealed",
                self.info.session_id
            )));
        }

        self.info.ended_at = Some(Utc::now());

        let domains: Vec<String> = self.partitions.keys().cloned().collect();
        for domain in &domains {
            self.publish_partition(domain)?;
        }

        self.sealed = true;
        self.dirty.clear();
        self.appended_since_checkpoint = 0;

        let summary = SessionSummary {
            info: self.info.clone(),
            total_records: self.record_count(),
            domains: self
                .partitions
                .iter()
                .map(|(domain, records)| (domain.clone(), records.len()))
                .collect(),
        };

        tracing::info!(
            "Sealed session {} with {} records across {} domains",
            self.info.session_id,
            summary.total_records,
            summary.domains.len()
        );

        Ok(summary)
    }

    fn publish_partition(&self, domain: &str) -> Result<()> {
        let records = self.partitions.get(domain).cloned().unwrap_or_default();
        let document = SessionDocument {
            session_id: self.info.session_id.clone(),
            domain: domain.to_string(),
            started_at: self.info.started_at,
            ended_at: self.info.ended_at,
            records,
        };

        self.storage
            .publish(&document)
            .map_err(|source| Error::SessionWrite {
                session_id: self.info.session_id.to_string(),
                source: Box::new(source),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ResourceType;
    use std::sync::{Arc, Mutex};

    /// In-memory storage recording each published document
    #[derive(Clone, Default)]
    struct MemoryStorage {
        published: Arc<Mutex<Vec<SessionDocument>>>,
        fail: bool,
    }

    impl SessionStorage for MemoryStorage {
        fn publish(&self, document: &SessionDocument) -> Result<()> {
            if self.fail {
                return Err(Error::Io(std::io::Error::other("disk full")));
            }
            self.published.lock().unwrap().push(document.clone());
            Ok(())
        }
    }

    fn info() -> SessionInfo {
        SessionInfo {
            session_id: SessionId::new("20240101_120000"),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    fn record(id: &str, domain: &str) -> RequestRecord {
        RequestRecord {
            request_id: id.to_string(),
            url: format!("https://{}/{}", domain, id),
            domain: domain.to_string(),
            method: "GET".to_string(),
            resource_type: ResourceType::Script,
            mime_type: None,
            start_time: 0.0,
            end_time: Some(10.0),
            status_code: Some(200),
            encoded_body_size: Some(10),
            duration_ms: Some(10.0),
            failed: false,
            error_text: None,
            session_id: SessionId::new("20240101_120000"),
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_partitions_by_domain() {
        let mut writer = SessionWriter::new(info(), MemoryStorage::default());
        writer.append(record("1", "a.com")).unwrap();
        writer.append(record("2", "b.com")).unwrap();
        writer.append(record("3", "a.com")).unwrap();

        assert_eq!(writer.partition("a.com").unwrap().len(), 2);
        assert_eq!(writer.partition("b.com").unwrap().len(), 1);
        assert_eq!(writer.record_count(), 3);
        assert_eq!(writer.pending(), 3);
    }

    #[test]
    fn test_seal_publishes_every_partition() {
        let storage = MemoryStorage::default();
        let mut writer = SessionWriter::new(info(), storage.clone());
        writer.append(record("1", "a.com")).unwrap();
        writer.append(record("2", "b.com")).unwrap();

        let summary = writer.seal().unwrap();
        assert!(writer.is_sealed());
        assert_eq!(summary.total_records, 2);
        assert!(summary.info.ended_at.is_some());

        let published = storage.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert!(published.iter().all(|d| d.ended_at.is_some()));
    }

    #[test]
    fn test_append_after_seal_is_invalid_state() {
        let mut writer = SessionWriter::new(info(), MemoryStorage::default());
        writer.seal().unwrap();

        let err = writer.append(record("1", "a.com")).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));
        assert!(matches!(writer.seal().unwrap_err(), Error::InvalidState(_)));
    }

    #[test]
    fn test_append_rejects_foreign_session() {
        let mut writer = SessionWriter::new(info(), MemoryStorage::default());
        let mut foreign = record("1", "a.com");
        foreign.session_id = SessionId::new("19990101_000000");
        assert!(matches!(writer.append(foreign), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_checkpoint_only_writes_dirty_partitions() {
        let storage = MemoryStorage::default();
        let mut writer = SessionWriter::new(info(), storage.clone());
        writer.append(record("1", "a.com")).unwrap();
        writer.append(record("2", "b.com")).unwrap();
        assert_eq!(writer.checkpoint().unwrap(), 2);
        assert_eq!(writer.pending(), 0);

        writer.append(record("3", "a.com")).unwrap();
        assert_eq!(writer.checkpoint().unwrap(), 1);

        let published = storage.published.lock().unwrap();
        let last = published.last().unwrap();
        assert_eq!(last.domain, "a.com");
        assert_eq!(last.records.len(), 2);
        assert!(last.ended_at.is_none());
    }

    #[test]
    fn test_storage_failure_reports_session_and_stays_unsealed() {
        let storage = MemoryStorage {
            fail: true,
            ..Default::default()
        };
        let mut writer = SessionWriter::new(info(), storage);
        writer.append(record("1", "a.com")).unwrap();

        let err = writer.seal().unwrap_err();
        assert!(matches!(err, Error::SessionWrite { .. }));
        assert!(err.to_string().contains("20240101_120000"));
        assert!(!writer.is_sealed());
    }
}
