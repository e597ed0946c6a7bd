use super::format;
use super::storage::partition_domain;
use super::types::{PartitionRef, SessionFormat, SessionId};
use crate::filter::DomainFilter;
use crate::record::RequestRecord;
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Which persisted partitions to load
#[derive(Debug, Clone, Default)]
pub struct Selection {
    pub domains: Option<DomainFilter>,
    pub sessions: Option<Vec<SessionId>>,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn session(session_id: SessionId) -> Self {
        Self {
            domains: None,
            sessions: Some(vec![session_id]),
        }
    }

    fn includes(&self, partition: &PartitionRef) -> bool {
        let domain_ok = self
            .domains
            .as_ref()
            .is_none_or(|filter| filter.matches(&partition.domain));
        let session_ok = self
            .sessions
            .as_ref()
            .is_none_or(|ids| ids.contains(&partition.session_id));
        domain_ok && session_ok
    }
}

/// Reads persisted sessions from a data directory
#[derive(Debug, Clone)]
pub struct SessionLoader {
    root: PathBuf,
}

impl SessionLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// List every `domain/sessionId` partition on disk, ordered by session
    /// then domain
    pub fn discover(&self) -> Result<Vec<PartitionRef>> {
        tracing::debug!("Discovering sessions in: {}", self.root.display());

        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let pattern = format!("{}/*/session_*.*", root);
        let paths = glob::glob(&pattern)
            .map_err(|e| Error::InvalidPattern(format!("Invalid data directory pattern: {}", e)))?;

        let mut partitions: BTreeMap<(SessionId, String), PartitionRef> = BTreeMap::new();
        for entry in paths {
            let path = entry.map_err(|e| Error::Io(e.into_error()))?;
            let Some((domain, session_id, format)) = parse_partition_path(&path) else {
                continue;
            };

            let partition = partitions
                .entry((session_id.clone(), domain.clone()))
                .or_insert_with(|| PartitionRef {
                    domain,
                    session_id,
                    json_path: None,
                    csv_path: None,
                });
            match format {
                SessionFormat::Json => partition.json_path = Some(path),
                SessionFormat::Csv => partition.csv_path = Some(path),
            }
        }

        tracing::info!("Found {} session partitions", partitions.len());
        Ok(partitions.into_values().collect())
    }

    /// Distinct session ids, oldest first
    pub fn sessions(&self) -> Result<Vec<SessionId>> {
        let mut ids: Vec<SessionId> = self
            .discover()?
            .into_iter()
            .map(|partition| partition.session_id)
            .collect();
        ids.dedup();
        Ok(ids)
    }

    /// Distinct domains, sorted
    pub fn domains(&self) -> Result<Vec<String>> {
        let mut domains: Vec<String> = self
            .discover()?
            .into_iter()
            .map(|partition| partition.domain)
            .collect();
        domains.sort();
        domains.dedup();
        Ok(domains)
    }

    pub fn latest_session(&self) -> Result<SessionId> {
        self.sessions()?.pop().ok_or_else(|| {
            Error::NotFound(format!("no sessions in {}", self.root.display()))
        })
    }

    /// Load a session by id, or a single partition file by path
    pub fn load(&self, session_or_path: &str) -> Result<Vec<RequestRecord>> {
        let path = Path::new(session_or_path);
        if path.is_file() {
            return Self::read_file(path);
        }

        self.load_selection(&Selection::session(SessionId::new(session_or_path)))
            .map_err(|e| match e {
                Error::NotFound(_) => Error::NotFound(format!(
                    "session {} not found in {}",
                    session_or_path,
                    self.root.display()
                )),
                other => other,
            })
    }

    /// Load every session, optionally restricted to matching domains
    pub fn load_all(&self, domain_filter: Option<&DomainFilter>) -> Result<Vec<RequestRecord>> {
        self.load_selection(&Selection {
            domains: domain_filter.cloned(),
            sessions: None,
        })
    }

    /// Load all partitions included by a selection and merge their records
    pub fn load_selection(&self, selection: &Selection) -> Result<Vec<RequestRecord>> {
        let partitions = self.discover()?;
        if partitions.is_empty() {
            return Err(Error::NotFound(format!(
                "no session files in {}",
                self.root.display()
            )));
        }

        let selected: Vec<&PartitionRef> = partitions
            .iter()
            .filter(|partition| selection.includes(partition))
            .collect();
        if selected.is_empty() {
            return Err(Error::NotFound(
                "no sessions match the selected filters".to_string(),
            ));
        }

        tracing::info!("Loading {} session files", selected.len());

        let mut records = Vec::new();
        for partition in selected {
            if let Some(path) = partition.primary_path() {
                records.extend(Self::read_file(path)?);
            }
        }

        tracing::info!("Loaded {} requests", records.len());
        Ok(records)
    }

    /// Read one partition file; the extension selects the decoder
    pub fn read_file(path: &Path) -> Result<Vec<RequestRecord>> {
        tracing::debug!("Reading session file: {}", path.display());

        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(SessionFormat::from_extension)
            .ok_or_else(|| Error::corrupt(path, "unsupported session file extension"))?;

        let bytes = std::fs::read(path)?;
        match format {
            SessionFormat::Json => format::decode_json(&bytes, path),
            SessionFormat::Csv => format::decode_csv(&bytes, path),
        }
    }
}

/// Split `<domain>/session_<id>.<ext>` into its parts
fn parse_partition_path(path: &Path) -> Option<(String, SessionId, SessionFormat)> {
    let format = SessionFormat::from_extension(path.extension()?.to_str()?)?;
    let stem = path.file_stem()?.to_str()?;
    let session_id = stem.strip_prefix("session_")?;
    if session_id.is_empty() {
        return None;
    }
    let dir_name = path.parent()?.file_name()?.to_str()?;
    Some((partition_domain(dir_name), SessionId::new(session_id), format))
}
