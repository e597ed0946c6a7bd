use super::format;
use super::types::{SessionDocument, SessionFormat, SessionId};
use crate::Result;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Durable backing for session partitions.
///
/// `publish` must be atomic per partition: readers observe either the
/// previous content or the complete new content, never a partial write.
pub trait SessionStorage: Send {
    fn publish(&self, document: &SessionDocument) -> Result<()>;
}

/// Filesystem storage rooted at a data directory.
///
/// Partitions live at `<root>/<domain>/session_<id>.json` and `.csv`.
#[derive(Debug, Clone)]
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn partition_path(&self, domain: &str, session_id: &SessionId, format: SessionFormat) -> PathBuf {
        self.root
            .join(partition_dir_name(domain))
            .join(session_file_name(session_id, format))
    }

    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        // The temp file lives next to the target so the rename stays on
        // one filesystem.
        let mut tmp = tempfile::Builder::new()
            .prefix(".slowpro-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl SessionStorage for DirectoryStorage {
    fn publish(&self, document: &SessionDocument) -> Result<()> {
        let json_path = self.partition_path(&document.domain, &document.session_id, SessionFormat::Json);
        let csv_path = self.partition_path(&document.domain, &document.session_id, SessionFormat::Csv);

        tracing::debug!(
            "Publishing {} records to {}",
            document.records.len(),
            json_path.display()
        );

        // Encode both forms before touching the disk.
        let json = format::encode_json(document)?;
        let csv = format::encode_csv(&document.records)?;

        Self::write_atomic(&csv_path, &csv)?;
        Self::write_atomic(&json_path, &json)?;
        Ok(())
    }
}

/// File name of a session partition
pub fn session_file_name(session_id: &SessionId, format: SessionFormat) -> String {
    format!("session_{}.{}", session_id, format.extension())
}

/// Directory name for a domain partition.
///
/// Characters that are not valid in file names on common platforms, and `%`
/// itself, are written as `%XX` so [`partition_domain`] can recover the
/// domain.
pub fn partition_dir_name(domain: &str) -> String {
    let mut name = String::with_capacity(domain.len());
    for c in domain.chars() {
        match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '%' => {
                name.push_str(&format!("%{:02X}", c as u32));
            }
            c => name.push(c),
        }
    }
    name
}

/// Domain stored in a partition directory named by [`partition_dir_name`].
///
/// Names without a valid escape are taken as is.
pub fn partition_domain(dir_name: &str) -> String {
    let bytes = dir_name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(byte) = dir_name
                .get(i + 1..i + 3)
                .filter(|hex| hex.bytes().all(|b| b.is_ascii_hexdigit()))
                .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        {
            decoded.push(byte);
            i += 3;
            continue;
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(decoded).unwrap_or_else(|_| dir_name.to_string())
}
