use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Owns the Chrome user-data directory of one capture run
pub struct ProfileManager {
    path: PathBuf,
    is_temporary: bool,
}

impl ProfileManager {
    /// Create a throwaway profile, removed on drop
    pub fn temporary() -> Result<Self> {
        let path = tempfile::Builder::new()
            .prefix("slowpro-profile-")
            .tempdir()?
            .keep();

        Ok(Self {
            path,
            is_temporary: true,
        })
    }

    /// Use (or create) the named profile under `~/.slowpro/profiles`
    pub fn named(name: &str) -> Result<Self> {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(Error::Browser(format!("Invalid profile name: {:?}", name)));
        }
        Self::persistent(profiles_root()?.join(name))
    }

    /// Use (or create) a persistent profile at `path`
    pub fn persistent(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)?;

        Ok(Self {
            path,
            is_temporary: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_temporary(&self) -> bool {
        self.is_temporary
    }
}

impl Drop for ProfileManager {
    fn drop(&mut self) {
        if self.is_temporary && self.path.exists() {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }
}

pub fn profiles_root() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".slowpro").join("profiles"))
        .ok_or_else(|| Error::Browser("Could not determine home directory".to_string()))
}
