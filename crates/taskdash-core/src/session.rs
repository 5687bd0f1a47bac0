use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Credentials kept between invocations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub login: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[tracing::instrument(skip(self), fields(file = %self.path.display()))]
    pub fn load(&self) -> anyhow::Result<Option<Session>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no session file");
                return Ok(None);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed reading {}", self.path.display()));
            }
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        let session: Session = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing session file {}", self.path.display()))?;
        debug!(login = %session.login, "loaded session");
        Ok(Some(session))
    }

    #[tracing::instrument(skip(self, session), fields(file = %self.path.display(), login = %session.login))]
    pub fn save(&self, session: &Session) -> anyhow::Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

        let mut temp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut temp, session)?;
        writeln!(temp)?;
        temp.flush()?;
        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;

        info!("saved session");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(file = %self.path.display()))]
    pub fn clear(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("cleared session");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| format!("failed removing {}", self.path.display())),
        }
    }
}
