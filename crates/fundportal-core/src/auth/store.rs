use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Token file name in cache directory
const TOKEN_FILE: &str = "tokens.json";

/// The two values a session persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    /// Fixed storage key for this token
    pub fn key(self) -> &'static str {
        match self {
            TokenKind::Access => "authToken",
            TokenKind::Refresh => "refreshToken",
        }
    }
}

/// Persistent storage for the access/refresh token pair.
///
/// Values are opaque strings; validation happens in `SessionManager`.
/// Implementations must be Send + Sync so a store can be shared between
/// the session manager and in-flight requests.
pub trait TokenStore: Send + Sync {
    fn get(&self, kind: TokenKind) -> Result<Option<String>>;

    /// Persist `token`, overwriting any prior value
    fn set(&self, kind: TokenKind, token: &str) -> Result<()>;

    /// Remove the value; removing an absent value is not an error
    fn remove(&self, kind: TokenKind) -> Result<()>;
}

/// Process-local store. Used by tests and the `memory` token storage setting.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<TokenKind, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, kind: TokenKind) -> Result<Option<String>> {
        let tokens = self
            .tokens
            .read()
            .map_err(|_| anyhow!("token store lock poisoned"))?;
        Ok(tokens.get(&kind).cloned())
    }

    fn set(&self, kind: TokenKind, token: &str) -> Result<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| anyhow!("token store lock poisoned"))?;
        tokens.insert(kind, token.to_string());
        Ok(())
    }

    fn remove(&self, kind: TokenKind) -> Result<()> {
        let mut tokens = self
            .tokens
            .write()
            .map_err(|_| anyhow!("token store lock poisoned"))?;
        tokens.remove(&kind);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(rename = "authToken", default, skip_serializing_if = "Option::is_none")]
    access: Option<String>,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    refresh: Option<String>,
}

impl StoredTokens {
    fn slot(&mut self, kind: TokenKind) -> &mut Option<String> {
        match kind {
            TokenKind::Access => &mut self.access,
            TokenKind::Refresh => &mut self.refresh,
        }
    }

    fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }
}

/// Stores tokens as JSON in the cache directory (`tokens.json`).
///
/// The file is deleted once both tokens are removed.
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(TOKEN_FILE),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<StoredTokens> {
        if !self.path.exists() {
            return Ok(StoredTokens::default());
        }
        let contents = std::fs::read_to_string(&self.path).context("Failed to read token file")?;
        serde_json::from_str(&contents).context("Failed to parse token file")
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }

    /// Write to a sibling temp file created owner-only, then rename it over
    /// the token file so readers never see a partial write.
    fn save(&self, tokens: &StoredTokens) -> Result<()> {
        if tokens.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path).context("Failed to remove token file")?;
                debug!(path = %self.path.display(), "Token file removed");
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(tokens)?;
        let temp = self.temp_path();
        // A leftover temp file would keep its old permissions
        if temp.exists() {
            std::fs::remove_file(&temp).context("Failed to remove stale token file")?;
        }
        {
            let mut file = open_private(&temp).context("Failed to create token file")?;
            file.write_all(contents.as_bytes())
                .context("Failed to write token file")?;
            file.sync_all().context("Failed to write token file")?;
        }
        std::fs::rename(&temp, &self.path).context("Failed to replace token file")?;
        Ok(())
    }

    fn update(&self, kind: TokenKind, value: Option<&str>) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("token file lock poisoned"))?;
        // An unreadable file must not block writes; it is replaced
        let mut tokens = self.load().unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "Discarding unreadable token file");
            StoredTokens::default()
        });
        *tokens.slot(kind) = value.map(str::to_string);
        self.save(&tokens)
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, kind: TokenKind) -> Result<Option<String>> {
        let mut tokens = self.load()?;
        Ok(tokens.slot(kind).take())
    }

    fn set(&self, kind: TokenKind, token: &str) -> Result<()> {
        self.update(kind, Some(token))
    }

    fn remove(&self, kind: TokenKind) -> Result<()> {
        self.update(kind, None)
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
