use anyhow::{Context, Result};
use keyring::Entry;

use super::store::{TokenKind, TokenStore};

const SERVICE_NAME: &str = "fundportal";

/// Stores tokens in the OS keychain, one entry per token key.
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a custom keychain service name (e.g. one per backend environment)
    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, kind: TokenKind) -> Result<Entry> {
        Entry::new(&self.service, kind.key()).context("Failed to create keyring entry")
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn get(&self, kind: TokenKind) -> Result<Option<String>> {
        match self.entry(kind)?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve token from keychain"),
        }
    }

    fn set(&self, kind: TokenKind, token: &str) -> Result<()> {
        self.entry(kind)?
            .set_password(token)
            .context("Failed to store token in keychain")
    }

    fn remove(&self, kind: TokenKind) -> Result<()> {
        match self.entry(kind)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete token from keychain"),
        }
    }
}
