//! Authentication module for managing the portal session.
//!
//! This module provides:
//! - `TokenStore`: persistence seam for the two opaque tokens, with
//!   in-memory, JSON file and OS keychain implementations
//! - `SessionManager`: the access/refresh token lifecycle
//! - `UserIdentity`: best-effort display identity decoded from the access token

pub mod claims;
pub mod credentials;
pub mod session;
pub mod store;

pub use claims::{TokenClaims, UserIdentity};
pub use credentials::KeyringTokenStore;
pub use session::{SessionManager, SessionState};
pub use store::{FileTokenStore, MemoryTokenStore, TokenKind, TokenStore};
