//! Core library for the fund-subscription portal.
//!
//! - `auth`: token stores and the `SessionManager` that owns the
//!   access/refresh token pair
//! - `api`: the `Gateway` that attaches credentials and refreshes on 401,
//!   and the `PortalClient` with one method per backend endpoint
//! - `models`: wire types for accounts, funds and subscriptions
//! - `config`: persisted application configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiError, Gateway, PortalClient};
pub use auth::{SessionManager, SessionState, TokenStore};
pub use config::Config;
