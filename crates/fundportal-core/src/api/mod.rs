//! REST API layer for the portal backend.
//!
//! - `Gateway`: attaches the bearer token and refreshes it on 401,
//!   retrying the original request once
//! - `PortalClient`: typed operations for login, registration, account,
//!   funds and subscriptions
//! - `Transport`: the HTTP seam, backed by reqwest in production

pub mod client;
pub mod error;
pub mod gateway;
pub mod transport;

pub use client::PortalClient;
pub use error::{ApiError, FieldErrors};
pub use gateway::Gateway;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
