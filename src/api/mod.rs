//! HTTP API.
//!
//! JSON endpoints for the clinic front-end, nested under `/api/`. Public
//! routes are rate-limited only; doctor routes add bearer auth, and
//! doctor-only data adds the verification gate.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server_on, ApiServer, ServerError};
pub use types::ApiContext;
