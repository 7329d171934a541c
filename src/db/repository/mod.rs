//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`, one sub-module per table.
//! All public functions are re-exported here.

mod audit;
mod patient;
mod registration_token;
mod session;
mod user;

pub use audit::*;
pub use patient::*;
pub use registration_token::*;
pub use session::*;
pub use user::*;
