//! API endpoint handlers.
//!
//! Each module corresponds to a front-end screen or flow. Handlers hold the
//! database lock only for synchronous work and call into the domain modules.

pub mod access;
pub mod auth;
pub mod health;
pub mod patients;
pub mod profile;
pub mod registration;
