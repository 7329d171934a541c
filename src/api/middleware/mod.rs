//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Rate limiter: reject early, save resources
//! 2. Auth validator: bearer session lookup
//! 3. Verification gate: approved doctors only, on gated routes
//! 4. Audit logger: logs after auth, has the doctor uid

pub mod audit;
pub mod auth;
pub mod gate;
pub mod rate;
