//! API middleware stack.
//!
//! Execution order on protected routes (outermost → innermost):
//! 1. Auth: resolve `X-Patient-Id` to an active patient
//! 2. Audit: log method, path, status after auth has run

pub mod audit;
pub mod auth;
