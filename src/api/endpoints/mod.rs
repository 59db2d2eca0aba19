//! API endpoint handlers.
//!
//! Handlers stay thin: parse the request, call the service module, wrap the
//! result in the response envelope.

pub mod adherence;
pub mod family;
pub mod health;
pub mod medications;
pub mod notifications;
pub mod patients;
