//! HTTP API.
//!
//! Exposes the medication, notification, adherence and family services as
//! JSON endpoints under `/api/`. Protected routes run behind
//! Auth → Audit middleware; `/health` and `/patients` are public.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
