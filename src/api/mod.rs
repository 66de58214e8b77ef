//! REST API for the OptiDoc web client.
//!
//! Routes are nested under `/api/`. Protected routes pass the bearer
//! auth middleware, which resolves the session to an `Actor`; handlers
//! then call the workflow modules as that actor.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer, ServerError};
pub use types::ApiContext;
