//! Web layer.
//!
//! Serves the cached snapshot page, exposes the refresh trigger for the
//! scheduler, and offers the raw data and statistics endpoints. The read
//! path never renders and never refreshes; it serves pre-built bytes.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::WebError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
