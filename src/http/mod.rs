//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, gate)
//!     → request.rs (request ID, partition, file id)
//!     → routing (route kind)
//!     → proxy (forwarder) / hotfix (merge) / cache
//!     → response.rs (relay or merged body)
//!     → Send to client
//!
//! relay.rs: standalone redirect-following relay (overlay-relay binary)
//! ```

pub mod relay;
pub mod request;
pub mod response;
pub mod server;

pub use relay::relay_router;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
