//! Override gate.
//!
//! # Data Flow
//! ```text
//! Incoming request (path, method)
//!     → middleware.rs (lookup)
//!     → hit: stored body + content type, 200
//!     → miss: routing and forwarding
//!
//! Admin API → store.rs (set / remove / list)
//! ```

pub mod middleware;
pub mod store;

pub use middleware::gate_middleware;
pub use store::{GateEntry, GateStore, GateSummary};
