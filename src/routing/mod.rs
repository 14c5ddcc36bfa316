//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request head (Host, path)
//!     → router.rs (ordered route table)
//!     → matcher.rs (host / path-prefix conditions)
//!     → matched Route (kind, cache TTL), or passthrough when nothing matches
//! ```
//!
//! # Design Decisions
//! - The table is built once from `[[routes]]` and never changes
//! - Higher priority first; ties keep configuration order
//! - Prefix matching only

pub mod matcher;
pub mod router;

pub use router::{Route, Router};
