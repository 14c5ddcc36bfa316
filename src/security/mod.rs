//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound request / relayed response:
//!     → headers.rs (strip hop-by-hop)
//!
//! Destination checks live with the forwarder (proxy::allow_list).
//! ```

pub mod headers;
