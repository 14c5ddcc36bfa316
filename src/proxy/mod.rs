//! Forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! InboundRequest + ForwardOptions
//!     → forwarder.rs preflight (loop marker, target, allow_list.rs)
//!     → forwarder.rs (outbound URL + headers)
//!     → upstream.rs (single hop) or relay.rs (bounded redirect chain)
//!     → classification → UpstreamResponse | error.rs
//! ```

pub mod allow_list;
pub mod error;
pub mod forwarder;
pub mod relay;
pub mod upstream;

pub use allow_list::{AllowList, OriginPattern};
pub use error::ForwardError;
pub use forwarder::{parse_target, ForwardOptions, Forwarder, ForwarderSettings, InboundRequest, SettingsError};
pub use relay::{RedirectRelay, MAX_REDIRECTS, REDIRECT_COUNT_HEADER};
pub use upstream::{ReqwestUpstream, TransportError, UpstreamClient, UpstreamRequest, UpstreamResponse};
