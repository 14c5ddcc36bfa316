//! Cache subsystem.
//!
//! # Data Flow
//! ```text
//! handler
//!     → registry.rs (partition id → running partition)
//!     → facade.rs (namespace prefix, TTL default, tags)
//!     → partition.rs (actor: shadow LRU → durable layer)
//!     → durable.rs (memory or JSON snapshot file)
//!
//! hotfix write:
//!     → invalidation.rs (queue, background worker)
//!     → registry.rs (every partition)
//!     → facade.rs on_mutate (tag index → delete members → clear index)
//! ```
//!
//! # Design Decisions
//! - Exact invalidation through tag indexes; no scans
//! - Cache failures are never visible to callers
//! - One writer per partition; partitions never share state

pub mod clock;
pub mod durable;
pub mod facade;
pub mod invalidation;
pub mod keys;
pub mod partition;
pub mod registry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use durable::{DurableBackend, DurableStore, FileDurable, MemoryDurable};
pub use facade::CacheFacade;
pub use invalidation::{InvalidationQueue, InvalidationWorker};
pub use keys::CacheKey;
pub use partition::{CacheError, PartitionHandle, PartitionStore};
pub use registry::{CacheSettings, PartitionRegistry};
