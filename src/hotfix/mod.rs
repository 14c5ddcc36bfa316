//! Hotfix (override) subsystem.
//!
//! # Data Flow
//! ```text
//! admin API / seed files
//!     → parser.rs (file content → OverrideRecord[])
//!     → store.rs (records keyed by file/section/key)
//!     → cache invalidation for the `hotfixes` table
//!
//! merge route:
//!     upstream content + store.for_file(id)
//!     → merge.rs (override keys replace upstream keys per section)
//!     → writer helpers (deterministic rendering)
//! ```
//!
//! # Design Decisions
//! - Parsing never fails; unreadable lines are skipped
//! - Rendering is deterministic so cached and fresh merges are byte-identical
//! - Disabled records are retained but never emitted by default

pub mod merge;
pub mod parser;
pub mod record;
pub mod store;
pub mod writer;

pub use merge::{combine, merge};
pub use parser::parse;
pub use record::OverrideRecord;
pub use store::{HotfixStore, HOTFIXES_TABLE};
pub use writer::{file_ids, sections_for_file, serialize, serialize_file};
