//! # catalog-projection
//!
//! Read-side view of the category forest as held by a search index.
//!
//! The index is filled asynchronously from the store by machinery outside
//! this crate, so it may trail the store. This crate defines:
//! - **[`SearchIndexProjection`]**: what an index must answer
//! - **[`IndexHit`]** and [`parse_hits`]: the wire contract (`left`, `right`,
//!   opaque `payload`; everything else optional)
//! - **[`InMemoryProjection`]**: an index kept in process, refreshed on demand
//! - **[`ProjectionReader`]**: nested reads through
//!   [`reconstruct`](catalog_tree::reconstruct), guarded by a
//!   [`StalenessPolicy`]
//!
//! ```text
//!  CategoryStore ──(async indexing)──► SearchIndexProjection
//!        │                                     │ flat hits
//!        │ revision                            ▼
//!        └────────────► ProjectionReader ──► reconstruct ──► TreeNode<IndexHit>
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
mod hit;
mod memory;
mod reader;
mod traits;

pub use error::{ProjectionError, ProjectionResult};
pub use hit::{parse_hits, IndexHit};
pub use memory::InMemoryProjection;
pub use reader::{ProjectionReader, StalenessPolicy};
pub use traits::SearchIndexProjection;
