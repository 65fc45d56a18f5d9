//! Category URL resolution
//!
//! Maps raw category URLs onto their canonical catalog identifiers and
//! collapses filter-variant duplicates onto one representative per id.

mod canonical;
mod store;

pub use canonical::{group_by_canonical_id, resolve, select_representatives};
pub use canonical::{CategoryId, CategoryTarget};
pub use store::{Store, StoreId};
