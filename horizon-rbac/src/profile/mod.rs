//! Profile mirror of identities, queryable in bulk

#[cfg(feature = "delta")]
pub mod delta;
pub mod store;

#[cfg(feature = "delta")]
pub use delta::DeltaProfileStore;
pub use store::{MemoryProfileStore, Profile, ProfileStore};
