//! Identity provider seam: credentials, the signed `role` claim and tokens

#[cfg(feature = "delta")]
pub mod delta;
mod password;
pub mod store;
pub mod token;
pub mod types;

#[cfg(feature = "delta")]
pub use delta::DeltaIdentityStore;
pub use store::{IdentityStore, MemoryIdentityStore};
pub use token::TokenIssuer;
pub use types::{Caller, IdentityRecord, NewIdentity, RoleClaims};
