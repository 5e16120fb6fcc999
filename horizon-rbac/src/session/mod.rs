//! Client session: identity state and profile resolution

pub mod auth_state;
pub mod resolver;

pub use auth_state::{AuthSession, SignedInIdentity};
pub use resolver::{ProfileResolver, ResolverHandle, ResolverState, SessionView};
