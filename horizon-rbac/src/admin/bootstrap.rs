//! First-admin bootstrap for an empty deployment

use tracing::{debug, info};

use crate::error::Result;
use crate::identity::{IdentityRecord, IdentityStore, NewIdentity};
use crate::profile::{Profile, ProfileStore};
use crate::role::Role;

/// Create the first admin when the identity store holds no identity yet.
///
/// Returns the created identity, or `None` when identities already exist.
pub async fn bootstrap_admin(
    identities: &dyn IdentityStore,
    profiles: &dyn ProfileStore,
    email: &str,
    password: &str,
    display_name: &str,
) -> Result<Option<IdentityRecord>> {
    if !identities.list_identities(1).await?.is_empty() {
        debug!("Identities present, skipping admin bootstrap");
        return Ok(None);
    }

    let mut identity = identities
        .create_identity(NewIdentity {
            email: email.to_string(),
            password: password.to_string(),
            display_name: display_name.to_string(),
        })
        .await?;
    identities.set_role_claim(&identity.uid, Role::Admin).await?;
    identity.role_claim = Some(Role::Admin);

    profiles
        .put_profile(&Profile {
            uid: identity.uid.clone(),
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            role: Role::Admin,
        })
        .await?;

    info!(uid = %identity.uid, email = %identity.email, "Bootstrapped first admin");
    Ok(Some(identity))
}
