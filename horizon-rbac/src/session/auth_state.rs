//! AuthSession: client-side view of the identity store
//!
//! Holds the signed-in identity (if any) and publishes every change on a
//! `watch` channel. Subscribers see the current value immediately and every
//! later sign-in, refresh and sign-out.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{PortalError, Result};
use crate::identity::{Caller, IdentityRecord, IdentityStore, TokenIssuer};
use crate::role::Role;

/// A signed-in identity together with its current token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInIdentity {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    /// Role claim as asserted by `token`
    pub role: Option<Role>,
    pub token: String,
}

impl SignedInIdentity {
    fn from_record(record: IdentityRecord, token: String) -> Self {
        Self {
            uid: record.uid,
            email: record.email,
            display_name: record.display_name,
            role: record.role_claim,
            token,
        }
    }

    /// Caller context for privileged operations
    pub fn caller(&self) -> Caller {
        Caller::new(self.uid.clone(), self.role)
    }
}

/// Identity state of one client
pub struct AuthSession {
    identities: Arc<dyn IdentityStore>,
    tokens: TokenIssuer,
    state: watch::Sender<Option<SignedInIdentity>>,
}

impl AuthSession {
    pub fn new(identities: Arc<dyn IdentityStore>, tokens: TokenIssuer) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            identities,
            tokens,
            state,
        }
    }

    /// Verify credentials and publish the signed-in identity
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignedInIdentity> {
        let record = self
            .identities
            .verify_password(email, password)
            .await
            .inspect_err(|e| warn!(email, error = %e, "Sign-in failed"))?;
        let token = self.tokens.issue(&record)?;
        let signed_in = SignedInIdentity::from_record(record, token);

        info!(uid = %signed_in.uid, "Signed in");
        self.state.send_replace(Some(signed_in.clone()));
        Ok(signed_in)
    }

    /// Clear the identity. Signing out twice publishes nothing new.
    pub fn sign_out(&self) {
        let was_signed_in = self.state.send_if_modified(|state| state.take().is_some());
        if was_signed_in {
            info!("Signed out");
        }
    }

    /// Reissue the token with the identity's current claim.
    ///
    /// An identity that no longer exists is signed out.
    pub async fn refresh(&self) -> Result<SignedInIdentity> {
        let uid = self
            .current()
            .map(|s| s.uid)
            .ok_or_else(|| PortalError::Unauthenticated("Not signed in.".into()))?;

        let Some(record) = self.identities.get_identity(&uid).await? else {
            warn!(uid = %uid, "Identity vanished, signing out");
            self.sign_out();
            return Err(PortalError::Unauthenticated("Identity no longer exists.".into()));
        };
        let token = self.tokens.issue(&record)?;
        let refreshed = SignedInIdentity::from_record(record, token);

        debug!(uid = %refreshed.uid, role = ?refreshed.role, "Token refreshed");
        self.state.send_replace(Some(refreshed.clone()));
        Ok(refreshed)
    }

    pub fn current(&self) -> Option<SignedInIdentity> {
        self.state.borrow().clone()
    }

    /// Identity-state observable; dropping the receiver unsubscribes
    pub fn subscribe(&self) -> watch::Receiver<Option<SignedInIdentity>> {
        self.state.subscribe()
    }
}
