//! ProfileResolver: joins identity-state changes with profile lookups
//!
//! A spawned task follows the identity observable. Every identity event
//! starts a new generation: the previous lookup is aborted, and a result
//! that still arrives tagged with an older generation is dropped. The
//! unified [`SessionView`] is published on a `watch` channel.
//!
//! A new event for the uid already resolved (a token refresh) keeps the
//! current profile visible while it is looked up again.
//!
//! ```text
//! Unresolved ──identity──► Resolving ──found──► Resolved(profile)
//!      │                     │  └──missing──► ProfileMissing
//!      │                     └──error────► LookupFailed
//!      └──────signed out──────────────────► Anonymous
//! ```

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::{PortalError, Result};
use crate::profile::{Profile, ProfileStore};

use super::auth_state::SignedInIdentity;

/// Resolution state of the current identity's profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverState {
    Unresolved,
    Resolving,
    Resolved(Profile),
    /// Signed in, but the profile store has no record for the uid
    ProfileMissing,
    LookupFailed(String),
    Anonymous,
}

impl ResolverState {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Unresolved | Self::Resolving)
    }

    pub fn profile(&self) -> Option<&Profile> {
        match self {
            Self::Resolved(profile) => Some(profile),
            _ => None,
        }
    }
}

/// `{identity, profile, isLoading}` as consumed by the guard and the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub identity: Option<SignedInIdentity>,
    pub state: ResolverState,
    /// Identity events seen so far
    pub generation: u64,
}

impl SessionView {
    fn unresolved() -> Self {
        Self {
            identity: None,
            state: ResolverState::Unresolved,
            generation: 0,
        }
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.state.profile()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }
}

type LookupResult = (u64, Result<Option<Profile>>);

/// Aborts the wrapped lookup when replaced or dropped
struct InFlight(JoinHandle<()>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.abort();
    }
}

pub struct ProfileResolver;

impl ProfileResolver {
    /// Spawn the resolver task following `identity_rx`
    pub fn spawn(
        profiles: Arc<dyn ProfileStore>,
        identity_rx: watch::Receiver<Option<SignedInIdentity>>,
    ) -> ResolverHandle {
        let (view_tx, view_rx) = watch::channel(SessionView::unresolved());
        let task = tokio::spawn(Self::run(profiles, identity_rx, view_tx));
        ResolverHandle { view_rx, task }
    }

    async fn run(
        profiles: Arc<dyn ProfileStore>,
        mut identity_rx: watch::Receiver<Option<SignedInIdentity>>,
        view_tx: watch::Sender<SessionView>,
    ) {
        let (result_tx, mut result_rx) = mpsc::channel::<LookupResult>(8);
        let mut generation = 0u64;
        let mut in_flight: Option<InFlight> = None;
        // The value present at subscription time counts as the first event
        identity_rx.mark_changed();

        loop {
            tokio::select! {
                changed = identity_rx.changed() => {
                    if changed.is_err() {
                        debug!("Identity source closed, resolver stopping");
                        break;
                    }
                    generation += 1;
                    in_flight = None;
                    let identity = identity_rx.borrow_and_update().clone();

                    let state = match &identity {
                        None => ResolverState::Anonymous,
                        Some(signed_in) => {
                            let kept = match &view_tx.borrow().state {
                                ResolverState::Resolved(profile) if profile.uid == signed_in.uid => {
                                    Some(ResolverState::Resolved(profile.clone()))
                                }
                                _ => None,
                            };
                            let profiles = Arc::clone(&profiles);
                            let tx = result_tx.clone();
                            let uid = signed_in.uid.clone();
                            let tag = generation;
                            in_flight = Some(InFlight(tokio::spawn(async move {
                                let result = profiles.get_profile(&uid).await;
                                let _ = tx.send((tag, result)).await;
                            })));
                            kept.unwrap_or(ResolverState::Resolving)
                        }
                    };
                    view_tx.send_replace(SessionView { identity, state, generation });
                }
                Some((tag, result)) = result_rx.recv() => {
                    if tag != generation {
                        debug!(tag, generation, "Discarding stale profile lookup");
                        continue;
                    }
                    in_flight = None;
                    let state = match result {
                        Ok(Some(profile)) => ResolverState::Resolved(profile),
                        Ok(None) => {
                            warn!(generation, "Signed-in identity has no profile");
                            ResolverState::ProfileMissing
                        }
                        Err(e) => {
                            error!(generation, error = %e, "Profile lookup failed");
                            ResolverState::LookupFailed(e.to_string())
                        }
                    };
                    view_tx.send_modify(|view| view.state = state);
                }
            }
        }
        drop(in_flight);
    }
}

/// Owner of a running resolver; dropping it stops the task
pub struct ResolverHandle {
    view_rx: watch::Receiver<SessionView>,
    task: JoinHandle<()>,
}

impl ResolverHandle {
    pub fn view(&self) -> SessionView {
        self.view_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view_rx.clone()
    }

    /// Wait for the next published view
    pub async fn changed(&mut self) -> Result<SessionView> {
        self.view_rx
            .changed()
            .await
            .map_err(|_| PortalError::ActorUnavailable("Profile resolver stopped".into()))?;
        Ok(self.view_rx.borrow_and_update().clone())
    }

    /// Wait until the view is no longer loading
    pub async fn settled(&mut self) -> Result<SessionView> {
        let view = self
            .view_rx
            .wait_for(|view| !view.is_loading())
            .await
            .map_err(|_| PortalError::ActorUnavailable("Profile resolver stopped".into()))?;
        Ok(view.clone())
    }

    /// Stop the task and wait for it to release its subscription
    pub async fn shutdown(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }
}

impl Drop for ResolverHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
