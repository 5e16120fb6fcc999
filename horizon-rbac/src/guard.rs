//! Route guard: render-or-redirect decisions at the UI boundary
//!
//! [`decide`] is the pure decision. [`RouteTable`] names which routes need
//! which roles, and [`RouteGuard`] re-evaluates a route every time the
//! session view changes.

use tokio::sync::watch;

use crate::error::{PortalError, Result};
use crate::profile::Profile;
use crate::role::Role;
use crate::session::SessionView;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";

/// Outcome of guarding one route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    Render,
    RedirectToLogin,
    RedirectToHome,
    ShowLoading,
}

impl Decision {
    /// Where a redirect decision points
    pub fn redirect_path(&self) -> Option<&'static str> {
        match self {
            Self::RedirectToLogin => Some(LOGIN_PATH),
            Self::RedirectToHome => Some(HOME_PATH),
            Self::Render | Self::ShowLoading => None,
        }
    }
}

/// Decide for one route entry. An empty `required_roles` admits any role.
pub fn decide(profile: Option<&Profile>, is_loading: bool, required_roles: &[Role]) -> Decision {
    if is_loading {
        return Decision::ShowLoading;
    }
    let Some(profile) = profile else {
        return Decision::RedirectToLogin;
    };
    if !required_roles.is_empty() && !required_roles.contains(&profile.role) {
        return Decision::RedirectToHome;
    }
    Decision::Render
}

/// Access rule attached to a route
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Public,
    /// Signed in with one of these roles; empty means any role
    Roles(Vec<Role>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub access: Access,
}

#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, path: &'static str, access: Access) -> Self {
        self.routes.push(Route { path, access });
        self
    }

    /// The portal's routes
    pub fn portal() -> Self {
        Self::new()
            .route(LOGIN_PATH, Access::Public)
            .route(HOME_PATH, Access::Roles(vec![]))
            .route("/announcements", Access::Roles(vec![]))
            .route("/assignments", Access::Roles(vec![]))
            .route("/admin", Access::Roles(vec![Role::Admin]))
    }

    pub fn lookup(&self, path: &str) -> Option<&Route> {
        let path = match path.trim_end_matches('/') {
            "" => HOME_PATH,
            trimmed => trimmed,
        };
        self.routes.iter().find(|r| r.path == path)
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Decision for `path` under `view`; `None` when no route matches
    pub fn evaluate(&self, path: &str, view: &SessionView) -> Option<Decision> {
        let route = self.lookup(path)?;
        Some(match &route.access {
            Access::Public => Decision::Render,
            Access::Roles(roles) => decide(view.profile(), view.is_loading(), roles),
        })
    }
}

/// Keeps one route's decision current as the session view changes
pub struct RouteGuard {
    table: RouteTable,
    path: String,
    views: watch::Receiver<SessionView>,
}

impl RouteGuard {
    pub fn new(table: RouteTable, path: impl Into<String>, views: watch::Receiver<SessionView>) -> Self {
        Self {
            table,
            path: path.into(),
            views,
        }
    }

    fn evaluate_current(&self) -> Result<Decision> {
        self.table
            .evaluate(&self.path, &self.views.borrow())
            .ok_or_else(|| PortalError::InvalidArgument(format!("No route for '{}'", self.path)))
    }

    /// Decision for the view as it is now
    pub fn decision(&mut self) -> Result<Decision> {
        self.views.mark_unchanged();
        self.evaluate_current()
    }

    /// Wait for the next view change and decide again
    pub async fn next_decision(&mut self) -> Result<Decision> {
        self.views
            .changed()
            .await
            .map_err(|_| PortalError::ActorUnavailable("Session view closed".into()))?;
        self.views.mark_unchanged();
        self.evaluate_current()
    }
}
