//! # Horizon Gateway
//!
//! JSON-over-HTTP surface of the Horizon access layer. Every admin endpoint
//! resolves the caller from the `Authorization: Bearer <token>` header and
//! hands it to [`RoleService`]; a missing or invalid token means no caller.
//!
//! | Path                  | Operation                 |
//! |-----------------------|---------------------------|
//! | `GET /health`         | liveness                  |
//! | `/api/signIn`         | credentials → token       |
//! | `/api/refreshToken`   | reissue with current claim|
//! | `/api/getAllUsers`    | `list_users_with_role`    |
//! | `/api/updateUserRole` | `set_role`                |
//! | `/api/createNewUser`  | `create_user`             |
//! | `/api/deleteUser`     | `delete_user`             |
//! | `/api/reconcileUser`  | `reconcile`               |

pub mod config;
pub mod error;

use std::convert::Infallible;
use std::sync::Arc;

use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use horizon_rbac::{
    bootstrap_admin, Caller, CreateUserRequest, DeltaIdentityStore, DeltaProfileStore,
    DeltaStore, ErrorKind, IdentityStore, MemoryIdentityStore, MemoryProfileStore, MutationReply,
    PortalError, ProfileStore, ReconcileOutcome, Role, RoleService, SetRoleRequest,
    TokenIssuer, UidRequest, UserSummary,
};

pub use config::{BootstrapAdmin, GatewayConfig, StoreBackend};
pub use error::{ApiError, ErrorBody, GatewayError};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: RoleService,
    pub tokens: TokenIssuer,
}

impl AppState {
    pub fn new(service: RoleService, tokens: TokenIssuer) -> Self {
        Self { service, tokens }
    }
}

/// Stores and state assembled from a [`GatewayConfig`]
pub struct Backend {
    pub state: AppState,
    /// Present with the Delta backend, for table maintenance
    pub delta: Option<Arc<DeltaStore>>,
}

/// Open the configured stores, bootstrap the first admin if asked to
pub async fn build_backend(config: &GatewayConfig) -> Result<Backend, GatewayError> {
    let portal = &config.portal;
    let identities: Arc<dyn IdentityStore>;
    let profiles: Arc<dyn ProfileStore>;
    let mut delta = None;
    match config.store {
        StoreBackend::Memory => {
            identities = Arc::new(MemoryIdentityStore::new(portal.min_password_len));
            profiles = Arc::new(MemoryProfileStore::new());
        }
        StoreBackend::Delta => {
            std::fs::create_dir_all(&portal.base_path)?;
            let store = Arc::new(DeltaStore::new(portal.clone()).await?);
            identities = Arc::new(DeltaIdentityStore::new(Arc::clone(&store)));
            profiles = Arc::new(DeltaProfileStore::new(Arc::clone(&store)));
            delta = Some(store);
        }
    }

    if let Some(admin) = &config.bootstrap {
        let created = bootstrap_admin(
            identities.as_ref(),
            profiles.as_ref(),
            &admin.email,
            &admin.password,
            &admin.display_name,
        )
        .await?;
        if let Some(record) = created {
            info!(uid = %record.uid, email = %record.email, "Bootstrap admin ready");
        }
    }

    let service = RoleService::new(identities, profiles)
        .with_list_limit(portal.list_users_limit)
        .with_claim_grace(portal.claim_grace());
    Ok(Backend {
        state: AppState::new(service, TokenIssuer::from_config(portal)),
        delta,
    })
}

/// Build the router with CORS and request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/signIn", post(sign_in))
        .route("/api/refreshToken", post(refresh_token))
        .route("/api/getAllUsers", post(get_all_users))
        .route("/api/updateUserRole", post(update_user_role))
        .route("/api/createNewUser", post(create_new_user))
        .route("/api/deleteUser", post(delete_user))
        .route("/api/reconcileUser", post(reconcile_user))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Caller extraction ───

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// The verified caller, if the request carries a valid bearer token
pub struct MaybeCaller(pub Option<Caller>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeCaller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let caller = bearer_token(&parts.headers).and_then(|token| state.tokens.caller_from_token(token));
        Ok(Self(caller))
    }
}

/// Undecodable bodies become empty requests so the admin precheck still
/// runs first and validation reports the missing fields.
fn body_or_default<T: Default>(payload: Result<Json<T>, JsonRejection>) -> T {
    match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            warn!(error = %rejection, "Unreadable request body");
            T::default()
        }
    }
}

// ─── Handlers ───

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignInReply {
    pub token: String,
    pub uid: String,
    pub role: Option<Role>,
}

async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Json<SignInReply>, ApiError> {
    let req = body_or_default(payload);
    let identity = state
        .service
        .identities()
        .verify_password(&req.email, &req.password)
        .await
        .map_err(|e| {
            warn!(email = %req.email, error = %e, "Sign-in rejected");
            let message = match e.kind() {
                ErrorKind::Unauthenticated => "Invalid email or password.",
                _ => "Sign-in failed.",
            };
            e.into_taxonomy(message)
        })?;
    let token = state.tokens.issue(&identity)?;

    info!(uid = %identity.uid, "Signed in");
    Ok(Json(SignInReply {
        token,
        uid: identity.uid,
        role: identity.role_claim,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenReply {
    pub token: String,
}

async fn refresh_token(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
) -> Result<Json<TokenReply>, ApiError> {
    let caller = caller.ok_or_else(|| {
        PortalError::Unauthenticated("The function must be called while authenticated.".into())
    })?;
    let identity = state
        .service
        .identities()
        .get_identity(&caller.uid)
        .await
        .map_err(|e| e.into_taxonomy("Failed to refresh token."))?
        .ok_or_else(|| PortalError::Unauthenticated("Identity no longer exists.".into()))?;
    let token = state.tokens.issue(&identity)?;
    Ok(Json(TokenReply { token }))
}

async fn get_all_users(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let users = state.service.list_users_with_role(caller.as_ref()).await?;
    Ok(Json(users))
}

async fn update_user_role(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
    payload: Result<Json<SetRoleRequest>, JsonRejection>,
) -> Result<Json<MutationReply>, ApiError> {
    let reply = state
        .service
        .set_role(caller.as_ref(), body_or_default(payload))
        .await?;
    Ok(Json(reply))
}

async fn create_new_user(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Json<MutationReply>, ApiError> {
    let reply = state
        .service
        .create_user(caller.as_ref(), body_or_default(payload))
        .await?;
    Ok(Json(reply))
}

async fn delete_user(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
    payload: Result<Json<UidRequest>, JsonRejection>,
) -> Result<Json<MutationReply>, ApiError> {
    let reply = state
        .service
        .delete_user(caller.as_ref(), body_or_default(payload))
        .await?;
    Ok(Json(reply))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReconcileReply {
    pub message: String,
    pub outcome: ReconcileOutcome,
}

async fn reconcile_user(
    State(state): State<AppState>,
    MaybeCaller(caller): MaybeCaller,
    payload: Result<Json<UidRequest>, JsonRejection>,
) -> Result<Json<ReconcileReply>, ApiError> {
    let req = body_or_default(payload);
    let uid = req.uid.clone();
    let outcome = state.service.reconcile(caller.as_ref(), req).await?;
    Ok(Json(ReconcileReply {
        message: format!("Reconciled user {}: {outcome}.", uid.trim()),
        outcome,
    }))
}
