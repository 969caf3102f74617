//! Authentication and authorization.
//!
//! Identity (credentials, sessions, token issuance) lives in an external
//! provider; this module verifies the JWTs that provider signs and turns
//! them into a per-request [`AuthUser`] principal. Role checks happen in
//! the route-guard layer via [`AuthRouterExt::with_role`], dispatching on
//! the closed [`Role`] enum — handlers never re-check role strings.

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::entities::Role;
use crate::errors::ServiceError;
use crate::AppState;

/// Claims carried by tokens from the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub email: String,
    /// Role name, must parse into [`Role`]
    pub role: String,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expiration (seconds since epoch)
    pub exp: i64,
}

/// The authenticated principal, resolved once per request by
/// [`authenticate`] and passed down through request extensions.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Ownership check used by services: admins act on anything, everyone
    /// else only on their own records.
    pub fn can_act_for(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.id == owner_id
    }
}

fn role_from_claim(raw: &str) -> Option<Role> {
    match raw {
        "admin" => Some(Role::Admin),
        "vendor" => Some(Role::Vendor),
        "customer" => Some(Role::Customer),
        _ => None,
    }
}

fn role_claim(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Vendor => "vendor",
        Role::Customer => "customer",
    }
}

/// Verifies a bearer token and extracts the principal.
pub fn verify_token(token: &str, secret: &str) -> Result<AuthUser, ServiceError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| ServiceError::Unauthorized(format!("invalid token: {}", e)))?;

    let id = Uuid::from_str(&data.claims.sub)
        .map_err(|_| ServiceError::Unauthorized("invalid subject claim".to_string()))?;
    let role = role_from_claim(&data.claims.role)
        .ok_or_else(|| ServiceError::Unauthorized("unknown role claim".to_string()))?;

    Ok(AuthUser {
        id,
        email: data.claims.email,
        role,
    })
}

/// Signs a token the way the identity provider does. Used by tests and
/// local tooling; the server itself only verifies.
pub fn mint_token(
    user_id: Uuid,
    email: &str,
    role: Role,
    secret: &str,
    ttl: Duration,
) -> Result<String, ServiceError> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role_claim(role).to_string(),
        iat: now,
        exp: now + ttl.as_secs() as i64,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ServiceError::InternalError(format!("failed to sign token: {}", e)))
}

/// Lenient authentication middleware: resolves the principal when a valid
/// bearer token is present and stores it in request extensions. Requests
/// without a token pass through; extraction of [`AuthUser`] is what makes
/// an endpoint require authentication.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if let Some(token) = token {
        match verify_token(token, &state.config.jwt_secret) {
            Ok(user) => {
                request.extensions_mut().insert(user);
            }
            Err(e) => {
                // A present-but-invalid token is rejected outright rather
                // than downgraded to anonymous.
                return e.into_response();
            }
        }
    }

    next.run(request).await
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ServiceError::Unauthorized("authentication required".to_string()))
    }
}

async fn role_guard(required: Role, request: Request, next: Next) -> Response {
    match request.extensions().get::<AuthUser>() {
        Some(user) if user.role.satisfies(required) => next.run(request).await,
        Some(_) => ServiceError::Forbidden(format!(
            "requires {} role",
            role_claim(required)
        ))
        .into_response(),
        None => {
            ServiceError::Unauthorized("authentication required".to_string()).into_response()
        }
    }
}

/// Router extension for role-gated route groups.
pub trait AuthRouterExt {
    fn with_role(self, required: Role) -> Self;
}

impl AuthRouterExt for Router<AppState> {
    fn with_role(self, required: Role) -> Self {
        self.layer(axum::middleware::from_fn(
            move |request: Request, next: Next| role_guard(required, request, next),
        ))
    }
}
