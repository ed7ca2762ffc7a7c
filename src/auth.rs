use axum::{
    extract::{FromRef, FromRequestParts},
    http::{StatusCode, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    repository::RepositoryState,
};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_MODERATOR: &str = "moderator";

/// Claims
///
/// Payload expected inside a bearer JWT.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id, looked up in the `users` table.
    pub sub: Uuid,
    /// Expiration Time (exp): always validated.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// Permission
///
/// Model-level change permissions checked by the moderation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    ChangeQuestion,
    ChangeResponse,
}

/// AuthUser
///
/// The resolved identity of an authenticated request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: String,
}

impl AuthUser {
    /// Staff see every question and response regardless of status.
    pub fn is_staff(&self) -> bool {
        self.role == ROLE_ADMIN || self.role == ROLE_MODERATOR
    }

    pub fn has_perm(&self, perm: Permission) -> bool {
        match self.role.as_str() {
            ROLE_ADMIN => true,
            ROLE_MODERATOR => matches!(perm, Permission::ChangeQuestion | Permission::ChangeResponse),
            _ => false,
        }
    }
}

/// Viewer
///
/// Who is asking: nobody in particular, or a known user. Every page and every
/// visibility decision starts from this.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Viewer {
    #[default]
    Anonymous,
    User(AuthUser),
}

impl Viewer {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Viewer::User(_))
    }

    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            Viewer::User(user) => Some(user),
            Viewer::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.user().map(|user| user.id)
    }

    pub fn is_staff(&self) -> bool {
        self.user().is_some_and(AuthUser::is_staff)
    }

    pub fn has_perm(&self, perm: Permission) -> bool {
        self.user().is_some_and(|user| user.has_perm(perm))
    }
}

/// Viewer Extractor Implementation
///
/// 1. Local bypass: in `Env::Local` a known user id in `x-user-id` is accepted.
/// 2. No `Authorization` header: the caller is anonymous.
/// 3. `Bearer` token: decoded and validated, then the user is looked up so deleted
///    accounts and role changes take effect immediately.
///
/// Rejection: `401` when credentials are present but invalid, `500` when the user
/// lookup itself fails.
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| Uuid::parse_str(raw).ok());
            if let Some(user_id) = bypass_id {
                let user = repo.get_user(user_id).await.map_err(|e| {
                    tracing::error!("user lookup failed: {:?}", e);
                    StatusCode::INTERNAL_SERVER_ERROR
                })?;
                if let Some(user) = user {
                    return Ok(Viewer::User(AuthUser {
                        id: user.id,
                        role: user.role,
                    }));
                }
            }
        }

        let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
            return Ok(Viewer::Anonymous);
        };

        let token = auth_header
            .to_str()
            .ok()
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!("rejected bearer token: {:?}", e.kind());
            StatusCode::UNAUTHORIZED
        })?;

        let user = repo
            .get_user(token_data.claims.sub)
            .await
            .map_err(|e| {
                tracing::error!("user lookup failed: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            })?
            // A valid token for a user that no longer exists.
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Viewer::User(AuthUser {
            id: user.id,
            role: user.role,
        }))
    }
}
