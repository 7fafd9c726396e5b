//! Caller identity for scoped list endpoints.
//!
//! Authentication itself lives outside this crate. A [`PrincipalResolver`]
//! turns request parts into an optional [`Principal`]; handlers then gate on
//! [`require_principal`] (401) and [`require_role`] (403) and use the
//! principal's id to scope queries with
//! [`ResourceQueryConfig::scoped`](crate::ResourceQueryConfig::scoped).

use async_trait::async_trait;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::errors::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    User,
    Hr,
    Admin,
    Employee,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Hr => "HR",
            Self::Admin => "ADMIN",
            Self::Employee => "EMPLOYEE",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "USER" => Ok(Self::User),
            "HR" => Ok(Self::Hr),
            "ADMIN" => Ok(Self::Admin),
            "EMPLOYEE" => Ok(Self::Employee),
            _ => Err(()),
        }
    }
}

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Principal {
    pub id: String,
    /// `None` when the identity provider returned no or an unknown role
    pub role: Option<Role>,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Option<Role>) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

/// Resolves the caller of a request
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    /// `Ok(None)` for anonymous requests. Errors are reserved for resolver
    /// failures such as an unreachable session store.
    async fn resolve(&self, parts: &Parts) -> Result<Option<Principal>, ApiError>;
}

/// Trusts identity headers set by an authenticating proxy in front of the
/// service.
#[derive(Debug, Clone)]
pub struct HeaderPrincipalResolver {
    id_header: &'static str,
    role_header: &'static str,
}

impl HeaderPrincipalResolver {
    pub const DEFAULT_ID_HEADER: &'static str = "x-user-id";
    pub const DEFAULT_ROLE_HEADER: &'static str = "x-user-role";

    #[must_use]
    pub fn new(id_header: &'static str, role_header: &'static str) -> Self {
        Self {
            id_header,
            role_header,
        }
    }
}

impl Default for HeaderPrincipalResolver {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ID_HEADER, Self::DEFAULT_ROLE_HEADER)
    }
}

#[async_trait]
impl PrincipalResolver for HeaderPrincipalResolver {
    async fn resolve(&self, parts: &Parts) -> Result<Option<Principal>, ApiError> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let Some(id) = header(self.id_header) else {
            return Ok(None);
        };
        let role = header(self.role_header).and_then(|role| role.parse().ok());
        Ok(Some(Principal::new(id, role)))
    }
}

/// 401 unless a principal is present
///
/// # Errors
///
/// Returns `ApiError::Unauthorized` for anonymous requests.
pub fn require_principal(principal: Option<Principal>) -> Result<Principal, ApiError> {
    principal.ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

/// 403 unless the principal holds one of `roles`
///
/// # Errors
///
/// Returns `ApiError::Forbidden` when the role is missing or not allowed.
pub fn require_role(principal: &Principal, roles: &[Role]) -> Result<Role, ApiError> {
    let Some(role) = principal.role else {
        return Err(ApiError::forbidden("Invalid or missing user role"));
    };
    if roles.contains(&role) {
        return Ok(role);
    }
    let required = roles
        .iter()
        .map(|role| role.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    Err(ApiError::forbidden(format!("Required role: {required}")))
}
