//! Request-scoped caller identity.
//!
//! The gateway in front of this service authenticates users and forwards the
//! result as `x-user-id` and `x-user-role` headers.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role { Customer, Admin }

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn is_admin(&self) -> bool { self.role == Role::Admin }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() { Ok(()) } else { Err(ApiError::forbidden("admin role required")) }
    }

    /// Admins may act on anything; customers only on their own records.
    pub fn can_access(&self, owner_id: &str) -> bool { self.is_admin() || self.user_id == owner_id }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim).filter(|v| !v.is_empty());
        let user_id = header(USER_ID_HEADER).ok_or_else(ApiError::unauthorized)?.to_string();
        let role = match header(USER_ROLE_HEADER) {
            Some(r) if r.eq_ignore_ascii_case("admin") => Role::Admin,
            _ => Role::Customer,
        };
        Ok(Self { user_id, role })
    }
}
