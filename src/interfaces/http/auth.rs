use super::response::ApiError;
use crate::domain::actor::{Actor, Role};
use crate::error::SettlementError;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Identity is established upstream; the gateway forwards it in headers.
#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };
        let user_id = header(USER_ID_HEADER).ok_or_else(|| {
            SettlementError::Unauthenticated(format!("missing {USER_ID_HEADER} header"))
        })?;
        let role: Role = header(USER_ROLE_HEADER)
            .ok_or_else(|| SettlementError::Unauthenticated(format!("missing {USER_ROLE_HEADER} header")))?
            .parse()?;
        Ok(Actor::new(user_id, role))
    }
}
