//! Caller identity
//!
//! Authentication happens upstream; the gateway forwards the verified
//! identity as `x-user-id`, `x-user-role`, `x-username` and
//! `x-user-full-name`. Handlers take [`CurrentActor`] and gate on role with
//! [`require_role`].

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use casedesk_common::{Actor, Role};
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USERNAME_HEADER: &str = "x-username";
pub const FULL_NAME_HEADER: &str = "x-user-full-name";

/// Identified caller of a request
#[derive(Debug, Clone)]
pub struct CurrentActor(pub Actor);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Build an [`Actor`] from gateway headers
pub fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let user_id = header(headers, USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("Missing user id".to_string()))?;
    let user_id = Uuid::parse_str(user_id)
        .map_err(|_| ApiError::Unauthorized(format!("Malformed user id: {}", user_id)))?;

    let role = header(headers, USER_ROLE_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("Missing user role".to_string()))?;
    let role: Role = role
        .parse()
        .map_err(|_| ApiError::Unauthorized(format!("Unknown user role: {}", role)))?;

    let username = header(headers, USERNAME_HEADER).unwrap_or_default();
    let actor = Actor::new(user_id, role, username);

    Ok(match header(headers, FULL_NAME_HEADER) {
        Some(full_name) => actor.with_full_name(full_name),
        None => actor,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
            .map(CurrentActor)
            .map_err(|e| {
                warn!(path = %parts.uri.path(), error = %e, "Rejected request without identity");
                e
            })
    }
}

/// Fail with 403 unless the actor holds one of `allowed`
pub fn require_role(actor: &Actor, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&actor.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "Role {} may not perform this action",
            actor.role
        )))
    }
}

/// Admin and Super Admin
pub const ADMINS: &[Role] = &[Role::Admin, Role::SuperAdmin];

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_actor_from_headers() {
        let id = Uuid::new_v4();
        let actor = actor_from_headers(&headers(&[
            (USER_ID_HEADER, &id.to_string()),
            (USER_ROLE_HEADER, "Payment Redeemer"),
            (USERNAME_HEADER, "pr1"),
            (FULL_NAME_HEADER, "Pat Redeemer"),
        ]))
        .unwrap();

        assert_eq!(actor.user_id, id);
        assert_eq!(actor.role, Role::PaymentRedeemer);
        assert_eq!(actor.full_name.as_deref(), Some("Pat Redeemer"));
    }

    #[test]
    fn test_missing_or_bad_identity_is_unauthorized() {
        assert!(matches!(
            actor_from_headers(&HeaderMap::new()),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            actor_from_headers(&headers(&[(USER_ID_HEADER, "nope"), (USER_ROLE_HEADER, "Admin")])),
            Err(ApiError::Unauthorized(_))
        ));
        let id = Uuid::new_v4().to_string();
        assert!(matches!(
            actor_from_headers(&headers(&[(USER_ID_HEADER, &id), (USER_ROLE_HEADER, "Janitor")])),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_require_role() {
        let admin = Actor::new(Uuid::new_v4(), Role::Admin, "a");
        let collector = Actor::new(Uuid::new_v4(), Role::Collector, "c");
        assert!(require_role(&admin, ADMINS).is_ok());
        assert!(matches!(
            require_role(&collector, ADMINS),
            Err(ApiError::Forbidden(_))
        ));
    }
}
