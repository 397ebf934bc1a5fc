use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Admin,
    CanteenStaff,
    NgoManager,
}

impl Role {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" => Some(Role::Student),
            "admin" => Some(Role::Admin),
            "canteen_staff" => Some(Role::CanteenStaff),
            "ngo_manager" => Some(Role::NgoManager),
            _ => None,
        }
    }
}

/// Caller identity as asserted by the identity layer in front of this service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, format!("missing {USER_ID_HEADER} header")))?;
        let user_id = Uuid::parse_str(raw.trim())
            .map_err(|_| (StatusCode::UNAUTHORIZED, format!("invalid {USER_ID_HEADER} header")))?;

        let role = match parts.headers.get(USER_ROLE_HEADER) {
            None => Role::Student,
            Some(h) => h
                .to_str()
                .ok()
                .and_then(Role::parse)
                .ok_or((StatusCode::BAD_REQUEST, format!("invalid {USER_ROLE_HEADER} header")))?,
        };

        Ok(Principal { user_id, role })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(req: Request<()>) -> Result<Principal, (StatusCode, String)> {
        let (mut parts, _) = req.into_parts();
        Principal::from_request_parts(&mut parts, &AppState::fake()).await
    }

    #[tokio::test]
    async fn role_defaults_to_student() {
        let id = Uuid::new_v4();
        let req = Request::builder()
            .header(USER_ID_HEADER, id.to_string())
            .body(())
            .expect("request");
        let p = extract(req).await.expect("principal");
        assert_eq!(p.user_id, id);
        assert_eq!(p.role, Role::Student);
    }

    #[tokio::test]
    async fn role_header_is_parsed() {
        let req = Request::builder()
            .header(USER_ID_HEADER, Uuid::new_v4().to_string())
            .header(USER_ROLE_HEADER, "canteen_staff")
            .body(())
            .expect("request");
        assert_eq!(extract(req).await.expect("principal").role, Role::CanteenStaff);
    }

    #[tokio::test]
    async fn missing_or_bad_user_id_is_unauthorized() {
        let req = Request::builder().body(()).expect("request");
        assert_eq!(extract(req).await.unwrap_err().0, StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .header(USER_ID_HEADER, "not-a-uuid")
            .body(())
            .expect("request");
        assert_eq!(extract(req).await.unwrap_err().0, StatusCode::UNAUTHORIZED);
    }
}
