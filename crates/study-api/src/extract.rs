use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use serde::Deserialize;

use crate::credentials;
use crate::error::ApiError;
use crate::AppState;

/// The authenticated caller, resolved from the `Authorization: Bearer`
/// header. Handlers that take this extractor are protected; a missing or
/// invalid token rejects with 401 and a `WWW-Authenticate: Bearer` header.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
    pub username: String,
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        let mut parts_iter = auth_header.split_whitespace();
        let token = match (parts_iter.next(), parts_iter.next(), parts_iter.next()) {
            (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => token,
            _ => {
                return Err(ApiError::unauthorized(
                    "Invalid authentication credentials",
                ))
            }
        };

        let email = credentials::decode_token(&state.config.secret_key, token)
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired token"))?;

        let user = state
            .db
            .get_user_by_email(&email)?
            .ok_or_else(|| ApiError::unauthorized("User not found"))?;

        Ok(CurrentUser {
            id: user.id,
            email: user.email,
            username: user.username,
        })
    }
}

/// `skip`/`limit` query parameters shared by every list endpoint.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: i64,
    pub limit: Option<i64>,
}

impl Pagination {
    /// Validate bounds (`skip >= 0`, `1 <= limit <= 100`) and fill in the
    /// endpoint's default limit.
    pub fn resolve(&self, default_limit: i64) -> Result<(i64, i64), ApiError> {
        if self.skip < 0 {
            return Err(ApiError::bad_request("skip must be non-negative"));
        }
        let limit = self.limit.unwrap_or(default_limit);
        if !(1..=100).contains(&limit) {
            return Err(ApiError::bad_request("limit must be between 1 and 100"));
        }
        Ok((self.skip, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_bounds() {
        let p = Pagination { skip: 0, limit: None };
        assert_eq!(p.resolve(10).unwrap(), (0, 10));

        let p = Pagination { skip: 5, limit: Some(100) };
        assert_eq!(p.resolve(10).unwrap(), (5, 100));

        let p = Pagination { skip: -1, limit: None };
        assert!(p.resolve(10).is_err());

        let p = Pagination { skip: 0, limit: Some(0) };
        assert!(p.resolve(10).is_err());

        let p = Pagination { skip: 0, limit: Some(101) };
        assert!(p.resolve(10).is_err());
    }
}
