use crate::error::AppError;
use crate::models::UserRole;
use crate::state::AppState;
use axum::extract::State;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The resolved "current user". Everything downstream of the auth layer
/// consumes this; the token itself never travels further.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: UserRole,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    role: String,
    exp: i64,
}

/// Resolve an opaque session credential to an identity, or fail with 401.
/// Stand-in for the external identity service's `resolveSession`.
pub fn resolve_session(secret: &str, token: &str) -> Result<Identity, AppError> {
    let validation = Validation::new(Algorithm::HS256);
    let data = decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthorized)?;

    let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AppError::Unauthorized)?;
    let role = UserRole::parse(&data.claims.role).ok_or(AppError::Unauthorized)?;

    Ok(Identity { user_id, role })
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Middleware that resolves the session and stores the identity in request
/// extensions. Failures short-circuit before any handler runs.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<axum::response::Response, AppError> {
    let token = bearer_token(req.headers()).ok_or(AppError::Unauthorized)?;
    let identity = resolve_session(&state.config.session_secret, token)?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, sub: &str, role: &str, exp: i64) -> String {
        let claims = SessionClaims {
            sub: sub.into(),
            role: role.into(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn resolves_valid_session() {
        let user = Uuid::new_v4();
        let t = token("s3cret", &user.to_string(), "INSTRUCTOR", future_exp());
        let identity = resolve_session("s3cret", &t).unwrap();
        assert_eq!(identity.user_id, user);
        assert_eq!(identity.role, UserRole::Instructor);
    }

    #[test]
    fn rejects_wrong_secret() {
        let t = token("s3cret", &Uuid::new_v4().to_string(), "STUDENT", future_exp());
        assert!(resolve_session("other", &t).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let t = token(
            "s3cret",
            &Uuid::new_v4().to_string(),
            "STUDENT",
            chrono::Utc::now().timestamp() - 3600,
        );
        assert!(resolve_session("s3cret", &t).is_err());
    }

    #[test]
    fn rejects_unknown_role() {
        let t = token("s3cret", &Uuid::new_v4().to_string(), "ROOT", future_exp());
        assert!(resolve_session("s3cret", &t).is_err());
    }

    #[test]
    fn rejects_non_uuid_subject() {
        let t = token("s3cret", "alice", "STUDENT", future_exp());
        assert!(resolve_session("s3cret", &t).is_err());
    }
}
