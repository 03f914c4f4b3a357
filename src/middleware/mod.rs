use axum::{
    extract::{FromRequestParts, Query},
    http::{header, request::Parts, StatusCode},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::UserId;
use crate::storage::ReservationStore;
use crate::AppState;

/// Проверенный владелец запроса; ядро получает только `user_id`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: UserId,
}

// Токены выпускает сервис аутентификации, здесь только проверка.
// Он кладёт в токен один `_id`; `exp` проверяется, только если он есть.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Токен из `?token=` или из `Authorization: Bearer <token>`.
pub fn extract_token(parts: &Parts) -> Option<String> {
    if let Ok(Query(TokenQuery { token: Some(token) })) = Query::<TokenQuery>::try_from_uri(&parts.uri) {
        if !token.is_empty() {
            return Some(token);
        }
    }

    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

pub fn decode_user_id(token: &str, secret: &str) -> Result<UserId, StatusCode> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.required_spec_claims.clear();

    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| {
            tracing::debug!("rejected token: {}", e);
            StatusCode::UNAUTHORIZED
        })?;

    data.claims
        .id
        .parse::<i32>()
        .map(UserId)
        .map_err(|_| StatusCode::UNAUTHORIZED)
}

// Bearer JWT extractor
impl<S: ReservationStore> FromRequestParts<Arc<AppState<S>>> for AuthUser {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState<S>>
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(parts).ok_or(StatusCode::UNAUTHORIZED)?;
        let user_id = decode_user_id(&token, &state.config.jwt.secret)?;

        // Пользователь из токена должен существовать
        let registered = state.reservations.is_registered(user_id).await.map_err(|e| {
            tracing::error!("user lookup failed for {}: {:?}", user_id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
        if !registered {
            tracing::debug!("token for unknown user {}", user_id);
            return Err(StatusCode::UNAUTHORIZED);
        }

        Ok(AuthUser { user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &str = "test-secret";

    fn token_for(id: &str, secret: &str, exp: Option<usize>) -> String {
        let claims = Claims { id: id.to_string(), exp };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn far_future() -> Option<usize> {
        Some((chrono::Utc::now().timestamp() + 3600) as usize)
    }

    fn parts(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn reads_bearer_header() {
        let p = parts("/user/reservations", Some("Bearer abc.def.ghi"));
        assert_eq!(extract_token(&p).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn query_token_wins_over_header() {
        let p = parts("/user/reservations?token=from-query", Some("Bearer from-header"));
        assert_eq!(extract_token(&p).as_deref(), Some("from-query"));
    }

    #[test]
    fn missing_or_foreign_scheme_yields_nothing() {
        assert!(extract_token(&parts("/user/reservations", None)).is_none());
        assert!(extract_token(&parts("/user/reservations", Some("Basic dXNlcjpwYXNz"))).is_none());
        assert!(extract_token(&parts("/user/reservations?token=", None)).is_none());
    }

    #[test]
    fn decodes_user_id_claim() {
        let token = token_for("42", SECRET, far_future());
        assert_eq!(decode_user_id(&token, SECRET), Ok(UserId(42)));
    }

    #[test]
    fn accepts_token_without_expiry() {
        // Так выпускает токены сервис аутентификации: только `_id`
        let token = encode(
            &Header::new(Algorithm::HS256),
            &serde_json::json!({ "_id": "42" }),
            &EncodingKey::from_secret(b"s"),
        )
        .unwrap();
        assert_eq!(decode_user_id(&token, "s"), Ok(UserId(42)));
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = token_for("42", "other-secret", far_future());
        assert_eq!(decode_user_id(&token, SECRET), Err(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn rejects_expired_token() {
        let token = token_for("42", SECRET, Some(1_000));
        assert_eq!(decode_user_id(&token, SECRET), Err(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn rejects_non_numeric_id() {
        let token = token_for("admin", SECRET, far_future());
        assert_eq!(decode_user_id(&token, SECRET), Err(StatusCode::UNAUTHORIZED));
    }
}
