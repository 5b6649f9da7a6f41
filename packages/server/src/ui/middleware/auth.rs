//! 呼び出し元の識別
//!
//! `Authorization: Bearer <jwt>`（HS256）、無ければ旧来の `X-User-ID` ヘッダーから
//! [`CallerIdentity`] を作り、リクエストの extensions に入れてからハンドラーに渡します。

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    domain::UserId,
    ui::{error::ApiError, state::AppState},
};

/// 旧来のユーザー識別ヘッダー
pub const USER_ID_HEADER: &str = "x-user-id";

/// JWT のクレーム
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: u64,
}

/// 識別情報の出どころ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentitySource {
    BearerToken,
    LegacyHeader,
}

/// 認証済みの呼び出し元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: UserId,
    pub email: Option<String>,
    pub source: IdentitySource,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingCredentials,

    #[error("Invalid authorization header format. Expected: Bearer <token>")]
    InvalidFormat,

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid user id: {0}")]
    InvalidUserId(String),
}

/// HS256 トークンの検証
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => {
                    tracing::debug!("Token validation failed: {}", e);
                    AuthError::InvalidToken
                }
            })
    }
}

/// ヘッダーから呼び出し元を識別する
///
/// `verifier` が無い（JWT シークレット未設定の）場合、Bearer トークンは常に無効として扱う。
pub struct Authenticator {
    verifier: Option<TokenVerifier>,
}

impl Authenticator {
    pub fn new(verifier: Option<TokenVerifier>) -> Self {
        Self { verifier }
    }

    pub fn identify(&self, headers: &HeaderMap) -> Result<CallerIdentity, AuthError> {
        if let Some(value) = headers.get(AUTHORIZATION) {
            let value = value.to_str().map_err(|_| AuthError::InvalidFormat)?;
            let token = value
                .strip_prefix("Bearer ")
                .filter(|token| !token.is_empty())
                .ok_or(AuthError::InvalidFormat)?;
            let verifier = self.verifier.as_ref().ok_or(AuthError::InvalidToken)?;
            let claims = verifier.verify(token)?;
            let user_id = UserId::new(claims.user_id)
                .map_err(|e| AuthError::InvalidUserId(e.to_string()))?;
            return Ok(CallerIdentity {
                user_id,
                email: claims.email.filter(|email| !email.is_empty()),
                source: IdentitySource::BearerToken,
            });
        }

        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or(AuthError::MissingCredentials)?;
        let user_id = UserId::new(user_id.to_string())
            .map_err(|e| AuthError::InvalidUserId(e.to_string()))?;
        Ok(CallerIdentity {
            user_id,
            email: None,
            source: IdentitySource::LegacyHeader,
        })
    }
}

/// 識別できないリクエストを 401 で拒否するミドルウェア
pub async fn require_identity(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = state.authenticator.identify(req.headers()).map_err(|e| {
        tracing::warn!("[AUTH] {} {}: {}", req.method(), req.uri().path(), e);
        ApiError::from(e)
    })?;
    tracing::debug!(
        "[AUTH] Authenticated user '{}' ({:?})",
        identity.user_id,
        identity.source
    );
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{EncodingKey, Header, encode};

    const SECRET: &str = "test-secret";

    fn token(exp: u64) -> String {
        let claims = Claims {
            user_id: "alice".to_string(),
            email: Some("alice@example.com".to_string()),
            exp,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn now_secs() -> u64 {
        chrono::Utc::now().timestamp() as u64
    }

    fn authenticator() -> Authenticator {
        Authenticator::new(Some(TokenVerifier::new(SECRET)))
    }

    fn headers(name: &'static str, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_missing_credentials_is_rejected() {
        // テスト項目: 認証情報の無いリクエストは拒否される
        // given (前提条件):
        let auth = authenticator();

        // when (操作):
        let result = auth.identify(&HeaderMap::new());

        // then (期待する結果):
        assert_eq!(result, Err(AuthError::MissingCredentials));
    }

    #[test]
    fn test_legacy_header_yields_identity() {
        // テスト項目: X-User-ID ヘッダーから呼び出し元が識別される
        // given (前提条件):
        let auth = authenticator();

        // when (操作):
        let identity = auth.identify(&headers("x-user-id", "bob")).unwrap();

        // then (期待する結果):
        assert_eq!(identity.user_id.as_str(), "bob");
        assert_eq!(identity.source, IdentitySource::LegacyHeader);
        assert_eq!(identity.email, None);
    }

    #[test]
    fn test_valid_bearer_yields_identity() {
        // テスト項目: 有効な Bearer トークンから呼び出し元が識別される
        // given (前提条件):
        let auth = authenticator();
        let value = format!("Bearer {}", token(now_secs() + 900));

        // when (操作):
        let identity = auth.identify(&headers("authorization", &value)).unwrap();

        // then (期待する結果):
        assert_eq!(identity.user_id.as_str(), "alice");
        assert_eq!(identity.email.as_deref(), Some("alice@example.com"));
        assert_eq!(identity.source, IdentitySource::BearerToken);
    }

    #[test]
    fn test_expired_bearer_is_rejected() {
        // テスト項目: 期限切れのトークンは Expired で拒否される
        // given (前提条件):
        let auth = authenticator();
        let value = format!("Bearer {}", token(now_secs() - 3600));

        // when (操作):
        let result = auth.identify(&headers("authorization", &value));

        // then (期待する結果):
        assert_eq!(result, Err(AuthError::Expired));
    }

    #[test]
    fn test_malformed_authorization_header_is_rejected() {
        // テスト項目: Bearer で始まらないヘッダーは形式エラー
        // given (前提条件):
        let auth = authenticator();

        // when (操作):
        let result = auth.identify(&headers("authorization", "Basic abc"));

        // then (期待する結果):
        assert_eq!(result, Err(AuthError::InvalidFormat));
    }

    #[test]
    fn test_token_signed_with_other_secret_is_invalid() {
        // テスト項目: 別の鍵で署名されたトークンは無効
        // given (前提条件):
        let auth = Authenticator::new(Some(TokenVerifier::new("another-secret")));
        let value = format!("Bearer {}", token(now_secs() + 900));

        // when (操作):
        let result = auth.identify(&headers("authorization", &value));

        // then (期待する結果):
        assert_eq!(result, Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_bearer_without_secret_is_invalid() {
        // テスト項目: JWT シークレット未設定の場合、Bearer トークンは受け付けない
        // given (前提条件):
        let auth = Authenticator::new(None);
        let value = format!("Bearer {}", token(now_secs() + 900));

        // when (操作):
        let result = auth.identify(&headers("authorization", &value));

        // then (期待する結果):
        assert_eq!(result, Err(AuthError::InvalidToken));
    }
}
