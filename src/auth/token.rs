//! アプリごとのシークレットで署名する HS256 トークン

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub uid: i64,
    pub email: String,
    pub app_id: i32,
    /// 失効時刻 (UNIX 秒)
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token: {0}")]
    Encode(String),

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),
}

/// クレームに署名してトークン文字列を返す。
/// 失効時刻は `now + validity`
pub fn issue(
    user_id: i64,
    email: &str,
    app_id: i32,
    app_secret: &[u8],
    now: OffsetDateTime,
    validity: Duration,
) -> Result<String, TokenError> {
    let claims = Claims {
        uid: user_id,
        email: email.to_string(),
        app_id,
        exp: now
            .checked_add(validity)
            .ok_or_else(|| TokenError::Encode("expiry is out of range".to_string()))?
            .unix_timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(app_secret),
    )
    .map_err(|e| TokenError::Encode(e.to_string()))
}

/// 署名と有効期限を検証してクレームを返す
pub fn verify(token: &str, app_secret: &[u8]) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp"]);

    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(app_secret), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        })
}
