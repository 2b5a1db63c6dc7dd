use serde::Deserialize;
use thiserror::Error;

/// 登録済みユーザー。`app_id` は常に所属アプリを指す
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub app_id: i32,
    pub email: String,
    pub password_hash: Vec<u8>,
    pub is_admin: bool,
}

/// 事前登録されたクライアントアプリ。`secret` はトークン署名専用
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct App {
    pub id: i32,
    pub name: String,
    pub secret: String,
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("app_id", &self.app_id)
            .field("email", &self.email)
            .field("is_admin", &self.is_admin)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("secret", &"***")
            .finish()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// 未登録メール・アプリ不一致・パスワード誤りをすべて含む
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("user not found")]
    UserNotFound,

    #[error("app not found")]
    AppNotFound,

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

pub type AuthResult<T> = Result<T, AuthError>;
