use crate::auth::domain::{App, AuthError, AuthResult, User};
use async_trait::async_trait;
use thiserror::Error;

/// ストレージ実装が返すエラー。
/// 一意制約違反と未検出は I/O 失敗と区別して返すこと
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("user already exists")]
    UserExists,

    #[error("user not found")]
    UserNotFound,

    #[error("app not found")]
    AppNotFound,

    #[error("database error: {0}")]
    Database(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait UserWriter: Send + Sync {
    /// ユーザーを作成し採番された ID を返す。メール重複時は `UserExists`
    async fn save_user(&self, email: &str, password_hash: &[u8], app_id: i32)
        -> StorageResult<i64>;
}

#[async_trait]
pub trait UserReader: Send + Sync {
    /// メールアドレスでユーザーを取得
    async fn user(&self, email: &str) -> StorageResult<User>;
    /// 管理者フラグを取得
    async fn is_admin(&self, user_id: i64) -> StorageResult<bool>;
}

#[async_trait]
pub trait AppReader: Send + Sync {
    async fn app(&self, app_id: i32) -> StorageResult<App>;
}

/// gRPC アダプタから見た認証サービス
#[async_trait]
pub trait AuthenticationPort: Send + Sync {
    /// 認証してアプリ用トークンを発行
    async fn login(&self, email: &str, password: &str, app_id: i32) -> AuthResult<String>;
    /// ユーザー登録
    async fn register(&self, email: &str, password: &str, app_id: i32) -> AuthResult<i64>;
    /// 管理者判定
    async fn is_admin(&self, user_id: i64) -> AuthResult<bool>;
}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UserExists => AuthError::UserAlreadyExists,
            StorageError::UserNotFound => AuthError::UserNotFound,
            StorageError::AppNotFound => AuthError::AppNotFound,
            StorageError::Database(msg) => AuthError::InternalError(msg),
        }
    }
}
