//! 認証ドメインサービス。
//!
//! ストレージはポート経由でのみ扱い、実装には依存しない。
//! ログイン時の失敗はアカウント列挙を防ぐため `InvalidCredentials` に集約する。

use std::sync::Arc;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument, warn};

use crate::auth::domain::{AuthError, AuthResult};
use crate::auth::password::{CredentialHasher, PasswordHasher};
use crate::auth::ports::{AppReader, AuthenticationPort, StorageError, UserReader, UserWriter};
use crate::auth::token;

// 照合対象が無いときに検証するパスワード
const DUMMY_PASSWORD: &str = "timing-equalizer";

pub struct AuthService<W, R, A, H = PasswordHasher> {
    user_writer: Arc<W>,
    user_reader: Arc<R>,
    app_reader: Arc<A>,
    hasher: H,
    /// 起動時に同じ設定で作るハッシュ。失敗経路でも照合コストを揃える
    dummy_hash: Arc<[u8]>,
    token_ttl: Duration,
}

impl<W, R, A, H> AuthService<W, R, A, H>
where
    W: UserWriter,
    R: UserReader,
    A: AppReader,
    H: CredentialHasher,
{
    pub fn new(
        user_writer: Arc<W>,
        user_reader: Arc<R>,
        app_reader: Arc<A>,
        hasher: H,
        token_ttl: Duration,
    ) -> AuthResult<Self> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?.into();
        Ok(Self {
            user_writer,
            user_reader,
            app_reader,
            hasher,
            dummy_hash,
            token_ttl,
        })
    }

    // Argon2 は重いのでランタイムのワーカーを塞がない
    async fn hash_password(&self, password: &str) -> AuthResult<Vec<u8>> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::InternalError(format!("hashing task failed: {e}")))?
    }

    async fn verify_password(&self, password: &str, stored: Arc<[u8]>) -> AuthResult<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &stored))
            .await
            .map_err(|e| AuthError::InternalError(format!("verify task failed: {e}")))?
    }

    /// 正規の照合と同じだけ計算してから拒否する
    async fn reject_credentials(&self, password: &str) -> AuthResult<String> {
        self.verify_password(password, self.dummy_hash.clone()).await?;
        Err(AuthError::InvalidCredentials)
    }
}

#[async_trait]
impl<W, R, A, H> AuthenticationPort for AuthService<W, R, A, H>
where
    W: UserWriter + 'static,
    R: UserReader + 'static,
    A: AppReader + 'static,
    H: CredentialHasher,
{
    #[instrument(name = "Auth.Login", skip(self, password))]
    async fn login(&self, email: &str, password: &str, app_id: i32) -> AuthResult<String> {
        info!("attempting to login user");

        let user = match self.user_reader.user(email).await {
            Ok(user) => user,
            Err(StorageError::UserNotFound) => {
                warn!("user not found");
                return self.reject_credentials(password).await;
            }
            Err(e) => {
                error!(error = %e, "failed to get user");
                return Err(e.into());
            }
        };

        if user.app_id != app_id {
            warn!(user_app_id = user.app_id, "user does not belong to requested app");
            return self.reject_credentials(password).await;
        }

        let app = match self.app_reader.app(app_id).await {
            Ok(app) => app,
            Err(StorageError::AppNotFound) => {
                warn!("app not found");
                return self.reject_credentials(password).await;
            }
            Err(e) => {
                error!(error = %e, "failed to get app");
                return Err(e.into());
            }
        };

        if !self
            .verify_password(password, user.password_hash.into())
            .await?
        {
            info!("invalid credentials");
            return Err(AuthError::InvalidCredentials);
        }

        let token = token::issue(
            user.id,
            &user.email,
            app.id,
            app.secret.as_bytes(),
            OffsetDateTime::now_utc(),
            self.token_ttl,
        )
        .map_err(|e| {
            error!(error = %e, "failed to generate token");
            AuthError::InternalError(e.to_string())
        })?;

        info!(user_id = user.id, "user logged in successfully");
        Ok(token)
    }

    #[instrument(name = "Auth.Register", skip(self, password))]
    async fn register(&self, email: &str, password: &str, app_id: i32) -> AuthResult<i64> {
        info!("registering user");

        let password_hash = self.hash_password(password).await.map_err(|e| {
            error!(error = %e, "failed to generate password hash");
            e
        })?;

        match self.user_writer.save_user(email, &password_hash, app_id).await {
            Ok(id) => {
                info!(user_id = id, "user registered");
                Ok(id)
            }
            Err(StorageError::UserExists) => {
                warn!("user already exists");
                Err(AuthError::UserAlreadyExists)
            }
            Err(e) => {
                error!(error = %e, "failed to save user");
                Err(e.into())
            }
        }
    }

    #[instrument(name = "Auth.IsAdmin", skip(self))]
    async fn is_admin(&self, user_id: i64) -> AuthResult<bool> {
        info!("checking if user is admin");

        let is_admin = self.user_reader.is_admin(user_id).await.map_err(|e| {
            match &e {
                StorageError::UserNotFound => warn!("user not found"),
                _ => error!(error = %e, "failed to check admin flag"),
            }
            AuthError::from(e)
        })?;

        info!(is_admin, "checked if user is admin");
        Ok(is_admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::domain::{App, User};
    use crate::auth::ports::StorageResult;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 返す結果を差し替えられるストレージ
    struct MockStorage {
        user: Mutex<Option<StorageResult<User>>>,
        app: Mutex<Option<StorageResult<App>>>,
        save: Mutex<Option<StorageResult<i64>>>,
        admin: Mutex<Option<StorageResult<bool>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                user: Mutex::new(None),
                app: Mutex::new(None),
                save: Mutex::new(None),
                admin: Mutex::new(None),
            }
        }
    }

    fn unset<T>() -> StorageResult<T> {
        Err(StorageError::Database("no response set".to_string()))
    }

    #[async_trait]
    impl UserWriter for MockStorage {
        async fn save_user(&self, _: &str, _: &[u8], _: i32) -> StorageResult<i64> {
            self.save.lock().take().unwrap_or_else(unset)
        }
    }

    #[async_trait]
    impl UserReader for MockStorage {
        async fn user(&self, _: &str) -> StorageResult<User> {
            self.user.lock().take().unwrap_or_else(unset)
        }

        async fn is_admin(&self, _: i64) -> StorageResult<bool> {
            self.admin.lock().take().unwrap_or_else(unset)
        }
    }

    #[async_trait]
    impl AppReader for MockStorage {
        async fn app(&self, _: i32) -> StorageResult<App> {
            self.app.lock().take().unwrap_or_else(unset)
        }
    }

    fn hasher() -> PasswordHasher {
        PasswordHasher::with_params(argon2::Params::MIN_M_COST, 1, 1).unwrap()
    }

    fn service(storage: &Arc<MockStorage>) -> AuthService<MockStorage, MockStorage, MockStorage> {
        AuthService::new(
            storage.clone(),
            storage.clone(),
            storage.clone(),
            hasher(),
            Duration::hours(1),
        )
        .unwrap()
    }

    /// `verify` の呼び出し回数を数えるハッシャ
    #[derive(Clone)]
    struct CountingHasher {
        inner: PasswordHasher,
        verifies: Arc<AtomicUsize>,
    }

    impl CredentialHasher for CountingHasher {
        fn hash(&self, password: &str) -> AuthResult<Vec<u8>> {
            self.inner.hash(password)
        }

        fn verify(&self, password: &str, stored: &[u8]) -> AuthResult<bool> {
            self.verifies.fetch_add(1, Ordering::SeqCst);
            self.inner.verify(password, stored)
        }
    }

    fn counting_service(
        storage: &Arc<MockStorage>,
    ) -> (
        Arc<AtomicUsize>,
        AuthService<MockStorage, MockStorage, MockStorage, CountingHasher>,
    ) {
        let verifies = Arc::new(AtomicUsize::new(0));
        let hasher = CountingHasher {
            inner: hasher(),
            verifies: verifies.clone(),
        };
        let service = AuthService::new(
            storage.clone(),
            storage.clone(),
            storage.clone(),
            hasher,
            Duration::hours(1),
        )
        .unwrap();
        (verifies, service)
    }

    fn user(app_id: i32, password: &str) -> User {
        User {
            id: 42,
            app_id,
            email: "u@x.com".to_string(),
            password_hash: hasher().hash(password).unwrap(),
            is_admin: false,
        }
    }

    fn app(id: i32) -> App {
        App {
            id,
            name: "test".to_string(),
            secret: "s3cr3t".to_string(),
        }
    }

    #[tokio::test]
    async fn login_issues_token_signed_with_app_secret() {
        let storage = Arc::new(MockStorage::new());
        *storage.user.lock() = Some(Ok(user(1, "pw")));
        *storage.app.lock() = Some(Ok(app(1)));

        let token = service(&storage).login("u@x.com", "pw", 1).await.unwrap();
        let claims = token::verify(&token, b"s3cr3t").unwrap();
        assert_eq!(claims.uid, 42);
        assert_eq!(claims.app_id, 1);
    }

    #[tokio::test]
    async fn login_collapses_missing_app_into_invalid_credentials() {
        let storage = Arc::new(MockStorage::new());
        *storage.user.lock() = Some(Ok(user(1, "pw")));
        *storage.app.lock() = Some(Err(StorageError::AppNotFound));

        let result = service(&storage).login("u@x.com", "pw", 1).await;
        assert_eq!(result, Err(AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_surfaces_storage_failure_as_internal() {
        let storage = Arc::new(MockStorage::new());
        *storage.user.lock() = Some(Err(StorageError::Database("connection reset".into())));

        let result = service(&storage).login("u@x.com", "pw", 1).await;
        assert!(matches!(result, Err(AuthError::InternalError(_))));
    }

    #[tokio::test]
    async fn register_maps_storage_errors() {
        let storage = Arc::new(MockStorage::new());
        let svc = service(&storage);

        *storage.save.lock() = Some(Err(StorageError::UserExists));
        assert_eq!(
            svc.register("u@x.com", "pw", 1).await,
            Err(AuthError::UserAlreadyExists)
        );

        *storage.save.lock() = Some(Err(StorageError::AppNotFound));
        assert_eq!(
            svc.register("u@x.com", "pw", 9).await,
            Err(AuthError::AppNotFound)
        );

        *storage.save.lock() = Some(Ok(5));
        assert_eq!(svc.register("u@x.com", "pw", 1).await, Ok(5));
    }

    #[tokio::test]
    async fn is_admin_maps_not_found() {
        let storage = Arc::new(MockStorage::new());
        *storage.admin.lock() = Some(Err(StorageError::UserNotFound));

        assert_eq!(service(&storage).is_admin(1).await, Err(AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn every_login_rejection_runs_password_verification() {
        // 未登録メール
        let storage = Arc::new(MockStorage::new());
        let (verifies, svc) = counting_service(&storage);
        *storage.user.lock() = Some(Err(StorageError::UserNotFound));
        assert_eq!(
            svc.login("nobody@x.com", "pw", 1).await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(verifies.load(Ordering::SeqCst), 1);

        // 所属アプリ不一致
        let storage = Arc::new(MockStorage::new());
        let (verifies, svc) = counting_service(&storage);
        *storage.user.lock() = Some(Ok(user(1, "pw")));
        assert_eq!(
            svc.login("u@x.com", "pw", 2).await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(verifies.load(Ordering::SeqCst), 1);

        // アプリが存在しない
        let storage = Arc::new(MockStorage::new());
        let (verifies, svc) = counting_service(&storage);
        *storage.user.lock() = Some(Ok(user(1, "pw")));
        *storage.app.lock() = Some(Err(StorageError::AppNotFound));
        assert_eq!(
            svc.login("u@x.com", "pw", 1).await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(verifies.load(Ordering::SeqCst), 1);

        // パスワード誤り
        let storage = Arc::new(MockStorage::new());
        let (verifies, svc) = counting_service(&storage);
        *storage.user.lock() = Some(Ok(user(1, "pw")));
        *storage.app.lock() = Some(Ok(app(1)));
        assert_eq!(
            svc.login("u@x.com", "wrong", 1).await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(verifies.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn dummy_password_does_not_authenticate_unknown_user() {
        let storage = Arc::new(MockStorage::new());
        *storage.user.lock() = Some(Err(StorageError::UserNotFound));

        let result = service(&storage)
            .login("nobody@x.com", DUMMY_PASSWORD, 1)
            .await;
        assert_eq!(result, Err(AuthError::InvalidCredentials));
    }
}
