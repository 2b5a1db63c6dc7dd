#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use grpc_sso::auth::adapters::memory::MemoryStorage;
use grpc_sso::auth::domain::{App, AuthError, AuthResult};
use grpc_sso::auth::password::PasswordHasher;
use grpc_sso::auth::ports::AuthenticationPort;
use grpc_sso::AuthService;
use tokio::sync::Mutex;

pub type MemoryAuthService = AuthService<MemoryStorage, MemoryStorage, MemoryStorage>;

pub const APP_SECRET: &str = "test-secret";
pub const OTHER_APP_SECRET: &str = "other-secret";

pub fn apps() -> Vec<App> {
    vec![
        App {
            id: 1,
            name: "test-app".to_string(),
            secret: APP_SECRET.to_string(),
        },
        App {
            id: 2,
            name: "other-app".to_string(),
            secret: OTHER_APP_SECRET.to_string(),
        },
    ]
}

/// テスト用に最小コストの Argon2 を使う
pub fn cheap_hasher() -> PasswordHasher {
    PasswordHasher::with_params(8, 1, 1).expect("valid argon2 params")
}

pub fn memory_service() -> (Arc<MemoryStorage>, MemoryAuthService) {
    let storage = Arc::new(MemoryStorage::with_apps(apps()));
    let service = AuthService::new(
        storage.clone(),
        storage.clone(),
        storage.clone(),
        cheap_hasher(),
        time::Duration::hours(1),
    )
    .expect("service construction");
    (storage, service)
}

/// 返す結果を差し替えられる認証サービス
pub struct MockAuthService {
    pub login_response: Mutex<Option<AuthResult<String>>>,
    pub register_response: Mutex<Option<AuthResult<i64>>>,
    pub is_admin_response: Mutex<Option<AuthResult<bool>>>,
    pub calls: Mutex<usize>,
}

impl MockAuthService {
    pub fn new() -> Self {
        Self {
            login_response: Mutex::new(None),
            register_response: Mutex::new(None),
            is_admin_response: Mutex::new(None),
            calls: Mutex::new(0),
        }
    }

    pub async fn set_login_response(&self, response: AuthResult<String>) {
        *self.login_response.lock().await = Some(response);
    }

    pub async fn set_register_response(&self, response: AuthResult<i64>) {
        *self.register_response.lock().await = Some(response);
    }

    pub async fn set_is_admin_response(&self, response: AuthResult<bool>) {
        *self.is_admin_response.lock().await = Some(response);
    }

    pub async fn calls(&self) -> usize {
        *self.calls.lock().await
    }

    async fn record_call(&self) {
        *self.calls.lock().await += 1;
    }
}

fn no_response<T>() -> AuthResult<T> {
    Err(AuthError::InternalError("No mock response set".to_string()))
}

#[async_trait]
impl AuthenticationPort for MockAuthService {
    async fn login(&self, _email: &str, _password: &str, _app_id: i32) -> AuthResult<String> {
        self.record_call().await;
        self.login_response
            .lock()
            .await
            .clone()
            .unwrap_or_else(no_response)
    }

    async fn register(&self, _email: &str, _password: &str, _app_id: i32) -> AuthResult<i64> {
        self.record_call().await;
        self.register_response
            .lock()
            .await
            .clone()
            .unwrap_or_else(no_response)
    }

    async fn is_admin(&self, _user_id: i64) -> AuthResult<bool> {
        self.record_call().await;
        self.is_admin_response
            .lock()
            .await
            .clone()
            .unwrap_or_else(no_response)
    }
}
