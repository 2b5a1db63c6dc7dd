use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::auth::domain::{App, User};
use crate::auth::ports::{AppReader, StorageError, StorageResult, UserReader, UserWriter};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    by_email: HashMap<String, usize>,
    apps: HashMap<i32, App>,
}

/// プロセス内ストレージ。テストとローカル起動用
#[derive(Default)]
pub struct MemoryStorage {
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_apps(apps: impl IntoIterator<Item = App>) -> Self {
        let storage = Self::new();
        for app in apps {
            storage.insert_app(app);
        }
        storage
    }

    pub fn insert_app(&self, app: App) {
        self.tables.write().apps.insert(app.id, app);
    }

    pub fn set_admin(&self, user_id: i64, is_admin: bool) -> StorageResult<()> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(StorageError::UserNotFound)?;
        user.is_admin = is_admin;
        Ok(())
    }

    pub fn user_count(&self) -> usize {
        self.tables.read().users.len()
    }
}

#[async_trait]
impl UserWriter for MemoryStorage {
    async fn save_user(
        &self,
        email: &str,
        password_hash: &[u8],
        app_id: i32,
    ) -> StorageResult<i64> {
        // 重複確認と挿入を同じ書き込みロック内で行う
        let mut tables = self.tables.write();
        if tables.by_email.contains_key(email) {
            return Err(StorageError::UserExists);
        }
        if !tables.apps.contains_key(&app_id) {
            return Err(StorageError::AppNotFound);
        }

        let id = tables.users.len() as i64 + 1;
        tables.users.push(User {
            id,
            app_id,
            email: email.to_string(),
            password_hash: password_hash.to_vec(),
            is_admin: false,
        });
        let index = tables.users.len() - 1;
        tables.by_email.insert(email.to_string(), index);
        Ok(id)
    }
}

#[async_trait]
impl UserReader for MemoryStorage {
    async fn user(&self, email: &str) -> StorageResult<User> {
        let tables = self.tables.read();
        tables
            .by_email
            .get(email)
            .map(|&i| tables.users[i].clone())
            .ok_or(StorageError::UserNotFound)
    }

    async fn is_admin(&self, user_id: i64) -> StorageResult<bool> {
        self.tables
            .read()
            .users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.is_admin)
            .ok_or(StorageError::UserNotFound)
    }
}

#[async_trait]
impl AppReader for MemoryStorage {
    async fn app(&self, app_id: i32) -> StorageResult<App> {
        self.tables
            .read()
            .apps
            .get(&app_id)
            .cloned()
            .ok_or(StorageError::AppNotFound)
    }
}
