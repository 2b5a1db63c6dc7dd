use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tracing::{debug, warn};

use crate::auth::domain::{App, User};
use crate::auth::ports::{AppReader, StorageError, StorageResult, UserReader, UserWriter};
use crate::config::DatabaseConfig;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const UNDEFINED_TABLE: &str = "42P01";

pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 接続できるまで `connect_attempts` 回まで待機しながら再試行する
    pub async fn connect(config: &DatabaseConfig) -> StorageResult<Self> {
        let pool = connect_with_retry(config).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub async fn connect_with_retry(config: &DatabaseConfig) -> StorageResult<PgPool> {
    let attempts = config.connect_attempts.max(1);
    let mut delay = Duration::from_millis(config.connect_retry_delay_ms);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) => {
                warn!(attempt, attempts, error = %e, "postgres is trying to connect");
                last_error = Some(e);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(StorageError::Database(format!(
        "failed to connect after {attempts} attempts: {}",
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}

/// 適用済みマイグレーション数。管理テーブルが未作成なら 0
pub async fn applied_migrations(pool: &PgPool) -> StorageResult<i64> {
    const OP: &str = "storage.postgres.applied_migrations";

    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations WHERE success")
        .fetch_one(pool)
        .await
    {
        Ok(count) => Ok(count),
        Err(e) if is_undefined_table(constraint_code(&e).as_deref()) => Ok(0),
        Err(e) => Err(database_error(OP, e)),
    }
}

fn is_undefined_table(code: Option<&str>) -> bool {
    code == Some(UNDEFINED_TABLE)
}

fn database_error(op: &str, e: sqlx::Error) -> StorageError {
    StorageError::Database(format!("{op}: {e}"))
}

fn constraint_code(e: &sqlx::Error) -> Option<String> {
    match e {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// INSERT 失敗時の SQLSTATE を分類する。該当しなければ `None`
fn classify_insert_error(code: Option<&str>) -> Option<StorageError> {
    match code {
        Some(UNIQUE_VIOLATION) => Some(StorageError::UserExists),
        Some(FOREIGN_KEY_VIOLATION) => Some(StorageError::AppNotFound),
        _ => None,
    }
}

fn insert_error(op: &str, e: sqlx::Error) -> StorageError {
    classify_insert_error(constraint_code(&e).as_deref()).unwrap_or_else(|| database_error(op, e))
}

/// 単一行の取得失敗。行が無い場合は `not_found` を返す
fn fetch_error(op: &str, e: sqlx::Error, not_found: StorageError) -> StorageError {
    match e {
        sqlx::Error::RowNotFound => not_found,
        e => database_error(op, e),
    }
}

#[async_trait]
impl UserWriter for PostgresStorage {
    async fn save_user(
        &self,
        email: &str,
        password_hash: &[u8],
        app_id: i32,
    ) -> StorageResult<i64> {
        const OP: &str = "storage.postgres.save_user";
        debug!(email, app_id, "inserting user");

        // 単一の INSERT なので途中で中断されても部分的な行は残らない
        let result = sqlx::query(
            r#"
            INSERT INTO users (email, password_hash, app_id)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(app_id)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => row.try_get::<i64, _>("id").map_err(|e| database_error(OP, e)),
            Err(e) => Err(insert_error(OP, e)),
        }
    }
}

#[async_trait]
impl UserReader for PostgresStorage {
    async fn user(&self, email: &str) -> StorageResult<User> {
        const OP: &str = "storage.postgres.user";

        let row = sqlx::query(
            r#"
            SELECT id, app_id, email, password_hash, is_admin
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| fetch_error(OP, e, StorageError::UserNotFound))?;

        Ok(User {
            id: row.try_get("id").map_err(|e| database_error(OP, e))?,
            app_id: row.try_get("app_id").map_err(|e| database_error(OP, e))?,
            email: row.try_get("email").map_err(|e| database_error(OP, e))?,
            password_hash: row
                .try_get("password_hash")
                .map_err(|e| database_error(OP, e))?,
            is_admin: row.try_get("is_admin").map_err(|e| database_error(OP, e))?,
        })
    }

    async fn is_admin(&self, user_id: i64) -> StorageResult<bool> {
        const OP: &str = "storage.postgres.is_admin";

        sqlx::query_scalar::<_, bool>("SELECT is_admin FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| fetch_error(OP, e, StorageError::UserNotFound))
    }
}

#[async_trait]
impl AppReader for PostgresStorage {
    async fn app(&self, app_id: i32) -> StorageResult<App> {
        const OP: &str = "storage.postgres.app";

        let row = sqlx::query("SELECT id, name, secret FROM apps WHERE id = $1")
            .bind(app_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| fetch_error(OP, e, StorageError::AppNotFound))?;

        Ok(App {
            id: row.try_get("id").map_err(|e| database_error(OP, e))?,
            name: row.try_get("name").map_err(|e| database_error(OP, e))?,
            secret: row.try_get("secret").map_err(|e| database_error(OP, e))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_constraint_violations_are_classified() {
        assert!(matches!(
            classify_insert_error(Some("23505")),
            Some(StorageError::UserExists)
        ));
        assert!(matches!(
            classify_insert_error(Some("23503")),
            Some(StorageError::AppNotFound)
        ));
    }

    #[test]
    fn other_insert_failures_stay_unclassified() {
        assert!(classify_insert_error(Some("23502")).is_none());
        assert!(classify_insert_error(Some("40001")).is_none());
        assert!(classify_insert_error(None).is_none());
    }

    #[test]
    fn insert_error_without_sqlstate_is_database_error() {
        let err = insert_error("storage.postgres.save_user", sqlx::Error::PoolTimedOut);
        match err {
            StorageError::Database(msg) => assert!(msg.starts_with("storage.postgres.save_user")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn only_undefined_table_counts_as_fresh_database() {
        assert!(is_undefined_table(Some("42P01")));
        assert!(!is_undefined_table(Some("42501")));
        assert!(!is_undefined_table(None));
    }

    #[test]
    fn missing_row_maps_to_not_found() {
        assert!(matches!(
            fetch_error("op", sqlx::Error::RowNotFound, StorageError::UserNotFound),
            StorageError::UserNotFound
        ));
        assert!(matches!(
            fetch_error("op", sqlx::Error::RowNotFound, StorageError::AppNotFound),
            StorageError::AppNotFound
        ));
    }

    #[test]
    fn other_fetch_failures_are_database_errors() {
        assert!(matches!(
            fetch_error("op", sqlx::Error::PoolClosed, StorageError::UserNotFound),
            StorageError::Database(_)
        ));
    }
}
