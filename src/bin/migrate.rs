//! `migrations/` を PostgreSQL に適用する

use std::error::Error;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use grpc_sso::auth::adapters::postgres::{applied_migrations, connect_with_retry};
use grpc_sso::config::Settings;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let settings = Settings::new()?;
    let pool = connect_with_retry(settings.postgres()?).await.map_err(|e| {
        error!("migrate: postgres connect error: {}", e);
        e
    })?;

    let migrator = sqlx::migrate!("./migrations");
    let applied = match applied_migrations(&pool).await {
        Ok(count) => count,
        Err(e) => {
            // 件数はログ表示にのみ使う
            warn!("migrate: failed to read applied migrations: {}", e);
            0
        }
    };
    debug!(applied, "migrate: applied migrations before run");

    migrator.run(&pool).await.map_err(|e| {
        error!("migrate: up error: {}", e);
        e
    })?;

    if applied as usize >= migrator.iter().count() {
        info!("migrate: no change");
    } else {
        info!("migrate: up success");
    }

    pool.close().await;
    Ok(())
}
