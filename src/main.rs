use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use tonic::transport::Server;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use grpc_sso::auth::adapters::grpc::GrpcAuthService;
use grpc_sso::auth::adapters::memory::MemoryStorage;
use grpc_sso::auth::adapters::postgres::PostgresStorage;
use grpc_sso::auth::password::PasswordHasher;
use grpc_sso::auth::ports::{AppReader, UserReader, UserWriter};
use grpc_sso::auth::AuthService;
use grpc_sso::config::{Env, Settings, StorageBackend};
use grpc_sso::generated::auth::auth_server::AuthServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize logging
    init_logging(settings.env);

    info!(env = ?settings.env, "Starting sso server...");

    let hasher = PasswordHasher::new(settings.auth.hash_cost)?;
    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port).parse()?;

    // Select storage backend
    match settings.storage.backend {
        StorageBackend::Postgres => {
            let storage = Arc::new(PostgresStorage::connect(settings.postgres()?).await.map_err(
                |e| {
                    error!("Failed to connect to storage: {}", e);
                    e
                },
            )?);
            serve(addr, storage, hasher, &settings).await
        }
        StorageBackend::Memory => {
            let storage = Arc::new(MemoryStorage::with_apps(settings.storage.apps.clone()));
            serve(addr, storage, hasher, &settings).await
        }
    }
}

fn init_logging(env: Env) {
    let default_level = match env {
        Env::Local => "debug",
        Env::Dev => "debug",
        Env::Prod => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    match env {
        Env::Local => builder.with_file(true).with_line_number(true).pretty().init(),
        Env::Dev | Env::Prod => builder.compact().init(),
    }
}

async fn serve<S>(
    addr: SocketAddr,
    storage: Arc<S>,
    hasher: PasswordHasher,
    settings: &Settings,
) -> Result<(), Box<dyn Error>>
where
    S: UserWriter + UserReader + AppReader + 'static,
{
    let auth_service = AuthService::new(
        storage.clone(),
        storage.clone(),
        storage,
        hasher,
        settings.token_ttl()?,
    )?;
    let grpc_service = GrpcAuthService::new(Arc::new(auth_service));

    info!("Starting gRPC server on {}", addr);

    Server::builder()
        .add_service(AuthServer::new(grpc_service))
        .serve_with_shutdown(addr, shutdown_signal())
        .await
        .map_err(|e| {
            error!("Server error: {}", e);
            e
        })?;

    info!("gracefully stopped");
    Ok(())
}

// Signal handling for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Received shutdown signal");
}
