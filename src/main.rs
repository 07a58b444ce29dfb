mod api;
mod auth;
mod config;
mod core;
mod judge0;
mod judger;
mod languages;
mod mail;
mod store;
mod validator;

#[cfg(test)]
mod stubs;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::api::AppState;
use crate::config::{Config, StoreBackend};
use crate::judge0::Judge0Client;
use crate::languages::Languages;
use crate::mail::LogMailer;
use crate::store::{MemoryStore, ProblemStore, RedisStore, UserStore};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("judgehub=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // Load language configurations
    let languages = match &config.languages_config {
        Some(path) => {
            let languages = Languages::from_path(path)?;
            info!("Loaded language configurations from {}", path.display());
            languages
        }
        None => Languages::bundled()?,
    };
    info!("Supported languages: {}", languages.supported().join(", "));

    let judge = Judge0Client::new(&config.judge0)?;
    info!("Judge service at {}", config.judge0.base_url);

    let (problems, users): (Arc<dyn ProblemStore>, Arc<dyn UserStore>) =
        match config.store_backend {
            StoreBackend::Redis => {
                let store = Arc::new(RedisStore::connect(&config.redis_url).await?);
                (store.clone(), store)
            }
            StoreBackend::Memory => {
                info!("Using in-memory store; data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        config: Arc::new(config),
        languages: Arc::new(languages),
        judge: Arc::new(judge),
        problems,
        users,
        mailer: Arc::new(LogMailer),
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("Listening on {}", bind_addr);

    axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
