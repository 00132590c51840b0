pub mod rank;
pub mod rejudge;
pub mod run;
pub mod sync;

use crate::modules::{migration::MIGRATOR, storage::PgStorage};
use anyhow::{Context, Result};
use sqlx::{postgres::Postgres, Pool};
use stackrating_libs::{shutdown::Shutdown, stackexchange::StackExchangeClient};
use std::{env, sync::Arc};

/// Connects to the database given by `DATABASE_URL` and brings its schema up to date.
pub async fn connect() -> Result<PgStorage> {
    let database_url: String = env::var("DATABASE_URL").with_context(|| {
        let message = "DATABASE_URL must be configured.";
        tracing::error!(message);
        message
    })?;

    let pool: Pool<Postgres> = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .with_context(|| {
            let message = "Failed to create database connection pool.";
            tracing::error!(message);
            message
        })?;

    MIGRATOR.run(&pool).await.with_context(|| {
        let message = "Failed to migrate database.";
        tracing::error!(message);
        message
    })?;

    Ok(PgStorage::new(pool))
}

pub fn create_client() -> Result<StackExchangeClient> {
    let site = env::var("STACKEXCHANGE_SITE").unwrap_or_else(|_| {
        tracing::warn!(
            "STACKEXCHANGE_SITE environment variable is not set. Default value `stackoverflow` will be used."
        );
        String::from("stackoverflow")
    });
    let key = env::var("STACKEXCHANGE_KEY").ok();
    if key.is_none() {
        tracing::warn!(
            "STACKEXCHANGE_KEY is not set, requests run on the much smaller anonymous quota."
        );
    }

    StackExchangeClient::new(&site, key).with_context(|| {
        let message = format!("couldn't create Stack Exchange API client for site {}", site);
        tracing::error!(message);
        message
    })
}

/// Requests shutdown on SIGINT or SIGTERM.
pub fn watch_shutdown_signal(shutdown: Arc<Shutdown>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to install Ctrl+C handler: {:?}", e);
                std::future::pending::<()>().await;
            }
        };

        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {:?}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        tracing::info!("Shutdown signal received, stopping at the next safe point.");
        shutdown.request();
    });
}
