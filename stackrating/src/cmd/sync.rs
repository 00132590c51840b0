use crate::cmd::{connect, create_client, watch_shutdown_signal};
use crate::modules::content::ContentUpdater;
use anyhow::{Context, Result};
use clap::Args;
use stackrating_libs::shutdown::Shutdown;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct SyncArgs {}

/// Runs a single update cycle.
pub async fn run(_args: SyncArgs) -> Result<()> {
    let storage = connect().await?;
    let client = create_client()?;

    let shutdown = Arc::new(Shutdown::new());
    watch_shutdown_signal(Arc::clone(&shutdown));

    let mut updater = ContentUpdater::new(&storage, &client, &shutdown);
    let outcome = updater.do_update_cycle().await.with_context(|| {
        let message = "update cycle failed";
        tracing::error!(message);
        message
    })?;

    tracing::info!("Update cycle ended: {:?}", outcome);
    Ok(())
}
