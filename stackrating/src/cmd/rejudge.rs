use crate::cmd::{connect, watch_shutdown_signal};
use crate::modules::rating::RatingUpdater;
use anyhow::{Context, Result};
use clap::Args;
use stackrating_libs::shutdown::Shutdown;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct RejudgeArgs {
    /// First game id to rejudge.
    #[arg(long, default_value_t = 0)]
    from: i32,
}

pub async fn run(args: RejudgeArgs) -> Result<()> {
    let storage = connect().await?;

    let shutdown = Arc::new(Shutdown::new());
    watch_shutdown_signal(Arc::clone(&shutdown));

    let updater = RatingUpdater::new(&storage, &shutdown);
    let outcome = updater.recompute(args.from).await.with_context(|| {
        let message = format!("failed to rejudge games from {}", args.from);
        tracing::error!(message);
        message
    })?;

    tracing::info!("Rejudge ended: {:?}", outcome);
    Ok(())
}
