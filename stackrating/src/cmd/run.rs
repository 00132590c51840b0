use crate::cmd::{connect, create_client, watch_shutdown_signal};
use crate::modules::content::{ContentUpdater, UpdaterConfig};
use anyhow::Result;
use clap::Args;
use stackrating_libs::shutdown::Shutdown;
use std::{sync::Arc, time::Duration};

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Seconds to wait after a failed update cycle.
    #[arg(long)]
    retry_delay_secs: Option<u64>,
    /// Days of history synchronized into an empty database.
    #[arg(long)]
    initial_days: Option<i64>,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let storage = connect().await?;
    let client = create_client()?;

    let mut config = UpdaterConfig::default();
    if let Some(secs) = args.retry_delay_secs {
        config.retry_delay = Duration::from_secs(secs);
    }
    if let Some(days) = args.initial_days {
        config.initial_sync = chrono::Duration::days(days);
    }

    let shutdown = Arc::new(Shutdown::new());
    watch_shutdown_signal(Arc::clone(&shutdown));

    tracing::info!("Start updater");
    let mut updater = ContentUpdater::with_config(&storage, &client, &shutdown, config);
    updater.run_forever().await;

    Ok(())
}
