use crate::cmd::connect;
use crate::modules::rating::{update_positions, RatingConfig};
use crate::types::tables::RankField;
use anyhow::{Context, Result};
use clap::Args;

#[derive(Debug, Args)]
pub struct RankArgs {
    /// Number of player ids updated per query.
    #[arg(long)]
    batch_size: Option<i32>,
}

/// Recomputes the rating and reputation positions of all players.
pub async fn run(args: RankArgs) -> Result<()> {
    let storage = connect().await?;
    let batch_size = args
        .batch_size
        .unwrap_or(RatingConfig::default().rank_batch_size);

    for field in [RankField::Rating, RankField::Rep] {
        update_positions(&storage, field, batch_size)
            .await
            .with_context(|| {
                let message = format!("failed to update {} positions", field.column());
                tracing::error!(message);
                message
            })?;
    }

    Ok(())
}
