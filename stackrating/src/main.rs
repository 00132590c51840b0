mod cmd;
mod modules;
mod types;

use crate::cmd::{
    rank::{self, RankArgs},
    rejudge::{self, RejudgeArgs},
    run::{self, RunArgs},
    sync::{self, SyncArgs},
};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::{env, str::FromStr};
use tokio::runtime::Builder;
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt::{self, time::OffsetTime},
};

#[derive(Debug, Parser)]
#[command(name = "stackrating")]
#[command(about = "Elo ratings for Stack Exchange answerers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Synchronize and rejudge continuously until interrupted.
    Run(RunArgs),
    /// Run a single update cycle.
    Sync(SyncArgs),
    /// Recompute entry deltas and player ratings from a game on.
    Rejudge(RejudgeArgs),
    /// Recompute rating and reputation positions.
    Rank(RankArgs),
}

fn main() {
    dotenv().ok();

    let log_level = env::var("RUST_LOG").unwrap_or(String::from("info"));
    let filter = EnvFilter::builder()
        .with_default_directive(
            LevelFilter::from_str(&log_level)
                .unwrap_or(LevelFilter::INFO)
                .into(),
        )
        .from_env_lossy();
    let format = fmt::format()
        .with_level(true)
        .with_target(true)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_timer(OffsetTime::local_rfc_3339().expect("couldn't get local time offset"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .event_format(format)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    let runtime = Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime");

    match Cli::parse().command {
        Commands::Run(args) => runtime.block_on(run::run(args)),
        Commands::Sync(args) => runtime.block_on(sync::run(args)),
        Commands::Rejudge(args) => runtime.block_on(rejudge::run(args)),
        Commands::Rank(args) => runtime.block_on(rank::run(args)),
    }
    .expect("command failed");
}
