use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use circuit_sync::config::SyncConfig;
use circuit_sync::fetch::HttpFetcher;
use circuit_sync::identity::IdentityResolver;
use circuit_sync::model::Player;
use circuit_sync::notify::notifier_from_config;
use circuit_sync::repo::{MemoryRepository, Repository};
use circuit_sync::sync::{StageOutcome, SyncOrchestrator, SyncStage};
use circuit_sync::util::env;

#[derive(Parser, Debug)]
#[command(name = "circuit-sync", version, about = "Competitive circuit sync CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Run the sync pipeline (all stages in order unless narrowed)
    Sync {
        /// Run only this stage
        #[arg(long, conflicts_with = "skip")]
        stage: Option<SyncStage>,
        /// Skip a stage (repeatable)
        #[arg(long)]
        skip: Vec<SyncStage>,
    },
    /// Reconcile platform account ids for players without one
    Reconcile,
    /// Look up a player by account id, UUID, wiki URL, or IGN
    Resolve {
        identifier: String,
    },
    /// Attach a platform account id to a player
    Link {
        /// Player UUID
        #[arg(long)]
        player: Uuid,
        /// 32-hex platform account id
        #[arg(long)]
        account: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env::init_env();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .try_init();

    let config = SyncConfig::from_env();
    let repo: Arc<dyn Repository> = Arc::new(MemoryRepository::new());
    let fetcher = Arc::new(HttpFetcher::new(&config)?);
    let notifier = notifier_from_config(&config)?;
    let orchestrator = SyncOrchestrator::new(repo.clone(), fetcher, notifier, config);

    let cli = Cli::parse();
    match cli.command {
        Commands::Sync { stage: Some(stage), .. } => {
            match orchestrator.run_stage(stage).await {
                StageOutcome::Success(summary) => println!("{stage}: {summary}"),
                StageOutcome::Skipped(reason) => println!("{stage}: skipped ({reason})"),
                StageOutcome::Error(message) => bail!("{stage}: {message}"),
            }
        }
        Commands::Sync { stage: None, skip } => {
            let report = orchestrator.run(&skip).await;
            println!("{}", report.render());
            let failed = report.error_count();
            if failed > 0 {
                bail!("{failed} stage(s) failed");
            }
        }
        Commands::Reconcile => {
            let summary = orchestrator.reconcile_identities().await?;
            println!("reconcile: {summary}");
        }
        Commands::Resolve { identifier } => {
            let resolver = IdentityResolver::new(repo.as_ref());
            match resolver.resolve(&identifier).await? {
                Some(player) => print_player(&player),
                None => bail!("no player matched {identifier:?}"),
            }
        }
        Commands::Link { player, account } => {
            let resolver = IdentityResolver::new(repo.as_ref());
            if !resolver.link_account_id(player, &account).await? {
                bail!("account {account} could not be linked to {player}");
            }
            println!("linked {account} to {player}");
        }
    }
    Ok(())
}

fn print_player(player: &Player) {
    println!("player      {}", player.player_id);
    println!("ign         {}", player.current_ign);
    println!(
        "account id  {}",
        player.epic_account_id.as_deref().unwrap_or("-")
    );
    println!("wiki url    {}", player.wiki_url.as_deref().unwrap_or("-"));
    for record in &player.ign_history {
        match &record.used_until {
            Some(until) => println!(
                "  ign {} from {} until {}",
                record.ign,
                record.used_from.format("%Y-%m-%d"),
                until.format("%Y-%m-%d")
            ),
            None => println!(
                "  ign {} from {} (current)",
                record.ign,
                record.used_from.format("%Y-%m-%d")
            ),
        }
    }
}
