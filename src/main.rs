use chrono::NaiveDate;
use clap::Parser;
use finagent::application::pipeline::{BackfillRequest, PipelineRequest};
use finagent::cli::commands::{Cli, Commands, MemoryCommands};
use finagent::config::Config;
use finagent::domain::ports::language_model::ImageAttachment;
use finagent::domain::values::account::AccountStatus;
use finagent::domain::values::memory_tier::MemoryTier;
use finagent::FinAgent;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    if matches!(cli.command, Commands::Run { .. } | Commands::Backfill { .. }) {
        if let Err(e) = config.require_model_key() {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
    let agent = match FinAgent::new(&config) {
        Ok(agent) => agent,
        Err(e) => {
            eprintln!("Error initializing finagent: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_command(agent, cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_command(agent: FinAgent, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::Run {
            symbol,
            date,
            cash,
            position,
            chart,
        } => {
            let chart = chart.map(|p| ImageAttachment::from_path(Path::new(&p))).transpose()?;
            let report = agent
                .run(PipelineRequest {
                    symbol,
                    date: parse_date(&date)?,
                    account: AccountStatus::new(cash, position)?,
                    chart,
                })
                .await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Backfill {
            symbols,
            from,
            to,
            cash,
            position,
            pause_secs,
        } => {
            let cancel = Arc::new(AtomicBool::new(false));
            let flag = Arc::clone(&cancel);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, stopping after the current date");
                    flag.store(true, Ordering::SeqCst);
                }
            });

            let pause = pause_secs.unwrap_or(agent.pipeline_config().backfill_pause_secs);
            let summaries = agent
                .backfill(
                    BackfillRequest {
                        symbols,
                        from: parse_date(&from)?,
                        to: parse_date(&to)?,
                        account: AccountStatus::new(cash, position)?,
                        pause: Duration::from_secs(pause),
                    },
                    cancel,
                )
                .await?;
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        Commands::Memory { command } => match command {
            MemoryCommands::Stats => {
                for s in agent.memory_stats()? {
                    println!("{}: {}", s.collection, s.count);
                }
            }
            MemoryCommands::Peek { tier, limit } => {
                let tier: MemoryTier = tier.parse()?;
                let records = agent.memory_peek(tier, limit)?;
                println!("{}", serde_json::to_string_pretty(&records)?);
            }
            MemoryCommands::Search { tier, query, limit } => {
                let tier: MemoryTier = tier.parse()?;
                let hits = agent.memory_search(tier, &query, limit).await?;
                println!("{}", serde_json::to_string_pretty(&hits)?);
            }
        },
    }
    Ok(())
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| format!("Invalid date format: {s}. Use YYYY-MM-DD"))
}
