use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{Sport, UserQuery};
use council::WeightBook;
use dispatch::{
    create_config_template, load_config, HeadDispatcher, HeadDispatcherBuilder, OracleConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "sports-oracle")]
#[command(version = "0.1.0")]
#[command(about = "Multi-sport prediction dispatcher", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: Level,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask for a prediction; two or more sports make a parlay
    Predict {
        /// Free-text question, also used to detect sports when none are given
        text: String,

        /// Sport to include (repeatable), e.g. `--sport nba --sport nhl`
        #[arg(short, long = "sport")]
        sports: Vec<Sport>,

        /// Requesting user id
        #[arg(short, long, default_value = "cli")]
        user: String,

        /// Preference as key=value (repeatable), e.g. `--pref risk_tolerance=low`
        #[arg(long = "pref", value_parser = parse_preference)]
        preferences: Vec<(String, String)>,

        /// Config file path
        #[arg(short, long, env = "ORACLE_CONFIG")]
        config: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a commented configuration template
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}

fn parse_preference(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty preference key in `{}`", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// One-shot dispatcher: no store is attached, since records would not outlive the
/// process and outcomes are reported by whoever embeds `PerformanceTracker`
fn build_dispatcher(config: &OracleConfig) -> Result<HeadDispatcher> {
    let weights = Arc::new(
        WeightBook::with_defaults(&config.council.default_weights)
            .context("Invalid council.default_weights")?,
    );
    Ok(HeadDispatcherBuilder::from_config(config, weights).build())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).init();

    match cli.command {
        Commands::InitConfig { path } => {
            create_config_template(&path)?;
            info!("Configuration template written to {}", path.display());
        }
        Commands::Predict {
            text,
            sports,
            user,
            preferences,
            config,
            json,
        } => {
            let config = load_config(config.as_deref())?;
            let dispatcher = build_dispatcher(&config)?;

            let mut query = UserQuery::new(user, text);
            for sport in sports {
                query = query.with_sport(sport);
            }
            for (key, value) in preferences {
                query = query.with_preference(key, value);
            }

            let combined = dispatcher.dispatch(&query).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&combined)?);
                return Ok(());
            }

            for leg in &combined.legs {
                println!(
                    "{:<10} {:<14} confidence {:>5.1}%  agreement {:>5.1}%",
                    leg.sport.label(),
                    leg.prediction_text,
                    leg.confidence * 100.0,
                    leg.agreement * 100.0
                );
            }
            if combined.is_parlay() {
                println!(
                    "Parlay confidence {:.1}%",
                    combined.combined_confidence * 100.0
                );
            }
            println!();
            println!("{}", combined.combined_reasoning);
        }
    }

    Ok(())
}
