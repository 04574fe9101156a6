//! Example usage of the sport council
//!
//! This example demonstrates:
//! 1. Building a weight book with a configured default
//! 2. Seating the standard specialists for two sports
//! 3. Aggregating a few queries and printing the result

use anyhow::Result;
use common::{Sport, UserQuery};
use council::{CouncilAggregator, CouncilConfig, WeightBook};
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Sport Council - Example");

    let mut config = CouncilConfig::default();
    config
        .default_weights
        .insert(Sport::Hockey, [0.15, 0.35, 0.2, 0.15, 0.15]);

    let weights = Arc::new(WeightBook::with_defaults(&config.default_weights)?);

    let queries = [
        (
            Sport::Basketball,
            "Home offense is surging while the road team is on a back-to-back",
        ),
        (
            Sport::Hockey,
            "Visitors power play is hot but the home goalie has been a shutdown wall",
        ),
        (
            Sport::Basketball,
            "Away shooting has been cold, smells like a coin flip upset",
        ),
    ];

    for (sport, text) in queries {
        let council = CouncilAggregator::standard(sport, Arc::clone(&weights), config.clone());
        let query = UserQuery::new("demo-user", text)
            .with_sport(sport)
            .with_preference("risk_tolerance", "low");

        let prediction = council.aggregate(&query).await?;

        info!("{}: {}", sport.label(), text);
        info!(
            "  -> {} (confidence {:.1}%, agreement {:.1}%)",
            prediction.prediction_text,
            prediction.confidence * 100.0,
            prediction.agreement * 100.0
        );
        info!("  reasoning: {}", prediction.reasoning);
    }

    Ok(())
}
