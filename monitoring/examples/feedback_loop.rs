//! Outcome feedback example
//!
//! Runs a few basketball predictions through a local council, resolves them,
//! and shows how the ensemble weights and calibration move.

use anyhow::Result;
use common::{InMemoryPredictionStore, PredictionRecord, PredictionStore, Sport, UserQuery};
use council::{CouncilAggregator, CouncilConfig, WeightBook};
use monitoring::{PerformanceTracker, TrackerConfig};
use std::sync::Arc;
use tracing::{info, Level};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let weights = Arc::new(WeightBook::new());
    let store = Arc::new(InMemoryPredictionStore::new());
    let tracker = PerformanceTracker::new(
        Arc::clone(&weights),
        store.clone(),
        TrackerConfig::default(),
    );
    let council = CouncilAggregator::standard(
        Sport::Basketball,
        Arc::clone(&weights),
        CouncilConfig::default(),
    );

    let games = [
        ("Home offense is surging and the visitors are on a back-to-back", true),
        ("Road team shooting is hot, home defense looks porous", false),
        ("Home crowd, well rested hosts, away side in a skid", true),
    ];

    for (text, home_won) in games {
        let query = UserQuery::new("feedback-demo", text).with_sport(Sport::Basketball);
        let prediction = council.aggregate(&query).await?;
        let record = PredictionRecord::pending("feedback-demo", &prediction);
        let id = record.id;
        store.insert(record).await?;

        let pick_was_home = prediction.prediction_text == common::HOME_PICK;
        let updated = tracker.resolve(id, pick_was_home == home_won).await?;

        info!(
            "{} -> {} ({:.1}%), weights v{}: {:?}",
            text,
            prediction.prediction_text,
            prediction.confidence * 100.0,
            updated.version,
            updated.as_array()
        );
    }

    let report = tracker.calibration(Sport::Basketball).await?;
    info!(
        "Basketball: {} resolved, hit rate {:.1}%, Brier {:.4}, log loss {:.4}",
        report.total_predictions,
        report.hit_rate * 100.0,
        report.brier_score,
        report.log_loss
    );

    Ok(())
}
