use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::{PredictionStore, Sport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Calibration Engine - Measures how well delivered confidences match realized hit rates
pub struct CalibrationEngine {
    store: Arc<dyn PredictionStore>,
}

/// Calibration summary for one sport over its resolved records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub sport: Sport,
    pub total_predictions: usize,
    pub hits: usize,
    pub hit_rate: f64,
    pub brier_score: f64,
    pub log_loss: f64,
    /// Expected calibration error, bucket errors weighted by bucket size
    pub calibration_error: f64,
    pub confidence_buckets: Vec<ConfidenceBucket>,
    pub first_prediction: Option<DateTime<Utc>>,
    pub last_prediction: Option<DateTime<Utc>>,
}

/// Predictions whose confidence falls in `[min_confidence, max_confidence)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceBucket {
    pub min_confidence: f64,
    pub max_confidence: f64,
    pub count: usize,
    pub avg_confidence: f64,
    pub hit_rate: f64,
    pub calibration_error: f64,
}

impl CalibrationEngine {
    pub fn new(store: Arc<dyn PredictionStore>) -> Self {
        Self { store }
    }

    /// Calculate calibration metrics for a sport
    pub async fn calculate_calibration(&self, sport: Sport) -> Result<CalibrationReport> {
        let records = self
            .store
            .by_sport(sport)
            .await
            .context("Failed to fetch prediction records")?;

        let resolved: Vec<&common::PredictionRecord> =
            records.iter().filter(|r| !r.is_pending()).collect();

        let predictions: Vec<(f64, bool)> = resolved
            .iter()
            .filter_map(|r| r.outcome.realized().map(|hit| (r.confidence, hit)))
            .collect();

        let hits = predictions.iter().filter(|(_, hit)| *hit).count();
        let confidence_buckets = create_confidence_buckets(&predictions);

        let report = CalibrationReport {
            sport,
            total_predictions: predictions.len(),
            hits,
            hit_rate: if predictions.is_empty() {
                0.0
            } else {
                hits as f64 / predictions.len() as f64
            },
            brier_score: BrierScoreCalculator::calculate(&predictions),
            log_loss: calculate_log_loss(&predictions),
            calibration_error: calculate_calibration_error(&confidence_buckets),
            confidence_buckets,
            first_prediction: resolved.iter().map(|r| r.timestamp).min(),
            last_prediction: resolved.iter().map(|r| r.timestamp).max(),
        };

        debug!(
            sport = %sport,
            resolved = report.total_predictions,
            brier = report.brier_score,
            "Calibration computed"
        );

        Ok(report)
    }
}

/// Brier Score Calculator
pub struct BrierScoreCalculator;

impl BrierScoreCalculator {
    /// Mean squared distance between confidence and the realized hit (1) or miss (0)
    pub fn calculate(predictions: &[(f64, bool)]) -> f64 {
        if predictions.is_empty() {
            return 0.0;
        }

        let sum: f64 = predictions
            .iter()
            .map(|(prob, hit)| (prob - indicator(*hit)).powi(2))
            .sum();

        sum / predictions.len() as f64
    }
}

fn indicator(hit: bool) -> f64 {
    if hit {
        1.0
    } else {
        0.0
    }
}

fn calculate_log_loss(predictions: &[(f64, bool)]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }

    // Keep ln() finite at 0 and 1
    let eps = 1e-10;
    let sum: f64 = predictions
        .iter()
        .map(|(pred, hit)| {
            let actual = indicator(*hit);
            let prob = pred.clamp(eps, 1.0 - eps);
            -(actual * prob.ln() + (1.0 - actual) * (1.0 - prob).ln())
        })
        .sum();

    sum / predictions.len() as f64
}

fn calculate_calibration_error(buckets: &[ConfidenceBucket]) -> f64 {
    let total: usize = buckets.iter().map(|b| b.count).sum();
    if total == 0 {
        return 0.0;
    }
    buckets
        .iter()
        .map(|b| b.calibration_error * b.count as f64)
        .sum::<f64>()
        / total as f64
}

/// Ten equal-width buckets; empty buckets are omitted and 1.0 lands in the last one
fn create_confidence_buckets(predictions: &[(f64, bool)]) -> Vec<ConfidenceBucket> {
    let mut buckets = Vec::with_capacity(10);

    for i in 0..10 {
        let min_conf = i as f64 / 10.0;
        let max_conf = (i + 1) as f64 / 10.0;

        let members: Vec<&(f64, bool)> = predictions
            .iter()
            .filter(|(p, _)| *p >= min_conf && (*p < max_conf || (i == 9 && *p <= 1.0)))
            .collect();

        if members.is_empty() {
            continue;
        }

        let count = members.len();
        let avg_confidence = members.iter().map(|(p, _)| p).sum::<f64>() / count as f64;
        let hit_rate = members.iter().map(|(_, hit)| indicator(*hit)).sum::<f64>() / count as f64;

        buckets.push(ConfidenceBucket {
            min_confidence: min_conf,
            max_confidence: max_conf,
            count,
            avg_confidence,
            hit_rate,
            calibration_error: (avg_confidence - hit_rate).abs(),
        });
    }

    buckets
}
