// Parlay Composition
// Merges per-sport legs into the prediction returned to the caller

use common::{clamp_unit, CombinedPrediction, PredictionError, SportPrediction};
use tracing::debug;

/// Combines successful legs into one `CombinedPrediction`
#[derive(Debug, Clone, Copy, Default)]
pub struct ParlayComposer;

impl ParlayComposer {
    pub fn new() -> Self {
        Self
    }

    /// Compose legs in request order.
    ///
    /// A single leg passes through untouched. Several legs multiply their
    /// confidences, never ending above the weakest leg.
    pub fn compose(&self, legs: Vec<SportPrediction>) -> Result<CombinedPrediction, PredictionError> {
        match legs.len() {
            0 => Err(PredictionError::NoLegs),
            1 => {
                let combined_confidence = legs[0].confidence;
                let combined_reasoning = legs[0].reasoning.clone();
                Ok(CombinedPrediction {
                    legs,
                    combined_confidence,
                    combined_reasoning,
                    record_ids: Vec::new(),
                })
            }
            _ => {
                let product: f64 = legs.iter().map(|leg| leg.confidence).product();
                let weakest = legs
                    .iter()
                    .map(|leg| leg.confidence)
                    .fold(f64::INFINITY, f64::min);
                let combined_confidence = clamp_unit(product.min(weakest));

                let combined_reasoning = legs
                    .iter()
                    .map(|leg| format!("{}: {}", leg.sport.label(), leg.reasoning))
                    .collect::<Vec<_>>()
                    .join("\n");

                debug!(
                    legs = legs.len(),
                    combined_confidence,
                    weakest_leg = weakest,
                    "Composed parlay"
                );

                Ok(CombinedPrediction {
                    legs,
                    combined_confidence,
                    combined_reasoning,
                    record_ids: Vec::new(),
                })
            }
        }
    }
}
