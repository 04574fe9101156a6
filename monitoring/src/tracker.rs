use crate::calibration::{CalibrationEngine, CalibrationReport};
use anyhow::{bail, Context, Result};
use common::{MemberContribution, PredictionStore, Sport, COUNCIL_SIZE};
use council::{SportWeights, WeightBook};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Outcome feedback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Fraction of the distance to 1 (right) or 0 (wrong) moved per outcome
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Share of the vector reserved for each member; an update never pushes a weight below it
    #[serde(default = "default_min_weight")]
    pub min_weight: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            min_weight: default_min_weight(),
        }
    }
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_min_weight() -> f64 {
    0.01
}

/// Performance Tracker - Turns realized outcomes into ensemble weight updates
///
/// The tracker is the only writer of the weight book. Updates for all sports are
/// serialized so each one starts from the latest vector.
pub struct PerformanceTracker {
    weights: Arc<WeightBook>,
    store: Arc<dyn PredictionStore>,
    config: TrackerConfig,
    update_lock: Mutex<()>,
}

impl PerformanceTracker {
    pub fn new(weights: Arc<WeightBook>, store: Arc<dyn PredictionStore>, config: TrackerConfig) -> Self {
        Self {
            weights,
            store,
            config,
            update_lock: Mutex::new(()),
        }
    }

    pub fn weights(&self) -> &Arc<WeightBook> {
        &self.weights
    }

    /// Mark a stored prediction as hit or miss and feed its contributions back.
    ///
    /// Fails if the record is unknown or already resolved; weights are untouched then.
    pub async fn resolve(&self, prediction_id: Uuid, realized: bool) -> Result<Arc<SportWeights>> {
        let record = self
            .store
            .record_outcome(prediction_id, realized)
            .await
            .with_context(|| format!("Failed to record outcome for prediction {}", prediction_id))?;

        info!(
            prediction_id = %prediction_id,
            sport = %record.sport,
            realized,
            "Prediction resolved"
        );

        self.report_outcome(prediction_id, record.sport, &record.contributions, realized)
            .await
    }

    /// Nudge each contributing member toward 1 if it sided correctly, toward 0 otherwise,
    /// then install the renormalized vector in one replace.
    ///
    /// The nudge acts on each member's share of the mass above the floor, so the floor
    /// holds without ever moving a member against its verdict.
    pub async fn report_outcome(
        &self,
        prediction_id: Uuid,
        sport: Sport,
        contributions: &[MemberContribution],
        realized: bool,
    ) -> Result<Arc<SportWeights>> {
        let _guard = self.update_lock.lock().await;
        let current = self.weights.snapshot(sport);

        if contributions.is_empty() {
            debug!(prediction_id = %prediction_id, sport = %sport, "No directional contributions, weights unchanged");
            return Ok(current);
        }

        let min_weight = self.config.min_weight;
        if !(0.0..1.0 / COUNCIL_SIZE as f64).contains(&min_weight) {
            bail!("min_weight {} leaves no weight to distribute", min_weight);
        }

        // A member counts once per outcome
        let mut verdicts: [Option<bool>; COUNCIL_SIZE] = [None; COUNCIL_SIZE];
        for contribution in contributions {
            let idx = contribution.member_id.index();
            if verdicts[idx].is_none() {
                verdicts[idx] = Some(contribution.sided_with_pick == realized);
            }
        }

        let previous = current.as_array();
        // A member already under the configured floor stays where it is until it earns its way up
        let floor = previous.iter().copied().fold(min_weight, f64::min);
        let spare = 1.0 - COUNCIL_SIZE as f64 * floor;
        let mut shares = previous.map(|w| (w - floor).max(0.0));
        normalize_shares(&mut shares);

        let rate = self.config.learning_rate;
        for (share, verdict) in shares.iter_mut().zip(verdicts) {
            *share = match verdict {
                Some(true) => *share + rate * (1.0 - *share),
                Some(false) => *share - rate * *share,
                None => *share,
            };
        }
        normalize_shares(&mut shares);

        let mut next = [0.0; COUNCIL_SIZE];
        for i in 0..COUNCIL_SIZE {
            let w = floor + spare * shares[i];
            // Rounding must not undo the direction of the nudge
            next[i] = match verdicts[i] {
                Some(true) => w.max(previous[i]),
                Some(false) => w.min(previous[i]),
                None => w,
            };
        }

        let next = current
            .successor(next)
            .context("Weight update produced an invalid vector")?;
        let installed = self.weights.replace(next);

        info!(
            prediction_id = %prediction_id,
            sport = %sport,
            realized,
            version = installed.version,
            weights = ?installed.as_array(),
            "Ensemble weights updated"
        );

        Ok(installed)
    }

    /// Calibration of delivered confidences for a sport
    pub async fn calibration(&self, sport: Sport) -> Result<CalibrationReport> {
        CalibrationEngine::new(Arc::clone(&self.store))
            .calculate_calibration(sport)
            .await
    }
}

/// Rescale to sum to one; an empty mass becomes an even split
fn normalize_shares(shares: &mut [f64; COUNCIL_SIZE]) {
    let total: f64 = shares.iter().sum();
    if total > 0.0 {
        for share in shares.iter_mut() {
            *share /= total;
        }
    } else {
        *shares = [1.0 / COUNCIL_SIZE as f64; COUNCIL_SIZE];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{
        CouncilMemberOpinion, InMemoryPredictionStore, MemberRole, PredictionRecord, Signal,
        SportPrediction, StoreError, AWAY_PICK, HOME_PICK,
    };
    use council::WEIGHT_SUM_TOLERANCE;

    fn tracker() -> (PerformanceTracker, Arc<InMemoryPredictionStore>) {
        let store = Arc::new(InMemoryPredictionStore::new());
        let tracker = PerformanceTracker::new(
            Arc::new(WeightBook::new()),
            store.clone(),
            TrackerConfig::default(),
        );
        (tracker, store)
    }

    fn contribution(member_id: MemberRole, sided_with_pick: bool) -> MemberContribution {
        MemberContribution {
            member_id,
            sided_with_pick,
        }
    }

    #[tokio::test]
    async fn test_correct_member_gains_incorrect_member_loses() {
        let (tracker, _) = tracker();
        let before = tracker.weights().snapshot(Sport::Basketball);

        // Pick was right: Offense backed it, Defense went the other way
        let after = tracker
            .report_outcome(
                Uuid::new_v4(),
                Sport::Basketball,
                &[
                    contribution(MemberRole::Offense, true),
                    contribution(MemberRole::Defense, false),
                ],
                true,
            )
            .await
            .unwrap();

        assert!(after.weight(MemberRole::Offense) > before.weight(MemberRole::Offense));
        assert!(after.weight(MemberRole::Defense) < before.weight(MemberRole::Defense));
        assert!((after.total() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert_eq!(after.version, before.version + 1);
        // Other sports untouched
        assert_eq!(tracker.weights().snapshot(Sport::Hockey).version, 0);
    }

    #[tokio::test]
    async fn test_missed_pick_rewards_dissenters() {
        let (tracker, _) = tracker();
        let after = tracker
            .report_outcome(
                Uuid::new_v4(),
                Sport::Soccer,
                &[
                    contribution(MemberRole::Momentum, true),
                    contribution(MemberRole::Variance, false),
                ],
                false,
            )
            .await
            .unwrap();

        assert!(after.weight(MemberRole::Variance) > after.weight(MemberRole::Momentum));
    }

    #[tokio::test]
    async fn test_weights_stay_normalized_and_floored() {
        let (tracker, _) = tracker();
        let wrong = [contribution(MemberRole::Variance, true)];

        let mut latest = tracker.weights().snapshot(Sport::Hockey);
        for _ in 0..200 {
            latest = tracker
                .report_outcome(Uuid::new_v4(), Sport::Hockey, &wrong, false)
                .await
                .unwrap();
            assert!((latest.total() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        }

        let floor = TrackerConfig::default().min_weight;
        assert!(latest.weight(MemberRole::Variance) >= floor);
        assert!(latest.weight(MemberRole::Variance) < 0.02);
        assert_eq!(latest.version, 200);
    }

    #[tokio::test]
    async fn test_repeated_outcomes_never_move_weights_the_wrong_way() {
        let (tracker, _) = tracker();
        let floor = TrackerConfig::default().min_weight;
        let verdict = [
            contribution(MemberRole::Offense, true),
            contribution(MemberRole::Defense, false),
        ];

        let mut previous = tracker.weights().snapshot(Sport::Basketball);
        for step in 1..=3000 {
            let next = tracker
                .report_outcome(Uuid::new_v4(), Sport::Basketball, &verdict, true)
                .await
                .unwrap();

            let (offense, defense) = (next.weight(MemberRole::Offense), next.weight(MemberRole::Defense));
            let (prev_offense, prev_defense) = (
                previous.weight(MemberRole::Offense),
                previous.weight(MemberRole::Defense),
            );
            assert!(offense >= prev_offense, "step {step}: offense fell {prev_offense} -> {offense}");
            assert!(defense <= prev_defense, "step {step}: defense rose {prev_defense} -> {defense}");
            // Strict until the vector saturates at double precision
            if step <= 50 {
                assert!(offense > prev_offense, "step {step}: offense stalled");
                assert!(defense < prev_defense, "step {step}: defense stalled");
            }
            assert!(next.as_array().iter().all(|w| *w >= floor), "step {step}: below floor");
            assert!((next.total() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
            previous = next;
        }

        assert!(previous.weight(MemberRole::Offense) > 0.95);
        assert!((previous.weight(MemberRole::Defense) - floor).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_member_below_floor_is_not_lifted_when_wrong() {
        let store = Arc::new(InMemoryPredictionStore::new());
        let book = WeightBook::new();
        let seeded = book
            .snapshot(Sport::Soccer)
            .successor([0.5, 0.005, 0.165, 0.165, 0.165])
            .unwrap();
        book.replace(seeded);
        let tracker = PerformanceTracker::new(Arc::new(book), store, TrackerConfig::default());

        let after = tracker
            .report_outcome(
                Uuid::new_v4(),
                Sport::Soccer,
                &[
                    contribution(MemberRole::Offense, true),
                    contribution(MemberRole::Defense, false),
                ],
                true,
            )
            .await
            .unwrap();

        assert!(after.weight(MemberRole::Defense) <= 0.005);
        assert!(after.weight(MemberRole::Offense) > 0.5);
        assert!((after.total() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[tokio::test]
    async fn test_no_contributions_leaves_weights() {
        let (tracker, _) = tracker();
        let after = tracker
            .report_outcome(Uuid::new_v4(), Sport::Football, &[], true)
            .await
            .unwrap();
        assert_eq!(after.version, 0);
    }

    #[tokio::test]
    async fn test_resolve_is_exactly_once() {
        let (tracker, store) = tracker();
        let prediction = SportPrediction {
            sport: Sport::Baseball,
            prediction_text: HOME_PICK.to_string(),
            confidence: 0.66,
            reasoning: "pitching edge".to_string(),
            contributing_members: vec![
                CouncilMemberOpinion::new(MemberRole::Defense, Signal::Score(0.4), 0.7, "rotation"),
                CouncilMemberOpinion::new(
                    MemberRole::Momentum,
                    Signal::Pick(AWAY_PICK.to_string()),
                    0.55,
                    "road streak",
                ),
            ],
            agreement: 0.6,
            generated_at: Utc::now(),
        };
        let record = PredictionRecord::pending("user-4", &prediction);
        let id = record.id;
        store.insert(record).await.unwrap();

        let updated = tracker.resolve(id, true).await.unwrap();
        assert!(updated.weight(MemberRole::Defense) > updated.weight(MemberRole::Momentum));
        assert_eq!(updated.version, 1);

        let err = tracker.resolve(id, false).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::OutcomeAlreadyReported { .. })
        ));
        assert_eq!(tracker.weights().snapshot(Sport::Baseball).version, 1);

        let report = tracker.calibration(Sport::Baseball).await.unwrap();
        assert_eq!(report.total_predictions, 1);
        assert_eq!(report.hits, 1);
    }

    #[tokio::test]
    async fn test_unknown_prediction_fails() {
        let (tracker, _) = tracker();
        let err = tracker.resolve(Uuid::new_v4(), true).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::RecordNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_reports_all_land() {
        let (tracker, _) = tracker();
        let tracker = Arc::new(tracker);

        let tasks: Vec<_> = (0..20)
            .map(|i| {
                let tracker = Arc::clone(&tracker);
                tokio::spawn(async move {
                    tracker
                        .report_outcome(
                            Uuid::new_v4(),
                            Sport::Basketball,
                            &[contribution(MemberRole::Situational, true)],
                            i % 2 == 0,
                        )
                        .await
                        .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let latest = tracker.weights().snapshot(Sport::Basketball);
        assert_eq!(latest.version, 20);
        assert!((latest.total() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }
}
