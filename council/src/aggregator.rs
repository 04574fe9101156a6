//! Council aggregator - combines the five seat opinions for one sport
//!
//! The aggregator:
//! - Runs every seat concurrently on its own task
//! - Drops seats that fail, keeping the rest of the council
//! - Computes a weighted-average confidence and a weighted vote on direction
//! - Builds reasoning from the heaviest seats' rationale

use super::member::{validate_roster, Roster};
use super::specialists::{standard_roster, SpecialistConfig};
use super::weights::{SportWeights, WeightBook};
use anyhow::Result;
use chrono::Utc;
use common::{
    join_scoped, CouncilMemberOpinion, COUNCIL_SIZE, MemberRole, PredictionError, Sport,
    SportPrediction, UserQuery,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Prediction text used when no surviving seat takes a side
pub const NO_EDGE_PICK: &str = "no clear edge";

const VOTE_TIE_EPSILON: f64 = 1e-9;

/// Configuration for council aggregation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouncilConfig {
    /// How many of the heaviest seats are quoted in the reasoning
    #[serde(default = "default_reasoning_members")]
    pub reasoning_members: usize,
    /// Starting weights per sport, in roster order; unlisted sports start uniform
    #[serde(default)]
    pub default_weights: HashMap<Sport, [f64; COUNCIL_SIZE]>,
    /// Tuning for the standard lexicon specialists
    #[serde(default)]
    pub specialists: SpecialistConfig,
}

impl Default for CouncilConfig {
    fn default() -> Self {
        Self {
            reasoning_members: default_reasoning_members(),
            default_weights: HashMap::new(),
            specialists: SpecialistConfig::default(),
        }
    }
}

fn default_reasoning_members() -> usize {
    3
}

/// Running tally for one pick during the vote
struct VoteTally {
    pick: String,
    weight: f64,
    /// Heaviest individual seat backing this pick, as (weight, roster index)
    anchor: (f64, usize),
}

/// Aggregates one sport's council into a `SportPrediction`
pub struct CouncilAggregator {
    sport: Sport,
    members: Roster,
    weights: Arc<WeightBook>,
    config: CouncilConfig,
}

impl CouncilAggregator {
    /// Create an aggregator over a custom roster; seats must be in roster order
    pub fn new(
        sport: Sport,
        members: Roster,
        weights: Arc<WeightBook>,
        config: CouncilConfig,
    ) -> Result<Self> {
        validate_roster(&members)?;
        Ok(Self {
            sport,
            members,
            weights,
            config,
        })
    }

    /// Create an aggregator seated with the standard lexicon specialists
    pub fn standard(sport: Sport, weights: Arc<WeightBook>, config: CouncilConfig) -> Self {
        let members = standard_roster(&config.specialists);
        Self {
            sport,
            members,
            weights,
            config,
        }
    }

    pub fn sport(&self) -> Sport {
        self.sport
    }

    /// Run the council for one query
    pub async fn aggregate(&self, query: &UserQuery) -> Result<SportPrediction, PredictionError> {
        // One snapshot for the whole call, even if the tracker swaps weights meanwhile
        let weights = self.weights.snapshot(self.sport);
        let opinions = self.collect_opinions(query).await;

        if opinions.is_empty() {
            warn!(sport = %self.sport, "All council members failed");
            return Err(PredictionError::NoOpinionsAvailable { sport: self.sport });
        }

        let prediction = combine(self.sport, &weights, opinions, self.config.reasoning_members);

        debug!(
            sport = %self.sport,
            pick = %prediction.prediction_text,
            confidence = prediction.confidence,
            agreement = prediction.agreement,
            members = prediction.contributing_members.len(),
            weights_version = weights.version,
            "Council aggregated"
        );

        Ok(prediction)
    }

    /// Fan out to every seat and gather the opinions that came back, in roster order.
/// Seats still running when this future is dropped are aborted.
    async fn collect_opinions(&self, query: &UserQuery) -> Vec<CouncilMemberOpinion> {
        let query = Arc::new(query.clone());
        let sport = self.sport;

        let tasks: Vec<_> = self
            .members
            .iter()
            .map(|member| {
                let member = Arc::clone(member);
                let query = Arc::clone(&query);
                tokio::spawn(async move { member.opine(sport, &query).await })
            })
            .collect();

        let results = join_scoped(tasks).await;

        let mut opinions = Vec::with_capacity(COUNCIL_SIZE);
        for (seat, result) in MemberRole::ALL.iter().zip(results) {
            match result {
                Ok(Ok(opinion)) if opinion.member_id == *seat => opinions.push(opinion),
                Ok(Ok(opinion)) => {
                    warn!(
                        sport = %sport,
                        seat = %seat,
                        reported = %opinion.member_id,
                        "Council member answered for the wrong seat, excluded"
                    );
                }
                Ok(Err(e)) => {
                    warn!(sport = %sport, seat = %seat, error = %e, "Council member failed, excluded");
                }
                Err(e) => {
                    warn!(sport = %sport, seat = %seat, error = %e, "Council member task aborted, excluded");
                }
            }
        }
        opinions
    }
}

/// Combine surviving opinions under one weight snapshot
fn combine(
    sport: Sport,
    weights: &SportWeights,
    opinions: Vec<CouncilMemberOpinion>,
    reasoning_members: usize,
) -> SportPrediction {
    let live_weight: f64 = opinions.iter().map(|o| weights.weight(o.member_id)).sum();
    // Survivors all at zero weight: treat them as equals
    let weight_of = |o: &CouncilMemberOpinion| {
        if live_weight > 0.0 {
            weights.weight(o.member_id) / live_weight
        } else {
            1.0 / opinions.len() as f64
        }
    };

    let confidence: f64 = opinions.iter().map(|o| weight_of(o) * o.confidence).sum();

    let (prediction_text, agreement) = match vote(&opinions, &weight_of) {
        Some(winner) => (winner.pick, winner.weight),
        None => (NO_EDGE_PICK.to_string(), 0.0),
    };

    let reasoning = build_reasoning(&opinions, &weight_of, reasoning_members);

    SportPrediction {
        sport,
        prediction_text,
        confidence: common::clamp_unit(confidence),
        reasoning,
        contributing_members: opinions,
        agreement: common::clamp_unit(agreement),
        generated_at: Utc::now(),
    }
}

/// Weighted vote over directions. Equal totals go to the pick backed by the
/// heaviest single seat, then to the earlier seat in roster order.
fn vote(
    opinions: &[CouncilMemberOpinion],
    weight_of: &dyn Fn(&CouncilMemberOpinion) -> f64,
) -> Option<VoteTally> {
    let mut tallies: Vec<VoteTally> = Vec::new();

    for opinion in opinions {
        let Some(pick) = opinion.signal.direction() else {
            continue;
        };
        let weight = weight_of(opinion);
        let seat = opinion.member_id.index();

        match tallies.iter_mut().find(|t| t.pick == pick) {
            Some(tally) => {
                tally.weight += weight;
                if beats_anchor((weight, seat), tally.anchor) {
                    tally.anchor = (weight, seat);
                }
            }
            None => tallies.push(VoteTally {
                pick,
                weight,
                anchor: (weight, seat),
            }),
        }
    }

    tallies.into_iter().reduce(|best, next| {
        let diff = next.weight - best.weight;
        if diff > VOTE_TIE_EPSILON {
            next
        } else if diff.abs() <= VOTE_TIE_EPSILON && beats_anchor(next.anchor, best.anchor) {
            next
        } else {
            best
        }
    })
}

fn beats_anchor(candidate: (f64, usize), current: (f64, usize)) -> bool {
    let diff = candidate.0 - current.0;
    diff > VOTE_TIE_EPSILON || (diff.abs() <= VOTE_TIE_EPSILON && candidate.1 < current.1)
}

/// Rationale of the heaviest seats, heaviest first
fn build_reasoning(
    opinions: &[CouncilMemberOpinion],
    weight_of: &dyn Fn(&CouncilMemberOpinion) -> f64,
    limit: usize,
) -> String {
    let mut ranked: Vec<&CouncilMemberOpinion> = opinions.iter().collect();
    ranked.sort_by(|a, b| {
        weight_of(b)
            .partial_cmp(&weight_of(a))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.member_id.index().cmp(&b.member_id.index()))
    });

    ranked
        .into_iter()
        .take(limit.max(1))
        .map(|o| format!("[{} {:.2}] {}", o.member_id, weight_of(o), o.rationale))
        .collect::<Vec<_>>()
        .join("; ")
}
