//! Core data model shared by the council, dispatch and monitoring layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ParseSportError;

/// Number of specialists sitting on every sport council
pub const COUNCIL_SIZE: usize = 5;

/// Pick label for a signal favouring the home side
pub const HOME_PICK: &str = "home team";

/// Pick label for a signal favouring the away side
pub const AWAY_PICK: &str = "away team";

/// Clamp a probability-like value into [0, 1]; NaN collapses to 0
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Sports with a prediction council
///
/// Deserializes through `FromStr`, so config files and remote peers may use aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Sport {
    Basketball,
    Hockey,
    Football,
    Baseball,
    Soccer,
}

impl Sport {
    pub const ALL: [Sport; 5] = [
        Sport::Basketball,
        Sport::Hockey,
        Sport::Football,
        Sport::Baseball,
        Sport::Soccer,
    ];

    /// Stable lowercase identifier, also used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::Basketball => "basketball",
            Sport::Hockey => "hockey",
            Sport::Football => "football",
            Sport::Baseball => "baseball",
            Sport::Soccer => "soccer",
        }
    }

    /// Human-facing label used when prefixing parlay reasoning
    pub fn label(&self) -> &'static str {
        match self {
            Sport::Basketball => "Basketball",
            Sport::Hockey => "Hockey",
            Sport::Football => "Football",
            Sport::Baseball => "Baseball",
            Sport::Soccer => "Soccer",
        }
    }
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sport {
    type Err = ParseSportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basketball" | "nba" | "wnba" | "ncaab" => Ok(Sport::Basketball),
            "hockey" | "nhl" | "ice hockey" => Ok(Sport::Hockey),
            "football" | "nfl" | "ncaaf" | "american football" => Ok(Sport::Football),
            "baseball" | "mlb" => Ok(Sport::Baseball),
            "soccer" | "mls" | "epl" | "premier league" => Ok(Sport::Soccer),
            other => Err(ParseSportError(other.to_string())),
        }
    }
}

impl TryFrom<String> for Sport {
    type Error = ParseSportError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Fixed specialist roles; every sport council seats exactly one of each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Offense,
    Defense,
    Situational,
    Momentum,
    Variance,
}

impl MemberRole {
    /// Roster order. Weight vectors are indexed in this order.
    pub const ALL: [MemberRole; COUNCIL_SIZE] = [
        MemberRole::Offense,
        MemberRole::Defense,
        MemberRole::Situational,
        MemberRole::Momentum,
        MemberRole::Variance,
    ];

    pub fn index(&self) -> usize {
        match self {
            MemberRole::Offense => 0,
            MemberRole::Defense => 1,
            MemberRole::Situational => 2,
            MemberRole::Momentum => 3,
            MemberRole::Variance => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Offense => "offense",
            MemberRole::Defense => "defense",
            MemberRole::Situational => "situational",
            MemberRole::Momentum => "momentum",
            MemberRole::Variance => "variance",
        }
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prediction request as handed to the dispatcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserQuery {
    pub user_id: String,
    pub query_text: String,
    /// Requested sports in presentation order; two or more means parlay intent
    #[serde(default)]
    pub sports: Vec<Sport>,
    /// Free-form options such as `risk_tolerance` or `strategy`
    #[serde(default)]
    pub preferences: BTreeMap<String, String>,
}

impl UserQuery {
    pub fn new(user_id: impl Into<String>, query_text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            query_text: query_text.into(),
            sports: Vec::new(),
            preferences: BTreeMap::new(),
        }
    }

    /// Append a sport, ignoring duplicates so the list stays an ordered set
    pub fn with_sport(mut self, sport: Sport) -> Self {
        if !self.sports.contains(&sport) {
            self.sports.push(sport);
        }
        self
    }

    pub fn with_preference(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.preferences.insert(key.into(), value.into());
        self
    }

    pub fn preference(&self, key: &str) -> Option<&str> {
        self.preferences.get(key).map(String::as_str)
    }

    pub fn is_parlay(&self) -> bool {
        self.sports.len() > 1
    }
}

/// Where an agent instance executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locality {
    Local,
    Remote,
}

/// Last-known reachability of an agent instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Reachable,
    Unreachable,
}

/// Catalog entry describing one running sport agent instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub instance_id: String,
    pub sport: Sport,
    pub locality: Locality,
    /// Base URL; only present for remote instances
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub health: Health,
}

impl AgentInfo {
    pub fn local(instance_id: impl Into<String>, sport: Sport) -> Self {
        Self {
            instance_id: instance_id.into(),
            sport,
            locality: Locality::Local,
            endpoint: None,
            health: Health::Reachable,
        }
    }

    pub fn remote(instance_id: impl Into<String>, sport: Sport, endpoint: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            sport,
            locality: Locality::Remote,
            endpoint: Some(endpoint.into()),
            health: Health::Reachable,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health == Health::Reachable
    }

    pub fn is_local(&self) -> bool {
        self.locality == Locality::Local
    }
}

/// A specialist's directional output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Signal {
    /// -1.0 (away side) to 1.0 (home side)
    Score(f64),
    /// Categorical pick such as "home team" or "over"
    Pick(String),
}

impl Signal {
    /// The pick this signal votes for, or None when it carries no direction
    pub fn direction(&self) -> Option<String> {
        match self {
            Signal::Score(score) if *score > f64::EPSILON => Some(HOME_PICK.to_string()),
            Signal::Score(score) if *score < -f64::EPSILON => Some(AWAY_PICK.to_string()),
            Signal::Score(_) => None,
            Signal::Pick(label) => {
                let label = label.trim();
                if label.is_empty() {
                    None
                } else {
                    Some(label.to_string())
                }
            }
        }
    }
}

/// One council member's opinion for a single aggregation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouncilMemberOpinion {
    pub member_id: MemberRole,
    pub signal: Signal,
    pub confidence: f64, // 0.0 to 1.0
    pub rationale: String,
}

impl CouncilMemberOpinion {
    pub fn new(member_id: MemberRole, signal: Signal, confidence: f64, rationale: impl Into<String>) -> Self {
        Self {
            member_id,
            signal,
            confidence: clamp_unit(confidence),
            rationale: rationale.into(),
        }
    }
}

/// How one member stood relative to the final pick; what the feedback loop needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberContribution {
    pub member_id: MemberRole,
    pub sided_with_pick: bool,
}

/// Sport-level output of a council aggregation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportPrediction {
    pub sport: Sport,
    pub prediction_text: String,
    pub confidence: f64,
    pub reasoning: String,
    pub contributing_members: Vec<CouncilMemberOpinion>,
    /// Share of live council weight that voted for `prediction_text`
    #[serde(default)]
    pub agreement: f64,
    pub generated_at: DateTime<Utc>,
}

impl SportPrediction {
    /// Members with a direction, marked by whether they backed the final pick.
    /// Members without a direction did not take part in the vote and are left out.
    pub fn contributions(&self) -> Vec<MemberContribution> {
        self.contributing_members
            .iter()
            .filter_map(|opinion| {
                opinion.signal.direction().map(|direction| MemberContribution {
                    member_id: opinion.member_id,
                    sided_with_pick: direction == self.prediction_text,
                })
            })
            .collect()
    }

    /// Structural checks applied to predictions that arrive from outside the process
    pub fn validate(&self, expected_sport: Sport) -> Result<(), String> {
        if self.sport != expected_sport {
            return Err(format!("expected sport {}, got {}", expected_sport, self.sport));
        }
        if self.prediction_text.trim().is_empty() {
            return Err("empty prediction_text".to_string());
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!("confidence {} outside [0, 1]", self.confidence));
        }
        if !(0.0..=1.0).contains(&self.agreement) {
            return Err(format!("agreement {} outside [0, 1]", self.agreement));
        }
        if let Some(bad) = self
            .contributing_members
            .iter()
            .find(|m| !(0.0..=1.0).contains(&m.confidence))
        {
            return Err(format!(
                "member {} confidence {} outside [0, 1]",
                bad.member_id, bad.confidence
            ));
        }
        Ok(())
    }
}

/// Final answer for a query: one leg, or a parlay of several
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedPrediction {
    pub legs: Vec<SportPrediction>,
    pub combined_confidence: f64,
    pub combined_reasoning: String,
    /// Ids of the records written for each leg, in leg order
    #[serde(default)]
    pub record_ids: Vec<Uuid>,
}

impl CombinedPrediction {
    pub fn is_parlay(&self) -> bool {
        self.legs.len() > 1
    }

    pub fn sports(&self) -> Vec<Sport> {
        self.legs.iter().map(|leg| leg.sport).collect()
    }
}

/// Tri-state outcome of a stored prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Hit,
    Miss,
}

impl Outcome {
    pub fn from_realized(realized: bool) -> Self {
        if realized {
            Outcome::Hit
        } else {
            Outcome::Miss
        }
    }

    pub fn realized(&self) -> Option<bool> {
        match self {
            Outcome::Pending => None,
            Outcome::Hit => Some(true),
            Outcome::Miss => Some(false),
        }
    }
}

/// Persisted trace of one delivered sport prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub sport: Sport,
    pub prediction_text: String,
    pub confidence: f64,
    pub reasoning: String,
    pub timestamp: DateTime<Utc>,
    pub outcome: Outcome,
    pub outcome_reported_at: Option<DateTime<Utc>>,
    /// Council members behind the prediction, captured at creation time
    #[serde(default)]
    pub contributions: Vec<MemberContribution>,
}

impl PredictionRecord {
    pub fn pending(user_id: impl Into<String>, prediction: &SportPrediction) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            sport: prediction.sport,
            prediction_text: prediction.prediction_text.clone(),
            confidence: prediction.confidence,
            reasoning: prediction.reasoning.clone(),
            timestamp: Utc::now(),
            outcome: Outcome::Pending,
            outcome_reported_at: None,
            contributions: prediction.contributions(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == Outcome::Pending
    }
}
