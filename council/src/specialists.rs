//! Lexicon specialists - the standard five-seat council
//!
//! Each specialist reads the query text through its own lexicon:
//! - Side-qualified cues ("home offense", "visitors on a back-to-back") push the
//!   signal toward the home or away side
//! - A per-sport home-advantage prior gives every seat a baseline lean
//! - The variance seat also reads volatility cues and the caller's risk tolerance
//!
//! Signals are scores in (-1, 1); positive favours the home side.

use super::member::{CouncilMember, Roster};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use common::{CouncilMemberOpinion, MemberRole, Signal, Sport, UserQuery, AWAY_PICK, HOME_PICK};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Preference key read by the variance seat
pub const RISK_TOLERANCE_KEY: &str = "risk_tolerance";

const HOME_SIDE: &str = r"(?:home|hosts?|hosting)";
const AWAY_SIDE: &str = r"(?:away|road|visiting|visitors?)";

/// Compiled cue patterns for one (sport, role) seat
struct Lexicon {
    home: Regex,
    away: Regex,
}

lazy_static! {
    static ref LEXICONS: HashMap<(Sport, MemberRole), Lexicon> = build_lexicons();
    static ref VOLATILITY: Regex = Regex::new(
        r"(?i)\b(?:upsets?|coin[- ]?flip|volatile|unpredictable|high[- ]variance|overtime|shootouts?|penalt(?:y|ies) kicks?|extra innings)\b"
    )
    .expect("volatility pattern is valid");
}

/// Specialist tuning shared by every seat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialistConfig {
    /// Scale applied to the per-sport home-advantage prior
    #[serde(default = "default_prior_weight")]
    pub prior_weight: f64,
    /// Contribution of each net cue before squashing
    #[serde(default = "default_cue_weight")]
    pub cue_weight: f64,
    /// Confidence of a seat with no lean at all
    #[serde(default = "default_base_confidence")]
    pub base_confidence: f64,
    /// Extra confidence reached as the lean approaches certainty
    #[serde(default = "default_confidence_span")]
    pub confidence_span: f64,
    /// Confidence lost per volatility cue on the variance seat
    #[serde(default = "default_volatility_penalty")]
    pub volatility_penalty: f64,
}

impl Default for SpecialistConfig {
    fn default() -> Self {
        Self {
            prior_weight: default_prior_weight(),
            cue_weight: default_cue_weight(),
            base_confidence: default_base_confidence(),
            confidence_span: default_confidence_span(),
            volatility_penalty: default_volatility_penalty(),
        }
    }
}

fn default_prior_weight() -> f64 {
    1.0
}

fn default_cue_weight() -> f64 {
    0.35
}

fn default_base_confidence() -> f64 {
    0.5
}

fn default_confidence_span() -> f64 {
    0.45
}

fn default_volatility_penalty() -> f64 {
    0.1
}

/// Caller appetite for variance, read from query preferences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskTolerance {
    Low,
    Medium,
    High,
}

impl RiskTolerance {
    pub fn from_query(query: &UserQuery) -> Result<Self> {
        match query.preference(RISK_TOLERANCE_KEY) {
            None => Ok(RiskTolerance::Medium),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "low" | "conservative" => Ok(RiskTolerance::Low),
                "medium" | "moderate" | "balanced" => Ok(RiskTolerance::Medium),
                "high" | "aggressive" => Ok(RiskTolerance::High),
                other => Err(anyhow!("Unrecognised risk tolerance '{}'", other)),
            },
        }
    }

    fn confidence_multiplier(&self) -> f64 {
        match self {
            RiskTolerance::Low => 0.85,
            RiskTolerance::Medium => 1.0,
            RiskTolerance::High => 1.1,
        }
    }
}

/// One lexicon-driven council seat
pub struct Specialist {
    role: MemberRole,
    config: SpecialistConfig,
}

impl Specialist {
    pub fn new(role: MemberRole, config: SpecialistConfig) -> Self {
        Self { role, config }
    }

    /// Net lean for this seat: (home cue count, away cue count, squashed score)
    fn lean(&self, sport: Sport, text: &str) -> Result<(usize, usize, f64)> {
        let lexicon = LEXICONS
            .get(&(sport, self.role))
            .ok_or_else(|| anyhow!("No {} lexicon for {}", self.role, sport))?;

        let home_hits = lexicon.home.find_iter(text).count();
        let away_hits = lexicon.away.find_iter(text).count();

        let prior = home_advantage(sport) * role_prior_factor(self.role) * self.config.prior_weight;
        let raw = prior + self.config.cue_weight * (home_hits as f64 - away_hits as f64);

        Ok((home_hits, away_hits, raw.tanh()))
    }
}

#[async_trait]
impl CouncilMember for Specialist {
    fn role(&self) -> MemberRole {
        self.role
    }

    async fn opine(&self, sport: Sport, query: &UserQuery) -> Result<CouncilMemberOpinion> {
        let text = query.query_text.trim();
        if text.is_empty() {
            bail!("{} specialist received an empty query", self.role);
        }

        let (home_hits, away_hits, score) = self.lean(sport, text)?;
        let mut confidence = self.config.base_confidence + self.config.confidence_span * score.abs();

        let mut rationale = format!(
            "{} reads {} home / {} away cue(s)",
            self.role, home_hits, away_hits
        );

        if self.role == MemberRole::Variance {
            let tolerance = RiskTolerance::from_query(query)?;
            let volatility_hits = VOLATILITY.find_iter(text).count();
            let damping = (1.0 - self.config.volatility_penalty * volatility_hits as f64).max(0.3);
            confidence *= damping * tolerance.confidence_multiplier();
            rationale.push_str(&format!(
                ", {} volatility cue(s) at {:?} risk tolerance",
                volatility_hits, tolerance
            ));
        }

        let pick = if score >= 0.0 { HOME_PICK } else { AWAY_PICK };
        rationale.push_str(&format!(", leans {} ({:+.2})", pick, score));

        debug!(
            sport = %sport,
            role = %self.role,
            score = score,
            confidence = confidence,
            "Specialist opinion"
        );

        Ok(CouncilMemberOpinion::new(
            self.role,
            Signal::Score(score),
            confidence,
            rationale,
        ))
    }
}

/// The standard council: one lexicon specialist per seat
pub fn standard_roster(config: &SpecialistConfig) -> Roster {
    MemberRole::ALL.map(|role| {
        Arc::new(Specialist::new(role, config.clone())) as Arc<dyn CouncilMember>
    })
}

/// Baseline home edge per sport before any cue is read
fn home_advantage(sport: Sport) -> f64 {
    match sport {
        Sport::Basketball => 0.12,
        Sport::Hockey => 0.06,
        Sport::Football => 0.10,
        Sport::Baseball => 0.05,
        Sport::Soccer => 0.14,
    }
}

fn role_prior_factor(role: MemberRole) -> f64 {
    match role {
        MemberRole::Offense => 0.6,
        MemberRole::Defense => 0.6,
        MemberRole::Situational => 1.0,
        MemberRole::Momentum => 0.3,
        MemberRole::Variance => 0.4,
    }
}

/// Positive and negative terms for one seat; negative terms attached to a side
/// count for the opposite side
fn seat_terms(sport: Sport, role: MemberRole) -> (Vec<&'static str>, Vec<&'static str>) {
    let (mut positive, negative): (Vec<&'static str>, Vec<&'static str>) = match role {
        MemberRole::Offense => (
            vec!["offen[cs]e", "scoring", "attack", "firepower"],
            vec!["slump", "drought", "misfiring", "sputtering"],
        ),
        MemberRole::Defense => (
            vec!["defen[cs]e", "defending", "shutdown"],
            vec![r"injur(?:y|ed|ies)", "leaky", "porous", "suspended", "suspensions?"],
        ),
        MemberRole::Situational => (
            vec![r"(?:well[- ])?rested", "fresh", "crowd", "home ?stand", "altitude"],
            vec![r"back[- ]to[- ]back", "road trip", r"travel(?:l?ing|l?ed)?", "fatigue", "tired", "short rest"],
        ),
        MemberRole::Momentum => (
            vec!["winning", "hot", "surging", "rolling", "unbeaten", "momentum"],
            vec!["losing", "skid", "slump", "slide", "cold", "winless"],
        ),
        MemberRole::Variance => (
            vec![r"(?:heavy )?favou?rites?", "mismatch", "blowout"],
            vec!["underdogs?", "long ?shots?"],
        ),
    };

    let extras: &[&'static str] = match (sport, role) {
        (Sport::Basketball, MemberRole::Offense) => &[r"three[- ]point", "pace", "shooting", "paint"],
        (Sport::Basketball, MemberRole::Defense) => &["rim protection", "perimeter", "rebounding"],
        (Sport::Hockey, MemberRole::Offense) => &[r"power[- ]?play", "forwards", "shots"],
        (Sport::Hockey, MemberRole::Defense) => &["goalie", "goaltend(?:er|ing)", "penalty kill", "blue ?line"],
        (Sport::Football, MemberRole::Offense) => &["passing", "rushing", "quarterback", "qb", "receivers"],
        (Sport::Football, MemberRole::Defense) => &["secondary", "pass rush", "linebackers"],
        (Sport::Baseball, MemberRole::Offense) => &["lineup", "hitting", "bats", "slugging"],
        (Sport::Baseball, MemberRole::Defense) => &["pitching", "starter", "bullpen", "rotation"],
        (Sport::Soccer, MemberRole::Offense) => &["strikers?", "finishing", "wingers?"],
        (Sport::Soccer, MemberRole::Defense) => &["keeper", "goalkeeper", "back (?:line|four)", "clean sheets?"],
        _ => &[],
    };
    positive.extend_from_slice(extras);

    (positive, negative)
}

/// A side word followed, within three words, by one of the terms
fn side_pattern(side: &str, terms: &[&str]) -> String {
    format!(r"\b{}\b(?:\W+\w+){{0,3}}?\W+(?:{})\b", side, terms.join("|"))
}

fn build_lexicons() -> HashMap<(Sport, MemberRole), Lexicon> {
    let mut lexicons = HashMap::new();

    for sport in Sport::ALL {
        for role in MemberRole::ALL {
            let (positive, negative) = seat_terms(sport, role);
            let home = format!(
                "(?i){}|{}",
                side_pattern(HOME_SIDE, &positive),
                side_pattern(AWAY_SIDE, &negative)
            );
            let away = format!(
                "(?i){}|{}",
                side_pattern(AWAY_SIDE, &positive),
                side_pattern(HOME_SIDE, &negative)
            );

            lexicons.insert(
                (sport, role),
                Lexicon {
                    home: Regex::new(&home).expect("home lexicon pattern is valid"),
                    away: Regex::new(&away).expect("away lexicon pattern is valid"),
                },
            );
        }
    }

    lexicons
}
