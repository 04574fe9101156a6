//! Ensemble weights - per-sport contribution multipliers for council members
//!
//! Each sport owns one immutable `SportWeights` vector behind an `Arc`. Readers take
//! a snapshot (an `Arc` clone) and keep it for a whole aggregation; the performance
//! tracker installs a complete successor vector. Nothing mutates a live vector.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use common::{MemberRole, Sport, COUNCIL_SIZE};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Tolerance used when checking that a weight vector sums to one
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Normalized weight vector for one sport, indexed by `MemberRole::index`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportWeights {
    pub sport: Sport,
    weights: [f64; COUNCIL_SIZE],
    /// Incremented on every replacement
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl SportWeights {
    pub fn uniform(sport: Sport) -> Self {
        Self {
            sport,
            weights: [1.0 / COUNCIL_SIZE as f64; COUNCIL_SIZE],
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Build from raw non-negative values; the result is normalized to sum to one
    pub fn from_raw(sport: Sport, raw: [f64; COUNCIL_SIZE]) -> Result<Self> {
        Ok(Self {
            sport,
            weights: normalize(raw)?,
            version: 0,
            updated_at: Utc::now(),
        })
    }

    /// A replacement vector for the same sport with the version bumped.
    /// Vectors already summing to one are installed unchanged.
    pub fn successor(&self, raw: [f64; COUNCIL_SIZE]) -> Result<Self> {
        Ok(Self {
            sport: self.sport,
            weights: normalize(raw)?,
            version: self.version + 1,
            updated_at: Utc::now(),
        })
    }

    pub fn weight(&self, role: MemberRole) -> f64 {
        self.weights[role.index()]
    }

    pub fn as_array(&self) -> [f64; COUNCIL_SIZE] {
        self.weights
    }

    pub fn total(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Roles ordered by weight, heaviest first; equal weights keep roster order
    pub fn ranked(&self) -> Vec<MemberRole> {
        let mut roles = MemberRole::ALL.to_vec();
        roles.sort_by(|a, b| {
            self.weight(*b)
                .partial_cmp(&self.weight(*a))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.index().cmp(&b.index()))
        });
        roles
    }
}

fn normalize(raw: [f64; COUNCIL_SIZE]) -> Result<[f64; COUNCIL_SIZE]> {
    if let Some(bad) = raw.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(anyhow!("Invalid ensemble weight {}", bad));
    }
    let total: f64 = raw.iter().sum();
    if total <= 0.0 {
        return Err(anyhow!("Ensemble weights must not all be zero"));
    }
    // Already normalized: keep the values bit for bit
    if (total - 1.0).abs() <= WEIGHT_SUM_TOLERANCE {
        return Ok(raw);
    }

    let mut normalized = raw;
    for w in normalized.iter_mut() {
        *w /= total;
    }
    Ok(normalized)
}

/// Process-wide holder of the current weight vector for every sport
#[derive(Debug)]
pub struct WeightBook {
    sports: DashMap<Sport, Arc<SportWeights>>,
}

impl WeightBook {
    /// Uniform weights for every known sport
    pub fn new() -> Self {
        let sports = DashMap::new();
        for sport in Sport::ALL {
            sports.insert(sport, Arc::new(SportWeights::uniform(sport)));
        }
        Self { sports }
    }

    /// Uniform weights, overridden per sport by configured raw vectors
    pub fn with_defaults(defaults: &HashMap<Sport, [f64; COUNCIL_SIZE]>) -> Result<Self> {
        let book = Self::new();
        for (sport, raw) in defaults {
            book.sports
                .insert(*sport, Arc::new(SportWeights::from_raw(*sport, *raw)?));
        }
        Ok(book)
    }

    /// Consistent view of a sport's weights for the duration of one call
    pub fn snapshot(&self, sport: Sport) -> Arc<SportWeights> {
        self.sports
            .entry(sport)
            .or_insert_with(|| Arc::new(SportWeights::uniform(sport)))
            .value()
            .clone()
    }

    /// Install a whole new vector for its sport. Readers holding an older
    /// snapshot keep it; later snapshots see the new one.
    pub fn replace(&self, next: SportWeights) -> Arc<SportWeights> {
        let next = Arc::new(next);
        debug!(
            sport = %next.sport,
            version = next.version,
            weights = ?next.weights,
            "Ensemble weights replaced"
        );
        self.sports.insert(next.sport, Arc::clone(&next));
        next
    }

    pub fn all(&self) -> Vec<Arc<SportWeights>> {
        let mut all: Vec<Arc<SportWeights>> =
            self.sports.iter().map(|entry| entry.value().clone()).collect();
        all.sort_by_key(|w| w.sport);
        all
    }
}

impl Default for WeightBook {
    fn default() -> Self {
        Self::new()
    }
}
