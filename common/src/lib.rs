//! Shared types for the sports prediction workspace
//!
//! Every crate in the workspace speaks in these types:
//! - Queries, sports and the fixed council roster
//! - Member opinions, sport-level predictions and parlays
//! - Prediction records and the storage boundary they are persisted through
//! - The failure taxonomy surfaced to callers
//! - Scoped task fan-out that cancels with its caller

pub mod error;
pub mod store;
pub mod task;
pub mod types;

pub use error::{FailureKind, LegFailure, ParseSportError, PredictionError, StoreError};
pub use store::{InMemoryPredictionStore, PredictionStore, StoreStats};
pub use task::{join_scoped, AbortOnDrop};
pub use types::{
    clamp_unit, AgentInfo, CombinedPrediction, CouncilMemberOpinion, Health, Locality,
    MemberContribution, MemberRole, Outcome, PredictionRecord, Signal, Sport, SportPrediction,
    UserQuery, AWAY_PICK, COUNCIL_SIZE, HOME_PICK,
};

// Re-export for convenience
pub use chrono::{DateTime, Utc};
pub use uuid::Uuid;
