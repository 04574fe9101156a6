use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Outcome, Sport};

/// Coarse failure classification handed back to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SportUnsupported,
    Unreachable,
    Timeout,
    InvalidResponse,
    NoOpinionsAvailable,
    SportUnavailable,
    ParlayIncomplete,
    NoSportRequested,
    NoLegs,
}

/// One failed leg of a multi-sport dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegFailure {
    pub sport: Sport,
    pub kind: FailureKind,
    pub message: String,
}

/// Failures of the prediction pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("No agent registered for sport {sport}")]
    SportUnsupported { sport: Sport },

    #[error("Instance {instance_id} ({sport}) unreachable: {reason}")]
    Unreachable {
        sport: Sport,
        instance_id: String,
        reason: String,
    },

    #[error("{sport} prediction timed out at {}", .instance_id.as_deref().unwrap_or("dispatch deadline"))]
    Timeout {
        sport: Sport,
        instance_id: Option<String>,
    },

    #[error("Instance {instance_id} ({sport}) returned an invalid response: {reason}")]
    InvalidResponse {
        sport: Sport,
        instance_id: String,
        reason: String,
    },

    #[error("Every {sport} council member failed to produce an opinion")]
    NoOpinionsAvailable { sport: Sport },

    #[error("{sport} prediction unavailable: {source}")]
    SportUnavailable {
        sport: Sport,
        source: Box<PredictionError>,
    },

    #[error("Parlay incomplete, failed legs: {}", join_sports(.failures))]
    ParlayIncomplete { failures: Vec<LegFailure> },

    #[error("Query names no sport and none could be detected in its text")]
    NoSportRequested,

    #[error("Cannot compose a prediction from zero legs")]
    NoLegs,
}

fn join_sports(failures: &[LegFailure]) -> String {
    failures
        .iter()
        .map(|f| f.sport.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl PredictionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            PredictionError::SportUnsupported { .. } => FailureKind::SportUnsupported,
            PredictionError::Unreachable { .. } => FailureKind::Unreachable,
            PredictionError::Timeout { .. } => FailureKind::Timeout,
            PredictionError::InvalidResponse { .. } => FailureKind::InvalidResponse,
            PredictionError::NoOpinionsAvailable { .. } => FailureKind::NoOpinionsAvailable,
            PredictionError::SportUnavailable { .. } => FailureKind::SportUnavailable,
            PredictionError::ParlayIncomplete { .. } => FailureKind::ParlayIncomplete,
            PredictionError::NoSportRequested => FailureKind::NoSportRequested,
            PredictionError::NoLegs => FailureKind::NoLegs,
        }
    }

    /// The sport this failure concerns, when it concerns exactly one
    pub fn sport(&self) -> Option<Sport> {
        match self {
            PredictionError::SportUnsupported { sport }
            | PredictionError::Unreachable { sport, .. }
            | PredictionError::Timeout { sport, .. }
            | PredictionError::InvalidResponse { sport, .. }
            | PredictionError::NoOpinionsAvailable { sport }
            | PredictionError::SportUnavailable { sport, .. } => Some(*sport),
            PredictionError::ParlayIncomplete { .. }
            | PredictionError::NoSportRequested
            | PredictionError::NoLegs => None,
        }
    }

    /// The agent instance at fault, if one is known
    pub fn instance_id(&self) -> Option<&str> {
        match self {
            PredictionError::Unreachable { instance_id, .. }
            | PredictionError::InvalidResponse { instance_id, .. } => Some(instance_id),
            PredictionError::Timeout { instance_id, .. } => instance_id.as_deref(),
            PredictionError::SportUnavailable { source, .. } => source.instance_id(),
            _ => None,
        }
    }

    /// Failures of a remote call; these are eligible for the local fallback
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            PredictionError::Unreachable { .. }
                | PredictionError::Timeout { .. }
                | PredictionError::InvalidResponse { .. }
        )
    }

    /// Sports named by a failed parlay, or the single sport of any other failure
    pub fn failed_sports(&self) -> Vec<Sport> {
        match self {
            PredictionError::ParlayIncomplete { failures } => {
                failures.iter().map(|f| f.sport).collect()
            }
            other => other.sport().into_iter().collect(),
        }
    }

    pub fn to_leg_failure(&self, sport: Sport) -> LegFailure {
        LegFailure {
            sport,
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown sport: {0}")]
pub struct ParseSportError(pub String);

/// Failures of the prediction record store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Prediction record {id} not found")]
    RecordNotFound { id: Uuid },

    #[error("Prediction record {id} already exists")]
    DuplicateRecord { id: Uuid },

    #[error("Outcome for prediction {id} already reported as {outcome:?}")]
    OutcomeAlreadyReported { id: Uuid, outcome: Outcome },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
