// Prediction Record Storage
// Persistence boundary for delivered predictions and their outcomes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{Outcome, PredictionRecord, Sport};

/// Trait for prediction record storage backends
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Store a freshly created (pending) record
    async fn insert(&self, record: PredictionRecord) -> Result<(), StoreError>;

    /// Retrieve a record by ID
    async fn get(&self, id: Uuid) -> Result<Option<PredictionRecord>, StoreError>;

    /// Move a pending record to its realized outcome.
    ///
    /// Must succeed at most once per record; later calls fail with
    /// `OutcomeAlreadyReported` and leave the record untouched.
    async fn record_outcome(&self, id: Uuid, realized: bool) -> Result<PredictionRecord, StoreError>;

    /// Retrieve all records for a sport
    async fn by_sport(&self, sport: Sport) -> Result<Vec<PredictionRecord>, StoreError>;

    /// Retrieve records still awaiting an outcome
    async fn pending(&self) -> Result<Vec<PredictionRecord>, StoreError>;

    /// Get storage statistics
    async fn stats(&self) -> Result<StoreStats, StoreError>;
}

/// Storage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_records: usize,
    pub pending: usize,
    pub hits: usize,
    pub misses: usize,
    pub records_by_sport: HashMap<Sport, usize>,
    pub oldest_record: Option<DateTime<Utc>>,
    pub newest_record: Option<DateTime<Utc>>,
}

/// In-memory record storage (for testing and single-process deployments)
pub struct InMemoryPredictionStore {
    records: RwLock<HashMap<Uuid, PredictionRecord>>,
}

impl InMemoryPredictionStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryPredictionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PredictionStore for InMemoryPredictionStore {
    async fn insert(&self, record: PredictionRecord) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::DuplicateRecord { id: record.id });
        }
        records.insert(record.id, record);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<PredictionRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.get(&id).cloned())
    }

    async fn record_outcome(&self, id: Uuid, realized: bool) -> Result<PredictionRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&id)
            .ok_or(StoreError::RecordNotFound { id })?;

        if !record.is_pending() {
            return Err(StoreError::OutcomeAlreadyReported {
                id,
                outcome: record.outcome,
            });
        }

        record.outcome = Outcome::from_realized(realized);
        record.outcome_reported_at = Some(Utc::now());
        Ok(record.clone())
    }

    async fn by_sport(&self, sport: Sport) -> Result<Vec<PredictionRecord>, StoreError> {
        let records = self.records.read().await;
        let mut sport_records: Vec<PredictionRecord> = records
            .values()
            .filter(|r| r.sport == sport)
            .cloned()
            .collect();
        sport_records.sort_by_key(|r| r.timestamp);
        Ok(sport_records)
    }

    async fn pending(&self) -> Result<Vec<PredictionRecord>, StoreError> {
        let records = self.records.read().await;
        let mut pending: Vec<PredictionRecord> = records
            .values()
            .filter(|r| r.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.timestamp);
        Ok(pending)
    }

    async fn stats(&self) -> Result<StoreStats, StoreError> {
        let records = self.records.read().await;
        let mut stats = StoreStats {
            total_records: records.len(),
            ..Default::default()
        };

        for record in records.values() {
            match record.outcome {
                Outcome::Pending => stats.pending += 1,
                Outcome::Hit => stats.hits += 1,
                Outcome::Miss => stats.misses += 1,
            }
            *stats.records_by_sport.entry(record.sport).or_insert(0) += 1;

            if stats.oldest_record.map_or(true, |t| record.timestamp < t) {
                stats.oldest_record = Some(record.timestamp);
            }
            if stats.newest_record.map_or(true, |t| record.timestamp > t) {
                stats.newest_record = Some(record.timestamp);
            }
        }

        Ok(stats)
    }
}
