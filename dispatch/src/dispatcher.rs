// Head Dispatcher
// Fans a query out to its sport agents under one deadline and composes the answer

use super::agent::{InProcessAgent, SportAgent};
use super::config::{DispatchConfig, OracleConfig};
use super::parlay::ParlayComposer;
use super::registry::AgentRegistry;
use super::remote::RemoteInvoker;
use super::routing::requested_sports;
use common::{
    join_scoped, AgentInfo, CombinedPrediction, PredictionError, PredictionRecord,
    PredictionStore, Sport, SportPrediction, UserQuery, Uuid,
};
use council::{CouncilAggregator, WeightBook};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Entry point for prediction requests
pub struct HeadDispatcher {
    config: DispatchConfig,
    registry: Arc<AgentRegistry>,
    locals: HashMap<Sport, Arc<InProcessAgent>>,
    invoker: Arc<RemoteInvoker>,
    composer: ParlayComposer,
    store: Option<Arc<dyn PredictionStore>>,
}

impl HeadDispatcher {
    pub fn builder(config: DispatchConfig) -> HeadDispatcherBuilder {
        HeadDispatcherBuilder::new(config)
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    fn sport_agent(&self, sport: Sport) -> SportAgent {
        SportAgent::new(
            sport,
            Arc::clone(&self.registry),
            self.locals.get(&sport).cloned(),
            Arc::clone(&self.invoker),
            self.config.remote_timeout(),
        )
    }

    /// Answer a query: one sport yields a single prediction, several yield a parlay
    /// that succeeds only if every leg does
    pub async fn dispatch(&self, query: &UserQuery) -> Result<CombinedPrediction, PredictionError> {
        let sports = requested_sports(query);
        if sports.is_empty() {
            warn!(user_id = %query.user_id, "No sport requested or detected");
            return Err(PredictionError::NoSportRequested);
        }

        let deadline = Instant::now() + self.config.max_request_latency();
        info!(
            user_id = %query.user_id,
            sports = ?sports,
            parlay = sports.len() > 1,
            "Dispatching prediction request"
        );

        let shared = Arc::new(query.clone());
        let tasks: Vec<_> = sports
            .iter()
            .map(|&sport| {
                let agent = self.sport_agent(sport);
                let query = Arc::clone(&shared);
                tokio::spawn(async move {
                    match tokio::time::timeout_at(deadline, agent.predict(&query, deadline)).await {
                        Ok(result) => result,
                        Err(_) => Err(PredictionError::Timeout {
                            sport,
                            instance_id: None,
                        }),
                    }
                })
            })
            .collect();

        let results = join_scoped(tasks).await;

        let mut legs: Vec<SportPrediction> = Vec::with_capacity(sports.len());
        let mut failures: Vec<(Sport, PredictionError)> = Vec::new();

        for (&sport, joined) in sports.iter().zip(results) {
            let result = joined.unwrap_or_else(|e| {
                error!(sport = %sport, error = %e, "Sport task aborted");
                Err(PredictionError::Unreachable {
                    sport,
                    instance_id: "dispatch".to_string(),
                    reason: e.to_string(),
                })
            });

            match result {
                Ok(prediction) => {
                    debug!(
                        sport = %sport,
                        pick = %prediction.prediction_text,
                        confidence = prediction.confidence,
                        "Leg ready"
                    );
                    legs.push(prediction);
                }
                Err(e) => {
                    warn!(sport = %sport, kind = ?e.kind(), error = %e, "Leg failed");
                    failures.push((sport, e));
                }
            }
        }

        if !failures.is_empty() {
            return Err(if sports.len() == 1 {
                let (sport, e) = failures.remove(0);
                match e {
                    PredictionError::SportUnsupported { .. } => e,
                    other => PredictionError::SportUnavailable {
                        sport,
                        source: Box::new(other),
                    },
                }
            } else {
                PredictionError::ParlayIncomplete {
                    failures: failures
                        .iter()
                        .map(|(sport, e)| e.to_leg_failure(*sport))
                        .collect(),
                }
            });
        }

        let mut combined = self.composer.compose(legs)?;
        combined.record_ids = self.persist(&query.user_id, &combined.legs).await;

        info!(
            user_id = %query.user_id,
            legs = combined.legs.len(),
            combined_confidence = combined.combined_confidence,
            records = combined.record_ids.len(),
            "Prediction delivered"
        );

        Ok(combined)
    }

    /// Write one pending record per leg; returns the ids that were stored
    async fn persist(&self, user_id: &str, legs: &[SportPrediction]) -> Vec<Uuid> {
        let Some(store) = &self.store else {
            return Vec::new();
        };

        let mut ids = Vec::with_capacity(legs.len());
        for leg in legs {
            let record = PredictionRecord::pending(user_id, leg);
            let id = record.id;
            match store.insert(record).await {
                Ok(()) => ids.push(id),
                Err(e) => {
                    error!(sport = %leg.sport, record_id = %id, error = %e, "Failed to store prediction record");
                }
            }
        }
        ids
    }
}

/// Assembles a `HeadDispatcher` and registers its agents
pub struct HeadDispatcherBuilder {
    config: DispatchConfig,
    registry: Option<Arc<AgentRegistry>>,
    locals: Vec<CouncilAggregator>,
    remotes: Vec<AgentInfo>,
    invoker: Option<Arc<RemoteInvoker>>,
    store: Option<Arc<dyn PredictionStore>>,
}

impl HeadDispatcherBuilder {
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            registry: None,
            locals: Vec::new(),
            remotes: Vec::new(),
            invoker: None,
            store: None,
        }
    }

    /// Standard local councils for the configured sports plus the remote catalog
    pub fn from_config(config: &OracleConfig, weights: Arc<WeightBook>) -> Self {
        let mut builder = Self::new(config.dispatch.clone());
        for &sport in &config.dispatch.local_sports {
            builder = builder.local_council(CouncilAggregator::standard(
                sport,
                Arc::clone(&weights),
                config.council.clone(),
            ));
        }
        for agent in &config.agents {
            builder = builder.remote_agent(agent.to_info());
        }
        builder
    }

    /// Share an existing registry instead of creating a fresh one
    pub fn registry(mut self, registry: Arc<AgentRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Host a sport's council in this process
    pub fn local_council(mut self, council: CouncilAggregator) -> Self {
        self.locals.push(council);
        self
    }

    pub fn remote_agent(mut self, agent: AgentInfo) -> Self {
        self.remotes.push(agent);
        self
    }

    pub fn invoker(mut self, invoker: Arc<RemoteInvoker>) -> Self {
        self.invoker = Some(invoker);
        self
    }

    /// Record delivered predictions for outcome tracking
    pub fn store(mut self, store: Arc<dyn PredictionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn build(self) -> HeadDispatcher {
        let registry = self.registry.unwrap_or_default();

        let mut locals = HashMap::new();
        for council in self.locals {
            let agent = Arc::new(InProcessAgent::new(council));
            registry.register(agent.info());
            if locals.insert(agent.sport(), agent).is_some() {
                warn!("Replacing an earlier local council for the same sport");
            }
        }
        for remote in self.remotes {
            registry.register(remote);
        }

        info!(
            local_sports = ?locals.keys().collect::<Vec<_>>(),
            supported = ?registry.sports(),
            "Head dispatcher ready"
        );

        HeadDispatcher {
            config: self.config,
            registry,
            locals,
            invoker: self.invoker.unwrap_or_default(),
            composer: ParlayComposer::new(),
            store: self.store,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use common::{
        CouncilMemberOpinion, FailureKind, InMemoryPredictionStore, MemberRole, Signal, HOME_PICK,
    };
    use council::{CouncilConfig, CouncilMember, Roster};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;

    enum Behavior {
        Answer(f64),
        Fail,
        Stall,
        Slow {
            delay: Duration,
            finished: Arc<AtomicUsize>,
        },
    }

    struct ScriptedMember {
        role: MemberRole,
        behavior: Arc<Behavior>,
    }

    #[async_trait]
    impl CouncilMember for ScriptedMember {
        fn role(&self) -> MemberRole {
            self.role
        }

        async fn opine(&self, _sport: Sport, _query: &UserQuery) -> Result<CouncilMemberOpinion> {
            match *self.behavior {
                Behavior::Answer(confidence) => Ok(CouncilMemberOpinion::new(
                    self.role,
                    Signal::Pick(HOME_PICK.to_string()),
                    confidence,
                    format!("{} likes the hosts", self.role),
                )),
                Behavior::Fail => bail!("{} feed offline", self.role),
                Behavior::Stall => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    bail!("unreachable")
                }
                Behavior::Slow { delay, ref finished } => {
                    tokio::time::sleep(delay).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(CouncilMemberOpinion::new(
                        self.role,
                        Signal::Pick(HOME_PICK.to_string()),
                        0.6,
                        "late read",
                    ))
                }
            }
        }
    }

    fn council(sport: Sport, behavior: Behavior) -> CouncilAggregator {
        let behavior = Arc::new(behavior);
        let roster: Roster = MemberRole::ALL.map(|role| {
            Arc::new(ScriptedMember {
                role,
                behavior: Arc::clone(&behavior),
            }) as Arc<dyn CouncilMember>
        });
        CouncilAggregator::new(sport, roster, Arc::new(WeightBook::new()), CouncilConfig::default())
            .unwrap()
    }

    fn fast_config() -> DispatchConfig {
        DispatchConfig {
            max_request_latency_ms: 300,
            remote_timeout_ms: 100,
            local_sports: vec![],
        }
    }

    fn query(sports: &[Sport]) -> UserQuery {
        let mut query = UserQuery::new("user-9", "Who covers tonight?");
        for sport in sports {
            query = query.with_sport(*sport);
        }
        query
    }

    #[tokio::test]
    async fn test_unanimous_basketball_council() {
        let store = Arc::new(InMemoryPredictionStore::new());
        let dispatcher = HeadDispatcher::builder(DispatchConfig::default())
            .local_council(council(Sport::Basketball, Behavior::Answer(0.7)))
            .store(store.clone())
            .build();

        let combined = dispatcher.dispatch(&query(&[Sport::Basketball])).await.unwrap();
        assert_eq!(combined.legs.len(), 1);
        assert_eq!(combined.legs[0].prediction_text, HOME_PICK);
        assert!((combined.combined_confidence - 0.7).abs() < 1e-9);
        assert!((combined.legs[0].confidence - 0.7).abs() < 1e-9);

        assert_eq!(combined.record_ids.len(), 1);
        let record = store.get(combined.record_ids[0]).await.unwrap().unwrap();
        assert_eq!(record.sport, Sport::Basketball);
        assert_eq!(record.user_id, "user-9");
        assert!(record.is_pending());
        assert_eq!(record.contributions.len(), 5);
    }

    #[tokio::test]
    async fn test_parlay_with_timed_out_leg_writes_nothing() {
        let store = Arc::new(InMemoryPredictionStore::new());
        let dispatcher = HeadDispatcher::builder(fast_config())
            .local_council(council(Sport::Basketball, Behavior::Answer(0.7)))
            .local_council(council(Sport::Hockey, Behavior::Stall))
            .store(store.clone())
            .build();

        let err = dispatcher
            .dispatch(&query(&[Sport::Basketball, Sport::Hockey]))
            .await
            .unwrap_err();

        match &err {
            PredictionError::ParlayIncomplete { failures } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].sport, Sport::Hockey);
                assert_eq!(failures[0].kind, FailureKind::Timeout);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.failed_sports(), vec![Sport::Hockey]);
        assert_eq!(store.stats().await.unwrap().total_records, 0);
    }

    #[tokio::test]
    async fn test_deadline_cancels_council_members() {
        let finished = Arc::new(AtomicUsize::new(0));
        let config = DispatchConfig {
            max_request_latency_ms: 100,
            remote_timeout_ms: 100,
            local_sports: vec![],
        };
        let dispatcher = HeadDispatcher::builder(config)
            .local_council(council(
                Sport::Hockey,
                Behavior::Slow {
                    delay: Duration::from_millis(400),
                    finished: Arc::clone(&finished),
                },
            ))
            .build();

        let err = dispatcher.dispatch(&query(&[Sport::Hockey])).await.unwrap_err();
        match err {
            PredictionError::SportUnavailable { sport, source } => {
                assert_eq!(sport, Sport::Hockey);
                assert_eq!(source.kind(), FailureKind::Timeout);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Well past the members' own delay: none of them ran to completion
        tokio::time::sleep(Duration::from_millis(700)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropped_dispatch_cancels_council_members() {
        let finished = Arc::new(AtomicUsize::new(0));
        let dispatcher = HeadDispatcher::builder(DispatchConfig::default())
            .local_council(council(
                Sport::Basketball,
                Behavior::Slow {
                    delay: Duration::from_millis(300),
                    finished: Arc::clone(&finished),
                },
            ))
            .build();

        let q = query(&[Sport::Basketball]);
        let outcome =
            tokio::time::timeout(Duration::from_millis(50), dispatcher.dispatch(&q)).await;
        assert!(outcome.is_err());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_silent_remote_leg_times_out_and_is_marked() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let dispatcher = HeadDispatcher::builder(fast_config())
            .local_council(council(Sport::Basketball, Behavior::Answer(0.6)))
            .remote_agent(AgentInfo::remote("hockey-east-1", Sport::Hockey, endpoint))
            .build();

        let err = dispatcher
            .dispatch(&query(&[Sport::Basketball, Sport::Hockey]))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::ParlayIncomplete);
        assert_eq!(err.failed_sports(), vec![Sport::Hockey]);
        assert!(!dispatcher.registry().resolve(Sport::Hockey)[0].is_healthy());
    }

    #[tokio::test]
    async fn test_parlay_success_records_every_leg() {
        let store = Arc::new(InMemoryPredictionStore::new());
        let dispatcher = HeadDispatcher::builder(DispatchConfig::default())
            .local_council(council(Sport::Basketball, Behavior::Answer(0.8)))
            .local_council(council(Sport::Soccer, Behavior::Answer(0.6)))
            .store(store.clone())
            .build();

        let combined = dispatcher
            .dispatch(&query(&[Sport::Soccer, Sport::Basketball]))
            .await
            .unwrap();
        assert_eq!(combined.sports(), vec![Sport::Soccer, Sport::Basketball]);
        assert!(combined.combined_confidence <= 0.6);
        assert!((combined.combined_confidence - 0.48).abs() < 1e-9);
        assert_eq!(combined.record_ids.len(), 2);
        assert_eq!(store.stats().await.unwrap().pending, 2);
    }

    #[tokio::test]
    async fn test_unsupported_sport_surfaces_as_is() {
        let dispatcher = HeadDispatcher::builder(DispatchConfig::default())
            .local_council(council(Sport::Basketball, Behavior::Answer(0.7)))
            .build();

        let err = dispatcher.dispatch(&query(&[Sport::Baseball])).await.unwrap_err();
        assert_eq!(
            err,
            PredictionError::SportUnsupported {
                sport: Sport::Baseball
            }
        );
    }

    #[tokio::test]
    async fn test_single_sport_failure_is_unavailable() {
        let store = Arc::new(InMemoryPredictionStore::new());
        let dispatcher = HeadDispatcher::builder(DispatchConfig::default())
            .local_council(council(Sport::Football, Behavior::Fail))
            .store(store.clone())
            .build();

        let err = dispatcher.dispatch(&query(&[Sport::Football])).await.unwrap_err();
        match err {
            PredictionError::SportUnavailable { sport, source } => {
                assert_eq!(sport, Sport::Football);
                assert_eq!(source.kind(), FailureKind::NoOpinionsAvailable);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.stats().await.unwrap().total_records, 0);
    }

    #[tokio::test]
    async fn test_sports_detected_from_text() {
        let dispatcher = HeadDispatcher::builder(DispatchConfig::default())
            .local_council(council(Sport::Basketball, Behavior::Answer(0.7)))
            .build();

        let combined = dispatcher
            .dispatch(&UserQuery::new("user-9", "Best NBA play tonight?"))
            .await
            .unwrap();
        assert_eq!(combined.sports(), vec![Sport::Basketball]);

        let err = dispatcher
            .dispatch(&UserQuery::new("user-9", "Anything good tonight?"))
            .await
            .unwrap_err();
        assert_eq!(err, PredictionError::NoSportRequested);
    }

    #[tokio::test]
    async fn test_duplicate_sports_collapse() {
        let dispatcher = HeadDispatcher::builder(DispatchConfig::default())
            .local_council(council(Sport::Hockey, Behavior::Answer(0.65)))
            .build();

        let mut q = query(&[Sport::Hockey]);
        q.sports.push(Sport::Hockey);
        let combined = dispatcher.dispatch(&q).await.unwrap();
        assert!(!combined.is_parlay());
        assert!((combined.combined_confidence - 0.65).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_from_config_hosts_standard_councils() {
        let mut config = OracleConfig::default();
        config.dispatch.local_sports = vec![Sport::Soccer, Sport::Hockey];
        let dispatcher =
            HeadDispatcherBuilder::from_config(&config, Arc::new(WeightBook::new())).build();

        assert_eq!(
            dispatcher.registry().sports(),
            vec![Sport::Hockey, Sport::Soccer]
        );
        let combined = dispatcher
            .dispatch(&UserQuery::new("user-1", "EPL: home strikers are in form").with_sport(Sport::Soccer))
            .await
            .unwrap();
        assert!((0.0..=1.0).contains(&combined.combined_confidence));
    }
}
