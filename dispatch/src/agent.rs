//! Sport agents - one sport's entry point, local council or remote instance
//!
//! A `SportAgent` resolves candidates through the registry and predicts through a
//! `Predictor`: either the in-process council or a proxy to a remote instance.
//! A failed remote call falls back to the local council exactly once.

use super::registry::AgentRegistry;
use super::remote::RemoteInvoker;
use async_trait::async_trait;
use common::{AgentInfo, PredictionError, Sport, SportPrediction, UserQuery};
use council::CouncilAggregator;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Something that can produce one sport's prediction within a time budget
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Instance this predictor speaks for
    fn instance_id(&self) -> &str;

    async fn predict(
        &self,
        query: &UserQuery,
        budget: Duration,
    ) -> Result<SportPrediction, PredictionError>;
}

/// A council aggregator hosted in this process
pub struct InProcessAgent {
    instance_id: String,
    council: CouncilAggregator,
}

impl InProcessAgent {
    pub fn new(council: CouncilAggregator) -> Self {
        Self {
            instance_id: local_instance_id(council.sport()),
            council,
        }
    }

    pub fn sport(&self) -> Sport {
        self.council.sport()
    }

    /// Registry entry describing this instance
    pub fn info(&self) -> AgentInfo {
        AgentInfo::local(self.instance_id.clone(), self.sport())
    }
}

#[async_trait]
impl Predictor for InProcessAgent {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    // The shared dispatch deadline bounds local work
    async fn predict(
        &self,
        query: &UserQuery,
        _budget: Duration,
    ) -> Result<SportPrediction, PredictionError> {
        self.council.aggregate(query).await
    }
}

/// Proxy to a remote instance through the invoker
pub struct RemoteProxy {
    info: AgentInfo,
    invoker: Arc<RemoteInvoker>,
    timeout: Duration,
}

impl RemoteProxy {
    pub fn new(info: AgentInfo, invoker: Arc<RemoteInvoker>, timeout: Duration) -> Self {
        Self {
            info,
            invoker,
            timeout,
        }
    }
}

#[async_trait]
impl Predictor for RemoteProxy {
    fn instance_id(&self) -> &str {
        &self.info.instance_id
    }

    /// The remote timeout never exceeds what is left of the caller's budget
    async fn predict(
        &self,
        query: &UserQuery,
        budget: Duration,
    ) -> Result<SportPrediction, PredictionError> {
        self.invoker
            .invoke(&self.info, query, self.timeout.min(budget))
            .await
    }
}

/// Conventional id for the in-process council of a sport
pub fn local_instance_id(sport: Sport) -> String {
    format!("{}-local", sport.as_str())
}

/// Entry point for one sport
pub struct SportAgent {
    sport: Sport,
    registry: Arc<AgentRegistry>,
    local: Option<Arc<InProcessAgent>>,
    invoker: Arc<RemoteInvoker>,
    remote_timeout: Duration,
}

impl SportAgent {
    pub fn new(
        sport: Sport,
        registry: Arc<AgentRegistry>,
        local: Option<Arc<InProcessAgent>>,
        invoker: Arc<RemoteInvoker>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            sport,
            registry,
            local,
            invoker,
            remote_timeout,
        }
    }

    pub fn sport(&self) -> Sport {
        self.sport
    }

    /// Predict for this sport before `deadline`
    pub async fn predict(
        &self,
        query: &UserQuery,
        deadline: Instant,
    ) -> Result<SportPrediction, PredictionError> {
        let candidates = self.registry.resolve(self.sport);
        if candidates.is_empty() {
            return Err(PredictionError::SportUnsupported { sport: self.sport });
        }

        let Some(chosen) = candidates
            .into_iter()
            .find(|c| !c.is_local() || self.hosts(c))
        else {
            // Only local entries are registered and none is hosted here
            return Err(PredictionError::SportUnsupported { sport: self.sport });
        };

        let budget = deadline.saturating_duration_since(Instant::now());

        if chosen.is_local() {
            debug!(sport = %self.sport, instance_id = %chosen.instance_id, "Using local council");
            return match &self.local {
                Some(local) => local.predict(query, budget).await,
                None => Err(PredictionError::SportUnsupported { sport: self.sport }),
            };
        }

        let proxy = RemoteProxy::new(chosen.clone(), Arc::clone(&self.invoker), self.remote_timeout);
        match proxy.predict(query, budget).await {
            Ok(prediction) => {
                if !chosen.is_healthy() {
                    self.registry.mark_healthy(&chosen.instance_id);
                }
                Ok(prediction)
            }
            Err(e) => {
                if matches!(
                    e,
                    PredictionError::Unreachable { .. } | PredictionError::Timeout { .. }
                ) {
                    self.registry.mark_unhealthy(&chosen.instance_id);
                }

                match &self.local {
                    Some(local) => {
                        warn!(
                            sport = %self.sport,
                            instance_id = %chosen.instance_id,
                            error = %e,
                            "Remote sport agent failed, falling back to local council"
                        );
                        let budget = deadline.saturating_duration_since(Instant::now());
                        local.predict(query, budget).await
                    }
                    None => {
                        info!(
                            sport = %self.sport,
                            instance_id = %chosen.instance_id,
                            error = %e,
                            "Remote sport agent failed with no local fallback"
                        );
                        Err(e)
                    }
                }
            }
        }
    }

    fn hosts(&self, candidate: &AgentInfo) -> bool {
        self.local
            .as_ref()
            .is_some_and(|local| local.instance_id() == candidate.instance_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Health;
    use council::{CouncilConfig, WeightBook};
    use tokio::net::TcpListener;

    fn local(sport: Sport) -> Arc<InProcessAgent> {
        Arc::new(InProcessAgent::new(CouncilAggregator::standard(
            sport,
            Arc::new(WeightBook::new()),
            CouncilConfig::default(),
        )))
    }

    fn query() -> UserQuery {
        UserQuery::new("user-3", "Home offense is rolling").with_sport(Sport::Basketball)
    }

    fn deadline() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    async fn closed_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        endpoint
    }

    fn agent(registry: &Arc<AgentRegistry>, local: Option<Arc<InProcessAgent>>) -> SportAgent {
        SportAgent::new(
            Sport::Basketball,
            Arc::clone(registry),
            local,
            Arc::new(RemoteInvoker::new()),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn test_unregistered_sport_is_unsupported() {
        let registry = Arc::new(AgentRegistry::new());
        let err = agent(&registry, None).predict(&query(), deadline()).await.unwrap_err();
        assert_eq!(
            err,
            PredictionError::SportUnsupported {
                sport: Sport::Basketball
            }
        );
    }

    #[tokio::test]
    async fn test_local_council_preferred() {
        let registry = Arc::new(AgentRegistry::new());
        let local = local(Sport::Basketball);
        registry.register(AgentInfo::remote("basketball-r1", Sport::Basketball, closed_endpoint().await));
        registry.register(local.info());

        let prediction = agent(&registry, Some(local))
            .predict(&query(), deadline())
            .await
            .unwrap();
        assert_eq!(prediction.sport, Sport::Basketball);
        // Remote never contacted, so its health is untouched
        assert_eq!(registry.resolve(Sport::Basketball)[1].health, Health::Reachable);
    }

    #[tokio::test]
    async fn test_unreachable_remote_falls_back_to_local() {
        let registry = Arc::new(AgentRegistry::new());
        let local = local(Sport::Basketball);
        registry.register(local.info());
        registry.register(AgentInfo::remote("basketball-r1", Sport::Basketball, closed_endpoint().await));
        // Local is registered but currently considered unhealthy, so remote goes first
        registry.mark_unhealthy(&local_instance_id(Sport::Basketball));

        let prediction = agent(&registry, Some(local))
            .predict(&query(), deadline())
            .await
            .unwrap();
        assert_eq!(prediction.sport, Sport::Basketball);

        let remote = registry
            .resolve(Sport::Basketball)
            .into_iter()
            .find(|a| a.instance_id == "basketball-r1")
            .unwrap();
        assert_eq!(remote.health, Health::Unreachable);
    }

    #[tokio::test]
    async fn test_remote_failure_without_local_propagates() {
        let registry = Arc::new(AgentRegistry::new());
        registry.register(AgentInfo::remote("basketball-r1", Sport::Basketball, closed_endpoint().await));

        let err = agent(&registry, None).predict(&query(), deadline()).await.unwrap_err();
        assert!(matches!(err, PredictionError::Unreachable { ref instance_id, .. } if instance_id == "basketball-r1"));
        assert!(!registry.resolve(Sport::Basketball)[0].is_healthy());
    }

    #[tokio::test]
    async fn test_expired_budget_times_out_remote() {
        let registry = Arc::new(AgentRegistry::new());
        registry.register(AgentInfo::remote("basketball-r1", Sport::Basketball, "http://127.0.0.1:9"));

        let err = agent(&registry, None)
            .predict(&query(), Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PredictionError::Timeout { .. }));
    }
}
