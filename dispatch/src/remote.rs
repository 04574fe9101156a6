//! Remote invoker - calls a sport agent running in another process
//!
//! One HTTP `POST {endpoint}/v1/sports/{sport}/predict` per invocation, bounded by
//! the caller's timeout. No retries happen here; the sport agent owns fallback.

use common::{AgentInfo, PredictionError, Sport, SportPrediction, UserQuery};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Request body sent to a remote sport agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePredictRequest {
    pub sport: Sport,
    pub query_text: String,
    pub user_id: String,
    pub preferences: BTreeMap<String, String>,
}

impl RemotePredictRequest {
    pub fn new(sport: Sport, query: &UserQuery) -> Self {
        Self {
            sport,
            query_text: query.query_text.clone(),
            user_id: query.user_id.clone(),
            preferences: query.preferences.clone(),
        }
    }
}

/// HTTP client for remote sport agents
pub struct RemoteInvoker {
    client: Client,
}

impl RemoteInvoker {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Invoke a remote instance for one sport, failing with `Unreachable`,
    /// `Timeout` or `InvalidResponse`
    pub async fn invoke(
        &self,
        agent: &AgentInfo,
        query: &UserQuery,
        timeout: Duration,
    ) -> Result<SportPrediction, PredictionError> {
        let sport = agent.sport;
        let instance_id = agent.instance_id.clone();

        let endpoint = agent
            .endpoint
            .as_deref()
            .ok_or_else(|| PredictionError::Unreachable {
                sport,
                instance_id: instance_id.clone(),
                reason: "no endpoint configured".to_string(),
            })?;

        if timeout.is_zero() {
            return Err(PredictionError::Timeout {
                sport,
                instance_id: Some(instance_id),
            });
        }

        let url = predict_url(endpoint, sport);
        let body = RemotePredictRequest::new(sport, query);

        debug!(
            instance_id = %instance_id,
            sport = %sport,
            url = %url,
            timeout_ms = timeout.as_millis() as u64,
            "Invoking remote sport agent"
        );

        let call = async {
            let response = self.client.post(&url).json(&body).send().await?;
            let status = response.status();
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, bytes))
        };

        let (status, bytes) = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(classify_transport_error(sport, instance_id, e)),
            Err(_) => {
                warn!(instance_id = %instance_id, sport = %sport, "Remote sport agent timed out");
                return Err(PredictionError::Timeout {
                    sport,
                    instance_id: Some(instance_id),
                });
            }
        };

        if !status.is_success() {
            return Err(PredictionError::InvalidResponse {
                sport,
                instance_id,
                reason: format!("HTTP status {}", status),
            });
        }

        let prediction: SportPrediction =
            serde_json::from_slice(&bytes).map_err(|e| PredictionError::InvalidResponse {
                sport,
                instance_id: instance_id.clone(),
                reason: format!("malformed body: {}", e),
            })?;

        prediction
            .validate(sport)
            .map_err(|reason| PredictionError::InvalidResponse {
                sport,
                instance_id: instance_id.clone(),
                reason,
            })?;

        debug!(
            instance_id = %instance_id,
            sport = %sport,
            confidence = prediction.confidence,
            "Remote sport agent answered"
        );

        Ok(prediction)
    }
}

impl Default for RemoteInvoker {
    fn default() -> Self {
        Self::new()
    }
}

fn predict_url(endpoint: &str, sport: Sport) -> String {
    format!(
        "{}/v1/sports/{}/predict",
        endpoint.trim_end_matches('/'),
        sport.as_str()
    )
}

fn classify_transport_error(sport: Sport, instance_id: String, e: reqwest::Error) -> PredictionError {
    if e.is_timeout() {
        PredictionError::Timeout {
            sport,
            instance_id: Some(instance_id),
        }
    } else if e.is_decode() || e.is_body() {
        PredictionError::InvalidResponse {
            sport,
            instance_id,
            reason: e.to_string(),
        }
    } else {
        // Connect, DNS and request errors all mean the instance could not be reached
        warn!(instance_id = %instance_id, sport = %sport, error = %e, "Remote sport agent unreachable");
        PredictionError::Unreachable {
            sport,
            instance_id,
            reason: e.to_string(),
        }
    }
}
