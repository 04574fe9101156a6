//! Oracle configuration
//!
//! Loaded from an optional TOML file, then overridden by `ORACLE__*` environment
//! variables (e.g. `ORACLE__DISPATCH__MAX_REQUEST_LATENCY_MS=2500`).

use anyhow::{bail, Context, Result};
use common::{AgentInfo, Sport};
use config::{Config, Environment, File};
use council::CouncilConfig;
use monitoring::TrackerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Deadlines and local hosting
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Council aggregation and specialist tuning
    #[serde(default)]
    pub council: CouncilConfig,

    /// Outcome feedback
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Remote sport agent catalog
    #[serde(default)]
    pub agents: Vec<AgentSpec>,
}

/// Head dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Deadline shared by every sport of one request (ms)
    #[serde(default = "default_max_request_latency_ms")]
    pub max_request_latency_ms: u64,

    /// Upper bound for a single remote call (ms)
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,

    /// Sports whose council runs in this process
    #[serde(default = "default_local_sports")]
    pub local_sports: Vec<Sport>,
}

impl DispatchConfig {
    pub fn max_request_latency(&self) -> Duration {
        Duration::from_millis(self.max_request_latency_ms)
    }

    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_request_latency_ms: default_max_request_latency_ms(),
            remote_timeout_ms: default_remote_timeout_ms(),
            local_sports: default_local_sports(),
        }
    }
}

fn default_max_request_latency_ms() -> u64 {
    5_000
}

fn default_remote_timeout_ms() -> u64 {
    3_000
}

fn default_local_sports() -> Vec<Sport> {
    Sport::ALL.to_vec()
}

/// One remote sport agent instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub instance_id: String,
    pub sport: Sport,
    /// Base URL, e.g. `http://hockey-agent:8080`
    pub endpoint: String,
}

impl AgentSpec {
    pub fn to_info(&self) -> AgentInfo {
        AgentInfo::remote(self.instance_id.clone(), self.sport, self.endpoint.clone())
    }
}

impl OracleConfig {
    /// Reject settings the runtime cannot honor
    pub fn validate(&self) -> Result<()> {
        if self.dispatch.max_request_latency_ms == 0 {
            bail!("dispatch.max_request_latency_ms must be positive");
        }
        if self.dispatch.remote_timeout_ms == 0 {
            bail!("dispatch.remote_timeout_ms must be positive");
        }

        let rate = self.tracker.learning_rate;
        if !(rate > 0.0 && rate < 1.0) {
            bail!("tracker.learning_rate must be in (0, 1), got {}", rate);
        }
        let floor = self.tracker.min_weight;
        if !(0.0..1.0 / common::COUNCIL_SIZE as f64).contains(&floor) {
            bail!(
                "tracker.min_weight must be in [0, {}), got {}",
                1.0 / common::COUNCIL_SIZE as f64,
                floor
            );
        }

        if self.council.reasoning_members == 0 {
            bail!("council.reasoning_members must be at least 1");
        }

        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.endpoint.trim().is_empty() {
                bail!("agent {} has an empty endpoint", agent.instance_id);
            }
            if !seen.insert(agent.instance_id.as_str()) {
                bail!("agent id {} is listed twice", agent.instance_id);
            }
        }

        Ok(())
    }
}

/// Load configuration from an optional TOML file plus `ORACLE__*` environment overrides
pub fn load_config(path: Option<&Path>) -> Result<OracleConfig> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("ORACLE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let config: OracleConfig = builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Failed to parse configuration")?;

    config.validate()?;
    Ok(config)
}

/// Save configuration to TOML file
pub fn save_config(config: &OracleConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Create a default configuration file template
pub fn create_config_template(path: &Path) -> Result<()> {
    let template = "# Sports Oracle Configuration

[dispatch]
# Deadline shared by every sport of one request (ms)
max_request_latency_ms = 5000

# Upper bound for a single remote agent call (ms)
remote_timeout_ms = 3000

# Sports whose council runs in this process
local_sports = [\"basketball\", \"hockey\", \"football\", \"baseball\", \"soccer\"]

[council]
# Number of heaviest members quoted in the reasoning
reasoning_members = 3

# Starting weights per sport, in seat order:
# offense, defense, situational, momentum, variance
[council.default_weights]
hockey = [0.15, 0.35, 0.2, 0.15, 0.15]

[council.specialists]
prior_weight = 1.0
cue_weight = 0.35
base_confidence = 0.5
confidence_span = 0.45
volatility_penalty = 0.1

[tracker]
# Fraction of the distance to 1 (or 0) moved per reported outcome
learning_rate = 0.1

# No member weight drops below this before renormalizing
min_weight = 0.01

# Remote sport agents
# [[agents]]
# instance_id = \"hockey-east-1\"
# sport = \"hockey\"
# endpoint = \"http://hockey-agent:8080\"
";

    std::fs::write(path, template)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
