//! Agent registry - catalog of sport agent instances and their health
//!
//! Resolution order for a sport:
//! - reachable instances before unreachable ones
//! - within a health class, local before remote
//! - otherwise registration order

use common::{AgentInfo, Health, Sport};
use dashmap::DashMap;
use tracing::{debug, info, warn};

/// Thread-safe catalog of sport agent instances
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: DashMap<Sport, Vec<AgentInfo>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance; re-registering an id replaces the previous entry
    pub fn register(&self, agent: AgentInfo) {
        self.remove(&agent.instance_id);

        info!(
            instance_id = %agent.instance_id,
            sport = %agent.sport,
            locality = ?agent.locality,
            endpoint = agent.endpoint.as_deref().unwrap_or("-"),
            "Registered sport agent"
        );
        self.agents.entry(agent.sport).or_default().push(agent);
    }

    /// Remove an instance; returns the removed entry if it was registered
    pub fn deregister(&self, instance_id: &str) -> Option<AgentInfo> {
        let removed = self.remove(instance_id);
        if let Some(agent) = &removed {
            info!(instance_id = %instance_id, sport = %agent.sport, "Deregistered sport agent");
        }
        removed
    }

    fn remove(&self, instance_id: &str) -> Option<AgentInfo> {
        for mut entry in self.agents.iter_mut() {
            if let Some(pos) = entry.iter().position(|a| a.instance_id == instance_id) {
                return Some(entry.remove(pos));
            }
        }
        None
    }

    /// Candidate instances for a sport, best first. Empty means unsupported.
    pub fn resolve(&self, sport: Sport) -> Vec<AgentInfo> {
        let mut candidates = self
            .agents
            .get(&sport)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();

        // Stable sort keeps registration order inside each class
        candidates.sort_by_key(|a| (!a.is_healthy(), !a.is_local()));

        debug!(sport = %sport, candidates = candidates.len(), "Resolved sport agents");
        candidates
    }

    /// Downgrade an instance so later resolutions prefer alternates
    pub fn mark_unhealthy(&self, instance_id: &str) -> bool {
        let updated = self.set_health(instance_id, Health::Unreachable);
        if updated {
            warn!(instance_id = %instance_id, "Sport agent marked unhealthy");
        }
        updated
    }

    /// Restore an instance after it has been seen reachable again
    pub fn mark_healthy(&self, instance_id: &str) -> bool {
        let updated = self.set_health(instance_id, Health::Reachable);
        if updated {
            info!(instance_id = %instance_id, "Sport agent marked healthy");
        }
        updated
    }

    fn set_health(&self, instance_id: &str, health: Health) -> bool {
        for mut entry in self.agents.iter_mut() {
            if let Some(agent) = entry.iter_mut().find(|a| a.instance_id == instance_id) {
                let changed = agent.health != health;
                agent.health = health;
                return changed;
            }
        }
        false
    }

    /// Sports with at least one registered instance
    pub fn sports(&self) -> Vec<Sport> {
        let mut sports: Vec<Sport> = self
            .agents
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| *entry.key())
            .collect();
        sports.sort();
        sports
    }

    pub fn len(&self) -> usize {
        self.agents.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(agents: &[AgentInfo]) -> Vec<&str> {
        agents.iter().map(|a| a.instance_id.as_str()).collect()
    }

    #[test]
    fn test_unknown_sport_resolves_empty() {
        let registry = AgentRegistry::new();
        registry.register(AgentInfo::local("basketball-local", Sport::Basketball));
        assert!(registry.resolve(Sport::Baseball).is_empty());
    }

    #[test]
    fn test_resolution_order() {
        let registry = AgentRegistry::new();
        registry.register(AgentInfo::remote("hockey-r1", Sport::Hockey, "http://r1"));
        registry.register(AgentInfo::remote("hockey-r2", Sport::Hockey, "http://r2"));
        registry.register(AgentInfo::local("hockey-local", Sport::Hockey));

        let resolved = registry.resolve(Sport::Hockey);
        assert_eq!(ids(&resolved), vec!["hockey-local", "hockey-r1", "hockey-r2"]);
    }

    #[test]
    fn test_unhealthy_instances_sink() {
        let registry = AgentRegistry::new();
        registry.register(AgentInfo::local("hockey-local", Sport::Hockey));
        registry.register(AgentInfo::remote("hockey-r1", Sport::Hockey, "http://r1"));
        registry.register(AgentInfo::remote("hockey-r2", Sport::Hockey, "http://r2"));

        assert!(registry.mark_unhealthy("hockey-local"));
        assert!(registry.mark_unhealthy("hockey-r1"));
        // Already unhealthy
        assert!(!registry.mark_unhealthy("hockey-r1"));

        let resolved = registry.resolve(Sport::Hockey);
        assert_eq!(ids(&resolved), vec!["hockey-r2", "hockey-local", "hockey-r1"]);

        assert!(registry.mark_healthy("hockey-r1"));
        let resolved = registry.resolve(Sport::Hockey);
        assert_eq!(ids(&resolved), vec!["hockey-r1", "hockey-r2", "hockey-local"]);
    }

    #[test]
    fn test_register_replaces_and_deregister_removes() {
        let registry = AgentRegistry::new();
        registry.register(AgentInfo::remote("soccer-1", Sport::Soccer, "http://old"));
        registry.register(AgentInfo::remote("soccer-1", Sport::Soccer, "http://new"));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.resolve(Sport::Soccer)[0].endpoint.as_deref(),
            Some("http://new")
        );

        assert!(registry.deregister("soccer-1").is_some());
        assert!(registry.deregister("soccer-1").is_none());
        assert!(registry.is_empty());
        assert!(registry.sports().is_empty());
    }

    #[test]
    fn test_sports_listing() {
        let registry = AgentRegistry::new();
        registry.register(AgentInfo::local("soccer-local", Sport::Soccer));
        registry.register(AgentInfo::local("basketball-local", Sport::Basketball));
        assert_eq!(registry.sports(), vec![Sport::Basketball, Sport::Soccer]);
        assert!(!registry.mark_unhealthy("nobody"));
    }
}
