//! Registry of known chains, built once from configuration and passed explicitly

use super::ChainId;
use crate::config::ChainConfig;

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// A chain known to the tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainInfo {
    pub chain_id: ChainId,
    pub name: String,
}

/// Immutable id <-> name lookup for configured chains
#[derive(Debug, Clone, Default)]
pub struct ChainRegistry {
    chains: BTreeMap<ChainId, ChainInfo>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the enabled chain configurations
    pub fn from_configs<'a>(configs: impl IntoIterator<Item = &'a ChainConfig>) -> Self {
        let mut registry = Self::new();
        for config in configs.into_iter().filter(|c| c.enabled) {
            registry = registry.with_chain(ChainId(config.chain_id), &config.name);
        }
        registry
    }

    /// Add a chain, replacing any previous entry with the same id
    pub fn with_chain(mut self, chain_id: ChainId, name: &str) -> Self {
        debug!("Registering chain {} as {}", chain_id, name);
        self.chains.insert(
            chain_id,
            ChainInfo {
                chain_id,
                name: name.to_string(),
            },
        );
        self
    }

    pub fn get(&self, chain_id: ChainId) -> Option<&ChainInfo> {
        self.chains.get(&chain_id)
    }

    /// Look up a chain by name, ignoring case
    pub fn by_name(&self, name: &str) -> Option<&ChainInfo> {
        self.chains
            .values()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Resolve a user-supplied key that is either a numeric id or a name
    pub fn resolve(&self, key: &str) -> Option<&ChainInfo> {
        let key = key.trim();
        match key.parse::<u64>() {
            Ok(id) => self.get(ChainId(id)),
            Err(_) => self.by_name(key),
        }
    }

    pub fn name_of(&self, chain_id: ChainId) -> Option<&str> {
        self.get(chain_id).map(|c| c.name.as_str())
    }

    pub fn chains(&self) -> impl Iterator<Item = &ChainInfo> {
        self.chains.values()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(chain_id: u64, name: &str, enabled: bool) -> ChainConfig {
        ChainConfig {
            chain_id,
            name: name.to_string(),
            enabled,
        }
    }

    #[test]
    fn test_from_configs_skips_disabled() {
        let configs = vec![
            chain(6, "avalanche", true),
            chain(14, "celo", true),
            chain(2, "ethereum", false),
        ];
        let registry = ChainRegistry::from_configs(&configs);

        assert_eq!(registry.len(), 2);
        assert!(!registry.is_empty());
        assert!(ChainRegistry::from_configs(&configs[2..]).is_empty());
        assert!(registry.get(ChainId(2)).is_none());
        assert_eq!(registry.name_of(ChainId(14)), Some("celo"));
    }

    #[test]
    fn test_resolve_by_id_or_name() {
        let registry = ChainRegistry::new()
            .with_chain(ChainId(6), "avalanche")
            .with_chain(ChainId(14), "celo");

        assert_eq!(registry.resolve("6").map(|c| c.chain_id), Some(ChainId(6)));
        assert_eq!(
            registry.resolve("Celo").map(|c| c.chain_id),
            Some(ChainId(14))
        );
        assert!(registry.resolve("42").is_none());
        assert!(registry.resolve("solana").is_none());
    }
}
