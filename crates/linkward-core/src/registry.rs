use std::sync::Arc;

use dashmap::DashMap;
use linkward_switch::Switch;

use crate::error::CoreError;
use crate::session::SwitchSession;

/// Configured switches, by registry name.
#[derive(Clone, Default)]
pub struct SwitchRegistry {
    switches: Arc<DashMap<String, Arc<dyn Switch>>>,
}

impl SwitchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `switch` under its own name, replacing any previous entry.
    pub fn insert(&self, switch: Arc<dyn Switch>) {
        self.switches.insert(switch.name().to_owned(), switch);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Switch>, CoreError> {
        self.switches
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| CoreError::not_found("switch", name))
    }

    pub fn remove(&self, name: &str) -> Option<Arc<dyn Switch>> {
        self.switches.remove(name).map(|(_, switch)| switch)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.switches.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.switches.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Open a session on the switch called `name`.
    pub async fn open(&self, name: &str) -> Result<SwitchSession, CoreError> {
        let switch = self.get(name)?;
        SwitchSession::open(switch.as_ref()).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use linkward_switch::MockSwitch;

    use super::*;

    #[tokio::test]
    async fn unknown_switch_is_not_found() {
        let registry = SwitchRegistry::new();
        registry.insert(Arc::new(MockSwitch::new("sw0")));
        assert!(registry.contains("sw0"));
        assert!(registry.open("sw0").await.is_ok());
        assert!(matches!(
            registry.open("sw9").await,
            Err(CoreError::NotFound { .. })
        ));
        assert_eq!(registry.names(), vec!["sw0".to_owned()]);
        assert!(registry.remove("sw0").is_some());
        assert!(registry.names().is_empty());
    }
}
