// SPDX-License-Identifier: MIT

use crate::sdk::error::RegistryError;
use crate::sdk::resolver::StepResolver;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Maps step-type keys to their resolvers.
///
/// Built once at startup and read-mostly afterwards. Clones share the same
/// table. Lookups hold the read lock only long enough to clone the `Arc`, so
/// a completed registration never blocks later lookups.
#[derive(Clone)]
pub struct StepResolverRegistry {
    resolvers: Arc<RwLock<HashMap<String, Arc<dyn StepResolver>>>>,
}

impl StepResolverRegistry {
    pub fn new() -> Self {
        Self {
            resolvers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Bind `step_type` to `resolver`; re-registering a key replaces the old binding
    pub async fn register(&self, step_type: impl Into<String>, resolver: Arc<dyn StepResolver>) {
        let step_type = step_type.into();
        let mut resolvers = self.resolvers.write().await;
        if resolvers.insert(step_type.clone(), resolver).is_some() {
            log::debug!("Replaced resolver for step type: {}", step_type);
        } else {
            log::debug!("Registered resolver for step type: {}", step_type);
        }
    }

    /// Fetch the resolver for `step_type`, failing with `UnknownStepType` on a miss
    pub async fn resolver(&self, step_type: &str) -> Result<Arc<dyn StepResolver>, RegistryError> {
        let resolvers = self.resolvers.read().await;
        resolvers
            .get(step_type)
            .cloned()
            .ok_or_else(|| RegistryError::unknown(step_type))
    }

    pub async fn contains(&self, step_type: &str) -> bool {
        self.resolvers.read().await.contains_key(step_type)
    }

    /// Registered keys, sorted
    pub async fn step_types(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.resolvers.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl Default for StepResolverRegistry {
    fn default() -> Self {
        Self::new()
    }
}
