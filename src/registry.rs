//! Named limiter registry.
//!
//! Maps a limiter name — a route, an action class, an API tier — to a
//! constructed [`Limiter`], so calling code can throttle against a name
//! instead of holding limiter instances itself.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::config::{LimiterConfig, RegistryConfig};
use crate::error::{FloodgateError, Result};
use crate::ratelimit::Limiter;

/// A thread-safe collection of named limiters.
///
/// Registration goes through the limiter factory, so every configuration
/// in the registry has been validated. Admission checks take a read lock
/// only long enough to clone the limiter handle.
pub struct LimiterRegistry<K = String>
where
    K: Eq + Hash,
{
    limiters: RwLock<HashMap<String, Arc<Limiter<K>>>>,
}

impl<K> LimiterRegistry<K>
where
    K: Eq + Hash + fmt::Debug,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            limiters: RwLock::new(HashMap::new()),
        }
    }

    /// Build a registry from a parsed configuration.
    pub fn from_config(config: &RegistryConfig) -> Result<Self> {
        let registry = Self::new();
        for (name, limiter_config) in &config.limiters {
            registry.register(name.clone(), limiter_config.clone())?;
        }
        Ok(registry)
    }

    /// Build a registry from a YAML configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_config(&RegistryConfig::from_file(path)?)
    }

    /// Construct and register a limiter under `name`, replacing any
    /// limiter previously registered there (and discarding its state).
    pub fn register(&self, name: impl Into<String>, config: LimiterConfig) -> Result<()> {
        let name = name.into();
        let kind = config.kind();
        let limiter = Arc::new(Limiter::new(config)?);

        self.limiters.write().insert(name.clone(), limiter);
        info!(name = %name, kind = %kind, "Registered limiter");
        Ok(())
    }

    /// Remove the limiter registered under `name`. Returns whether one
    /// existed.
    pub fn deregister(&self, name: &str) -> bool {
        self.limiters.write().remove(name).is_some()
    }

    /// Look up the limiter registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<Limiter<K>>> {
        self.limiters.read().get(name).cloned()
    }

    /// Decide whether an action for `key` is admitted by the limiter
    /// registered under `name`.
    ///
    /// An unregistered name is an error; the admission decision itself
    /// never fails.
    pub fn allow(&self, name: &str, key: impl Into<K>) -> Result<bool> {
        let limiter = self
            .get(name)
            .ok_or_else(|| FloodgateError::UnknownLimiter(name.to_string()))?;
        Ok(limiter.allow(key))
    }

    /// Names of all registered limiters.
    pub fn names(&self) -> Vec<String> {
        self.limiters.read().keys().cloned().collect()
    }

    /// Number of registered limiters.
    pub fn len(&self) -> usize {
        self.limiters.read().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.limiters.read().is_empty()
    }
}

impl<K> Default for LimiterRegistry<K>
where
    K: Eq + Hash + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}
