//! Live configuration lookup.
//!
//! The host owns its configuration objects; this crate only looks one up by
//! name once per tick and holds the handle for that tick. Any closure
//! `Fn(&str) -> Option<LiveConfig>` is a registry, which is usually all a host
//! adapter needs.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::LookupError;
use crate::tree::LiveConfig;

/// Name → live configuration lookup.
pub trait ConfigRegistry: Send + Sync {
    /// Returns the live configuration registered under `name`.
    fn lookup(&self, name: &str) -> Option<LiveConfig>;
}

impl<F> ConfigRegistry for F
where
    F: Fn(&str) -> Option<LiveConfig> + Send + Sync,
{
    fn lookup(&self, name: &str) -> Option<LiveConfig> {
        self(name)
    }
}

/// Which registry names to try, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetNames {
    /// Tried first.
    pub primary: String,
    /// Tried only if the primary is absent.
    pub fallback: Option<String>,
}

impl TargetNames {
    /// Primary name with a fallback.
    #[must_use]
    pub fn new(primary: impl Into<String>, fallback: Option<String>) -> Self {
        Self {
            primary: primary.into(),
            fallback,
        }
    }

    /// Looks up the primary name, then the fallback.
    ///
    /// # Errors
    ///
    /// Returns `LookupError::ConfigNotFound` if neither name is registered.
    pub fn resolve<R>(&self, registry: &R) -> Result<LiveConfig, LookupError>
    where
        R: ConfigRegistry + ?Sized,
    {
        if let Some(live) = registry.lookup(&self.primary) {
            return Ok(live);
        }
        if let Some(fallback) = &self.fallback {
            if let Some(live) = registry.lookup(fallback) {
                return Ok(live);
            }
        }
        Err(LookupError::ConfigNotFound {
            primary: self.primary.clone(),
            fallback: self.fallback.clone().unwrap_or_else(|| "none".to_string()),
        })
    }
}

fn lock_poisoned() -> Option<LiveConfig> {
    tracing::error!("poisoned lock: registry");
    None
}

/// Thread-safe in-memory registry.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    objects: RwLock<HashMap<String, LiveConfig>>,
}

impl InMemoryRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `live` under `name`, returning any handle it replaced.
    pub fn register(&self, name: impl Into<String>, live: LiveConfig) -> Option<LiveConfig> {
        match self.objects.write() {
            Ok(mut guard) => guard.insert(name.into(), live),
            Err(_) => lock_poisoned(),
        }
    }

    /// Removes the handle registered under `name`.
    pub fn unregister(&self, name: &str) -> Option<LiveConfig> {
        match self.objects.write() {
            Ok(mut guard) => guard.remove(name),
            Err(_) => lock_poisoned(),
        }
    }
}

impl ConfigRegistry for InMemoryRegistry {
    fn lookup(&self, name: &str) -> Option<LiveConfig> {
        match self.objects.read() {
            Ok(guard) => guard.get(name).cloned(),
            Err(_) => lock_poisoned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::tree::ConfigTree;

    fn names() -> TargetNames {
        TargetNames::new("region0", Some("defaultRegion".to_string()))
    }

    #[test]
    fn test_primary_wins() {
        let registry = InMemoryRegistry::new();
        let primary = ConfigTree::new().into_live();
        let fallback = ConfigTree::new().into_live();
        registry.register("region0", Arc::clone(&primary));
        registry.register("defaultRegion", Arc::clone(&fallback));

        let got = names().resolve(&registry).unwrap();
        assert!(Arc::ptr_eq(&got, &primary));
    }

    #[test]
    fn test_fallback_used_when_primary_absent() {
        let registry = InMemoryRegistry::new();
        let fallback = ConfigTree::new().into_live();
        registry.register("defaultRegion", Arc::clone(&fallback));

        let got = names().resolve(&registry).unwrap();
        assert!(Arc::ptr_eq(&got, &fallback));
    }

    #[test]
    fn test_neither_found() {
        let registry = InMemoryRegistry::new();
        let err = names().resolve(&registry).unwrap_err();
        assert_eq!(
            err,
            LookupError::ConfigNotFound {
                primary: "region0".to_string(),
                fallback: "defaultRegion".to_string(),
            }
        );
    }

    #[test]
    fn test_no_fallback_configured() {
        let registry = InMemoryRegistry::new();
        registry.register("defaultRegion", ConfigTree::new().into_live());
        let err = TargetNames::new("region0", None).resolve(&registry).unwrap_err();
        assert!(format!("{err}").contains("fallback: none"));
    }

    #[test]
    fn test_closure_registry() {
        let live = ConfigTree::new().into_live();
        let captured = Arc::clone(&live);
        let registry = move |name: &str| (name == "fluid").then(|| Arc::clone(&captured));

        let got = TargetNames::new("fluid", None).resolve(&registry).unwrap();
        assert!(Arc::ptr_eq(&got, &live));
        assert!(registry.lookup("solid").is_none());
    }

    #[test]
    fn test_unregister() {
        let registry = InMemoryRegistry::new();
        registry.register("region0", ConfigTree::new().into_live());
        assert!(registry.unregister("region0").is_some());
        assert!(registry.lookup("region0").is_none());
    }
}
