//! Registry of emitted type declarations.
//!
//! A declaration name is claimed by the first section planned for it; later
//! claims for the same name are skipped. The registry is shared by reference
//! and safe to claim from concurrent workers.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

/// Lifetime of a registry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum RegistryScope {
    /// A fresh registry per service; every artifact is self-contained
    #[default]
    PerService,
    /// One registry for the whole run; a name is declared by the first
    /// service (in schema order) that needs it
    PerRun,
}

impl RegistryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerService => "per-service",
            Self::PerRun => "per-run",
        }
    }
}

impl FromStr for RegistryScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "per-service" | "service" => Ok(Self::PerService),
            "per-run" | "run" => Ok(Self::PerRun),
            _ => Err(format!("Unknown registry scope: {s}")),
        }
    }
}

impl fmt::Display for RegistryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Default)]
pub struct DeduplicationRegistry {
    claimed: Mutex<HashSet<String>>,
}

impl DeduplicationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // the set stays consistent even if a claimant panicked
        self.claimed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `name`. Returns true if the caller is the first claimant and
    /// should emit the declaration.
    pub fn claim_or_skip(&self, name: &str) -> bool {
        let claimed = self.lock().insert(name.to_string());
        if !claimed {
            log::debug!("Skipping duplicate declaration '{name}'");
        }
        claimed
    }

    /// Give back claims made by a service whose plan failed.
    pub fn release<'n>(&self, names: impl IntoIterator<Item = &'n str>) {
        let mut claimed = self.lock();
        for name in names {
            claimed.remove(name);
        }
    }

    pub fn is_claimed(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_first_claim_wins() {
        let registry = DeduplicationRegistry::new();
        assert!(registry.claim_or_skip("PetResponseBody"));
        assert!(!registry.claim_or_skip("PetResponseBody"));
        assert!(registry.claim_or_skip("OwnerResponseBody"));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_release_reopens_names() {
        let registry = DeduplicationRegistry::new();
        assert!(registry.claim_or_skip("A"));
        registry.release(["A"]);
        assert!(!registry.is_claimed("A"));
        assert!(registry.claim_or_skip("A"));
    }

    #[test]
    fn test_concurrent_claims_grant_each_name_once() {
        let registry = Arc::new(DeduplicationRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..100)
                        .filter(|i| registry.claim_or_skip(&format!("Type{i}")))
                        .count()
                })
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().expect("worker")).sum();
        assert_eq!(granted, 100);
        assert_eq!(registry.len(), 100);
    }

    #[test]
    fn test_scope_from_str() {
        assert_eq!("per-run".parse::<RegistryScope>(), Ok(RegistryScope::PerRun));
        assert_eq!("SERVICE".parse::<RegistryScope>(), Ok(RegistryScope::PerService));
        assert!("global".parse::<RegistryScope>().is_err());
        assert_eq!(RegistryScope::default().to_string(), "per-service");
    }
}
