// Named authorization policies

use crate::actor::Actor;
use crate::operation::Operation;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A named policy check over the instance and the resolved actor
pub type PolicyFn = Arc<dyn Fn(&Operation, Option<&dyn Actor>) -> bool + Send + Sync>;

/// Resolves policy names to checks
pub trait PolicyLookup: Send + Sync {
    fn policy(&self, name: &str) -> Option<PolicyFn>;
}

/// In-memory set of named policies
#[derive(Clone, Default)]
pub struct PolicySet {
    policies: HashMap<String, PolicyFn>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a policy
    pub fn define<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Operation, Option<&dyn Actor>) -> bool + Send + Sync + 'static,
    {
        self.insert(name, check);
        self
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, check: F)
    where
        F: Fn(&Operation, Option<&dyn Actor>) -> bool + Send + Sync + 'static,
    {
        self.policies.insert(name.into(), Arc::new(check));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    /// List all policy names
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl PolicyLookup for PolicySet {
    fn policy(&self, name: &str) -> Option<PolicyFn> {
        self.policies.get(name).cloned()
    }
}

impl fmt::Debug for PolicySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicySet")
            .field("names", &self.names())
            .finish()
    }
}
