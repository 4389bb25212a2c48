// Authorization rule definitions and the per-class rule registry

use crate::error::DeclarationError;
use crate::operation::Operation;
use std::fmt;
use std::sync::Arc;

/// Predicate over the operation instance, used by guards
pub type GuardFn = Arc<dyn Fn(&Operation) -> bool + Send + Sync>;

/// Body of a custom authorization rule
pub type CustomFn = Arc<dyn Fn(&Operation) -> bool + Send + Sync>;

/// Optional `if` / `unless` conditions. A rule whose guard does not allow it
/// is skipped and counts as satisfied.
#[derive(Clone, Default)]
pub struct Guard {
    if_check: Option<GuardFn>,
    unless_check: Option<GuardFn>,
}

impl Guard {
    /// No conditions; the rule is always evaluated
    pub fn always() -> Self {
        Self::default()
    }

    /// Evaluate the rule only when `check` holds
    pub fn when<F>(check: F) -> Self
    where
        F: Fn(&Operation) -> bool + Send + Sync + 'static,
    {
        Self::always().and_when(check)
    }

    /// Skip the rule when `check` holds
    pub fn unless<F>(check: F) -> Self
    where
        F: Fn(&Operation) -> bool + Send + Sync + 'static,
    {
        Self::always().and_unless(check)
    }

    pub fn and_when<F>(mut self, check: F) -> Self
    where
        F: Fn(&Operation) -> bool + Send + Sync + 'static,
    {
        self.if_check = Some(Arc::new(check));
        self
    }

    pub fn and_unless<F>(mut self, check: F) -> Self
    where
        F: Fn(&Operation) -> bool + Send + Sync + 'static,
    {
        self.unless_check = Some(Arc::new(check));
        self
    }

    /// False when `if` is false or `unless` is true
    pub fn allows(&self, op: &Operation) -> bool {
        if let Some(check) = &self.if_check {
            if !check(op) {
                return false;
            }
        }
        if let Some(check) = &self.unless_check {
            if check(op) {
                return false;
            }
        }
        true
    }

    pub fn is_unconditional(&self) -> bool {
        self.if_check.is_none() && self.unless_check.is_none()
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard")
            .field("if", &self.if_check.is_some())
            .field("unless", &self.unless_check.is_some())
            .finish()
    }
}

/// One declarative authorization requirement
#[derive(Clone)]
pub enum AuthRule {
    RequireActorPresent,
    RequireActorAbsent,
    Custom {
        label: String,
        predicate: CustomFn,
        guard: Guard,
    },
    /// Resolved by name through the class's policy lookup
    Policy { name: String, guard: Guard },
}

impl fmt::Debug for AuthRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthRule::RequireActorPresent => f.write_str("RequireActorPresent"),
            AuthRule::RequireActorAbsent => f.write_str("RequireActorAbsent"),
            AuthRule::Custom { label, guard, .. } => f
                .debug_struct("Custom")
                .field("label", label)
                .field("guard", guard)
                .finish(),
            AuthRule::Policy { name, guard } => f
                .debug_struct("Policy")
                .field("name", name)
                .field("guard", guard)
                .finish(),
        }
    }
}

/// Ordered authorization rules of one class, inherited and appended
#[derive(Debug, Clone)]
pub struct AuthRules {
    owner: String,
    rules: Vec<AuthRule>,
    declared: bool,
}

impl AuthRules {
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            rules: Vec::new(),
            declared: false,
        }
    }

    /// Start a subclass registry from a snapshot of `parent`
    pub fn inherit(owner: impl Into<String>, parent: &AuthRules) -> Self {
        Self {
            owner: owner.into(),
            rules: parent.rules.clone(),
            declared: parent.declared,
        }
    }

    pub fn push(&mut self, rule: AuthRule) {
        log::debug!("{} declares authorization rule {:?}", self.owner, rule);
        self.rules.push(rule);
        self.declared = true;
    }

    /// Declare that the class places no constraint on the actor
    pub fn declare_no_requirements(&mut self) {
        self.declared = true;
    }

    pub fn is_declared(&self) -> bool {
        self.declared
    }

    pub fn ensure_declared(&self) -> Result<(), DeclarationError> {
        if self.declared {
            Ok(())
        } else {
            Err(DeclarationError::AuthorizationNotDeclared(self.owner.clone()))
        }
    }

    pub fn policy_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().filter_map(|rule| match rule {
            AuthRule::Policy { name, .. } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuthRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
