// Enforcement Layer - Declarative authorization for operations
//
// Classes declare an ordered list of authorization rules; each operation
// instance carries a gate that evaluates those rules against the resolved
// current actor, short-circuiting on the first unmet requirement.

pub mod audit;
pub mod engine;
pub mod policy;
pub mod rule;

pub use audit::{AuditEvent, AuditLog, Verdict};
pub use engine::{AuthorizationGate, GateState};
pub use policy::{PolicyFn, PolicyLookup, PolicySet};
pub use rule::{AuthRule, AuthRules, CustomFn, Guard, GuardFn};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The rule that rejected an operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailedRule {
    ActorRequired,
    ActorForbidden,
    Custom(String),
    Policy(String),
}

impl fmt::Display for FailedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailedRule::ActorRequired => write!(f, "an actor is required"),
            FailedRule::ActorForbidden => write!(f, "no actor may be present"),
            FailedRule::Custom(label) => write!(f, "custom authorization `{}` denied", label),
            FailedRule::Policy(name) => write!(f, "policy `{}` denied", name),
        }
    }
}

/// Raised by `enforce()` when a rule is not met
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Not authorized to run {operation}: {rule}")]
pub struct NotAuthorizedError {
    pub operation: String,
    pub rule: FailedRule,
}
