// Enforcement engine - evaluates a class's rules for one operation instance

use super::{AuditEvent, AuthRule, FailedRule, NotAuthorizedError, PolicyLookup, Verdict};
use crate::actor::Actor;
use crate::operation::Operation;
use serde::{Deserialize, Serialize};
use std::cell::Cell;

/// Result of the most recent `enforce()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GateState {
    #[default]
    Unchecked,
    Passed,
    Failed,
}

/// Per-instance authorization gate.
///
/// Every `enforce()` re-evaluates the rules from scratch; the state only
/// records the last verdict. Bypass is a side channel that makes `enforce()`
/// pass without looking at any rule.
#[derive(Debug, Default)]
pub struct AuthorizationGate {
    bypassed: bool,
    state: Cell<GateState>,
}

impl AuthorizationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable rule evaluation for this instance
    pub fn skip_auth_checks(&mut self) {
        self.bypassed = true;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypassed
    }

    pub fn state(&self) -> GateState {
        self.state.get()
    }

    /// Evaluate the rules of `op`'s class in declaration order
    pub fn enforce(&self, op: &Operation) -> Result<(), NotAuthorizedError> {
        let class = op.class();
        let actor = op.actor();
        let actor_id = actor.and_then(|a| a.actor_id());

        if self.bypassed {
            log::info!("authorization checks bypassed for {}", class.name());
            self.state.set(GateState::Passed);
            self.audit(op, AuditEvent::new(class.name(), actor_id, Verdict::Bypassed));
            return Ok(());
        }

        for rule in class.auth_rules().iter() {
            if let Err(failed) = Self::evaluate(rule, op, actor, class.policies()) {
                log::warn!("{} denied: {}", class.name(), failed);
                self.state.set(GateState::Failed);
                self.audit(
                    op,
                    AuditEvent::new(class.name(), actor_id, Verdict::Denied)
                        .with_failed_rule(failed.clone()),
                );
                return Err(NotAuthorizedError {
                    operation: class.name().to_string(),
                    rule: failed,
                });
            }
        }

        log::debug!("{} authorized", class.name());
        self.state.set(GateState::Passed);
        self.audit(op, AuditEvent::new(class.name(), actor_id, Verdict::Passed));
        Ok(())
    }

    fn evaluate(
        rule: &AuthRule,
        op: &Operation,
        actor: Option<&dyn Actor>,
        policies: Option<&dyn PolicyLookup>,
    ) -> Result<(), FailedRule> {
        match rule {
            AuthRule::RequireActorPresent => match actor {
                Some(_) => Ok(()),
                None => Err(FailedRule::ActorRequired),
            },
            AuthRule::RequireActorAbsent => match actor {
                Some(_) => Err(FailedRule::ActorForbidden),
                None => Ok(()),
            },
            AuthRule::Custom {
                label,
                predicate,
                guard,
            } => {
                if !guard.allows(op) {
                    log::debug!("custom authorization `{}` skipped by guard", label);
                    return Ok(());
                }
                if predicate(op) {
                    Ok(())
                } else {
                    Err(FailedRule::Custom(label.clone()))
                }
            }
            AuthRule::Policy { name, guard } => {
                if !guard.allows(op) {
                    log::debug!("policy `{}` skipped by guard", name);
                    return Ok(());
                }
                let Some(check) = policies.and_then(|p| p.policy(name)) else {
                    log::error!("policy `{}` could not be resolved", name);
                    return Err(FailedRule::Policy(name.clone()));
                };
                if check(op, actor) {
                    Ok(())
                } else {
                    Err(FailedRule::Policy(name.clone()))
                }
            }
        }
    }

    fn audit(&self, op: &Operation, event: AuditEvent) {
        if let Some(log) = op.class().audit_log() {
            log.log(event);
        }
    }
}
