// Audit logging for authorization verdicts

use super::FailedRule;
use crate::actor::ActorId;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

/// Outcome of one `enforce()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Passed,
    Denied,
    Bypassed,
}

/// Audit event representing one authorization decision
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp: SystemTime,
    pub operation: String,
    pub actor: Option<ActorId>,
    pub verdict: Verdict,
    pub failed_rule: Option<FailedRule>,
}

impl AuditEvent {
    pub fn new(operation: impl Into<String>, actor: Option<ActorId>, verdict: Verdict) -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: operation.into(),
            actor,
            verdict,
            failed_rule: None,
        }
    }

    pub fn with_failed_rule(mut self, rule: FailedRule) -> Self {
        self.failed_rule = Some(rule);
        self
    }
}

/// Bounded in-memory audit log, shared by cloning
pub struct AuditLog {
    events: Arc<RwLock<Vec<AuditEvent>>>,
    max_events: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    pub fn with_capacity(max_events: usize) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            max_events,
        }
    }

    /// Record an event, dropping the oldest ones beyond capacity
    pub fn log(&self, event: AuditEvent) {
        let mut events = self.events.write().unwrap_or_else(PoisonError::into_inner);
        events.push(event);

        if events.len() > self.max_events {
            let drain_count = events.len() - self.max_events;
            events.drain(0..drain_count);
        }
    }

    fn filtered(&self, keep: impl Fn(&AuditEvent) -> bool) -> Vec<AuditEvent> {
        self.events
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| keep(e))
            .cloned()
            .collect()
    }

    pub fn get_events(&self) -> Vec<AuditEvent> {
        self.filtered(|_| true)
    }

    pub fn get_operation_events(&self, operation: &str) -> Vec<AuditEvent> {
        self.filtered(|e| e.operation == operation)
    }

    pub fn get_denied_events(&self) -> Vec<AuditEvent> {
        self.filtered(|e| e.verdict == Verdict::Denied)
    }

    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn count(&self) -> usize {
        self.events.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for AuditLog {
    fn clone(&self) -> Self {
        Self {
            events: Arc::clone(&self.events),
            max_events: self.max_events,
        }
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("count", &self.count())
            .field("max_events", &self.max_events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_bounded_and_shared() {
        let log = AuditLog::with_capacity(2);
        let shared = log.clone();

        log.log(AuditEvent::new("A", None, Verdict::Passed));
        log.log(
            AuditEvent::new("B", Some(ActorId(1)), Verdict::Denied)
                .with_failed_rule(FailedRule::ActorForbidden),
        );
        log.log(AuditEvent::new("C", None, Verdict::Bypassed));

        assert_eq!(shared.count(), 2);
        assert!(shared.get_operation_events("A").is_empty());

        let denied = shared.get_denied_events();
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].failed_rule, Some(FailedRule::ActorForbidden));

        shared.clear();
        assert_eq!(log.count(), 0);
    }
}
