//! Subroutine - typed fields and declarative authorization for operation objects
//!
//! An operation is a single-purpose command object. This crate provides the
//! two building blocks such objects share: a field engine (typed declarations
//! with defaults, inheritance and per-instance coercion) and an authorization
//! engine (actor presence rules, custom predicates and named policies with
//! `if`/`unless` guards, enforced through a per-instance gate).

pub mod actor;
pub mod coercion;
pub mod enforcement;
pub mod error;
pub mod fields;
pub mod operation;
pub mod value;

// Re-export main types
pub use actor::{
    Actor, ActorConfig, ActorId, ActorLookup, ActorRef, ActorResolver, ActorTypeError,
    AsyncActorLookup, BlockingLookup,
};
pub use coercion::{CoercerRegistry, CoercionError, TypeTag};
pub use enforcement::{
    AuditEvent, AuditLog, AuthRule, AuthRules, AuthorizationGate, FailedRule, GateState, Guard,
    NotAuthorizedError, PolicyLookup, PolicySet, Verdict,
};
pub use error::{DeclarationError, OpError, OpResult};
pub use fields::{DefaultValue, FieldDeclaration, FieldOptions, FieldSchema, FieldStore};
pub use operation::{
    ActorRequirement, AuthorizationConfig, Operation, OperationClass, OperationClassBuilder,
    OperationConfig,
};
pub use value::{FieldValue, Params};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = "subroutine";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.5.1");
    }
}
