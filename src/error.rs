// Error types for operation declaration, construction and authorization

use crate::actor::ActorTypeError;
use crate::coercion::{CoercionError, TypeTag};
use crate::enforcement::NotAuthorizedError;
use thiserror::Error;

/// Result type alias for operation APIs
pub type OpResult<T> = Result<T, OpError>;

/// Raised while a class is being declared, never deferred to enforcement
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeclarationError {
    #[error("Unknown type `{type_tag}` for field `{field}` on {owner}")]
    UnknownType {
        owner: String,
        field: String,
        type_tag: TypeTag,
    },

    #[error(
        "Authorization has not been declared on {0}. Use require_actor, require_no_actor, \
         no_actor_requirements, custom_authorization or policy"
    )]
    AuthorizationNotDeclared(String),

    #[error("Policy `{policy}` referenced by {owner} is not defined")]
    UnknownPolicy { owner: String, policy: String },

    #[error("Invalid default for field `{field}`: {reason}")]
    InvalidDefault { field: String, reason: String },
}

/// Main error type surfaced to callers of an operation
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OpError {
    #[error(transparent)]
    Declaration(#[from] DeclarationError),

    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error(transparent)]
    ActorType(#[from] ActorTypeError),

    #[error(transparent)]
    NotAuthorized(#[from] NotAuthorizedError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl OpError {
    pub fn is_not_authorized(&self) -> bool {
        matches!(self, OpError::NotAuthorized(_))
    }
}
