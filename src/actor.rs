// Current-actor resolution
//
// An operation is constructed with a raw actor reference: a full actor, an
// identifier to be looked up, nothing at all, or (from dynamic input) some
// other kind of value. The resolver checks the reference against the
// configured allow-list and turns identifiers into actors through an injected
// lookup.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tokio::runtime::{self, Handle, RuntimeFlavor};

/// Type name reported for identifier references
pub const IDENTIFIER_TYPE: &str = "Integer";

/// Type name reported for absent references
pub const NIL_TYPE: &str = "Nil";

/// Identifier of an actor, resolved through an [`ActorLookup`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(pub i64);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The authenticated entity attempting to run an operation
pub trait Actor: fmt::Debug + Send + Sync {
    fn actor_id(&self) -> Option<ActorId>;

    /// Concrete type name, as listed in [`ActorConfig`]
    fn type_name(&self) -> &str;

    /// Whether this actor counts as `type_name`. Override to accept super-types.
    fn is_kind_of(&self, type_name: &str) -> bool {
        self.type_name() == type_name
    }

    fn as_any(&self) -> &dyn Any;
}

/// Raw actor reference given at construction
#[derive(Debug, Clone, Default)]
pub enum ActorRef {
    #[default]
    Absent,
    Id(ActorId),
    Actor(Arc<dyn Actor>),
    /// A value of some other type, e.g. a string taken from a request
    Other { type_name: String },
}

impl ActorRef {
    pub fn none() -> Self {
        ActorRef::Absent
    }

    pub fn type_name(&self) -> &str {
        match self {
            ActorRef::Absent => NIL_TYPE,
            ActorRef::Id(_) => IDENTIFIER_TYPE,
            ActorRef::Actor(actor) => actor.type_name(),
            ActorRef::Other { type_name } => type_name,
        }
    }
}

impl From<ActorId> for ActorRef {
    fn from(id: ActorId) -> Self {
        ActorRef::Id(id)
    }
}

impl From<i64> for ActorRef {
    fn from(id: i64) -> Self {
        ActorRef::Id(ActorId(id))
    }
}

impl From<i32> for ActorRef {
    fn from(id: i32) -> Self {
        ActorRef::Id(ActorId(id as i64))
    }
}

impl<T: Actor + 'static> From<Arc<T>> for ActorRef {
    fn from(actor: Arc<T>) -> Self {
        ActorRef::Actor(actor)
    }
}

impl From<Arc<dyn Actor>> for ActorRef {
    fn from(actor: Arc<dyn Actor>) -> Self {
        ActorRef::Actor(actor)
    }
}

impl From<Option<Arc<dyn Actor>>> for ActorRef {
    fn from(actor: Option<Arc<dyn Actor>>) -> Self {
        actor.map_or(ActorRef::Absent, ActorRef::Actor)
    }
}

impl From<JsonValue> for ActorRef {
    fn from(value: JsonValue) -> Self {
        let type_name = match &value {
            JsonValue::Null => return ActorRef::Absent,
            JsonValue::Number(n) => match n.as_i64() {
                Some(id) => return ActorRef::Id(ActorId(id)),
                // beyond the identifier range
                None if n.is_u64() => IDENTIFIER_TYPE,
                None => "Float",
            },
            JsonValue::Bool(_) => "Boolean",
            JsonValue::String(_) => "String",
            JsonValue::Array(_) => "Array",
            JsonValue::Object(_) => "Object",
        };
        ActorRef::Other {
            type_name: type_name.to_string(),
        }
    }
}

/// Raised when the actor reference is of a type outside the allow-list
#[derive(Error, Debug, Clone, PartialEq)]
#[error(
    "current actor must be one of the following types {{{}}} but was {}",
    .allowed.join(","),
    .actual
)]
pub struct ActorTypeError {
    pub allowed: Vec<String>,
    pub actual: String,
}

fn default_true() -> bool {
    true
}

/// Which actor references an operation class accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Actor type identifiers are looked up as
    pub actor_type: String,

    /// Further actor types accepted as-is
    #[serde(default)]
    pub additional_types: Vec<String>,

    #[serde(default = "default_true")]
    pub allow_identifier: bool,

    #[serde(default = "default_true")]
    pub allow_absent: bool,
}

impl ActorConfig {
    pub fn new(actor_type: impl Into<String>) -> Self {
        Self {
            actor_type: actor_type.into(),
            additional_types: Vec::new(),
            allow_identifier: true,
            allow_absent: true,
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.additional_types.push(type_name.into());
        self
    }

    pub fn without_identifier(mut self) -> Self {
        self.allow_identifier = false;
        self
    }

    /// Every accepted type name, in the order used by error messages
    pub fn allowed_types(&self) -> Vec<String> {
        let mut allowed = vec![self.actor_type.clone()];
        allowed.extend(self.additional_types.iter().cloned());
        if self.allow_identifier {
            allowed.push(IDENTIFIER_TYPE.to_string());
        }
        if self.allow_absent {
            allowed.push(NIL_TYPE.to_string());
        }
        allowed
    }

    fn accepts_actor(&self, actor: &dyn Actor) -> bool {
        actor.is_kind_of(&self.actor_type)
            || self.additional_types.iter().any(|t| actor.is_kind_of(t))
    }
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self::new("User")
    }
}

/// Finds actors by identifier. Returning `None` means "not found".
pub trait ActorLookup: Send + Sync {
    fn find(&self, actor_type: &str, id: ActorId) -> Option<Arc<dyn Actor>>;
}

impl<F> ActorLookup for F
where
    F: Fn(&str, ActorId) -> Option<Arc<dyn Actor>> + Send + Sync,
{
    fn find(&self, actor_type: &str, id: ActorId) -> Option<Arc<dyn Actor>> {
        self(actor_type, id)
    }
}

/// Asynchronous actor lookup, e.g. backed by a database client
pub trait AsyncActorLookup: Send + Sync {
    fn find(
        &self,
        actor_type: &str,
        id: ActorId,
    ) -> impl Future<Output = Option<Arc<dyn Actor>>> + Send;
}

/// Adapts an [`AsyncActorLookup`] by blocking on the single lookup call.
///
/// Outside a tokio runtime the future is polled on the calling thread. Inside
/// a multi-threaded runtime the worker is handed off with `block_in_place`
/// and the lookup runs on the ambient runtime. A current-thread runtime
/// cannot be re-entered, so the lookup is driven to completion on a scoped
/// thread with its own runtime; it must not depend on I/O resources owned by
/// the blocked runtime.
pub struct BlockingLookup<L> {
    inner: L,
}

impl<L: AsyncActorLookup> BlockingLookup<L> {
    pub fn new(inner: L) -> Self {
        Self { inner }
    }
}

impl<L: AsyncActorLookup> ActorLookup for BlockingLookup<L> {
    fn find(&self, actor_type: &str, id: ActorId) -> Option<Arc<dyn Actor>> {
        let lookup = self.inner.find(actor_type, id);

        let Ok(handle) = Handle::try_current() else {
            return futures::executor::block_on(lookup);
        };

        match handle.runtime_flavor() {
            RuntimeFlavor::CurrentThread => {
                log::debug!("driving {} lookup on a dedicated runtime", actor_type);
                thread::scope(|scope| {
                    scope
                        .spawn(move || run_on_dedicated_runtime(lookup))
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
            }
            _ => tokio::task::block_in_place(|| handle.block_on(lookup)),
        }
    }
}

fn run_on_dedicated_runtime<F>(lookup: F) -> Option<Arc<dyn Actor>>
where
    F: Future<Output = Option<Arc<dyn Actor>>>,
{
    match runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt.block_on(lookup),
        Err(e) => {
            log::error!("failed to start actor lookup runtime: {}", e);
            None
        }
    }
}

/// Resolves a raw reference into the current actor
pub struct ActorResolver<'a> {
    config: &'a ActorConfig,
    lookup: Option<&'a dyn ActorLookup>,
}

impl<'a> ActorResolver<'a> {
    pub fn new(config: &'a ActorConfig, lookup: Option<&'a dyn ActorLookup>) -> Self {
        Self { config, lookup }
    }

    pub fn resolve(&self, raw: &ActorRef) -> Result<Option<Arc<dyn Actor>>, ActorTypeError> {
        match raw {
            ActorRef::Absent if self.config.allow_absent => Ok(None),
            ActorRef::Actor(actor) if self.config.accepts_actor(actor.as_ref()) => {
                Ok(Some(Arc::clone(actor)))
            }
            ActorRef::Id(id) if self.config.allow_identifier => {
                let Some(lookup) = self.lookup else {
                    log::warn!(
                        "no actor lookup configured; identifier {} resolves to no actor",
                        id
                    );
                    return Ok(None);
                };
                let found = lookup.find(&self.config.actor_type, *id);
                if found.is_none() {
                    log::debug!("{} {} not found", self.config.actor_type, id);
                }
                Ok(found)
            }
            other => Err(ActorTypeError {
                allowed: self.config.allowed_types(),
                actual: other.type_name().to_string(),
            }),
        }
    }
}
