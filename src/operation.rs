// Operation classes and instances
//
// An OperationClass is built once (fields, authorization rules, actor
// configuration and injected lookups) and shared through an Arc. Each
// Operation owns the per-instance field store and authorization gate.

use crate::actor::{Actor, ActorConfig, ActorLookup, ActorRef, ActorResolver};
use crate::coercion::{CoercerRegistry, TypeTag};
use crate::enforcement::{
    AuditLog, AuthRule, AuthRules, AuthorizationGate, GateState, Guard, NotAuthorizedError,
    PolicyLookup,
};
use crate::error::{DeclarationError, OpError, OpResult};
use crate::fields::{FieldConfig, FieldOptions, FieldSchema, FieldStore};
use crate::value::{FieldValue, Params};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;
use std::sync::Arc;

/// Actor constraint declared in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRequirement {
    Required,
    Forbidden,
    Any,
}

/// Authorization section of an operation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    #[serde(default)]
    pub actor: Option<ActorRequirement>,

    #[serde(default)]
    pub policies: Vec<String>,
}

/// Complete declaration of an operation class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationConfig {
    pub name: String,

    #[serde(default)]
    pub actor: ActorConfig,

    #[serde(default)]
    pub fields: Vec<FieldConfig>,

    #[serde(default)]
    pub authorization: AuthorizationConfig,
}

/// Class-level declarations shared by every instance
pub struct OperationClass {
    name: String,
    parent: Option<String>,
    fields: Arc<FieldSchema>,
    auth: AuthRules,
    actor_config: ActorConfig,
    coercers: Arc<CoercerRegistry>,
    actor_lookup: Option<Arc<dyn ActorLookup>>,
    policies: Option<Arc<dyn PolicyLookup>>,
    audit_log: Option<AuditLog>,
}

impl OperationClass {
    pub fn builder(name: impl Into<String>) -> OperationClassBuilder {
        let name = name.into();
        OperationClassBuilder {
            fields: FieldSchema::new(name.clone()),
            auth: AuthRules::new(name.clone()),
            name,
            parent: None,
            actor_config: ActorConfig::default(),
            coercers: Arc::new(CoercerRegistry::new()),
            actor_lookup: None,
            policies: None,
            audit_log: None,
        }
    }

    /// Start a subclass that inherits every declaration and capability of `parent`
    pub fn subclass(parent: &OperationClass, name: impl Into<String>) -> OperationClassBuilder {
        let name = name.into();
        OperationClassBuilder {
            fields: FieldSchema::inherit(name.clone(), &parent.fields),
            auth: AuthRules::inherit(name.clone(), &parent.auth),
            name,
            parent: Some(parent.name.clone()),
            actor_config: parent.actor_config.clone(),
            coercers: Arc::clone(&parent.coercers),
            actor_lookup: parent.actor_lookup.clone(),
            policies: parent.policies.clone(),
            audit_log: parent.audit_log.clone(),
        }
    }

    /// Load a class declaration from configuration. Lookups and the audit log
    /// are attached on the returned builder.
    pub fn from_config(
        config: &OperationConfig,
    ) -> Result<OperationClassBuilder, DeclarationError> {
        let mut builder = Self::builder(config.name.clone()).actor_config(config.actor.clone());
        builder.fields = FieldSchema::from_config(&config.name, &config.fields, &builder.coercers)?;

        builder = match config.authorization.actor {
            Some(ActorRequirement::Required) => builder.require_actor(),
            Some(ActorRequirement::Forbidden) => builder.require_no_actor(),
            Some(ActorRequirement::Any) => builder.no_actor_requirements(),
            None => builder,
        };

        for policy in &config.authorization.policies {
            builder = builder.policy(policy.clone(), Guard::always());
        }

        Ok(builder)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn fields(&self) -> &FieldSchema {
        &self.fields
    }

    pub fn auth_rules(&self) -> &AuthRules {
        &self.auth
    }

    pub fn actor_config(&self) -> &ActorConfig {
        &self.actor_config
    }

    pub fn coercers(&self) -> &CoercerRegistry {
        &self.coercers
    }

    pub fn policies(&self) -> Option<&dyn PolicyLookup> {
        self.policies.as_deref()
    }

    pub fn actor_lookup(&self) -> Option<&dyn ActorLookup> {
        self.actor_lookup.as_deref()
    }

    pub fn audit_log(&self) -> Option<&AuditLog> {
        self.audit_log.as_ref()
    }
}

impl fmt::Debug for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationClass")
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("fields", &self.fields.names())
            .field("auth", &self.auth)
            .field("actor_config", &self.actor_config)
            .finish()
    }
}

/// Builder collecting class declarations
pub struct OperationClassBuilder {
    name: String,
    parent: Option<String>,
    fields: FieldSchema,
    auth: AuthRules,
    actor_config: ActorConfig,
    coercers: Arc<CoercerRegistry>,
    actor_lookup: Option<Arc<dyn ActorLookup>>,
    policies: Option<Arc<dyn PolicyLookup>>,
    audit_log: Option<AuditLog>,
}

impl OperationClassBuilder {
    /// Replace the coercer registry used by subsequent field declarations
    pub fn with_coercers(mut self, coercers: CoercerRegistry) -> Self {
        self.coercers = Arc::new(coercers);
        self
    }

    /// Declare a field; the type tag must already be registered
    pub fn field(
        mut self,
        name: impl Into<String>,
        type_tag: impl Into<TypeTag>,
        options: FieldOptions,
    ) -> Result<Self, DeclarationError> {
        self.fields.declare(&self.coercers, name, type_tag, options)?;
        Ok(self)
    }

    pub fn string(
        self,
        name: impl Into<String>,
        options: FieldOptions,
    ) -> Result<Self, DeclarationError> {
        self.field(name, "string", options)
    }

    pub fn integer(
        self,
        name: impl Into<String>,
        options: FieldOptions,
    ) -> Result<Self, DeclarationError> {
        self.field(name, "integer", options)
    }

    pub fn number(
        self,
        name: impl Into<String>,
        options: FieldOptions,
    ) -> Result<Self, DeclarationError> {
        self.field(name, "number", options)
    }

    pub fn boolean(
        self,
        name: impl Into<String>,
        options: FieldOptions,
    ) -> Result<Self, DeclarationError> {
        self.field(name, "boolean", options)
    }

    pub fn date(
        self,
        name: impl Into<String>,
        options: FieldOptions,
    ) -> Result<Self, DeclarationError> {
        self.field(name, "date", options)
    }

    pub fn time(
        self,
        name: impl Into<String>,
        options: FieldOptions,
    ) -> Result<Self, DeclarationError> {
        self.field(name, "time", options)
    }

    pub fn iso_date(
        self,
        name: impl Into<String>,
        options: FieldOptions,
    ) -> Result<Self, DeclarationError> {
        self.field(name, "iso_date", options)
    }

    pub fn iso_time(
        self,
        name: impl Into<String>,
        options: FieldOptions,
    ) -> Result<Self, DeclarationError> {
        self.field(name, "iso_time", options)
    }

    pub fn array(
        self,
        name: impl Into<String>,
        options: FieldOptions,
    ) -> Result<Self, DeclarationError> {
        self.field(name, "array", options)
    }

    pub fn object(
        self,
        name: impl Into<String>,
        options: FieldOptions,
    ) -> Result<Self, DeclarationError> {
        self.field(name, "object", options)
    }

    pub fn actor_config(mut self, config: ActorConfig) -> Self {
        self.actor_config = config;
        self
    }

    /// Shorthand for an actor configuration with default allow-list
    pub fn actor_type(self, actor_type: impl Into<String>) -> Self {
        self.actor_config(ActorConfig::new(actor_type))
    }

    pub fn with_actor_lookup<L: ActorLookup + 'static>(mut self, lookup: L) -> Self {
        self.actor_lookup = Some(Arc::new(lookup));
        self
    }

    pub fn with_policies<P: PolicyLookup + 'static>(mut self, policies: P) -> Self {
        self.policies = Some(Arc::new(policies));
        self
    }

    pub fn with_audit_log(mut self, audit_log: AuditLog) -> Self {
        self.audit_log = Some(audit_log);
        self
    }

    pub fn require_actor(mut self) -> Self {
        self.auth.push(AuthRule::RequireActorPresent);
        self
    }

    pub fn require_no_actor(mut self) -> Self {
        self.auth.push(AuthRule::RequireActorAbsent);
        self
    }

    /// Declare that any actor, or none, may run the operation
    pub fn no_actor_requirements(mut self) -> Self {
        self.auth.declare_no_requirements();
        self
    }

    pub fn custom_authorization<F>(self, label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Operation) -> bool + Send + Sync + 'static,
    {
        self.guarded_authorization(label, predicate, Guard::always())
    }

    pub fn guarded_authorization<F>(
        mut self,
        label: impl Into<String>,
        predicate: F,
        guard: Guard,
    ) -> Self
    where
        F: Fn(&Operation) -> bool + Send + Sync + 'static,
    {
        self.auth.push(AuthRule::Custom {
            label: label.into(),
            predicate: Arc::new(predicate),
            guard,
        });
        self
    }

    pub fn policy(mut self, name: impl Into<String>, guard: Guard) -> Self {
        self.auth.push(AuthRule::Policy {
            name: name.into(),
            guard,
        });
        self
    }

    /// Finish the class. Fails when no authorization was declared anywhere in
    /// the hierarchy or when a referenced policy cannot be resolved.
    pub fn build(self) -> Result<Arc<OperationClass>, DeclarationError> {
        self.auth.ensure_declared()?;

        for name in self.auth.policy_names() {
            let defined = self
                .policies
                .as_ref()
                .is_some_and(|policies| policies.policy(name).is_some());
            if !defined {
                return Err(DeclarationError::UnknownPolicy {
                    owner: self.name.clone(),
                    policy: name.to_string(),
                });
            }
        }

        log::debug!(
            "built operation class {} ({} fields, {} authorization rules)",
            self.name,
            self.fields.len(),
            self.auth.len()
        );

        Ok(Arc::new(OperationClass {
            name: self.name,
            parent: self.parent,
            fields: Arc::new(self.fields),
            auth: self.auth,
            actor_config: self.actor_config,
            coercers: self.coercers,
            actor_lookup: self.actor_lookup,
            policies: self.policies,
            audit_log: self.audit_log,
        }))
    }
}

/// One operation instance: its parameters, current actor and gate
pub struct Operation {
    class: Arc<OperationClass>,
    fields: FieldStore,
    actor: Option<Arc<dyn Actor>>,
    gate: AuthorizationGate,
}

impl Operation {
    /// Construct an instance. The actor reference is type-checked and resolved,
    /// and every supplied parameter is coerced, before the instance exists.
    /// `params` must be a JSON object or `null`.
    pub fn new(
        class: &Arc<OperationClass>,
        actor: impl Into<ActorRef>,
        params: JsonValue,
    ) -> OpResult<Self> {
        let params = match params {
            JsonValue::Null => Map::new(),
            JsonValue::Object(map) => map,
            other => {
                return Err(OpError::InvalidParameter(format!(
                    "{} expects an object of parameters, got {}",
                    class.name, other
                )))
            }
        };

        let actor = ActorResolver::new(&class.actor_config, class.actor_lookup())
            .resolve(&actor.into())?;

        let fields = FieldStore::setup(
            Arc::clone(&class.fields),
            Arc::clone(&class.coercers),
            params,
        );
        fields.resolve_provided()?;

        Ok(Self {
            class: Arc::clone(class),
            fields,
            actor,
            gate: AuthorizationGate::new(),
        })
    }

    pub fn class(&self) -> &OperationClass {
        &self.class
    }

    pub fn fields(&self) -> &FieldStore {
        &self.fields
    }

    /// Value of a declared field. `None` when it was neither supplied nor defaulted.
    pub fn get(&self, name: &str) -> OpResult<Option<&FieldValue>> {
        Ok(self.fields.get(name)?)
    }

    /// Whether a field holds a truthy value, for use in guards
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.fields.get(name), Ok(Some(value)) if value.is_truthy())
    }

    pub fn field_provided(&self, name: &str) -> bool {
        self.fields.field_provided(name)
    }

    /// Values of the supplied fields only
    pub fn params(&self) -> OpResult<Params> {
        Ok(self.fields.params_given()?)
    }

    pub fn params_with_defaults(&self) -> OpResult<Params> {
        Ok(self.fields.params_with_defaults()?)
    }

    pub fn defaults(&self) -> Params {
        self.fields.defaults_only()
    }

    pub fn current_actor(&self) -> Option<&Arc<dyn Actor>> {
        self.actor.as_ref()
    }

    pub fn actor(&self) -> Option<&dyn Actor> {
        self.actor.as_deref()
    }

    /// Make `enforce()` pass regardless of rules, for trusted internal callers
    pub fn skip_auth_checks(&mut self) -> &mut Self {
        self.gate.skip_auth_checks();
        self
    }

    pub fn is_auth_bypassed(&self) -> bool {
        self.gate.is_bypassed()
    }

    pub fn auth_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn enforce(&self) -> Result<(), NotAuthorizedError> {
        self.gate.enforce(self)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("class", &self.class.name)
            .field("provided", self.fields.provided_keys())
            .field("actor", &self.actor)
            .field("gate", &self.gate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enforcement::PolicySet;
    use serde_json::json;

    #[test]
    fn test_missing_authorization_is_a_declaration_error() {
        let err = OperationClass::builder("MissingAuthOp")
            .string("foo", FieldOptions::new())
            .unwrap()
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DeclarationError::AuthorizationNotDeclared("MissingAuthOp".to_string())
        );
    }

    #[test]
    fn test_subclass_inherits_declared_authorization() {
        let parent = OperationClass::builder("Parent")
            .no_actor_requirements()
            .string("a", FieldOptions::new())
            .unwrap()
            .build()
            .unwrap();
        let child = OperationClass::subclass(&parent, "Child")
            .integer("b", FieldOptions::new().default_value(1))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(child.parent(), Some("Parent"));
        assert_eq!(child.fields().names(), vec!["a", "b"]);
        assert_eq!(parent.fields().names(), vec!["a"]);
    }

    #[test]
    fn test_unknown_policy_rejected_at_build() {
        let err = OperationClass::builder("P")
            .with_policies(PolicySet::new())
            .policy("missing", Guard::always())
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            DeclarationError::UnknownPolicy {
                owner: "P".to_string(),
                policy: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_non_object_params_rejected() {
        let class = OperationClass::builder("Open")
            .no_actor_requirements()
            .build()
            .unwrap();
        let err = Operation::new(&class, ActorRef::none(), json!([1, 2])).unwrap_err();
        assert!(matches!(err, OpError::InvalidParameter(_)));
        assert!(Operation::new(&class, ActorRef::none(), JsonValue::Null).is_ok());
    }

    #[test]
    fn test_from_config() {
        let config: OperationConfig = serde_json::from_value(json!({
            "name": "ConfiguredOp",
            "actor": {"actor_type": "Admin"},
            "fields": [
                {"name": "title", "type": "string", "default": "untitled"},
                {"name": "count", "type": "integer"}
            ],
            "authorization": {"actor": "required", "policies": ["can_create"]}
        }))
        .unwrap();

        let class = OperationClass::from_config(&config)
            .unwrap()
            .with_policies(PolicySet::new().define("can_create", |_, _| true))
            .build()
            .unwrap();

        assert_eq!(class.actor_config().actor_type, "Admin");
        assert_eq!(class.auth_rules().len(), 2);

        let op = Operation::new(&class, ActorRef::none(), json!({"count": "3"})).unwrap();
        assert_eq!(op.get("title").unwrap(), Some(&FieldValue::from("untitled")));
        assert_eq!(op.get("count").unwrap(), Some(&FieldValue::Integer(3)));
        assert!(op.enforce().unwrap_err().rule == crate::enforcement::FailedRule::ActorRequired);
    }

    #[test]
    fn test_from_config_without_authorization_fails_to_build() {
        let config: OperationConfig =
            serde_json::from_value(json!({"name": "Bare"})).unwrap();
        let err = OperationClass::from_config(&config).unwrap().build().unwrap_err();
        assert!(matches!(err, DeclarationError::AuthorizationNotDeclared(_)));
    }

    #[test]
    fn test_flag_reads_truthy_fields() {
        let class = OperationClass::builder("Flags")
            .no_actor_requirements()
            .boolean("on", FieldOptions::new())
            .unwrap()
            .boolean("off", FieldOptions::new().default_value(false))
            .unwrap()
            .build()
            .unwrap();
        let op = Operation::new(&class, ActorRef::none(), json!({"on": "yes"})).unwrap();
        assert!(op.flag("on"));
        assert!(!op.flag("off"));
        assert!(!op.flag("unknown"));
    }
}
