// Shared fixtures: actors, lookups and operation classes
#![allow(dead_code)]

use serde_json::Value as JsonValue;
use std::any::Any;
use std::sync::Arc;
use subroutine::*;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug)]
pub struct User {
    pub id: Option<ActorId>,
    pub email_address: String,
    pub admin: bool,
}

impl User {
    pub fn new(email_address: &str) -> Arc<Self> {
        Arc::new(Self {
            id: None,
            email_address: email_address.to_string(),
            admin: false,
        })
    }
}

impl Actor for User {
    fn actor_id(&self) -> Option<ActorId> {
        self.id
    }

    fn type_name(&self) -> &str {
        if self.admin {
            "AdminUser"
        } else {
            "User"
        }
    }

    // AdminUser is a kind of User
    fn is_kind_of(&self, type_name: &str) -> bool {
        type_name == "User" || (self.admin && type_name == "AdminUser")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn user() -> Arc<User> {
    User::new("doug@example.com")
}

pub fn find_user(actor_type: &str, id: ActorId) -> Option<Arc<dyn Actor>> {
    let admin = match actor_type {
        "User" => false,
        "AdminUser" => true,
        _ => return None,
    };
    Some(Arc::new(User {
        id: Some(id),
        email_address: format!("user{}@example.com", id),
        admin,
    }))
}

pub fn policies() -> PolicySet {
    PolicySet::new().define("user_can_access", |_, _| false)
}

pub fn build(builder: OperationClassBuilder) -> Arc<OperationClass> {
    builder.build().expect("operation class should build")
}

pub fn submit(class: &Arc<OperationClass>, actor: impl Into<ActorRef>) -> OpResult<Operation> {
    submit_with(class, actor, JsonValue::Null)
}

pub fn submit_with(
    class: &Arc<OperationClass>,
    actor: impl Into<ActorRef>,
    params: JsonValue,
) -> OpResult<Operation> {
    let op = Operation::new(class, actor, params)?;
    op.enforce()?;
    Ok(op)
}

pub fn require_user_op() -> Arc<OperationClass> {
    build(OperationClass::builder("RequireUserOp").require_actor())
}

pub fn require_no_user_op() -> Arc<OperationClass> {
    build(OperationClass::builder("RequireNoUserOp").require_no_actor())
}

pub fn no_user_requirements_op() -> Arc<OperationClass> {
    build(OperationClass::builder("NoUserRequirementsOp").no_actor_requirements())
}

pub fn custom_authorize_op() -> Arc<OperationClass> {
    build(
        OperationClass::builder("CustomAuthorizeOp")
            .with_actor_lookup(find_user)
            .require_actor()
            .custom_authorization("authorize_user_is_correct", |op| {
                op.actor()
                    .and_then(|actor| actor.as_any().downcast_ref::<User>())
                    .is_some_and(|user| user.email_address == "doug@example.com")
            }),
    )
}

pub fn different_user_class_op() -> Arc<OperationClass> {
    build(
        OperationClass::builder("DifferentUserClassOp")
            .actor_type("AdminUser")
            .with_actor_lookup(find_user)
            .no_actor_requirements(),
    )
}

pub fn policy_op() -> Arc<OperationClass> {
    build(
        OperationClass::builder("PolicyOp")
            .with_policies(policies())
            .policy("user_can_access", Guard::always()),
    )
}

pub fn if_conditional_policy_op() -> Arc<OperationClass> {
    build(
        OperationClass::builder("IfConditionalPolicyOp")
            .boolean("check_policy", FieldOptions::new())
            .expect("boolean is a built-in type")
            .with_policies(policies())
            .policy(
                "user_can_access",
                Guard::when(|op| op.flag("check_policy")),
            ),
    )
}

pub fn unless_conditional_policy_op() -> Arc<OperationClass> {
    build(
        OperationClass::builder("UnlessConditionalPolicyOp")
            .boolean("unless_check_policy", FieldOptions::new())
            .expect("boolean is a built-in type")
            .with_policies(policies())
            .policy(
                "user_can_access",
                Guard::unless(|op| op.flag("unless_check_policy")),
            ),
    )
}
