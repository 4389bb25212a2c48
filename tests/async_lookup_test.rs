// Actor lookups backed by async I/O are awaited one call at a time

mod support;

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use subroutine::*;
use support::*;

/// Directory whose lookups wait on a tokio timer, like a database round trip
struct SlowDirectory;

impl AsyncActorLookup for SlowDirectory {
    async fn find(&self, actor_type: &str, id: ActorId) -> Option<Arc<dyn Actor>> {
        tokio::time::sleep(Duration::from_millis(1)).await;
        find_user(actor_type, id)
    }
}

/// Directory that needs no runtime at all
struct ReadyDirectory;

impl AsyncActorLookup for ReadyDirectory {
    async fn find(&self, actor_type: &str, id: ActorId) -> Option<Arc<dyn Actor>> {
        futures::future::ready(()).await;
        find_user(actor_type, id)
    }
}

fn slow_lookup_op() -> Arc<OperationClass> {
    build(
        OperationClass::builder("AsyncLookupOp")
            .with_actor_lookup(BlockingLookup::new(SlowDirectory))
            .require_actor(),
    )
}

#[tokio::test]
async fn test_timer_backed_lookup_on_current_thread_runtime() {
    init_logging();
    let class = slow_lookup_op();

    let op = Operation::new(&class, ActorId(5), json!({})).unwrap();
    assert_eq!(op.current_actor().and_then(|a| a.actor_id()), Some(ActorId(5)));
    op.enforce().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timer_backed_lookup_on_multi_thread_runtime() {
    let class = slow_lookup_op();

    let op = Operation::new(&class, ActorId(7), json!({})).unwrap();
    assert_eq!(op.current_actor().and_then(|a| a.actor_id()), Some(ActorId(7)));
    op.enforce().unwrap();
}

#[test]
fn test_timer_backed_lookup_inside_explicit_current_thread_runtime() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let class = slow_lookup_op();

    let actor_id = rt.block_on(async {
        let op = Operation::new(&class, ActorId(5), json!({})).unwrap();
        op.current_actor().and_then(|a| a.actor_id())
    });
    assert_eq!(actor_id, Some(ActorId(5)));
}

#[test]
fn test_lookup_without_runtime() {
    let class = build(
        OperationClass::builder("ReadyLookupOp")
            .with_actor_lookup(BlockingLookup::new(ReadyDirectory))
            .require_actor(),
    );

    let op = Operation::new(&class, ActorId(3), json!({})).unwrap();
    assert_eq!(op.current_actor().and_then(|a| a.actor_id()), Some(ActorId(3)));
}

#[tokio::test]
async fn test_blocking_lookup_not_found_is_absence() {
    let class = build(
        OperationClass::builder("AsyncMissOp")
            .actor_type("Robot")
            .with_actor_lookup(BlockingLookup::new(SlowDirectory))
            .require_actor(),
    );

    let op = Operation::new(&class, ActorId(5), json!({})).unwrap();
    assert!(op.current_actor().is_none());
    assert_eq!(op.enforce().unwrap_err().rule, FailedRule::ActorRequired);
}
