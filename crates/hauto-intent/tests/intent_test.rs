//! Intent lifecycle and run accounting

use hauto_asyncable::Asyncable;
use hauto_check::{Check, Cooldown, ValueCheck};
use hauto_core::{Clock, Context, HautoError, IntentState, Parent, Payload};
use hauto_intent::{Handler, Intent, IntentBuilder, RunStatus};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn ctx_for(intent: &Intent, payload: serde_json::Value) -> Context {
    let clock = Clock::realtime();
    let payload = match payload {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    };
    Context::new(
        intent.event().clone(),
        payload,
        intent.id(),
        Parent::external("test"),
        clock.now(),
        clock,
    )
}

fn counting(counter: &Arc<AtomicUsize>) -> Handler {
    let counter = counter.clone();
    Asyncable::from_async(move |_ctx: Context| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

#[test]
fn test_build_requires_handler() {
    let err = IntentBuilder::new("dummy").build().unwrap_err();
    assert!(matches!(err, HautoError::Configuration(_)));
}

#[tokio::test]
async fn test_declared_intent_waits_for_bind() {
    let counter = Arc::new(AtomicUsize::new(0));
    let intent = IntentBuilder::new("dummy").declare();
    assert_eq!(intent.state(), IntentState::Initialized);
    assert_eq!(intent.event(), "DUMMY");

    let ctx = ctx_for(&intent, json!({}));
    assert!(!intent.can_run(&ctx).await.unwrap());
    assert!(intent.run(ctx).await.is_err());

    intent.bind(counting(&counter)).unwrap();
    assert_eq!(intent.state(), IntentState::Ready);

    let ctx = ctx_for(&intent, json!({}));
    assert!(intent.can_run(&ctx).await.unwrap());
    assert_eq!(intent.run(ctx).await.unwrap(), RunStatus::Completed);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(intent.last_ran().is_some());
}

#[tokio::test]
async fn test_pause_unpause_cancel() {
    let counter = Arc::new(AtomicUsize::new(0));
    let intent = IntentBuilder::new("dummy")
        .handler(counting(&counter))
        .build()
        .unwrap();

    for _ in 0..3 {
        intent.pause();
        assert_eq!(intent.state(), IntentState::Paused);
        assert!(!intent.can_run(&ctx_for(&intent, json!({}))).await.unwrap());

        intent.unpause();
        assert_eq!(intent.state(), IntentState::Ready);
        assert!(intent.can_run(&ctx_for(&intent, json!({}))).await.unwrap());
    }

    intent.cancel();
    intent.unpause();
    intent.pause();
    assert_eq!(intent.state(), IntentState::Cancelled);
    assert!(!intent.can_run(&ctx_for(&intent, json!({}))).await.unwrap());
    assert!(intent.bind(counting(&counter)).is_err());
}

#[tokio::test]
async fn test_limit_blocks_further_runs() {
    let counter = Arc::new(AtomicUsize::new(0));
    let intent = IntentBuilder::new("dummy")
        .limit(1)
        .handler(counting(&counter))
        .build()
        .unwrap();

    let ctx = ctx_for(&intent, json!({}));
    assert!(intent.can_run(&ctx).await.unwrap());
    intent.run(ctx).await.unwrap();

    assert!(!intent.can_run(&ctx_for(&intent, json!({}))).await.unwrap());
    assert_eq!(intent.runs(), 1);
}

#[tokio::test]
async fn test_concurrent_admissions_respect_limit() {
    let counter = Arc::new(AtomicUsize::new(0));
    let intent = IntentBuilder::new("dummy")
        .limit(2)
        .handler(counting(&counter))
        .build()
        .unwrap();

    // every firing is admitted before any of them runs
    let mut admitted = Vec::new();
    for _ in 0..5 {
        let ctx = ctx_for(&intent, json!({}));
        assert!(intent.can_run(&ctx).await.unwrap());
        admitted.push(ctx);
    }

    let handles: Vec<_> = admitted
        .into_iter()
        .map(|ctx| {
            let intent = intent.clone();
            tokio::spawn(async move { intent.run(ctx).await.unwrap() })
        })
        .collect();

    let mut skipped = 0;
    for handle in handles {
        if handle.await.unwrap() == RunStatus::Skipped {
            skipped += 1;
        }
    }

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(skipped, 3);
}

#[tokio::test]
async fn test_checks_and_cooldown_gate_admission() {
    let counter = Arc::new(AtomicUsize::new(0));
    let intent = IntentBuilder::new("state_changed")
        .check(ValueCheck::new("state", "on"))
        .cooldown(Cooldown::throttle(60.0, 1.0).unwrap())
        .handler(counting(&counter))
        .build()
        .unwrap();

    assert!(!intent.can_run(&ctx_for(&intent, json!({"state": "off"}))).await.unwrap());
    assert!(intent.can_run(&ctx_for(&intent, json!({"state": "on"}))).await.unwrap());
    assert!(!intent.can_run(&ctx_for(&intent, json!({"state": "on"}))).await.unwrap());
}

#[tokio::test]
async fn test_body_failures_are_reported_not_raised() {
    let failing = IntentBuilder::new("dummy")
        .handler(Asyncable::safe_sync(|_| Err(anyhow::anyhow!("bulb unreachable"))))
        .build()
        .unwrap();
    let status = failing.run(ctx_for(&failing, json!({}))).await.unwrap();
    assert_eq!(status, RunStatus::Failed("bulb unreachable".to_string()));

    let panicking = IntentBuilder::new("dummy")
        .check(Check::new(|_| Ok(true)))
        .handler(Asyncable::blocking(|_| panic!("wires crossed")))
        .build()
        .unwrap();
    let status = panicking.run(ctx_for(&panicking, json!({}))).await.unwrap();
    assert_eq!(status, RunStatus::Panicked("wires crossed".to_string()));
}

#[test]
fn test_clones_share_identity() {
    let intent = IntentBuilder::new("dummy").declare();
    let other = IntentBuilder::new("dummy").declare();
    assert_eq!(intent, intent.clone());
    assert_ne!(intent, other);
    assert!(intent.to_string().contains("event=\"DUMMY\""));
}
