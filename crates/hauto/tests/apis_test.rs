//! Trigger and Moment APIs running inside a core

use chrono::{DateTime, Duration as TimeDelta, TimeZone, Utc};
use hauto::{
    Context, HautoConfig, HautoError, Handler, Hautomate, MomentSpec, Parent, Payload, WaitPolicy,
    EVT_TIME_SLIPPAGE,
};
use hauto_asyncable::Asyncable;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn counting(counter: &Arc<AtomicUsize>) -> Handler {
    let counter = counter.clone();
    Asyncable::safe_sync(move |_ctx: Context| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

fn timestamps(seen: &Arc<Mutex<Vec<DateTime<Utc>>>>) -> Handler {
    let seen = seen.clone();
    Asyncable::safe_sync(move |ctx: Context| {
        seen.lock().unwrap().push(ctx.when());
        Ok(())
    })
}

async fn fire(core: &Hautomate, event: &str) {
    core.fire(
        event,
        Parent::external("test"),
        Some(WaitPolicy::AllCompleted),
        Payload::new(),
    )
    .await;
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 5, 17, 12, 0, 0).unwrap()
}

fn paused_config() -> HautoConfig {
    let mut config = HautoConfig::default();
    config.moment.epoch = Some(epoch());
    config
}

#[tokio::test]
async fn test_trigger_patterns() {
    let core = Hautomate::new(HautoConfig::default()).unwrap();
    let trigger = core.trigger().unwrap();

    let exact = Arc::new(AtomicUsize::new(0));
    let lights = Arc::new(AtomicUsize::new(0));
    let prefixed = Arc::new(AtomicUsize::new(0));
    let suffixed = Arc::new(AtomicUsize::new(0));
    let either = Arc::new(AtomicUsize::new(0));

    let on = trigger.on("light_on").handler(counting(&exact)).build().unwrap();
    assert_eq!(on.event(), "LIGHT_ON");
    core.register(on);
    core.register(
        trigger
            .re_match("light_.*")
            .unwrap()
            .handler(counting(&lights))
            .build()
            .unwrap(),
    );
    core.register(
        trigger
            .startswith("DOOR")
            .unwrap()
            .handler(counting(&prefixed))
            .build()
            .unwrap(),
    );
    core.register(
        trigger
            .endswith("_OFF")
            .unwrap()
            .handler(counting(&suffixed))
            .build()
            .unwrap(),
    );
    core.register(
        trigger
            .any(["doorbell", "light_off"])
            .unwrap()
            .handler(counting(&either))
            .build()
            .unwrap(),
    );

    core.start().await.unwrap();
    for event in ["light_on", "light_off", "doorbell", "door_open", "daylight_on"] {
        fire(&core, event).await;
    }

    assert_eq!(exact.load(Ordering::SeqCst), 1);
    assert_eq!(lights.load(Ordering::SeqCst), 2);
    assert_eq!(prefixed.load(Ordering::SeqCst), 2);
    assert_eq!(suffixed.load(Ordering::SeqCst), 1);
    assert_eq!(either.load(Ordering::SeqCst), 2);

    core.stop().await.unwrap();
}

#[tokio::test]
async fn test_trigger_contains_escapes_metacharacters() {
    let core = Hautomate::new(HautoConfig::default()).unwrap();
    let trigger = core.trigger().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    core.register(
        trigger
            .contains(".")
            .unwrap()
            .handler(counting(&counter))
            .build()
            .unwrap(),
    );
    core.start().await.unwrap();

    fire(&core, "sensor.kitchen").await;
    fire(&core, "sensor_kitchen").await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    core.stop().await.unwrap();
}

#[test]
fn test_trigger_rejects_bad_patterns() {
    let trigger = hauto::Trigger::new();
    assert!(matches!(
        trigger.re_match("light_("),
        Err(HautoError::Configuration(_))
    ));
    assert!(matches!(
        trigger.any(Vec::<&str>::new()),
        Err(HautoError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_wait_for_next_firing() {
    let core = Hautomate::new(HautoConfig::default()).unwrap();
    let trigger = core.trigger().unwrap();
    core.start().await.unwrap();

    let waiter = tokio::spawn({
        let trigger = trigger.clone();
        async move { trigger.wait_for("doorbell", Some(Duration::from_secs(5))).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut payload = Payload::new();
    payload.insert("visitor".into(), json!("postman"));
    core.fire(
        "doorbell",
        Parent::external("test"),
        Some(WaitPolicy::AllCompleted),
        payload,
    )
    .await;

    let ctx = waiter.await.unwrap().unwrap();
    assert_eq!(ctx.event(), "DOORBELL");
    assert_eq!(ctx.get("visitor"), Some(&json!("postman")));

    core.stop().await.unwrap();
}

#[tokio::test]
async fn test_wait_for_timeout_leaves_other_waiters() {
    let core = Hautomate::new(HautoConfig::default()).unwrap();
    let trigger = core.trigger().unwrap();
    core.start().await.unwrap();

    let patient = tokio::spawn({
        let trigger = trigger.clone();
        async move { trigger.wait_for("doorbell", None).await }
    });

    let err = trigger
        .wait_for("doorbell", Some(Duration::from_millis(30)))
        .await
        .unwrap_err();
    assert!(matches!(err, HautoError::Timeout { ref event, .. } if event == "DOORBELL"));
    assert!(!patient.is_finished());

    fire(&core, "doorbell").await;
    let ctx = tokio::time::timeout(Duration::from_secs(1), patient)
        .await
        .expect("remaining waiter should be woken")
        .unwrap()
        .unwrap();
    assert_eq!(ctx.event(), "DOORBELL");

    core.stop().await.unwrap();
}

#[tokio::test]
async fn test_wait_for_leaves_no_stale_waiters() {
    let core = Hautomate::new(HautoConfig::default()).unwrap();
    let trigger = core.trigger().unwrap();
    core.start().await.unwrap();

    for _ in 0..3 {
        let err = trigger
            .wait_for("doorbell", Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, HautoError::Timeout { .. }));
        assert_eq!(trigger.waiting(), 0);
    }

    let abandoned = tokio::spawn({
        let trigger = trigger.clone();
        async move { trigger.wait_for("porch_light", None).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(trigger.waiting(), 1);

    abandoned.abort();
    assert!(abandoned.await.unwrap_err().is_cancelled());
    assert_eq!(trigger.waiting(), 0);

    core.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_moment_at_runs_once_on_time() {
    let core = Hautomate::new(paused_config()).unwrap();
    let moment = core.moment().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let at = epoch() + TimeDelta::seconds(5);
    let intent = core.register(moment.at(at).handler(timestamps(&seen)).build().unwrap());
    assert_eq!(intent.limit(), Some(1));

    core.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10_500)).await;

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert!(seen[0] >= epoch() + TimeDelta::seconds(4));
    assert!(seen[0] <= at);
    let ran = intent.last_ran().unwrap();
    assert!(ran >= at && ran < at + TimeDelta::seconds(1));

    core.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_moment_at_waits_inside_tick() {
    let core = Hautomate::new(paused_config()).unwrap();
    let moment = core.moment().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    let at = epoch() + TimeDelta::milliseconds(2_500);
    let intent = core.register(moment.at(at).handler(counting(&counter)).build().unwrap());
    core.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(2_400)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(intent.last_ran().unwrap() >= at);

    core.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_moment_every_is_throttled() {
    let core = Hautomate::new(paused_config()).unwrap();
    let moment = core.moment().unwrap();
    let counter = Arc::new(AtomicUsize::new(0));

    core.register(
        moment
            .every(Duration::from_secs(3), None)
            .unwrap()
            .handler(counting(&counter))
            .build()
            .unwrap(),
    );
    core.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10_500)).await;

    // eleven ticks, one run per three seconds
    let runs = counter.load(Ordering::SeqCst);
    assert!((3..=4).contains(&runs), "ran {runs} times");

    core.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_moment_every_from_start() {
    let core = Hautomate::new(paused_config()).unwrap();
    let moment = core.moment().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let start = epoch() + TimeDelta::seconds(5);
    core.register(
        moment
            .every(Duration::from_secs(2), Some(start))
            .unwrap()
            .handler(timestamps(&seen))
            .build()
            .unwrap(),
    );
    core.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10_500)).await;

    let seen = seen.lock().unwrap().clone();
    assert!(!seen.is_empty());
    assert!(seen[0] >= epoch() + TimeDelta::seconds(4));
    assert!(seen.len() <= 3, "ran at {seen:?}");

    core.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_late_tick_fires_slippage() {
    let core = Hautomate::new(paused_config()).unwrap();
    let lags = Arc::new(Mutex::new(Vec::new()));
    let handler: Handler = Asyncable::safe_sync({
        let lags = lags.clone();
        move |ctx: Context| {
            if let Some(lag) = ctx.get("lag").and_then(|lag| lag.as_f64()) {
                lags.lock().unwrap().push(lag);
            }
            Ok(())
        }
    });
    core.subscribe(EVT_TIME_SLIPPAGE, handler);
    core.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(3_500)).await;
    assert!(lags.lock().unwrap().is_empty());

    // the pending tick wakes a second and a half late
    tokio::time::advance(Duration::from_millis(1_500)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    let lags = lags.lock().unwrap().clone();
    assert_eq!(lags.len(), 1, "slipped {lags:?}");
    assert!(lags[0] >= 1.5, "lag of {}", lags[0]);

    core.stop().await.unwrap();
}

#[tokio::test]
async fn test_moment_soon_and_every_validate() {
    let core = Hautomate::new(paused_config()).unwrap();
    let moment = core.moment().unwrap();

    let soon = moment.soon(Duration::from_secs(60)).unwrap();
    let intent = soon.declare();
    assert_eq!(intent.limit(), Some(1));
    assert_eq!(intent.event(), "TIME_UPDATE");

    assert!(moment.soon(Duration::MAX).is_err());
    assert!(matches!(
        moment.every(Duration::ZERO, None),
        Err(HautoError::Configuration(_))
    ));
    assert_eq!(
        "07:30".parse::<MomentSpec>().unwrap().to_string(),
        "daily at 07:30:00"
    );
}
