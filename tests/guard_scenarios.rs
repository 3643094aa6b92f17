use rate_limit_guard::limits::ThresholdLevel;
use rate_limit_guard::{Alert, Guard, GuardConfig, GuardError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn advance(ms: u64) {
    tokio::time::advance(Duration::from_millis(ms)).await;
    for _ in 0..3 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_251st_request_is_refused_and_pauses() {
    let guard = Guard::new(GuardConfig::default()).unwrap();

    for i in 0..250 {
        assert!(guard.record_request(), "request {} refused", i + 1);
    }
    assert!(!guard.record_request());

    let state = guard.state();
    assert!(state.is_paused);
    assert_eq!(state.request_count, 250);
    assert_eq!(state.level, ThresholdLevel::AtLimit);
}

#[tokio::test(start_paused = true)]
async fn test_admitted_count_never_exceeds_block_threshold() {
    let guard = Guard::new(GuardConfig::default()).unwrap();
    let mut admitted = 0;
    for _ in 0..1_000 {
        if !guard.should_block() && guard.record_request() {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 250);
}

#[test]
fn test_concurrent_admission_respects_block_threshold() {
    let guard = Guard::new(GuardConfig::default()).unwrap();
    let admitted = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let guard = guard.clone();
        let admitted = admitted.clone();
        handles.push(std::thread::spawn(move || {
            for _ in 0..100 {
                if let Ok(permit) = guard.admit() {
                    admitted.fetch_add(1, Ordering::SeqCst);
                    drop(permit);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(admitted.load(Ordering::SeqCst), 250);
}

#[tokio::test(start_paused = true)]
async fn test_warning_level_is_advisory() {
    let guard = Guard::new(GuardConfig::default()).unwrap();
    for _ in 0..200 {
        guard.record_request();
    }

    let state = guard.state();
    assert_eq!(state.level, ThresholdLevel::NearLimit);
    assert_eq!(state.alert(), Some(Alert::NearLimit));
    assert!(!guard.should_block());
}

#[tokio::test(start_paused = true)]
async fn test_window_usage_returns_to_zero() {
    let guard = Guard::new(GuardConfig::default()).unwrap();
    for _ in 0..100 {
        guard.record_request();
    }
    assert!((guard.state().percentage_used - 20.0).abs() < 1e-9);

    advance(60_001).await;
    let state = guard.state();
    assert_eq!(state.percentage_used, 0.0);
    assert_eq!(state.request_count, 0);
}

#[tokio::test(start_paused = true)]
async fn test_pause_lifts_when_window_resets() {
    let guard = Guard::new(GuardConfig::default()).unwrap();
    for _ in 0..250 {
        guard.record_request();
    }
    assert!(guard.should_block());
    assert!(guard.state().is_paused);

    advance(30_000).await;
    assert!(guard.should_block());

    advance(30_001).await;
    assert!(!guard.should_block());
    assert!(!guard.state().is_paused);
}

#[tokio::test(start_paused = true)]
async fn test_two_overloads_open_then_close_after_cooldown() {
    let guard = Guard::new(GuardConfig::default()).unwrap();
    guard.record_overload_error();
    assert!(!guard.state().is_open);
    guard.record_overload_error();
    assert!(guard.state().is_open);

    for _ in 0..3 {
        advance(10_000).await;
        assert!(guard.should_block());
    }

    advance(1).await;
    assert!(!guard.should_block());
    assert!(!guard.state().is_open);
}

#[test]
fn test_circuit_closes_lazily_without_runtime() {
    let mut config = GuardConfig::default();
    config.circuit.cooldown_ms = 20;
    let guard = Guard::new(config).unwrap();
    guard.open();
    assert!(guard.should_block());

    std::thread::sleep(Duration::from_millis(40));
    assert!(!guard.should_block());
}

#[tokio::test(start_paused = true)]
async fn test_success_between_overloads_keeps_circuit_closed() {
    let guard = Guard::new(GuardConfig::default()).unwrap();
    guard.record_overload_error();
    guard.record_success();
    guard.record_overload_error();

    let state = guard.state();
    assert!(!state.is_open);
    assert_eq!(state.failure_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_open_cancels_in_flight_and_refuses() {
    let guard = Guard::new(GuardConfig::default()).unwrap();
    let permits: Vec<_> = (0..3).map(|_| guard.admit().unwrap()).collect();

    guard.open();
    assert!(permits.iter().all(|p| p.is_cancelled()));
    assert_eq!(guard.state().in_flight, 0);
    assert!(matches!(guard.admit(), Err(GuardError::Blocked { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_all_with_nothing_registered() {
    let guard = Guard::new(GuardConfig::default()).unwrap();
    assert_eq!(guard.cancel_all(), 0);
    assert!(!guard.should_block());
}

#[tokio::test(start_paused = true)]
async fn test_recommended_delay_follows_state() {
    let guard = Guard::new(GuardConfig::default()).unwrap();
    assert_eq!(guard.recommended_delay(), Duration::ZERO);

    guard.open();
    assert_eq!(guard.recommended_delay(), Duration::from_millis(30_000));

    advance(30_001).await;
    assert_eq!(guard.recommended_delay(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_listeners_see_each_transition_and_can_unsubscribe() {
    let guard = Guard::new(GuardConfig::default()).unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let log = seen.clone();
    let subscription = guard.subscribe(move |snapshot| {
        log.lock().unwrap().push(snapshot.alert());
    });

    guard.open();
    advance(30_001).await;
    {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.first(), Some(&Some(Alert::Open)));
        assert_eq!(seen.last(), Some(&None));
    }

    subscription.unsubscribe();
    let before = seen.lock().unwrap().len();
    guard.open();
    assert_eq!(seen.lock().unwrap().len(), before);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_listener_does_not_starve_others() {
    let guard = Guard::new(GuardConfig::default()).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let _bad = guard.subscribe(|_| panic!("listener failure"));
    let counter = calls.clone();
    let _good = guard.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    guard.open();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
