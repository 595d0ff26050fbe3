//! Admission order, forced overflow and rejection tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use elastic_executor::executor::pool::ThreadFactory;
use elastic_executor::{RejectReason, ResizableExecutor, StandardExecutor};

use crate::helpers::*;

/// Workers are created before anything is queued while below max
#[test]
fn test_worker_created_before_queueing() {
    let executor = StandardExecutor::new(small_config("grow")).unwrap();
    executor.start().unwrap();
    let gate = Gate::new();

    executor.submit(gate.job()).unwrap();
    executor.submit(gate.job()).unwrap();

    let stats = executor.stats();
    assert_eq!(stats.current_pool_size, 2);
    assert_eq!(stats.queue_depth, 0);

    // At max: the next item waits in the queue.
    executor.submit(gate.job()).unwrap();
    let stats = executor.stats();
    assert_eq!(stats.current_pool_size, 2);
    assert_eq!(stats.queue_depth, 1);

    gate.open();
    assert!(wait_until(WAIT, || executor.stats().completed_count == 3));
}

/// A full queue at max workers still admits plain submissions
#[test]
fn test_force_past_full_queue() {
    let executor = StandardExecutor::new(small_config("force")).unwrap();
    executor.start().unwrap();
    let gate = Gate::new();
    let ran = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        executor.submit(gate.job()).unwrap();
    }
    // Queue capacity is 2; the last two go past it.
    for _ in 0..4 {
        let ran = Arc::clone(&ran);
        executor
            .submit(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    let stats = executor.stats();
    assert_eq!(stats.current_pool_size, 2);
    assert_eq!(stats.queue_depth, 4);
    assert_eq!(stats.rejected_count, 0);

    gate.open();
    assert!(wait_until(WAIT, || ran.load(Ordering::SeqCst) == 4));
    assert_eq!(executor.stats().queue_depth, 0);
}

/// No worker and a full queue means nothing could ever drain it
#[test]
fn test_rejected_without_workers() {
    let executor = StandardExecutor::with_thread_factory(
        small_config("noworkers").with_max_queue_size(1),
        |_| Box::new(FailingFactory) as Box<dyn ThreadFactory>,
    )
    .unwrap();
    executor.start().unwrap();

    // Spawning fails, so the item falls back to the queue.
    executor.submit(|| {}).unwrap();
    assert_eq!(executor.stats().queue_depth, 1);
    assert_eq!(executor.pool_size(), 0);

    let err = executor.submit(|| {}).unwrap_err();
    assert!(err.is_rejected());
    assert_eq!(err.reject_reason(), Some(RejectReason::QueueFull));
    assert!(err.to_string().contains("noworkers"));
    assert_eq!(executor.stats().rejected_count, 1);
}

/// A zero deadline against a saturated pool is refused without blocking
#[test]
fn test_timed_zero_deadline_rejected() {
    let executor =
        StandardExecutor::new(small_config("zero").with_threads(1, 1).with_max_queue_size(1))
            .unwrap();
    executor.start().unwrap();
    let gate = Gate::new();

    executor.submit(gate.job()).unwrap();
    executor.submit(gate.job()).unwrap();

    let started = Instant::now();
    let err = executor
        .submit_timeout(|| {}, Duration::ZERO)
        .unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(
        err.reject_reason(),
        Some(RejectReason::DeadlineElapsed(Duration::ZERO))
    );
    assert_eq!(executor.stats().queue_depth, 1);

    gate.open();
}

/// A timed submission waits for room and never forces
#[test]
fn test_timed_deadline_elapses() {
    let executor =
        StandardExecutor::new(small_config("deadline").with_threads(1, 1).with_max_queue_size(1))
            .unwrap();
    executor.start().unwrap();
    let gate = Gate::new();

    executor.submit(gate.job()).unwrap();
    executor.submit(gate.job()).unwrap();

    let timeout = Duration::from_millis(100);
    let started = Instant::now();
    let err = executor.submit_timeout(|| {}, timeout).unwrap_err();
    assert!(started.elapsed() >= timeout);
    assert!(err.is_rejected());
    assert_eq!(executor.stats().queue_depth, 1);

    gate.open();
}

/// A timed submission is admitted once a worker takes a queued item
#[test]
fn test_timed_admitted_when_space_frees() {
    let executor = Arc::new(
        StandardExecutor::new(small_config("space").with_threads(1, 1).with_max_queue_size(1))
            .unwrap(),
    );
    executor.start().unwrap();
    let gate = Gate::new();

    executor.submit(gate.job()).unwrap();
    executor.submit(|| {}).unwrap();

    let opener = {
        let gate = gate.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gate.open();
        })
    };

    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    executor
        .submit_timeout(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            WAIT,
        )
        .unwrap();

    opener.join().unwrap();
    assert!(wait_until(WAIT, || ran.load(Ordering::SeqCst) == 1));
    assert_eq!(executor.stats().rejected_count, 0);
}

/// An idle worker takes new work instead of a new thread being spawned
#[test]
fn test_idle_worker_reused() {
    let executor =
        StandardExecutor::new(small_config("reuse").with_threads(0, 4)).unwrap();
    executor.start().unwrap();

    executor.submit(|| {}).unwrap();
    assert!(wait_until(WAIT, || {
        let stats = executor.stats();
        stats.completed_count == 1 && stats.active_count == 0
    }));
    // Let the worker park.
    thread::sleep(Duration::from_millis(50));

    executor.submit(|| {}).unwrap();
    assert!(wait_until(WAIT, || executor.stats().completed_count == 2));
    assert_eq!(executor.stats().largest_pool_size, 1);
}

/// Workers above core exit after the idle timeout; core workers stay
#[test]
fn test_idle_timeout_shrinks_to_core() {
    let executor = StandardExecutor::new(
        small_config("idle")
            .with_threads(1, 3)
            .with_max_idle_time(Duration::from_millis(100)),
    )
    .unwrap();
    executor.start().unwrap();
    let gate = Gate::new();

    for _ in 0..3 {
        executor.submit(gate.job()).unwrap();
    }
    assert_eq!(executor.pool_size(), 3);

    gate.open();
    assert!(wait_until(WAIT, || executor.pool_size() == 1));

    thread::sleep(Duration::from_millis(300));
    assert_eq!(executor.pool_size(), 1);
    assert_eq!(executor.stats().largest_pool_size, 3);
}

/// A panicking job is contained and the worker keeps serving
#[test]
fn test_panic_is_contained() {
    let executor =
        StandardExecutor::new(small_config("panic").with_threads(1, 1)).unwrap();
    executor.start().unwrap();

    executor.submit(|| panic!("boom")).unwrap();
    assert!(wait_until(WAIT, || executor.stats().failed_count == 1));

    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    executor
        .submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    assert!(wait_until(WAIT, || ran.load(Ordering::SeqCst) == 1));

    let stats = executor.stats();
    assert_eq!(stats.completed_count, 2);
    assert_eq!(stats.current_pool_size, 1);
}

/// Worker threads carry the configured name prefix
#[test]
fn test_worker_thread_names() {
    let executor = StandardExecutor::new(small_config("named")).unwrap();
    executor.start().unwrap();

    let (tx, rx) = std::sync::mpsc::channel();
    executor
        .submit(move || {
            let name = thread::current().name().map(str::to_string);
            tx.send(name).unwrap();
        })
        .unwrap();

    let name = rx.recv_timeout(WAIT).unwrap().unwrap();
    assert!(name.starts_with("named-"), "unexpected thread name {}", name);
}

/// Raising the worker ceiling admits a timed submission still waiting for space
#[test]
fn test_timed_waiter_admitted_on_resize() {
    let executor = Arc::new(
        StandardExecutor::new(small_config("widen").with_threads(1, 1).with_max_queue_size(1))
            .unwrap(),
    );
    executor.start().unwrap();
    let gate = Gate::new();

    executor.submit(gate.job()).unwrap();
    executor.submit(gate.job()).unwrap();
    assert_eq!(executor.stats().queue_depth, 1);

    let resizer = {
        let executor = Arc::clone(&executor);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            executor.resize_pool(1, 2)
        })
    };

    let started = Instant::now();
    executor
        .submit_timeout(gate.job(), Duration::from_secs(2))
        .unwrap();
    let waited = started.elapsed();

    assert!(resizer.join().unwrap());
    assert!(waited < Duration::from_secs(1), "waited {:?}", waited);
    assert_eq!(executor.pool_size(), 2);
    gate.open();
}
