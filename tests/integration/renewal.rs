//! Thread renewal tests

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use elastic_executor::{ResizableExecutor, StandardExecutor};

use crate::helpers::*;

fn renewing(name: &str, delay: Duration) -> StandardExecutor {
    StandardExecutor::new(
        small_config(name)
            .with_threads(2, 2)
            .with_prestart(true)
            .with_thread_renewal_delay(Some(delay)),
    )
    .unwrap()
}

#[test]
fn test_aged_workers_are_renewed() {
    let delay = Duration::from_millis(100);
    let executor = renewing("aged", delay);
    let started = Instant::now();
    executor.start().unwrap();

    assert!(wait_until(WAIT, || executor.stats().renewed_count >= 2));
    let elapsed = started.elapsed();
    let stats = executor.stats();

    // At most one renewal per delay window.
    let ceiling = (elapsed.as_millis() / delay.as_millis()) as u64 + 1;
    assert!(
        stats.renewed_count <= ceiling,
        "{} renewals in {:?}",
        stats.renewed_count,
        elapsed
    );
    // The old worker leaves before its replacement starts.
    assert_eq!(stats.largest_pool_size, 2);
    assert_eq!(stats.current_pool_size, 2);
}

#[test]
fn test_replacement_gets_new_identity() {
    let executor = StandardExecutor::new(
        small_config("names")
            .with_threads(1, 1)
            .with_prestart(true)
            .with_thread_renewal_delay(Some(Duration::from_millis(200))),
    )
    .unwrap();
    executor.start().unwrap();

    let worker_name = |executor: &StandardExecutor| -> String {
        let (tx, rx) = mpsc::channel();
        executor
            .submit(move || {
                let _ = tx.send(thread::current().name().unwrap_or("").to_string());
            })
            .unwrap();
        rx.recv_timeout(WAIT).unwrap()
    };

    assert_eq!(worker_name(&executor), "names-0");
    assert!(wait_until(WAIT, || executor.stats().renewed_count >= 1));

    let after = worker_name(&executor);
    let id: u64 = after
        .strip_prefix("names-")
        .and_then(|id| id.parse().ok())
        .unwrap();
    assert!(id >= 1, "worker {} was not replaced", after);
}

#[test]
fn test_context_stopping_staggers_renewal() {
    // Age alone never triggers within the test.
    let executor = renewing("ctx", Duration::from_secs(30));
    executor.start().unwrap();
    assert_eq!(executor.pool_size(), 2);

    executor.notify_context_stopping();
    assert!(wait_until(WAIT, || executor.stats().renewed_count == 1));

    // The second stale worker must wait a full delay for its slot.
    thread::sleep(Duration::from_millis(200));
    assert_eq!(executor.stats().renewed_count, 1);
    assert_eq!(executor.pool_size(), 2);
}

#[test]
fn test_disabled_renewal_ignores_context_stop() {
    let executor = StandardExecutor::new(
        small_config("off")
            .with_threads(2, 2)
            .with_prestart(true)
            .with_thread_renewal_delay(None),
    )
    .unwrap();
    executor.start().unwrap();

    executor.notify_context_stopping();
    thread::sleep(Duration::from_millis(150));
    assert_eq!(executor.stats().renewed_count, 0);
}

#[test]
fn test_renewal_enabled_live() {
    let executor = StandardExecutor::new(
        small_config("live")
            .with_threads(1, 1)
            .with_prestart(true)
            .with_thread_renewal_delay(None),
    )
    .unwrap();
    executor.start().unwrap();

    thread::sleep(Duration::from_millis(100));
    assert_eq!(executor.stats().renewed_count, 0);

    executor
        .set_thread_renewal_delay(Some(Duration::from_millis(20)))
        .unwrap();
    assert!(wait_until(WAIT, || executor.stats().renewed_count >= 1));
    assert_eq!(
        executor.config().thread_renewal_delay,
        Some(Duration::from_millis(20))
    );
}
