//! Lifecycle tests: start, stop, restart, destroy and failure states

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use elastic_executor::executor::pool::ThreadFactory;
use elastic_executor::executor::LifecycleState;
use elastic_executor::{ResizableExecutor, StandardExecutor};

use crate::helpers::*;

#[test]
fn test_submit_before_start_is_illegal() {
    let executor = StandardExecutor::new(small_config("early")).unwrap();

    let err = executor.submit(|| {}).unwrap_err();
    assert!(err.is_illegal_state());
    assert!(err.to_string().contains("NEW"));

    let err = executor
        .submit_timeout(|| {}, Duration::from_millis(10))
        .unwrap_err();
    assert!(err.is_illegal_state());
}

#[test]
fn test_prestart_reaches_min_spare_threads() {
    let executor =
        StandardExecutor::new(small_config("prestart").with_threads(3, 5).with_prestart(true))
            .unwrap();
    executor.start().unwrap();

    let stats = executor.stats();
    assert!(stats.current_pool_size >= 3);
    assert_eq!(stats.core_pool_size, 3);
    assert_eq!(stats.max_pool_size, 5);
    assert_eq!(stats.active_count, 0);
}

#[test]
fn test_lazy_start_has_no_workers() {
    let executor = StandardExecutor::new(small_config("lazy").with_threads(3, 5)).unwrap();
    executor.start().unwrap();
    assert_eq!(executor.pool_size(), 0);
}

#[test]
fn test_stop_drops_workers_and_refuses_work() {
    let executor =
        StandardExecutor::new(small_config("stop").with_threads(2, 2).with_prestart(true))
            .unwrap();
    executor.start().unwrap();
    assert_eq!(executor.pool_size(), 2);

    executor.stop();
    assert_eq!(executor.state(), LifecycleState::Stopped);
    assert_eq!(executor.stats().current_pool_size, 0);

    let err = executor.submit(|| {}).unwrap_err();
    assert!(err.is_illegal_state());

    // Repeated stops are harmless.
    executor.stop();
    assert_eq!(executor.state(), LifecycleState::Stopped);
}

#[test]
fn test_stop_discards_queued_items() {
    let executor =
        StandardExecutor::new(small_config("discard").with_threads(1, 1).with_max_queue_size(4))
            .unwrap();
    executor.start().unwrap();
    let gate = Gate::new();
    let ran = Arc::new(AtomicUsize::new(0));

    executor.submit(gate.job()).unwrap();
    for _ in 0..3 {
        let ran = Arc::clone(&ran);
        executor
            .submit(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }
    assert_eq!(executor.stats().queue_depth, 3);

    executor.stop();
    gate.open();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn test_restart_after_stop() {
    let executor = StandardExecutor::new(small_config("restart")).unwrap();
    executor.start().unwrap();
    executor.stop();

    executor.start().unwrap();
    assert_eq!(executor.state(), LifecycleState::Started);

    let (tx, rx) = std::sync::mpsc::channel();
    executor.submit(move || tx.send(()).unwrap()).unwrap();
    assert!(rx.recv_timeout(WAIT).is_ok());
}

#[test]
fn test_counters_reset_on_restart() {
    let executor = StandardExecutor::new(small_config("fresh")).unwrap();
    executor.start().unwrap();
    executor.submit(|| {}).unwrap();
    assert!(wait_until(WAIT, || executor.stats().completed_count == 1));

    executor.stop();
    executor.start().unwrap();
    assert_eq!(executor.stats().completed_count, 0);
    assert_eq!(executor.stats().largest_pool_size, 0);
}

#[test]
fn test_prestart_failure_marks_failed() {
    let executor = StandardExecutor::with_thread_factory(
        small_config("broken").with_prestart(true),
        |_| Box::new(FailingFactory) as Box<dyn ThreadFactory>,
    )
    .unwrap();

    let err = executor.start().unwrap_err();
    assert!(err.to_string().contains("thread limit reached"));
    assert_eq!(executor.state(), LifecycleState::Failed);
    assert!(executor.submit(|| {}).unwrap_err().is_illegal_state());

    executor.stop();
    assert_eq!(executor.state(), LifecycleState::Stopped);
}

#[test]
fn test_destroy_stops_running_executor() {
    let executor =
        StandardExecutor::new(small_config("destroy").with_prestart(true)).unwrap();
    executor.start().unwrap();

    executor.destroy();
    assert_eq!(executor.state(), LifecycleState::Destroyed);
    assert_eq!(executor.pool_size(), 0);
    assert!(executor.start().unwrap_err().is_illegal_state());
}

#[test]
fn test_configure_between_runs() {
    let executor = StandardExecutor::new(small_config("reconf")).unwrap();
    executor.start().unwrap();
    executor.stop();

    executor
        .configure(small_config("reconf").with_threads(2, 6).with_prestart(true))
        .unwrap();
    executor.start().unwrap();

    let stats = executor.stats();
    assert_eq!(stats.max_pool_size, 6);
    assert!(stats.current_pool_size >= 2);
}

#[test]
fn test_stop_races_submitters_and_resize() {
    let live = Arc::new(AtomicUsize::new(0));
    let factory_live = Arc::clone(&live);
    let executor = Arc::new(
        StandardExecutor::with_thread_factory(
            small_config("race").with_threads(1, 4).with_max_queue_size(0),
            move |config| {
                Box::new(CountingFactory::new(config, Arc::clone(&factory_live)))
                    as Box<dyn ThreadFactory>
            },
        )
        .unwrap(),
    );
    executor.start().unwrap();

    let stopped = Arc::new(AtomicBool::new(false));
    let late_admissions = Arc::new(AtomicUsize::new(0));
    let ran_after_stop = Arc::new(AtomicUsize::new(0));

    let mut submitters = Vec::new();
    for _ in 0..4 {
        let executor = Arc::clone(&executor);
        let stopped = Arc::clone(&stopped);
        let late_admissions = Arc::clone(&late_admissions);
        let ran_after_stop = Arc::clone(&ran_after_stop);
        submitters.push(thread::spawn(move || loop {
            let after_stop = stopped.load(Ordering::SeqCst);
            let ran = Arc::clone(&ran_after_stop);
            let result = executor.submit(move || {
                if after_stop {
                    ran.fetch_add(1, Ordering::SeqCst);
                }
            });
            match result {
                Ok(()) if after_stop => {
                    late_admissions.fetch_add(1, Ordering::SeqCst);
                }
                Ok(()) => thread::sleep(Duration::from_micros(100)),
                Err(e) if e.is_illegal_state() => break,
                Err(e) => panic!("unexpected submission error: {}", e),
            }
        }));
    }

    let resizer = {
        let executor = Arc::clone(&executor);
        let stopped = Arc::clone(&stopped);
        thread::spawn(move || {
            let mut round = 0;
            loop {
                let after_stop = stopped.load(Ordering::SeqCst);
                let resized = executor.resize_pool(1 + round % 3, 4);
                if after_stop {
                    return resized;
                }
                round += 1;
                thread::sleep(Duration::from_millis(1));
            }
        })
    };

    thread::sleep(Duration::from_millis(50));
    executor.stop();
    stopped.store(true, Ordering::SeqCst);

    for submitter in submitters {
        submitter.join().unwrap();
    }
    assert!(!resizer.join().unwrap(), "resize accepted after stop");

    assert_eq!(late_admissions.load(Ordering::SeqCst), 0);
    assert_eq!(executor.stats().current_pool_size, 0);
    assert!(
        wait_until(WAIT, || live.load(Ordering::SeqCst) == 0),
        "{} worker threads still running",
        live.load(Ordering::SeqCst)
    );
    assert_eq!(ran_after_stop.load(Ordering::SeqCst), 0);
}
