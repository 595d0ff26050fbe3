use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use elastic_executor::config::{env_parse, Config};
use elastic_executor::observability::PoolMetrics;
use elastic_executor::{logging, Executor, StandardExecutor, VERSION};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() -> Result<(), BoxError> {
    let config = Config::from_env()?;
    logging::init(&config.logging)?;

    info!(version = VERSION, "Starting elastic_executor demo");
    config.log_summary();

    let tasks: usize = env_parse("DEMO_TASKS", 1000)?;
    let task_time = Duration::from_millis(env_parse("DEMO_TASK_MS", 5u64)?);

    // Single-threaded runtime: all blocking work goes to the pool.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(config, tasks, task_time))
}

async fn run(config: Config, tasks: usize, task_time: Duration) -> Result<(), BoxError> {
    let executor = StandardExecutor::new(config.executor)?;
    executor.start()?;

    let metrics = PoolMetrics::new(&executor.name())?;

    let mut rejected = 0u64;
    let mut receivers = Vec::new();
    for i in 0..tasks {
        let submitted = if i % 100 == 0 {
            executor
                .submit_with_result(move || {
                    thread::sleep(task_time);
                    i
                })
                .map(|rx| receivers.push(rx))
        } else {
            executor.submit(move || thread::sleep(task_time))
        };

        match submitted {
            Ok(()) => {}
            Err(e) if e.is_rejected() => rejected += 1,
            Err(e) => return Err(e.into()),
        }
    }
    if rejected > 0 {
        warn!(rejected, "Some demo tasks were rejected");
    }

    let mut checksum = 0usize;
    for rx in receivers {
        checksum += rx.await?;
    }
    info!(checksum, "Awaited result tasks");

    let mut ticker = tokio::time::interval(Duration::from_millis(250));
    loop {
        ticker.tick().await;
        let stats = executor.stats();
        metrics.observe(&stats);
        info!(
            pool = stats.current_pool_size,
            active = stats.active_count,
            queued = stats.queue_depth,
            completed = stats.completed_count,
            "Pool stats"
        );
        if stats.queue_depth == 0 && stats.active_count == 0 {
            break;
        }
    }

    let stats = executor.stats();
    metrics.observe(&stats);
    println!("{}", serde_json::to_string_pretty(&stats)?);

    executor.stop();
    executor.destroy();
    info!("Executor destroyed");

    print!("{}", metrics.render()?);
    Ok(())
}
