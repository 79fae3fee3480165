//! Property-Based Tests for Scheduler Module
//!
//! Drives the scheduler with arbitrary task mixes and outcomes, checking the
//! worker/task pairing, the retry bound and the dispatch order.

use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::events::EventBus;
use crate::scheduler::{
    HandlerExecutor, Priority, Scheduler, SchedulerConfig, TaskQueue, Task, TaskStatus,
};

// == Strategies ==
fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::Low),
        Just(Priority::Medium),
        Just(Priority::High),
        Just(Priority::Critical),
    ]
}

/// (priority, fails on every attempt, max attempts)
fn task_spec_strategy() -> impl Strategy<Value = (Priority, bool, u32)> {
    (priority_strategy(), any::<bool>(), 1u32..=3)
}

fn counting_executor(calls: Arc<AtomicUsize>) -> HandlerExecutor {
    HandlerExecutor::new().with_handler("job", move |payload: Value| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if payload["fail"].as_bool().unwrap_or(false) {
                Err(anyhow::anyhow!("scripted failure"))
            } else {
                Ok(payload)
            }
        }
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every task ends terminal, busy workers always match processing tasks,
    /// and a failing task runs exactly max_attempts times.
    #[test]
    fn prop_runs_respect_pairing_and_retry_bound(
        specs in prop::collection::vec(task_spec_strategy(), 1..12),
        worker_count in 1usize..4,
    ) {
        tokio_test::block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let config = SchedulerConfig {
                retry_backoff_base_ms: 0,
                ..SchedulerConfig::default()
            };
            let scheduler = Arc::new(Scheduler::new(
                config,
                Arc::new(counting_executor(Arc::clone(&calls))),
                EventBus::new(1024),
            ));
            for i in 0..worker_count {
                scheduler
                    .register_worker(&format!("w{}", i), vec!["job".to_string()])
                    .await
                    .unwrap();
            }

            let mut ids = Vec::new();
            let mut expected_calls = 0usize;
            for (priority, fail, max_attempts) in &specs {
                expected_calls += if *fail { *max_attempts as usize } else { 1 };
                let id = scheduler
                    .submit("job", json!({ "fail": fail }), *priority, Some(*max_attempts), None)
                    .await
                    .unwrap();
                ids.push(id);
            }

            for _ in 0..1000 {
                scheduler.tick().await;
                assert!(scheduler.check_invariants().await.is_ok());
                let stats = scheduler.stats().await;
                assert_eq!(stats.workers_busy, stats.processing);
                assert!(stats.processing <= worker_count);
                if stats.completed + stats.failed == specs.len() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }

            for (id, (_, fail, max_attempts)) in ids.iter().zip(&specs) {
                let task = scheduler.status(*id).await.unwrap();
                if *fail {
                    assert_eq!(task.status, TaskStatus::Failed);
                    assert_eq!(task.attempt, *max_attempts);
                } else {
                    assert_eq!(task.status, TaskStatus::Completed);
                }
            }
            assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
        });
    }

    /// With a single worker, tasks run in priority order, FIFO within a priority.
    #[test]
    fn prop_single_worker_runs_in_priority_order(
        priorities in prop::collection::vec(priority_strategy(), 1..16),
    ) {
        tokio_test::block_on(async {
            let order = Arc::new(Mutex::new(Vec::new()));
            let seen = Arc::clone(&order);
            let executor = HandlerExecutor::new().with_handler("job", move |payload: Value| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().unwrap().push(payload["index"].as_u64().unwrap_or(0) as usize);
                    Ok::<_, anyhow::Error>(Value::Null)
                }
            });
            let scheduler = Arc::new(Scheduler::new(
                SchedulerConfig::default(),
                Arc::new(executor),
                EventBus::default(),
            ));

            for (index, priority) in priorities.iter().enumerate() {
                scheduler
                    .submit("job", json!({ "index": index }), *priority, None, None)
                    .await
                    .unwrap();
            }
            scheduler.register_worker("solo", vec!["job".to_string()]).await.unwrap();

            for _ in 0..1000 {
                scheduler.tick().await;
                if scheduler.stats().await.completed == priorities.len() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }

            let mut expected: Vec<usize> = (0..priorities.len()).collect();
            // Stable sort keeps submission order within a priority
            expected.sort_by(|a, b| priorities[*b].cmp(&priorities[*a]));
            assert_eq!(*order.lock().unwrap(), expected);
        });
    }

    /// Draining the queue yields non-increasing priorities.
    #[test]
    fn prop_queue_drains_by_priority(
        priorities in prop::collection::vec(priority_strategy(), 0..32),
    ) {
        let mut queue = TaskQueue::new();
        for priority in &priorities {
            queue.push_back(Task::new("job", json!(null), *priority, 1, 1));
        }
        prop_assert_eq!(queue.len(), priorities.len());

        let drained: Vec<Priority> = std::iter::from_fn(|| queue.take_first(|_| true))
            .map(|task| task.priority)
            .collect();
        prop_assert!(drained.windows(2).all(|pair| pair[0] >= pair[1]));
        prop_assert!(queue.is_empty());
    }
}
