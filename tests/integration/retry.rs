//! Integration test: persisted jobs retried by a queue and dead-lettered.

use reef_integration_tests::{Attempt, PUT_VALUE, PutValue, ReplicaGroup, RetryDriver};
use reef_jobs::{Job, MemoryConsumer, NestedJob, Task};

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_retry_succeeds_after_replica_recovers() {
    let group = ReplicaGroup::new(3);
    let registry = group.registry();
    let sink = MemoryConsumer::new();
    let driver = RetryDriver::new(&registry, &sink, 5);

    group.replica(2).set_down(true);
    let payload = Job::new(PutValue::new(&group, "key", 11)).encode();

    let payload = match driver.attempt(&payload).await.unwrap() {
        Attempt::Retry(payload) => payload,
        other => panic!("expected retry, got {other:?}"),
    };
    let pending = registry.decode(&payload).unwrap();
    assert_eq!(pending.error_count, 1);
    assert!(pending.error_message.contains("replica-2"));

    group.replica(2).set_down(false);
    assert!(matches!(driver.attempt(&payload).await.unwrap(), Attempt::Done(None)));
    assert_eq!(group.replica(2).peek("key").await, Some(11));
    assert!(sink.is_empty());
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_exhausted_job_is_dead_lettered() {
    let group = ReplicaGroup::new(2);
    let registry = group.registry();
    let sink = MemoryConsumer::new();
    let driver = RetryDriver::new(&registry, &sink, 3);

    group.replica(0).set_down(true);
    let mut payload = Job::new(PutValue::new(&group, "lost", 1)).encode();
    let mut attempts = 0;
    loop {
        attempts += 1;
        match driver.attempt(&payload).await.unwrap() {
            Attempt::Retry(next) => payload = next,
            Attempt::DeadLettered => break,
            Attempt::Done(_) => panic!("job should not succeed"),
        }
    }
    assert_eq!(attempts, 3);

    let dropped = sink.drain();
    assert_eq!(dropped.len(), 1);
    let job = registry.decode(&dropped[0]).unwrap();
    assert_eq!(job.tag(), PUT_VALUE);
    assert_eq!(job.error_count, 3);
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_nested_job_retry_reruns_from_start() {
    let group = ReplicaGroup::new(2);
    let registry = group.registry();
    let sink = MemoryConsumer::new();
    let driver = RetryDriver::new(&registry, &sink, 5);

    let nested: Vec<Box<dyn Task>> = vec![
        Box::new(PutValue::new(&group, "first", 1)),
        Box::new(PutValue::new(&group, "second", 2)),
    ];
    let payload = Job::new(NestedJob::new(nested)).encode();

    // Replica 1 rejects every write: the first child fails, the second never runs.
    group.replica(1).set_down(true);
    let payload = match driver.attempt(&payload).await.unwrap() {
        Attempt::Retry(payload) => payload,
        other => panic!("expected retry, got {other:?}"),
    };
    assert_eq!(group.replica(0).peek("first").await, Some(1));
    assert_eq!(group.replica(0).peek("second").await, None);

    group.replica(1).set_down(false);
    assert!(matches!(driver.attempt(&payload).await.unwrap(), Attempt::Done(None)));
    for i in 0..2 {
        assert_eq!(group.replica(i).peek("first").await, Some(1));
        assert_eq!(group.replica(i).peek("second").await, Some(2));
    }
}

#[tokio::test]
#[ntest::timeout(10000)]
async fn test_next_job_handed_to_queue() {
    let group = ReplicaGroup::new(1);
    let registry = group.registry();
    let sink = MemoryConsumer::new();
    let driver = RetryDriver::new(&registry, &sink, 1);

    let job = Job::new(PutValue::new(&group, "a", 1)).with_next(Job::new(PutValue::new(&group, "b", 2)));
    let next = match driver.run(job).await.unwrap() {
        Attempt::Done(Some(next)) => next,
        other => panic!("expected follow-up, got {other:?}"),
    };
    assert_eq!(group.replica(0).peek("b").await, None);

    assert!(matches!(driver.attempt(&next).await.unwrap(), Attempt::Done(None)));
    assert_eq!(group.replica(0).peek("b").await, Some(2));
}
