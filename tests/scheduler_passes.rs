// tests/scheduler_passes.rs

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use assetdag::engine::{cancel, CancelSignal, SkipReason, TaskStatus};
use assetdag_test_utils::builders::{graph_of, memory_scheduler, mock_project};
use assetdag_test_utils::fakes::RecordingTransform;
use assetdag_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn full_pass_writes_every_artifact_in_batch_order() -> TestResult {
    with_timeout(async {
        init_tracing();

        let transform = RecordingTransform::new();
        let graph = graph_of(
            &[("C", &["A", "B"]), ("B", &[]), ("A", &[])],
            Arc::new(transform.clone()),
        );
        let (scheduler, sink) = memory_scheduler(mock_project(&["A", "B", "C"]));

        let session = scheduler.run_all(&graph, &CancelSignal::never()).await?;

        assert!(session.is_success());
        assert_eq!(session.task_ids(), vec!["A", "B", "C"]);
        assert_eq!(transform.calls().last().map(String::as_str), Some("C"));
        assert_eq!(sink.get("C.out").unwrap(), b"C");
        assert_eq!(sink.len(), 3);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn changing_a_reruns_the_whole_chain() -> TestResult {
    with_timeout(async {
        init_tracing();

        let transform = RecordingTransform::new();
        let graph = graph_of(
            &[("A", &[]), ("B", &["A"]), ("C", &["B"])],
            Arc::new(transform.clone()),
        );
        let (scheduler, _sink) = memory_scheduler(mock_project(&["A", "B", "C"]));

        let session = scheduler
            .run_subset(&graph, ["A"], &CancelSignal::never())
            .await?;

        assert_eq!(session.task_ids(), vec!["A", "B", "C"]);
        assert_eq!(transform.calls(), vec!["A", "B", "C"]);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn changing_the_leaf_reruns_only_the_leaf() -> TestResult {
    with_timeout(async {
        init_tracing();

        let transform = RecordingTransform::new();
        let graph = graph_of(
            &[("A", &[]), ("B", &["A"]), ("C", &["B"])],
            Arc::new(transform.clone()),
        );
        let (scheduler, sink) = memory_scheduler(mock_project(&["A", "B", "C"]));

        let session = scheduler
            .run_subset(&graph, ["C", "not-a-task"], &CancelSignal::never())
            .await?;

        assert_eq!(session.task_ids(), vec!["C"]);
        assert_eq!(transform.calls(), vec!["C"]);
        assert_eq!(sink.paths().len(), 1);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn failure_skips_dependents_but_not_independent_branches() -> TestResult {
    with_timeout(async {
        init_tracing();

        let transform = RecordingTransform::new().failing_on("X");
        let graph = graph_of(
            &[("X", &[]), ("Y", &["X"]), ("P", &[]), ("Q", &["P"])],
            Arc::new(transform.clone()),
        );
        let (scheduler, sink) = memory_scheduler(mock_project(&["X", "Y", "P", "Q"]));

        let session = scheduler.run_all(&graph, &CancelSignal::never()).await?;

        assert!(!session.is_success());
        assert_eq!(session.task_ids(), vec!["P", "X", "Q", "Y"]);

        let x = session.get("X").unwrap();
        assert_eq!(x.status, TaskStatus::Failed);
        assert!(x.error.as_deref().unwrap().contains("refusing"));

        assert_eq!(
            session.get("Y").unwrap().status,
            TaskStatus::Skipped(SkipReason::UpstreamFailed("X".to_string()))
        );
        assert!(session.get("P").unwrap().status.is_success());
        assert!(session.get("Q").unwrap().status.is_success());

        assert!(!transform.calls().contains(&"Y".to_string()));
        assert!(sink.get("X.out").is_none());
        assert!(sink.get("Q.out").is_some());
        Ok(())
    })
    .await
}

#[tokio::test]
async fn skips_propagate_through_several_levels() -> TestResult {
    with_timeout(async {
        init_tracing();

        let transform = RecordingTransform::new().failing_on("A");
        let graph = graph_of(
            &[("A", &[]), ("B", &["A"]), ("C", &["B"])],
            Arc::new(transform),
        );
        let (scheduler, _sink) = memory_scheduler(mock_project(&["A", "B", "C"]));

        let session = scheduler.run_all(&graph, &CancelSignal::never()).await?;

        assert_eq!(
            session.get("C").unwrap().status,
            TaskStatus::Skipped(SkipReason::UpstreamFailed("B".to_string()))
        );
        assert_eq!(session.skipped().count(), 2);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn cancellation_is_checked_between_batches() -> TestResult {
    with_timeout(async {
        init_tracing();

        let transform = RecordingTransform::new().with_delay(Duration::from_millis(100));
        let graph = graph_of(
            &[("A", &[]), ("B", &["A"]), ("C", &["B"])],
            Arc::new(transform.clone()),
        );
        let (scheduler, _sink) = memory_scheduler(mock_project(&["A", "B", "C"]));
        let (handle, signal) = cancel::pair();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.cancel();
        });

        let session = scheduler.run_all(&graph, &signal).await?;

        assert!(session.was_cancelled());
        assert!(!session.is_success());
        // The batch that was already running completes.
        assert!(session.get("A").unwrap().status.is_success());
        for id in ["B", "C"] {
            assert_eq!(
                session.get(id).unwrap().status,
                TaskStatus::Skipped(SkipReason::Cancelled)
            );
        }
        assert_eq!(transform.calls(), vec!["A"]);
        Ok(())
    })
    .await
}

#[tokio::test]
async fn bounded_concurrency_still_runs_everything() -> TestResult {
    with_timeout(async {
        init_tracing();

        let ids = ["a", "b", "c", "d", "e"];
        let layout: Vec<(&str, &[&str])> = ids.iter().map(|id| (*id, &[][..])).collect();
        let graph = graph_of(&layout, Arc::new(RecordingTransform::new()));
        let (scheduler, sink) = memory_scheduler(mock_project(&ids));
        let scheduler = scheduler.with_concurrency(Some(2));

        let session = scheduler.run_all(&graph, &CancelSignal::never()).await?;

        assert!(session.is_success());
        assert_eq!(session.task_ids(), ids.to_vec());
        assert_eq!(sink.len(), 5);
        Ok(())
    })
    .await
}
