// Copyright (c) 2026 Argus Labs
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end tests of the scheduling and execution pipeline over the
//! in-memory store: dispatch exclusivity, window tiling, deterministic
//! sampling, partial-failure isolation, idempotent score writes, and the
//! stuck-run sweep.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::stream;
use std::sync::Arc;
use uuid::Uuid;

use argus_core::application::catalog::{EvaluatorCatalog, EvaluatorDefinition};
use argus_core::application::executor::{ExecutorConfig, RunExecutor};
use argus_core::application::sampling::DeterministicSampler;
use argus_core::application::scheduler::{MonitorScheduler, SchedulerConfig};
use argus_core::domain::evaluator::{
    EvalItem, EvalScore, Evaluator, EvaluatorConfig, EvaluatorError,
};
use argus_core::domain::monitor::{
    AgentId, EnvironmentId, EvaluatorSpec, Monitor, OrgId, ProjectId,
};
use argus_core::domain::repository::{MonitorRepository, MonitorRunRepository, ScoreRepository};
use argus_core::domain::run::{
    EvaluatorLevel, MonitorRun, MonitorRunId, RunEvaluator, RunStatus, Score,
};
use argus_core::domain::trace::{
    AgentScope, Span, SpanId, Trace, TraceId, TraceSource, TraceSourceError, TraceStream,
};
use argus_core::infrastructure::repositories::InMemoryStore;

struct StubTraceSource {
    traces: Vec<Trace>,
}

#[async_trait]
impl TraceSource for StubTraceSource {
    async fn fetch(
        &self,
        _scope: &AgentScope,
        _window_start: DateTime<Utc>,
        _window_end: DateTime<Utc>,
    ) -> Result<TraceStream, TraceSourceError> {
        let items: Vec<Result<Trace, TraceSourceError>> =
            self.traces.iter().cloned().map(Ok).collect();
        Ok(Box::pin(stream::iter(items)))
    }
}

struct UnreachableTraceSource;

#[async_trait]
impl TraceSource for UnreachableTraceSource {
    async fn fetch(
        &self,
        _scope: &AgentScope,
        _window_start: DateTime<Utc>,
        _window_end: DateTime<Utc>,
    ) -> Result<TraceStream, TraceSourceError> {
        Err(TraceSourceError::Query("connection refused".into()))
    }
}

/// Scores 1.0, except traces carrying a truthy `fail` attribute, which error.
struct FlakyEvaluator;

#[async_trait]
impl Evaluator for FlakyEvaluator {
    async fn evaluate(
        &self,
        item: &EvalItem<'_>,
        _config: &EvaluatorConfig,
    ) -> Result<EvalScore, EvaluatorError> {
        let fails = item
            .trace()
            .attributes
            .get("fail")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if fails {
            return Err(EvaluatorError::Execution("upstream judge unavailable".into()));
        }
        Ok(EvalScore {
            score: 1.0,
            explanation: None,
            metadata: serde_json::Value::Null,
        })
    }
}

/// Sleeps past any reasonable deadline before answering.
struct StallingEvaluator;

#[async_trait]
impl Evaluator for StallingEvaluator {
    async fn evaluate(
        &self,
        _item: &EvalItem<'_>,
        _config: &EvaluatorConfig,
    ) -> Result<EvalScore, EvaluatorError> {
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;
        Ok(EvalScore {
            score: 1.0,
            explanation: None,
            metadata: serde_json::Value::Null,
        })
    }
}

struct ConstantEvaluator(f64);

#[async_trait]
impl Evaluator for ConstantEvaluator {
    async fn evaluate(
        &self,
        _item: &EvalItem<'_>,
        _config: &EvaluatorConfig,
    ) -> Result<EvalScore, EvaluatorError> {
        Ok(EvalScore {
            score: self.0,
            explanation: None,
            metadata: serde_json::Value::Null,
        })
    }
}

fn definition(identifier: &str, level: EvaluatorLevel) -> EvaluatorDefinition {
    EvaluatorDefinition {
        identifier: identifier.to_string(),
        version: "1.0".to_string(),
        display_name: identifier.to_string(),
        description: String::new(),
        tags: vec![],
        level,
        config_schema: vec![],
        provider: "test".to_string(),
    }
}

fn spec(identifier: &str) -> EvaluatorSpec {
    EvaluatorSpec {
        identifier: identifier.to_string(),
        version: "1.0".to_string(),
        config: EvaluatorConfig::new(),
    }
}

fn trace(id: &str, spans: usize) -> Trace {
    Trace {
        id: TraceId(id.to_string()),
        timestamp: Utc::now() - Duration::minutes(5),
        spans: (0..spans)
            .map(|i| Span {
                id: SpanId(format!("{id}-s{i}")),
                name: format!("step-{i}"),
                attributes: serde_json::Value::Null,
            })
            .collect(),
        attributes: serde_json::json!({}),
    }
}

fn failing_trace(id: &str) -> Trace {
    let mut t = trace(id, 0);
    t.attributes = serde_json::json!({ "fail": true });
    t
}

struct Harness {
    monitors: Arc<dyn MonitorRepository>,
    runs: Arc<dyn MonitorRunRepository>,
    scores: Arc<dyn ScoreRepository>,
    scheduler: Arc<MonitorScheduler>,
}

impl Harness {
    fn new(
        traces: Arc<dyn TraceSource>,
        evaluators: Vec<(EvaluatorDefinition, Arc<dyn Evaluator>)>,
    ) -> Self {
        Self::with_executor_config(traces, evaluators, ExecutorConfig::default())
    }

    fn with_executor_config(
        traces: Arc<dyn TraceSource>,
        evaluators: Vec<(EvaluatorDefinition, Arc<dyn Evaluator>)>,
        executor_config: ExecutorConfig,
    ) -> Self {
        let store = InMemoryStore::new();
        let monitors: Arc<dyn MonitorRepository> = Arc::new(store.clone());
        let runs: Arc<dyn MonitorRunRepository> = Arc::new(store.clone());
        let scores: Arc<dyn ScoreRepository> = Arc::new(store);

        let catalog = Arc::new(EvaluatorCatalog::new());
        for (definition, handler) in evaluators {
            catalog.register(None, definition, handler);
        }

        let executor = Arc::new(RunExecutor::new(
            Arc::clone(&monitors),
            Arc::clone(&runs),
            Arc::clone(&scores),
            traces,
            Arc::clone(&catalog),
            executor_config,
        ));
        let scheduler = Arc::new(MonitorScheduler::new(
            Arc::clone(&monitors),
            Arc::clone(&runs),
            executor,
            SchedulerConfig::default(),
        ));

        Self {
            monitors,
            runs,
            scores,
            scheduler,
        }
    }

    async fn save_due_future_monitor(&self, evaluators: Vec<EvaluatorSpec>, rate: f64) -> Monitor {
        let mut monitor = Monitor::future(
            "resp-quality".into(),
            "Response Quality".into(),
            OrgId(Uuid::new_v4()),
            ProjectId(Uuid::new_v4()),
            AgentId(Uuid::new_v4()),
            EnvironmentId(Uuid::new_v4()),
            evaluators,
            60,
            rate,
        )
        .unwrap();
        monitor.schedule.as_mut().unwrap().next_run_time = Utc::now() - Duration::minutes(1);
        self.monitors.save(&monitor).await.unwrap();
        monitor
    }

    async fn wait_terminal(&self, id: MonitorRunId) -> MonitorRun {
        for _ in 0..500 {
            if let Some(run) = self.runs.find_by_id(id).await.unwrap() {
                if run.status.is_terminal() {
                    return run;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("run never reached a terminal state");
    }

    async fn only_run(&self, monitor: &Monitor) -> MonitorRun {
        let runs = self.runs.list_for_monitor(monitor.id).await.unwrap();
        assert_eq!(runs.len(), 1, "expected exactly one run");
        runs.into_iter().next().unwrap()
    }
}

#[tokio::test]
async fn test_scheduled_run_executes_to_success() {
    let traces: Arc<dyn TraceSource> = Arc::new(StubTraceSource {
        traces: vec![trace("t-1", 0), trace("t-2", 0), trace("t-3", 0)],
    });
    let harness = Harness::new(
        traces,
        vec![(
            definition("quality", EvaluatorLevel::Trace),
            Arc::new(ConstantEvaluator(0.8)),
        )],
    );
    let monitor = harness
        .save_due_future_monitor(vec![spec("quality")], 1.0)
        .await;

    let dispatched = harness.scheduler.tick().await.unwrap();
    assert_eq!(dispatched, 1);

    let run = harness.only_run(&monitor).await;
    let run = harness.wait_terminal(run.id).await;
    assert_eq!(run.status, RunStatus::Success);
    assert!(run.started_at.is_some());
    assert!(run.completed_at.is_some());

    let evaluators = harness.scores.run_evaluators_for_run(run.id).await.unwrap();
    assert_eq!(evaluators.len(), 1);
    assert_eq!(evaluators[0].count, 3);
    assert_eq!(evaluators[0].error_count, 0);
    assert!((evaluators[0].aggregations.mean - 0.8).abs() < 1e-9);
    assert_eq!(evaluators[0].aggregations.scored, 3);
}

#[tokio::test]
async fn test_active_run_blocks_further_dispatch() {
    let traces: Arc<dyn TraceSource> = Arc::new(StubTraceSource { traces: vec![] });
    let harness = Harness::new(
        traces,
        vec![(
            definition("quality", EvaluatorLevel::Trace),
            Arc::new(ConstantEvaluator(0.8)),
        )],
    );
    let monitor = harness
        .save_due_future_monitor(vec![spec("quality")], 1.0)
        .await;

    // Plant a pending run by hand; the monitor is due but must be skipped.
    let stuck = MonitorRun::dispatch(&monitor, Utc::now() - Duration::hours(1), Utc::now());
    assert!(harness
        .runs
        .create_run_and_advance(&stuck, None)
        .await
        .unwrap());

    let dispatched = harness.scheduler.tick().await.unwrap();
    assert_eq!(dispatched, 0);
    assert_eq!(
        harness.runs.list_for_monitor(monitor.id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_dispatch_advances_schedule_and_windows_tile() {
    let traces: Arc<dyn TraceSource> = Arc::new(StubTraceSource { traces: vec![] });
    let harness = Harness::new(
        traces,
        vec![(
            definition("quality", EvaluatorLevel::Trace),
            Arc::new(ConstantEvaluator(0.5)),
        )],
    );
    let monitor = harness
        .save_due_future_monitor(vec![spec("quality")], 1.0)
        .await;
    let due_at = monitor.schedule.as_ref().unwrap().next_run_time;

    harness.scheduler.tick().await.unwrap();

    let run = harness.only_run(&monitor).await;
    // Window opens one interval before the due time and closes at dispatch.
    assert_eq!(run.trace_start, due_at - Duration::minutes(60));
    assert!(run.trace_end > due_at);

    let advanced = harness
        .monitors
        .find_by_id(monitor.id)
        .await
        .unwrap()
        .unwrap();
    let next = advanced.schedule.as_ref().unwrap().next_run_time;
    assert_eq!(next, run.trace_end + Duration::minutes(60));
}

#[tokio::test]
async fn test_evaluator_failures_do_not_fail_the_run() {
    let traces: Arc<dyn TraceSource> = Arc::new(StubTraceSource {
        traces: vec![trace("ok-1", 0), failing_trace("bad-1"), trace("ok-2", 0)],
    });
    let harness = Harness::new(
        traces,
        vec![(
            definition("flaky", EvaluatorLevel::Trace),
            Arc::new(FlakyEvaluator),
        )],
    );
    let monitor = harness
        .save_due_future_monitor(vec![spec("flaky")], 1.0)
        .await;

    harness.scheduler.tick().await.unwrap();
    let run = harness.only_run(&monitor).await;
    let run = harness.wait_terminal(run.id).await;
    assert_eq!(run.status, RunStatus::Success);

    let evaluators = harness.scores.run_evaluators_for_run(run.id).await.unwrap();
    assert_eq!(evaluators[0].count, 3);
    assert_eq!(evaluators[0].error_count, 1);
    // Errored items never enter the aggregation.
    assert_eq!(evaluators[0].aggregations.scored, 2);
    assert!((evaluators[0].aggregations.mean - 1.0).abs() < 1e-9);

    let scores = harness
        .scores
        .scores_for_run_evaluator(evaluators[0].id)
        .await
        .unwrap();
    let errored: Vec<_> = scores.iter().filter(|s| s.is_errored()).collect();
    assert_eq!(errored.len(), 1);
    assert_eq!(errored[0].trace_id.0, "bad-1");
    assert!(errored[0].score.is_none());
}

#[tokio::test]
async fn test_stalled_evaluator_times_out_as_errored_score() {
    let traces: Arc<dyn TraceSource> = Arc::new(StubTraceSource {
        traces: vec![trace("t-1", 0)],
    });
    let harness = Harness::with_executor_config(
        traces,
        vec![
            (
                definition("stalls", EvaluatorLevel::Trace),
                Arc::new(StallingEvaluator),
            ),
            (
                definition("quality", EvaluatorLevel::Trace),
                Arc::new(ConstantEvaluator(0.8)),
            ),
        ],
        ExecutorConfig {
            eval_timeout: std::time::Duration::from_millis(50),
            ..ExecutorConfig::default()
        },
    );
    let monitor = harness
        .save_due_future_monitor(vec![spec("stalls"), spec("quality")], 1.0)
        .await;

    harness.scheduler.tick().await.unwrap();
    let run = harness.only_run(&monitor).await;
    let run = harness.wait_terminal(run.id).await;
    // One evaluator hanging is item-level data, not a run failure.
    assert_eq!(run.status, RunStatus::Success);

    let evaluators = harness.scores.run_evaluators_for_run(run.id).await.unwrap();
    let stalled = evaluators
        .iter()
        .find(|e| e.display_name == "stalls")
        .unwrap();
    assert_eq!(stalled.count, 1);
    assert_eq!(stalled.error_count, 1);
    let scores = harness
        .scores
        .scores_for_run_evaluator(stalled.id)
        .await
        .unwrap();
    assert!(scores[0].error.as_deref().unwrap().contains("timed out"));

    let healthy = evaluators
        .iter()
        .find(|e| e.display_name == "quality")
        .unwrap();
    assert_eq!(healthy.count, 1);
    assert_eq!(healthy.error_count, 0);
}

#[tokio::test]
async fn test_trace_fetch_failure_fails_the_run() {
    let harness = Harness::new(
        Arc::new(UnreachableTraceSource),
        vec![(
            definition("quality", EvaluatorLevel::Trace),
            Arc::new(ConstantEvaluator(0.8)),
        )],
    );
    let monitor = harness
        .save_due_future_monitor(vec![spec("quality")], 1.0)
        .await;

    harness.scheduler.tick().await.unwrap();
    let run = harness.only_run(&monitor).await;
    let run = harness.wait_terminal(run.id).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run
        .error_message
        .as_deref()
        .unwrap()
        .contains("connection refused"));
}

#[tokio::test]
async fn test_unknown_evaluator_fails_the_run() {
    let traces: Arc<dyn TraceSource> = Arc::new(StubTraceSource {
        traces: vec![trace("t-1", 0)],
    });
    // Catalog left empty: the run's snapshot can no longer be resolved.
    let harness = Harness::new(traces, vec![]);
    let monitor = harness
        .save_due_future_monitor(vec![spec("quality")], 1.0)
        .await;

    harness.scheduler.tick().await.unwrap();
    let run = harness.only_run(&monitor).await;
    let run = harness.wait_terminal(run.id).await;
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.as_deref().unwrap().contains("quality@1.0"));
}

#[tokio::test]
async fn test_sampling_is_deterministic_per_run() {
    // Ten traces with two spans each, one trace-level and one span-level
    // evaluator at a 0.5 sampling rate. The persisted counts must equal a
    // replay of the sampling decisions keyed by the same run id.
    let trace_set: Vec<Trace> = (0..10).map(|i| trace(&format!("t-{i}"), 2)).collect();
    let traces: Arc<dyn TraceSource> = Arc::new(StubTraceSource {
        traces: trace_set.clone(),
    });
    let harness = Harness::new(
        traces,
        vec![
            (
                definition("quality", EvaluatorLevel::Trace),
                Arc::new(ConstantEvaluator(0.9)),
            ),
            (
                definition("tool-use", EvaluatorLevel::Span),
                Arc::new(ConstantEvaluator(0.7)),
            ),
        ],
    );
    let monitor = harness
        .save_due_future_monitor(vec![spec("quality"), spec("tool-use")], 0.5)
        .await;

    harness.scheduler.tick().await.unwrap();
    let run = harness.only_run(&monitor).await;
    let run = harness.wait_terminal(run.id).await;
    assert_eq!(run.status, RunStatus::Success);

    let sampler = DeterministicSampler::new(run.id, 0.5);
    let expected_traces = trace_set
        .iter()
        .filter(|t| sampler.admits(&t.id.0))
        .count() as i64;
    let expected_spans = trace_set
        .iter()
        .flat_map(|t| t.spans.iter().map(move |s| format!("{}/{}", t.id.0, s.id.0)))
        .filter(|key| sampler.admits(key))
        .count() as i64;

    // An aggregate row only exists once its evaluator scored an item, so a
    // missing row means the sampler admitted nothing for that level.
    let evaluators = harness.scores.run_evaluators_for_run(run.id).await.unwrap();
    let count_for = |name: &str| {
        evaluators
            .iter()
            .find(|e| e.display_name == name)
            .map_or(0, |e| e.count)
    };
    assert_eq!(count_for("quality@1.0"), expected_traces);
    assert_eq!(count_for("tool-use@1.0"), expected_spans);
}

#[tokio::test]
async fn test_score_writes_are_idempotent() {
    let store = InMemoryStore::new();
    let scores: Arc<dyn ScoreRepository> = Arc::new(store);

    let run_id = MonitorRunId::new();
    let run_evaluator = RunEvaluator::new(run_id, "quality@1.0".into(), EvaluatorLevel::Trace);
    let id = scores.ensure_run_evaluator(&run_evaluator).await.unwrap();

    // Racing creator converges on the same row.
    let duplicate = RunEvaluator::new(run_id, "quality@1.0".into(), EvaluatorLevel::Trace);
    assert_eq!(scores.ensure_run_evaluator(&duplicate).await.unwrap(), id);

    let ts = Utc::now();
    let errored = Score::errored(id, TraceId("t-1".into()), None, "timeout".into(), ts);
    scores.record_score(&errored).await.unwrap();
    scores.record_score(&errored).await.unwrap();

    let after_retry = scores.run_evaluators_for_run(run_id).await.unwrap();
    assert_eq!(after_retry[0].count, 1);
    assert_eq!(after_retry[0].error_count, 1);

    // A retry that succeeds replaces the errored item and moves the counter.
    let replaced = Score::scored(id, TraceId("t-1".into()), None, 0.9, None, serde_json::Value::Null, ts);
    scores.record_score(&replaced).await.unwrap();

    let after_replace = scores.run_evaluators_for_run(run_id).await.unwrap();
    assert_eq!(after_replace[0].count, 1);
    assert_eq!(after_replace[0].error_count, 0);
    assert_eq!(scores.score_values(id).await.unwrap(), vec![0.9]);
}

#[tokio::test]
async fn test_absent_span_is_one_equivalence_class() {
    let store = InMemoryStore::new();
    let scores: Arc<dyn ScoreRepository> = Arc::new(store);

    let run_id = MonitorRunId::new();
    let run_evaluator = RunEvaluator::new(run_id, "quality@1.0".into(), EvaluatorLevel::Trace);
    let id = scores.ensure_run_evaluator(&run_evaluator).await.unwrap();

    let ts = Utc::now();
    let a = Score::scored(id, TraceId("t-1".into()), None, 0.4, None, serde_json::Value::Null, ts);
    let b = Score::scored(id, TraceId("t-1".into()), None, 0.6, None, serde_json::Value::Null, ts);
    scores.record_score(&a).await.unwrap();
    scores.record_score(&b).await.unwrap();

    // Same (evaluator, trace, no-span) key: the second write replaced the first.
    let stored = scores.scores_for_run_evaluator(id).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].score, Some(0.6));

    // A span-scoped score for the same trace is a distinct item.
    let c = Score::scored(
        id,
        TraceId("t-1".into()),
        Some(SpanId("s-1".into())),
        0.2,
        None,
        serde_json::Value::Null,
        ts,
    );
    scores.record_score(&c).await.unwrap();
    assert_eq!(scores.scores_for_run_evaluator(id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_stuck_runs_are_swept_and_dispatch_resumes() {
    let traces: Arc<dyn TraceSource> = Arc::new(StubTraceSource { traces: vec![] });
    let harness = Harness::new(
        traces,
        vec![(
            definition("quality", EvaluatorLevel::Trace),
            Arc::new(ConstantEvaluator(0.8)),
        )],
    );
    let monitor = harness
        .save_due_future_monitor(vec![spec("quality")], 1.0)
        .await;

    // A pending run created two hours ago, well past the 60 minute timeout.
    let mut stale = MonitorRun::dispatch(&monitor, Utc::now() - Duration::hours(3), Utc::now());
    stale.created_at = Utc::now() - Duration::hours(2);
    assert!(harness
        .runs
        .create_run_and_advance(&stale, None)
        .await
        .unwrap());

    let dispatched = harness.scheduler.tick().await.unwrap();

    let swept = harness.runs.find_by_id(stale.id).await.unwrap().unwrap();
    assert_eq!(swept.status, RunStatus::Failed);
    assert!(swept
        .error_message
        .as_deref()
        .unwrap()
        .contains("timeout"));
    // The sweep freed the monitor within the same tick.
    assert_eq!(dispatched, 1);
}

#[tokio::test]
async fn test_past_monitor_backfills_its_range_once() {
    let range_start = Utc::now() - Duration::days(7);
    let range_end = Utc::now() - Duration::days(1);

    let traces: Arc<dyn TraceSource> = Arc::new(StubTraceSource {
        traces: vec![trace("old-1", 0), trace("old-2", 0)],
    });
    let harness = Harness::new(
        traces,
        vec![(
            definition("quality", EvaluatorLevel::Trace),
            Arc::new(ConstantEvaluator(0.8)),
        )],
    );

    let monitor = Monitor::past(
        "incident-review".into(),
        "Incident Review".into(),
        OrgId(Uuid::new_v4()),
        ProjectId(Uuid::new_v4()),
        AgentId(Uuid::new_v4()),
        EnvironmentId(Uuid::new_v4()),
        vec![spec("quality")],
        range_start,
        range_end,
        1.0,
    )
    .unwrap();
    harness.monitors.save(&monitor).await.unwrap();

    // With a non-terminal run planted, dispatch refuses to create another.
    let mut planted = MonitorRun::dispatch(&monitor, range_start, range_end);
    assert!(harness
        .runs
        .create_run_and_advance(&planted, None)
        .await
        .unwrap());
    assert!(harness
        .scheduler
        .dispatch_past(&monitor)
        .await
        .unwrap()
        .is_none());

    planted.fail("operator cancelled".into()).unwrap();
    harness.runs.save(&planted).await.unwrap();

    let run_id = harness
        .scheduler
        .dispatch_past(&monitor)
        .await
        .unwrap()
        .expect("backfill run should be created");

    let run = harness.wait_terminal(run_id).await;
    assert_eq!(run.status, RunStatus::Success);
    // Backfills use the stored range verbatim.
    assert_eq!(run.trace_start, range_start);
    assert_eq!(run.trace_end, range_end);

    // Past monitors never become due for the polling loop.
    let dispatched = harness.scheduler.tick().await.unwrap();
    assert_eq!(dispatched, 0);
}

#[tokio::test]
async fn test_executor_skips_runs_already_picked_up() {
    let traces: Arc<dyn TraceSource> = Arc::new(StubTraceSource {
        traces: vec![trace("t-1", 0)],
    });
    let harness = Harness::new(
        traces,
        vec![(
            definition("quality", EvaluatorLevel::Trace),
            Arc::new(ConstantEvaluator(0.8)),
        )],
    );
    let monitor = harness
        .save_due_future_monitor(vec![spec("quality")], 1.0)
        .await;

    harness.scheduler.tick().await.unwrap();
    let run = harness.only_run(&monitor).await;
    let run = harness.wait_terminal(run.id).await;

    // A second hand-off of the same run leaves the terminal state untouched.
    let evaluators_before = harness.scores.run_evaluators_for_run(run.id).await.unwrap();
    harness.scheduler.tick().await.unwrap();
    let unchanged = harness.runs.find_by_id(run.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, RunStatus::Success);
    assert_eq!(
        harness.scores.run_evaluators_for_run(run.id).await.unwrap()[0].count,
        evaluators_before[0].count
    );
}
