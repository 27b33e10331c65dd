use std::sync::atomic::{AtomicUsize, Ordering};

use olm_core::errors::OlmError;
use olm_run::{
    case_fingerprint, AnalyticSolver, CaseState, JobGraph, JobId, JobKind, JobNode,
    JsonTemplater, RunOpts, RunReport, Runner, Solver, SolverFailure, StepOutput, StepRequest,
    Templater, WorkDir,
};
use olm_space::{Axis, BurnupSchedule, CaseSet, ExpansionStrategy, StateSpace, StaticParams};

fn case_set() -> CaseSet {
    case_set_with(&[0.0, 500.0, 1500.0, 3000.0])
}

fn case_set_with(checkpoints: &[f64]) -> CaseSet {
    let axes = vec![Axis::new("enrichment", vec![2.0, 3.0, 4.0], "wt%").expect("axis")];
    let space = StateSpace::new(axes, ExpansionStrategy::Grid).expect("space");
    let schedule = BurnupSchedule::new(checkpoints, 25.0).expect("schedule");
    CaseSet::new(space, schedule, None, StaticParams::new()).expect("cases")
}

fn counting() -> Counting<AnalyticSolver> {
    Counting {
        inner: AnalyticSolver::default(),
        calls: AtomicUsize::new(0),
        fail_case: None,
    }
}

struct Counting<S> {
    inner: S,
    calls: AtomicUsize,
    fail_case: Option<usize>,
}

impl<S: Solver> Solver for Counting<S> {
    fn execute(&self, request: &StepRequest<'_>) -> Result<StepOutput, SolverFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if Some(request.case.index()) == self.fail_case && request.step.index == 1 {
            return Err(SolverFailure::new("license", "solver license unavailable"));
        }
        self.inner.execute(request)
    }
}

#[test]
fn dry_run_reports_plan_without_dispatch() {
    let cases = case_set();
    let plan = Runner::new(RunOpts {
        concurrency: 0,
        ..RunOpts::default()
    })
    .plan(&cases)
    .expect("plan");
    assert_eq!(plan.cases, 3);
    assert_eq!(plan.steps, 12);
    assert_eq!(plan.jobs.len(), 15);
    assert_eq!(plan.concurrency, 1);
    // four chained steps plus the aggregate
    assert_eq!(plan.critical_path, 5);
    assert_eq!(plan.waves[0].len(), 3);
    assert!(plan
        .waves
        .last()
        .expect("waves")
        .iter()
        .all(|id| matches!(plan.jobs[id.0].kind, JobKind::Aggregate { .. })));
}

#[test]
fn graph_validation_detects_cycles_and_broken_chains() {
    let cases = case_set();
    let graph = JobGraph::build(&cases);
    graph.validate().expect("built graph is valid");

    let mut nodes: Vec<JobNode> = graph.nodes().to_vec();
    nodes[1].deps.push(JobId(2));
    let err = JobGraph::from_nodes(nodes).validate().expect_err("cycle");
    assert!(matches!(err, OlmError::Configuration(_)));
    assert_eq!(err.info().code, "graph_cycle");

    let mut nodes: Vec<JobNode> = graph.nodes().to_vec();
    nodes[2].deps.clear();
    let err = JobGraph::from_nodes(nodes).validate().expect_err("broken chain");
    assert_eq!(err.info().code, "graph_broken_chain");

    let mut nodes: Vec<JobNode> = graph.nodes().to_vec();
    nodes[1].deps = vec![JobId(99)];
    let err = JobGraph::from_nodes(nodes).validate().expect_err("dangling");
    assert_eq!(err.info().code, "graph_dangling_dependency");

    // drop the first case's aggregate and renumber the rest
    let mut nodes: Vec<JobNode> = graph.nodes().to_vec();
    nodes.remove(4);
    for (position, node) in nodes.iter_mut().enumerate() {
        node.id = JobId(position);
        for dep in &mut node.deps {
            if dep.0 > 4 {
                dep.0 -= 1;
            }
        }
    }
    let err = JobGraph::from_nodes(nodes).validate().expect_err("missing aggregate");
    assert_eq!(err.info().code, "graph_aggregate_count");
}

#[test]
fn resume_reruns_only_incomplete_cases() {
    let cases = case_set();
    let temp = tempfile::tempdir().expect("tmp dir");
    let opts = RunOpts {
        concurrency: 2,
        resume: false,
        work_dir: Some(temp.path().to_path_buf()),
    };

    let first = Counting {
        inner: AnalyticSolver::default(),
        calls: AtomicUsize::new(0),
        fail_case: Some(2),
    };
    let initial = Runner::new(opts.clone())
        .run(&cases, &JsonTemplater, &first)
        .expect("initial run");
    assert!(!initial.report.success);
    assert_eq!(first.calls.load(Ordering::SeqCst), 4 + 4 + 2);

    let store = WorkDir::open(temp.path()).expect("work dir");
    let status = store.read_status(&cases.ids()[2]).expect("read").expect("status");
    assert_eq!(status.state, CaseState::Failed);
    assert_eq!(status.steps_completed, 1);
    assert!(temp.path().join(cases.ids()[0].as_str()).join("input.json").exists());
    let bytes = std::fs::read(temp.path().join("run_report.json")).expect("report");
    let persisted: RunReport = olm_core::serde::from_json_slice(&bytes).expect("parse");
    assert_eq!(persisted.summary, initial.report.summary);

    let second = Counting {
        inner: AnalyticSolver::default(),
        calls: AtomicUsize::new(0),
        fail_case: None,
    };
    let resumed = Runner::new(RunOpts {
        resume: true,
        ..opts
    })
    .run(&cases, &JsonTemplater, &second)
    .expect("resumed run");
    assert!(resumed.report.success);
    assert_eq!(second.calls.load(Ordering::SeqCst), 4);
    assert_eq!(resumed.report.summary.resumed_cases, 2);
    assert_eq!(resumed.results[0], initial.results[0]);
    assert_eq!(resumed.completed().count(), 3);
}

#[test]
fn resume_reruns_cases_whose_schedule_changed() {
    let temp = tempfile::tempdir().expect("tmp dir");
    let opts = RunOpts {
        concurrency: 2,
        resume: true,
        work_dir: Some(temp.path().to_path_buf()),
    };

    let before = case_set_with(&[0.0, 1000.0, 2000.0]);
    let first = counting();
    Runner::new(opts.clone())
        .run(&before, &JsonTemplater, &first)
        .expect("initial run");
    assert_eq!(first.calls.load(Ordering::SeqCst), 9);

    let after = case_set_with(&[0.0, 5000.0, 9000.0]);
    assert_eq!(before.ids(), after.ids());
    let second = counting();
    let rerun = Runner::new(opts.clone())
        .run(&after, &JsonTemplater, &second)
        .expect("rerun");
    assert_eq!(second.calls.load(Ordering::SeqCst), 9);
    assert_eq!(rerun.report.summary.resumed_cases, 0);
    for result in &rerun.results {
        let times: Vec<f64> = result.case.schedule.steps().iter().map(|s| s.time).collect();
        let expected: Vec<f64> = after.base_schedule().steps().iter().map(|s| s.time).collect();
        assert_eq!(times, expected);
        assert_eq!(result.outputs.len(), 3);
    }
    let fresh = Runner::new(RunOpts {
        work_dir: None,
        resume: false,
        ..opts.clone()
    })
    .run(&after, &JsonTemplater, &AnalyticSolver::default())
    .expect("fresh run");
    assert_eq!(rerun.results, fresh.results);

    // unchanged inputs are reused on the next resume
    let third = counting();
    let reused = Runner::new(opts)
        .run(&after, &JsonTemplater, &third)
        .expect("resume");
    assert_eq!(third.calls.load(Ordering::SeqCst), 0);
    assert_eq!(reused.report.summary.resumed_cases, 3);
}

#[test]
fn status_without_matching_fingerprint_is_not_reused() {
    let cases = case_set();
    let temp = tempfile::tempdir().expect("tmp dir");
    Runner::new(RunOpts {
        concurrency: 1,
        resume: false,
        work_dir: Some(temp.path().to_path_buf()),
    })
    .run(&cases, &JsonTemplater, &AnalyticSolver::default())
    .expect("run");

    let store = WorkDir::open(temp.path()).expect("work dir");
    let case = cases.get(0).expect("case");
    let input = JsonTemplater.render(&case).expect("render");
    let fingerprint = case_fingerprint(&case, &input).expect("fingerprint");
    assert!(store
        .load_complete(&case.id, 4, &fingerprint)
        .expect("load")
        .is_some());
    assert!(store
        .load_complete(&case.id, 4, "0000")
        .expect("load")
        .is_none());

    let mut status = store.read_status(&case.id).expect("read").expect("status");
    status.fingerprint = None;
    store.write_status(&case.id, &status).expect("write");
    assert!(store
        .load_complete(&case.id, 4, &fingerprint)
        .expect("load")
        .is_none());
}

#[test]
fn persistence_failure_still_writes_the_run_report() {
    let cases = case_set();
    let temp = tempfile::tempdir().expect("tmp dir");
    // a directory where a step file should go makes that write fail
    let blocked = temp.path().join(cases.ids()[1].as_str()).join("step_2.json");
    std::fs::create_dir_all(&blocked).expect("blocker");

    let err = Runner::new(RunOpts {
        concurrency: 2,
        resume: false,
        work_dir: Some(temp.path().to_path_buf()),
    })
    .run(&cases, &JsonTemplater, &AnalyticSolver::default())
    .expect_err("step write fails");
    assert!(matches!(err, OlmError::Io(_)));
    assert_eq!(err.info().code, "json_write");

    let bytes = std::fs::read(temp.path().join("run_report.json")).expect("report");
    let persisted: RunReport = olm_core::serde::from_json_slice(&bytes).expect("parse");
    assert_eq!(persisted.summary.succeeded, 15);
    for id in [&cases.ids()[0], &cases.ids()[2]] {
        let step = temp.path().join(id.as_str()).join("step_3.json");
        assert!(step.exists());
    }
}
