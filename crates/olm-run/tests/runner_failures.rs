use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use olm_core::errors::OlmError;
use olm_run::{
    AnalyticSolver, JobKind, JobState, JsonTemplater, Quantity, RunOpts, Runner, Solver,
    SolverFailure, StepOutput, StepRequest,
};
use olm_space::{Axis, BurnupSchedule, CaseSet, ExpansionStrategy, StateSpace, StaticParams};

fn case_set() -> CaseSet {
    let axes = vec![
        Axis::new("enrichment", vec![1.5, 3.0, 4.5], "wt%").expect("axis"),
        Axis::new("mod_dens", vec![0.3, 0.7], "g/cc").expect("axis"),
    ];
    let space = StateSpace::new(axes, ExpansionStrategy::Grid).expect("space");
    let schedule =
        BurnupSchedule::new(&[0.0, 1000.0, 5000.0, 10000.0, 20000.0], 40.0).expect("schedule");
    CaseSet::new(space, schedule, None, StaticParams::new()).expect("cases")
}

/// Fails step 2 of the case at `fail_case` and counts every invocation.
struct FlakySolver {
    fail_case: usize,
    calls: AtomicUsize,
}

impl Solver for FlakySolver {
    fn execute(&self, request: &StepRequest<'_>) -> Result<StepOutput, SolverFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.case.index() == self.fail_case && request.step.index == 2 {
            return Err(SolverFailure::new("diverged", "depletion did not converge"));
        }
        let mut quantities = BTreeMap::new();
        quantities.insert("burnup".to_string(), Quantity::Scalar(request.step.burnup));
        Ok(StepOutput {
            quantities,
            ..StepOutput::default()
        })
    }
}

#[test]
fn failed_step_skips_remaining_steps_of_its_case_only() {
    let cases = case_set();
    let solver = FlakySolver {
        fail_case: 1,
        calls: AtomicUsize::new(0),
    };
    let runner = Runner::new(RunOpts {
        concurrency: 3,
        ..RunOpts::default()
    });
    let outcome = runner.run(&cases, &JsonTemplater, &solver).expect("run");

    // case 1 runs steps 0..=2, the other five cases all five steps
    assert_eq!(solver.calls.load(Ordering::SeqCst), 3 + 5 * 5);
    assert!(!outcome.report.success);
    assert_eq!(outcome.report.summary.failed, 1);
    // steps 3 and 4 plus the aggregate
    assert_eq!(outcome.report.summary.skipped, 3);
    assert_eq!(outcome.report.failures.len(), 1);
    assert_eq!(outcome.report.failures[0].step, 2);
    assert_eq!(outcome.report.failures[0].case_id, cases.ids()[1]);

    for record in &outcome.report.jobs {
        let expected = match record.kind {
            JobKind::Step { case: 1, step } if step < 2 => JobState::Succeeded,
            JobKind::Step { case: 1, step: 2 } => JobState::Failed,
            JobKind::Step { case: 1, .. } | JobKind::Aggregate { case: 1 } => JobState::Skipped,
            _ => JobState::Succeeded,
        };
        assert_eq!(record.state, expected, "{:?}", record.kind);
    }

    assert_eq!(outcome.completed().count(), 5);
    let failed = &outcome.results[1];
    assert!(!failed.complete);
    assert!(failed.outputs.is_empty());
    for result in outcome.completed() {
        assert_eq!(result.outputs.len(), 5);
        assert_eq!(
            result.outputs[4].quantities["burnup"],
            Quantity::Scalar(20000.0)
        );
    }

    match outcome.report.ensure_success() {
        Err(OlmError::External(info)) => {
            assert_eq!(info.code, "run_failed");
            assert!(info.context.contains_key(cases.ids()[1].as_str()));
        }
        other => panic!("expected external failure, got {other:?}"),
    }
}

#[test]
fn panicking_solver_is_reported_as_failure() {
    struct Panics;
    impl Solver for Panics {
        fn execute(&self, request: &StepRequest<'_>) -> Result<StepOutput, SolverFailure> {
            if request.step.index == 1 {
                panic!("boom");
            }
            Ok(StepOutput::default())
        }
    }
    let cases = case_set();
    let outcome = Runner::new(RunOpts {
        concurrency: 2,
        ..RunOpts::default()
    })
    .run(&cases, &JsonTemplater, &Panics)
    .expect("run");
    assert_eq!(outcome.report.summary.failed, cases.len());
    assert_eq!(outcome.completed().count(), 0);
    assert!(outcome.report.failures[0].error.starts_with("solver_panic"));
}

#[test]
fn outputs_do_not_depend_on_concurrency() {
    let cases = case_set();
    let solver = AnalyticSolver::default();
    let serial = Runner::new(RunOpts {
        concurrency: 1,
        ..RunOpts::default()
    })
    .run(&cases, &JsonTemplater, &solver)
    .expect("serial");
    let parallel = Runner::new(RunOpts {
        concurrency: 4,
        ..RunOpts::default()
    })
    .run(&cases, &JsonTemplater, &solver)
    .expect("parallel");
    assert!(serial.report.success);
    assert_eq!(serial.results, parallel.results);
    assert_eq!(serial.report.jobs, parallel.report.jobs);
}

#[test]
fn analytic_solver_carries_state_between_steps() {
    let cases = case_set();
    let solver = AnalyticSolver::default();
    let outcome = Runner::new(RunOpts::default())
        .run(&cases, &JsonTemplater, &solver)
        .expect("run");
    for result in outcome.completed() {
        let scale = 1.0 + 0.01 * result.case.point.values().iter().sum::<f64>();
        for (output, step) in result.outputs.iter().zip(result.case.schedule.steps()) {
            let expected = (-4.0e-5 * scale * step.burnup).exp();
            let Quantity::Scalar(actual) = output.quantities["u235"] else {
                panic!("u235 must be scalar");
            };
            assert!((actual - expected).abs() < 1e-12, "{actual} vs {expected}");
            assert_eq!(output.quantities["inventory"].len(), 2);
        }
    }
}

#[test]
fn resume_requires_work_dir() {
    let err = Runner::new(RunOpts {
        resume: true,
        work_dir: None,
        ..RunOpts::default()
    })
    .run(&case_set(), &JsonTemplater, &AnalyticSolver::default())
    .expect_err("resume without work dir");
    assert_eq!(err.info().code, "resume_without_work_dir");
}
