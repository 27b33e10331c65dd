use std::collections::BTreeMap;

use olm_check::{
    CheckKind, CheckSpec, ConsistencyChecker, ReferenceSet, Tolerance,
};
use olm_core::errors::OlmError;
use olm_core::provenance::RunProvenance;
use olm_lib::{Assembler, AssemblySpec, Library};
use olm_run::{
    AnalyticSolver, JsonTemplater, Quantity, RunOpts, Runner, Solver, SolverFailure, StepOutput,
    StepRequest,
};
use olm_space::{Axis, BurnupSchedule, CaseSet, ExpansionStrategy, StateSpace, StaticParams};

/// Reports quantities that are exactly linear in burnup and in each coordinate.
struct LinearSolver;

impl Solver for LinearSolver {
    fn execute(&self, request: &StepRequest<'_>) -> Result<StepOutput, SolverFailure> {
        let point = &request.case.point;
        let e = point.value("enrichment").unwrap_or_default();
        let m = point.value("mod_dens").unwrap_or_default();
        let b = request.step.burnup;
        let mut quantities = BTreeMap::new();
        quantities.insert(
            "flux".to_string(),
            Quantity::Scalar(2.0 * e + 3.0 * m + 1e-3 * b + 1.0),
        );
        quantities.insert(
            "inventory".to_string(),
            Quantity::Vector(vec![e - 1e-4 * b + 5.0, m + 1e-5 * b + 5.0]),
        );
        Ok(StepOutput {
            quantities,
            ..StepOutput::default()
        })
    }
}

fn build(
    enrichments: Vec<f64>,
    solver: &dyn Solver,
    keep_every: usize,
) -> (Library, ReferenceSet) {
    let axes = vec![
        Axis::new("enrichment", enrichments, "wt%").expect("axis"),
        Axis::new("mod_dens", vec![0.3, 0.5, 0.7], "g/cc").expect("axis"),
    ];
    let space = StateSpace::new(axes, ExpansionStrategy::Grid).expect("space");
    let schedule = BurnupSchedule::new(
        &[0.0, 1000.0, 2000.0, 4000.0, 8000.0, 12000.0, 16000.0],
        40.0,
    )
    .expect("schedule");
    let cases = CaseSet::new(space, schedule, None, StaticParams::new()).expect("cases");
    let outcome = Runner::new(RunOpts {
        concurrency: 2,
        ..RunOpts::default()
    })
    .run(&cases, &JsonTemplater, solver)
    .expect("run");
    let mut dim_map = BTreeMap::new();
    dim_map.insert("enrichment".to_string(), "enrichment".to_string());
    dim_map.insert("mod_dens".to_string(), "mod_dens".to_string());
    let library = Assembler::new(AssemblySpec {
        name: "test".to_string(),
        dim_map,
        selection_axes: Vec::new(),
        keep_every,
        fuel_type: None,
    })
    .expect("assembler")
    .assemble(cases.space(), &outcome.results, RunProvenance::default())
    .expect("library");
    (library, ReferenceSet::from_results(&outcome.results))
}

fn spec(name: &str, kind: CheckKind, quantities: &[&str]) -> CheckSpec {
    CheckSpec {
        name: name.to_string(),
        kind,
        quantities: quantities.iter().map(|q| q.to_string()).collect(),
        tolerance: Tolerance::default(),
    }
}

#[test]
fn linear_data_passes_both_checks() -> Result<(), OlmError> {
    let (library, reference) = build(vec![1.5, 3.0, 4.5], &LinearSolver, 2);
    let checker = ConsistencyChecker::new(vec![
        CheckSpec::new(CheckKind::LowOrderConsistency),
        CheckSpec::new(CheckKind::GridGradient),
    ])?;
    let report = checker.run(&library, &reference)?;
    assert!(report.pass, "{report:?}");
    report.ensure_passed()?;

    let low = &report.checks[0];
    // kept steps 0, 2, 4, 6 leave steps 1, 3 and 5 for 9 points and 3 components
    assert_eq!(low.comparisons, 9 * 3 * 3);
    assert!(low.max_rel_deviation < 1e-9);

    let grid = &report.checks[1];
    // one interior value per axis line: 3 lines per axis, 2 axes, 4 entries, 3 components
    assert_eq!(grid.comparisons, 2 * 3 * 4 * 3);
    assert!(grid.note.is_none());
    Ok(())
}

#[test]
fn failures_are_reported_without_stopping_other_checks() -> Result<(), OlmError> {
    let (library, reference) = build(vec![1.5, 3.0, 4.5], &AnalyticSolver::default(), 3);
    let strict = Tolerance {
        epsa: 0.0,
        epsr: 1e-9,
        target_q1: 1.0,
        target_q2: 1.0,
        ..Tolerance::default()
    };
    let mut curved = spec("u235-burnup", CheckKind::LowOrderConsistency, &["u235"]);
    curved.tolerance = strict;
    let checker = ConsistencyChecker::new(vec![
        curved,
        spec("time-burnup", CheckKind::LowOrderConsistency, &["time"]),
        spec("unknown", CheckKind::GridGradient, &["xenon"]),
        spec("time-grid", CheckKind::GridGradient, &["time"]),
    ])?;
    let report = checker.run(&library, &reference)?;
    assert_eq!(report.checks.len(), 4);
    assert!(!report.pass);

    let by_name: BTreeMap<&str, _> = report
        .checks
        .iter()
        .map(|check| (check.name.as_str(), check))
        .collect();
    let curved = by_name["u235-burnup"];
    assert!(!curved.pass);
    assert!(curved.comparisons > 0);
    let worst = curved.worst.as_ref().expect("worst deviation");
    assert_eq!(worst.quantity, "u235");
    assert!(curved.note.as_deref().unwrap_or_default().contains("tight"));

    assert!(by_name["time-burnup"].pass);
    let unknown = by_name["unknown"];
    assert!(!unknown.pass);
    assert!(unknown.note.as_deref().unwrap_or_default().contains("xenon"));
    assert!(by_name["time-grid"].pass);

    match report.ensure_passed() {
        Err(OlmError::Tolerance(info)) => {
            assert!(info.context.contains_key("u235-burnup"));
            assert!(info.context.contains_key("unknown"));
            assert!(!info.context.contains_key("time-grid"));
        }
        other => panic!("expected tolerance failure, got {other:?}"),
    }
    Ok(())
}

#[test]
fn empty_comparisons_pass_with_note() -> Result<(), OlmError> {
    let (library, reference) = build(vec![1.5, 4.5], &LinearSolver, 1);
    let report = ConsistencyChecker::new(vec![
        CheckSpec::new(CheckKind::LowOrderConsistency),
        spec("enrichment-only", CheckKind::GridGradient, &["flux"]),
    ])?
    .run(&library, &reference)?;
    // nothing decimated
    assert_eq!(report.checks[0].comparisons, 0);
    assert!(report.checks[0].pass);
    assert!(report.checks[0].note.is_some());
    // mod_dens still has an interior value even though enrichment has none
    assert_eq!(report.checks[1].comparisons, 2 * 7);
    assert!(report.pass);
    Ok(())
}

#[test]
fn missing_reference_fails_the_check() -> Result<(), OlmError> {
    let (library, _) = build(vec![1.5, 3.0, 4.5], &LinearSolver, 2);
    let report = ConsistencyChecker::new(vec![CheckSpec::new(CheckKind::LowOrderConsistency)])?
        .run(&library, &ReferenceSet::default())?;
    assert!(!report.pass);
    let note = report.checks[0].note.as_deref().unwrap_or_default();
    assert!(note.contains("no reference output"), "{note}");
    Ok(())
}

#[test]
fn checker_rejects_duplicate_names_and_bad_tolerances() {
    let err = ConsistencyChecker::new(vec![
        CheckSpec::new(CheckKind::GridGradient),
        CheckSpec::new(CheckKind::GridGradient),
    ])
    .expect_err("duplicate");
    assert_eq!(err.info().code, "check_duplicate_name");

    let mut bad = CheckSpec::new(CheckKind::GridGradient);
    bad.tolerance.target_q2 = 2.0;
    let err = ConsistencyChecker::new(vec![bad]).expect_err("tolerance");
    assert_eq!(err.info().context["check"], "grid_gradient");
}

#[test]
fn check_specs_parse_from_yaml() {
    let yaml = r#"
- type: low_order_consistency
  quantities: [u235]
  tolerance:
    epsr: 0.01
    target_q1: 0.8
- name: grid
  type: grid_gradient
"#;
    let specs: Vec<CheckSpec> = serde_yaml::from_str(yaml).expect("yaml");
    assert_eq!(specs[0].display_name(), "low_order_consistency");
    assert_eq!(specs[0].tolerance.epsr, 0.01);
    assert_eq!(specs[0].tolerance.epsa, 1e-6);
    assert_eq!(specs[0].tolerance.loose_factor, 10.0);
    assert_eq!(specs[1].kind, CheckKind::GridGradient);
    assert_eq!(specs[1].tolerance, Tolerance::default());
}
