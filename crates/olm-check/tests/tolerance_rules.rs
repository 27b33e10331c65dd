use olm_check::{Tally, Tolerance};
use olm_core::errors::OlmError;

fn tolerance() -> Tolerance {
    Tolerance {
        eps0: 1e-12,
        epsa: 1e-6,
        epsr: 1e-3,
        ..Tolerance::default()
    }
}

#[test]
fn relative_branch_accepts_small_relative_error() {
    let tol = tolerance();
    // 3e-6 absolute exceeds epsa but is well inside epsr * 1.0
    assert!(tol.passes(1.0, 1.000003));
    assert!(!tol.passes(1.0, 1.01));
}

#[test]
fn absolute_and_zero_branches() {
    let tol = tolerance();
    assert!(tol.passes(0.0, 5e-7));
    assert!(tol.passes(0.0, 1e-13));
    assert!(!tol.passes(0.0, 2e-6));
    assert!(!tol.passes(1.0, f64::NAN));
}

#[test]
fn loose_criterion_scales_thresholds() {
    let tol = tolerance();
    assert!(!tol.passes(1.0, 1.005));
    assert!(tol.passes_loose(1.0, 1.005));
    assert!(!tol.passes_loose(1.0, 1.02));
}

#[test]
fn seven_of_ten_meets_q1_of_seventy_percent() {
    let tol = Tolerance {
        target_q1: 0.70,
        target_q2: 0.95,
        ..tolerance()
    };
    let mut tally = Tally::default();
    for _ in 0..7 {
        tally.record(&tol, 1.0, 1.0000001);
    }
    // tight failures that still pass the loose criterion
    for _ in 0..3 {
        tally.record(&tol, 1.0, 1.004);
    }
    assert_eq!(tally.total, 10);
    assert_eq!(tally.tight, 7);
    assert_eq!(tally.loose, 10);
    assert!((tally.tight_fraction() - 0.7).abs() < 1e-12);
    assert!(tol.accepts(&tally));

    let mut short = Tally::default();
    for _ in 0..6 {
        short.record(&tol, 1.0, 1.0);
    }
    for _ in 0..4 {
        short.record(&tol, 1.0, 1.004);
    }
    assert!(!tol.accepts(&short));
}

#[test]
fn loose_target_is_enforced_independently() {
    let tol = Tolerance {
        target_q1: 0.5,
        target_q2: 0.95,
        ..tolerance()
    };
    let mut tally = Tally::default();
    for _ in 0..9 {
        tally.record(&tol, 1.0, 1.0);
    }
    tally.record(&tol, 1.0, 2.0);
    assert!((tally.loose_fraction() - 0.9).abs() < 1e-12);
    assert!(!tol.accepts(&tally));
    assert!((tally.max_abs - 1.0).abs() < 1e-12);
}

#[test]
fn empty_tally_is_accepted() {
    assert!(tolerance().accepts(&Tally::default()));
}

#[test]
fn invalid_tolerances_are_configuration_errors() {
    let bad = [
        Tolerance { epsa: -1.0, ..Tolerance::default() },
        Tolerance { epsr: f64::INFINITY, ..Tolerance::default() },
        Tolerance { target_q1: 1.5, ..Tolerance::default() },
        Tolerance { loose_factor: 0.5, ..Tolerance::default() },
    ];
    for tolerance in bad {
        let err = tolerance.validate().expect_err("invalid");
        assert!(matches!(err, OlmError::Configuration(_)));
        assert_eq!(err.info().code, "tolerance_invalid");
    }
    Tolerance::default().validate().expect("defaults are valid");
}
