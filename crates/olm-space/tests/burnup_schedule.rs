use olm_core::errors::OlmError;
use olm_space::{BurnupSchedule, BurnupSpec};

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() <= 1e-12, "{actual:?} != {expected:?}");
    }
}

#[test]
fn time_deltas_follow_burnup_over_power() -> Result<(), OlmError> {
    let schedule = BurnupSchedule::new(&[0.0, 0.04, 1.04], 40.0)?;
    assert_close(&schedule.delta_times(), &[0.0, 0.001, 0.025]);
    let times: Vec<f64> = schedule.steps().iter().map(|s| s.time).collect();
    assert_close(&times, &[0.0, 0.001, 0.026]);
    assert_eq!(schedule.len(), 3);
    assert_eq!(schedule.specific_power(), 40.0);
    Ok(())
}

#[test]
fn nonzero_first_checkpoint_fails() {
    let err = BurnupSchedule::new(&[0.04, 1.04], 40.0).unwrap_err();
    assert!(matches!(err, OlmError::Configuration(ref info) if info.code == "burnup_nonzero_start"));
}

#[test]
fn non_increasing_checkpoints_fail() {
    let err = BurnupSchedule::new(&[0.0, 10.0, 10.0], 40.0).unwrap_err();
    assert_eq!(err.info().code, "burnup_not_increasing");
    let err = BurnupSchedule::new(&[0.0, 10.0, 5.0], 40.0).unwrap_err();
    assert_eq!(err.info().context.get("index").map(String::as_str), Some("2"));
}

#[test]
fn non_positive_power_fails() {
    for power in [0.0, -1.0, f64::NAN] {
        let err = BurnupSchedule::new(&[0.0, 1.0], power).unwrap_err();
        assert_eq!(err.info().code, "burnup_power_invalid");
    }
    assert_eq!(
        BurnupSchedule::new(&[], 40.0).unwrap_err().info().code,
        "burnup_empty"
    );
}

#[test]
fn power_override_derives_a_copy() -> Result<(), OlmError> {
    let base = BurnupSchedule::new(&[0.0, 100.0, 300.0], 50.0)?;
    let derived = base.with_specific_power(25.0)?;
    assert_eq!(base.burnups(), derived.burnups());
    assert_close(&base.delta_times(), &[0.0, 2.0, 4.0]);
    assert_close(&derived.delta_times(), &[0.0, 4.0, 8.0]);
    assert!(base.with_specific_power(0.0).is_err());
    Ok(())
}

#[test]
fn spec_scaling_and_units() -> Result<(), OlmError> {
    let spec: BurnupSpec = serde_json::from_value(serde_json::json!({
        "checkpoints": [0.0, 0.5, 1.0],
        "specific_power": 25.0,
        "burnup_scale": 1000.0,
        "burnup_unit": "MWd/MTU"
    }))
    .expect("spec");
    let schedule = BurnupSchedule::from_spec(&spec)?;
    assert_eq!(schedule.burnups(), vec![0.0, 500.0, 1000.0]);
    assert_close(&schedule.delta_times(), &[0.0, 20.0, 20.0]);
    assert_eq!(schedule.burnup_unit(), "MWd/MTU");
    assert_eq!(schedule.time_unit(), "days");
    Ok(())
}
