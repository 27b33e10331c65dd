use olm_core::errors::{ErrorInfo, OlmError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("axis", "enrichment")
        .with_context("reason", "example")
}

#[test]
fn configuration_error_surface() {
    let err = OlmError::Configuration(sample_info("axis_empty", "axis has no values"));
    assert_eq!(err.info().code, "axis_empty");
    assert!(err.info().context.contains_key("axis"));
    assert!(err.is_fatal());
}

#[test]
fn external_error_is_not_fatal() {
    let err = OlmError::External(sample_info("solver_exit", "solver exited with 3"));
    assert_eq!(err.info().code, "solver_exit");
    assert!(!err.is_fatal());
}

#[test]
fn incomplete_grid_error_surface() {
    let err = OlmError::IncompleteGrid(sample_info("grid_missing", "missing combination"));
    assert!(err.info().context.contains_key("reason"));
    assert!(err.is_fatal());
}

#[test]
fn tolerance_error_is_reported_not_fatal() {
    let err = OlmError::Tolerance(sample_info("check_failed", "low order check failed"));
    assert!(!err.is_fatal());
}

#[test]
fn display_includes_context_and_hint() {
    let err = OlmError::Schema(
        ErrorInfo::new("dim_unmapped", "axis is not mapped")
            .with_context("axis", "coolant_density")
            .with_hint("add it to dim_map or selection_axes"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("schema error: axis is not mapped (code: dim_unmapped)"));
    assert!(rendered.contains("axis=coolant_density"));
    assert!(rendered.contains("hint: add it to dim_map"));
}

#[test]
fn errors_round_trip_through_json() {
    let err = OlmError::Io(sample_info("read", "missing file"));
    let json = serde_json::to_string(&err).expect("serialize");
    assert!(json.contains("\"family\":\"Io\""));
    let decoded: OlmError = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(decoded, err);
}
