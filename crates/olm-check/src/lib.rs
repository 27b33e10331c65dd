#![deny(missing_docs)]
#![doc = "Consistency checks comparing an assembled library against full-resolution run outputs."]

use std::collections::BTreeSet;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_lib::Library;
use tracing::{info, warn};

/// Check kinds and their evaluation.
pub mod checks;
/// Full-resolution reference outputs.
pub mod reference;
/// Check results and aggregated reports.
pub mod report;
/// Tight and loose acceptance criteria.
pub mod tolerance;

pub use checks::{CheckKind, CheckSpec};
pub use reference::{ReferenceCase, ReferenceSet};
pub use report::{CheckReport, CheckResult, Deviation};
pub use tolerance::{Tally, Tolerance};

/// Runs a fixed list of checks against a library.
#[derive(Debug, Clone)]
pub struct ConsistencyChecker {
    checks: Vec<CheckSpec>,
}

impl ConsistencyChecker {
    /// Validates tolerances and requires unique check names.
    pub fn new(checks: Vec<CheckSpec>) -> Result<Self, OlmError> {
        let mut names = BTreeSet::new();
        for check in &checks {
            check.tolerance.validate().map_err(|err| match err {
                OlmError::Configuration(info) => {
                    OlmError::Configuration(info.with_context("check", check.display_name()))
                }
                other => other,
            })?;
            if !names.insert(check.display_name().to_string()) {
                return Err(OlmError::Configuration(
                    ErrorInfo::new(
                        "check_duplicate_name",
                        format!("check `{}` is declared twice", check.display_name()),
                    )
                    .with_context("check", check.display_name()),
                ));
            }
        }
        Ok(Self { checks })
    }

    /// Configured checks.
    pub fn checks(&self) -> &[CheckSpec] {
        &self.checks
    }

    /// Evaluates every check; a failing check never stops the others.
    pub fn run(&self, library: &Library, reference: &ReferenceSet) -> Result<CheckReport, OlmError> {
        let mut results = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let result = check.check(library, reference);
            if result.pass {
                info!(
                    check = %result.name,
                    comparisons = result.comparisons,
                    tight = result.tight_fraction,
                    loose = result.loose_fraction,
                    "check passed"
                );
            } else {
                warn!(
                    check = %result.name,
                    comparisons = result.comparisons,
                    note = result.note.as_deref().unwrap_or_default(),
                    "check failed"
                );
            }
            results.push(result);
        }
        CheckReport::new(library.name.clone(), results)
    }
}
