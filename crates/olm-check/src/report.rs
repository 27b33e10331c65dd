use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::hash::stable_hash_string;
use olm_core::serde::to_canonical_json_bytes;
use serde::{Deserialize, Serialize};

use crate::checks::CheckKind;
use crate::tolerance::Tolerance;

/// Largest deviation seen by a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deviation {
    /// Where the comparison was made.
    pub location: String,
    /// Quantity compared.
    pub quantity: String,
    /// Reference value.
    pub expected: f64,
    /// Interpolated value.
    pub actual: f64,
}

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Check name.
    pub name: String,
    /// Check kind.
    pub kind: CheckKind,
    /// Whether the acceptance criterion was met.
    pub pass: bool,
    /// Number of comparisons made.
    pub comparisons: usize,
    /// Fraction passing the tight criterion.
    pub tight_fraction: f64,
    /// Fraction passing the loose criterion.
    pub loose_fraction: f64,
    /// Largest absolute deviation.
    pub max_abs_deviation: f64,
    /// Largest relative deviation.
    pub max_rel_deviation: f64,
    /// The comparison with the largest relative deviation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worst: Option<Deviation>,
    /// Thresholds applied.
    pub tolerance: Tolerance,
    /// Explanation for empty, failed or unevaluable checks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// All check results for one library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckReport {
    /// Content hash of the results.
    pub analysis_hash: String,
    /// Name of the checked library.
    pub library: String,
    /// True only when every check passed.
    pub pass: bool,
    /// Results in configuration order.
    pub checks: Vec<CheckResult>,
}

impl CheckReport {
    /// Aggregates results and computes the content hash.
    pub fn new(library: impl Into<String>, checks: Vec<CheckResult>) -> Result<Self, OlmError> {
        let library = library.into();
        let analysis_hash = stable_hash_string(&(&library, &checks))?;
        Ok(Self {
            analysis_hash,
            pass: checks.iter().all(|check| check.pass),
            library,
            checks,
        })
    }

    /// Failing checks.
    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|check| !check.pass)
    }

    /// Converts a failing report into a tolerance error naming each failed check.
    pub fn ensure_passed(&self) -> Result<(), OlmError> {
        if self.pass {
            return Ok(());
        }
        let failed: Vec<&CheckResult> = self.failures().collect();
        let mut info = ErrorInfo::new(
            "checks_failed",
            format!(
                "{} of {} consistency checks failed for library `{}`",
                failed.len(),
                self.checks.len(),
                self.library
            ),
        );
        for check in failed {
            info = info.with_context(
                check.name.clone(),
                check.note.clone().unwrap_or_else(|| "failed".to_string()),
            );
        }
        Err(OlmError::Tolerance(info))
    }

    /// Canonical JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, OlmError> {
        to_canonical_json_bytes(self)
    }
}
