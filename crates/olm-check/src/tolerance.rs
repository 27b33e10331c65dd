use olm_core::errors::{ErrorInfo, OlmError};
use serde::{Deserialize, Serialize};

/// Acceptance thresholds of one check.
///
/// A comparison passes when `|d| <= eps0`, `|d| <= epsa` or
/// `|d| <= epsr * max(|expected|, eps0)`. The loose criterion scales `epsa`
/// and `epsr` by `loose_factor`. A check passes when the tight pass fraction
/// reaches `target_q1` and the loose pass fraction reaches `target_q2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    /// Differences at or below this are treated as zero.
    #[serde(default = "Tolerance::default_eps0")]
    pub eps0: f64,
    /// Absolute tolerance.
    #[serde(default = "Tolerance::default_epsa")]
    pub epsa: f64,
    /// Relative tolerance.
    #[serde(default = "Tolerance::default_epsr")]
    pub epsr: f64,
    /// Required fraction of comparisons passing the tight criterion.
    #[serde(default = "Tolerance::default_target_q1")]
    pub target_q1: f64,
    /// Required fraction of comparisons passing the loose criterion.
    #[serde(default = "Tolerance::default_target_q2")]
    pub target_q2: f64,
    /// Multiplier applied to `epsa` and `epsr` for the loose criterion.
    #[serde(default = "Tolerance::default_loose_factor")]
    pub loose_factor: f64,
}

impl Tolerance {
    const fn default_eps0() -> f64 {
        1e-12
    }

    const fn default_epsa() -> f64 {
        1e-6
    }

    const fn default_epsr() -> f64 {
        1e-3
    }

    const fn default_target_q1() -> f64 {
        0.9
    }

    const fn default_target_q2() -> f64 {
        0.95
    }

    const fn default_loose_factor() -> f64 {
        10.0
    }

    /// Rejects negative or non-finite thresholds and targets outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), OlmError> {
        let thresholds = [("eps0", self.eps0), ("epsa", self.epsa), ("epsr", self.epsr)];
        for (name, value) in thresholds {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(name, value, "must be a finite non-negative number"));
            }
        }
        for (name, value) in [("target_q1", self.target_q1), ("target_q2", self.target_q2)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(name, value, "must lie in [0, 1]"));
            }
        }
        if !(self.loose_factor.is_finite() && self.loose_factor >= 1.0) {
            return Err(invalid(
                "loose_factor",
                self.loose_factor,
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Tight criterion.
    pub fn passes(&self, expected: f64, actual: f64) -> bool {
        self.within(expected, actual, 1.0)
    }

    /// Loose criterion.
    pub fn passes_loose(&self, expected: f64, actual: f64) -> bool {
        self.within(expected, actual, self.loose_factor)
    }

    fn within(&self, expected: f64, actual: f64, scale: f64) -> bool {
        let diff = (actual - expected).abs();
        if diff.is_nan() {
            return false;
        }
        diff <= self.eps0
            || diff <= self.epsa * scale
            || diff <= self.epsr * scale * expected.abs().max(self.eps0)
    }

    /// Whether the tallied fractions meet both targets; an empty tally passes.
    pub fn accepts(&self, tally: &Tally) -> bool {
        tally.total == 0
            || (tally.tight_fraction() >= self.target_q1
                && tally.loose_fraction() >= self.target_q2)
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            eps0: Self::default_eps0(),
            epsa: Self::default_epsa(),
            epsr: Self::default_epsr(),
            target_q1: Self::default_target_q1(),
            target_q2: Self::default_target_q2(),
            loose_factor: Self::default_loose_factor(),
        }
    }
}

fn invalid(name: &str, value: f64, why: &str) -> OlmError {
    OlmError::Configuration(
        ErrorInfo::new("tolerance_invalid", format!("{name}={value} {why}"))
            .with_context("field", name),
    )
}

/// Running counts of comparisons against a [`Tolerance`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Tally {
    /// Comparisons made.
    pub total: usize,
    /// Comparisons passing the tight criterion.
    pub tight: usize,
    /// Comparisons passing the loose criterion.
    pub loose: usize,
    /// Largest absolute difference seen.
    pub max_abs: f64,
    /// Largest relative difference seen (against `max(|expected|, eps0)`).
    pub max_rel: f64,
}

impl Tally {
    /// Records one comparison; returns its relative difference.
    pub fn record(&mut self, tolerance: &Tolerance, expected: f64, actual: f64) -> f64 {
        self.total += 1;
        if tolerance.passes(expected, actual) {
            self.tight += 1;
        }
        if tolerance.passes_loose(expected, actual) {
            self.loose += 1;
        }
        let diff = (actual - expected).abs();
        let rel = diff / expected.abs().max(tolerance.eps0);
        if diff > self.max_abs || diff.is_nan() {
            self.max_abs = diff;
        }
        if rel > self.max_rel || rel.is_nan() {
            self.max_rel = rel;
        }
        rel
    }

    /// Fraction passing tight (1 when empty).
    pub fn tight_fraction(&self) -> f64 {
        fraction(self.tight, self.total)
    }

    /// Fraction passing loose (1 when empty).
    pub fn loose_fraction(&self) -> f64 {
        fraction(self.loose, self.total)
    }
}

fn fraction(count: usize, total: usize) -> f64 {
    if total == 0 {
        1.0
    } else {
        count as f64 / total as f64
    }
}
