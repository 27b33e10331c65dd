use std::collections::BTreeSet;

use olm_lib::{Library, LibraryEntry, LibraryPoint, SubLibrary};
use olm_run::{Quantities, Quantity};
use serde::{Deserialize, Serialize};

use crate::reference::ReferenceSet;
use crate::report::{CheckResult, Deviation};
use crate::tolerance::{Tally, Tolerance};

/// Available consistency checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Burnup interpolation over retained entries against the full-resolution run.
    LowOrderConsistency,
    /// Leave-one-out interpolation between grid neighbours.
    GridGradient,
}

impl CheckKind {
    /// Stable identifier, also the default check name.
    pub fn id(self) -> &'static str {
        match self {
            CheckKind::LowOrderConsistency => "low_order_consistency",
            CheckKind::GridGradient => "grid_gradient",
        }
    }
}

/// One configured check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSpec {
    /// Name reported in the check report; defaults to the kind identifier.
    #[serde(default)]
    pub name: String,
    /// Check kind.
    #[serde(rename = "type")]
    pub kind: CheckKind,
    /// Quantities to compare; all library quantities when empty.
    #[serde(default)]
    pub quantities: Vec<String>,
    /// Acceptance thresholds.
    #[serde(default)]
    pub tolerance: Tolerance,
}

impl CheckSpec {
    /// A check of `kind` with default tolerance over every quantity.
    pub fn new(kind: CheckKind) -> Self {
        Self {
            name: kind.id().to_string(),
            kind,
            quantities: Vec::new(),
            tolerance: Tolerance::default(),
        }
    }

    /// Name used in reports.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.kind.id()
        } else {
            &self.name
        }
    }

    /// Runs the check. Never fails: problems that prevent evaluation produce a
    /// failed result with a note.
    pub fn check(&self, library: &Library, reference: &ReferenceSet) -> CheckResult {
        let quantities = match self.selected_quantities(library) {
            Ok(quantities) => quantities,
            Err(note) => return self.unevaluable(note),
        };
        let mut comparator = Comparator::new(self.tolerance);
        let outcome = match self.kind {
            CheckKind::LowOrderConsistency => {
                low_order_consistency(library, reference, &quantities, &mut comparator)
            }
            CheckKind::GridGradient => grid_gradient(library, &quantities, &mut comparator),
        };
        if let Err(note) = outcome {
            return self.unevaluable(note);
        }
        let tally = comparator.tally;
        let pass = self.tolerance.accepts(&tally);
        let note = if tally.total == 0 {
            Some(match self.kind {
                CheckKind::LowOrderConsistency => "no decimated burnup steps to compare",
                CheckKind::GridGradient => "no interior grid points to compare",
            }
            .to_string())
        } else if !pass {
            Some(format!(
                "tight {:.4} (target {}), loose {:.4} (target {})",
                tally.tight_fraction(),
                self.tolerance.target_q1,
                tally.loose_fraction(),
                self.tolerance.target_q2
            ))
        } else {
            None
        };
        CheckResult {
            name: self.display_name().to_string(),
            kind: self.kind,
            pass,
            comparisons: tally.total,
            tight_fraction: tally.tight_fraction(),
            loose_fraction: tally.loose_fraction(),
            max_abs_deviation: tally.max_abs,
            max_rel_deviation: tally.max_rel,
            worst: comparator.worst,
            tolerance: self.tolerance,
            note,
        }
    }

    fn selected_quantities(&self, library: &Library) -> Result<Vec<String>, String> {
        if self.quantities.is_empty() {
            return Ok(library.quantities.keys().cloned().collect());
        }
        let mut seen = BTreeSet::new();
        for name in &self.quantities {
            if !library.quantities.contains_key(name) {
                return Err(format!("quantity `{name}` is not in the library"));
            }
            seen.insert(name.clone());
        }
        Ok(seen.into_iter().collect())
    }

    fn unevaluable(&self, note: String) -> CheckResult {
        CheckResult {
            name: self.display_name().to_string(),
            kind: self.kind,
            pass: false,
            comparisons: 0,
            tight_fraction: 0.0,
            loose_fraction: 0.0,
            max_abs_deviation: 0.0,
            max_rel_deviation: 0.0,
            worst: None,
            tolerance: self.tolerance,
            note: Some(note),
        }
    }
}

struct Comparator {
    tolerance: Tolerance,
    tally: Tally,
    worst: Option<Deviation>,
    worst_rel: f64,
}

impl Comparator {
    fn new(tolerance: Tolerance) -> Self {
        Self {
            tolerance,
            tally: Tally::default(),
            worst: None,
            worst_rel: -1.0,
        }
    }

    fn compare(
        &mut self,
        location: impl FnOnce() -> String,
        quantity: &str,
        expected: f64,
        actual: f64,
    ) {
        let rel = self.tally.record(&self.tolerance, expected, actual);
        if rel.is_nan() || rel > self.worst_rel {
            self.worst_rel = rel;
            self.worst = Some(Deviation {
                location: location(),
                quantity: quantity.to_string(),
                expected,
                actual,
            });
        }
    }
}

fn components<'a>(
    quantities: &'a Quantities,
    name: &str,
    context: &dyn Fn() -> String,
) -> Result<&'a [f64], String> {
    quantities
        .get(name)
        .map(Quantity::components)
        .ok_or_else(|| format!("quantity `{name}` missing at {}", context()))
}

fn lerp(x0: f64, y0: f64, x1: f64, y1: f64, x: f64) -> f64 {
    if x1 == x0 {
        return y0;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

fn low_order_consistency(
    library: &Library,
    reference: &ReferenceSet,
    quantities: &[String],
    comparator: &mut Comparator,
) -> Result<(), String> {
    let kept: BTreeSet<usize> = library.decimation.kept_steps.iter().copied().collect();
    for point in library.points() {
        let case = reference
            .get(&point.case_id)
            .ok_or_else(|| format!("no reference output for case {}", point.case_id))?;
        if case.burnups.len() != case.steps.len() {
            return Err(format!("reference for case {} is truncated", point.case_id));
        }
        for (step, (burnup, expected)) in case.burnups.iter().zip(&case.steps).enumerate() {
            if kept.contains(&step) {
                continue;
            }
            let Some((lo, hi)) = bracket(point, *burnup) else {
                return Err(format!(
                    "burnup {burnup} of case {} lies outside the library",
                    point.case_id
                ));
            };
            for name in quantities {
                let at = || format!("{} burnup={burnup}", point.case_id);
                let want = components(expected, name, &at)?;
                let low = components(&lo.quantities, name, &at)?;
                let high = components(&hi.quantities, name, &at)?;
                if want.len() != low.len() || low.len() != high.len() {
                    return Err(format!("quantity `{name}` changes length at {}", at()));
                }
                for (component, ((want, low), high)) in want.iter().zip(low).zip(high).enumerate() {
                    let predicted = lerp(lo.burnup, *low, hi.burnup, *high, *burnup);
                    comparator.compare(
                        || format!("{} burnup={burnup} [{component}]", point.interptags),
                        name,
                        *want,
                        predicted,
                    );
                }
            }
        }
    }
    Ok(())
}

fn bracket(point: &LibraryPoint, burnup: f64) -> Option<(&LibraryEntry, &LibraryEntry)> {
    point
        .entries
        .windows(2)
        .find(|pair| pair[0].burnup <= burnup && burnup <= pair[1].burnup)
        .map(|pair| (&pair[0], &pair[1]))
}

fn grid_gradient(
    library: &Library,
    quantities: &[String],
    comparator: &mut Comparator,
) -> Result<(), String> {
    for sub in &library.sublibraries {
        let shape = sub.shape();
        for (axis, extent) in shape.iter().enumerate() {
            if *extent < 3 {
                continue;
            }
            for (flat, point) in sub.points.iter().enumerate() {
                let index = sub.multi_index(flat);
                if index[axis] == 0 || index[axis] + 1 == *extent {
                    continue;
                }
                let (below, above) = neighbours(sub, &index, axis)?;
                let xs = &sub.grid[axis];
                let (x0, x, x1) = (xs[index[axis] - 1], xs[index[axis]], xs[index[axis] + 1]);
                for ((entry, lo), hi) in point.entries.iter().zip(&below.entries).zip(&above.entries) {
                    for name in quantities {
                        let at = || format!("{} burnup={}", point.interptags, entry.burnup);
                        let stored = components(&entry.quantities, name, &at)?;
                        let low = components(&lo.quantities, name, &at)?;
                        let high = components(&hi.quantities, name, &at)?;
                        if stored.len() != low.len() || low.len() != high.len() {
                            return Err(format!("quantity `{name}` changes length at {}", at()));
                        }
                        for (component, ((value, low), high)) in
                            stored.iter().zip(low).zip(high).enumerate()
                        {
                            comparator.compare(
                                || {
                                    format!(
                                        "{} burnup={} along {} [{component}]",
                                        point.interptags, entry.burnup, sub.axes[axis]
                                    )
                                },
                                name,
                                *value,
                                lerp(x0, *low, x1, *high, x),
                            );
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

fn neighbours<'a>(
    sub: &'a SubLibrary,
    index: &[usize],
    axis: usize,
) -> Result<(&'a LibraryPoint, &'a LibraryPoint), String> {
    let mut lower = index.to_vec();
    lower[axis] -= 1;
    let mut upper = index.to_vec();
    upper[axis] += 1;
    match (sub.point_at(&lower), sub.point_at(&upper)) {
        (Some(below), Some(above)) => Ok((below, above)),
        _ => Err(format!("grid neighbours of {index:?} are missing")),
    }
}
