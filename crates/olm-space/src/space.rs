use std::collections::{BTreeMap, HashSet};

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::rng::substream_rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::axis::{normalize, Axis, AxisSpec};

/// Supported deterministic expansion strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ExpansionStrategy {
    /// Full Cartesian product, first-declared axis varying slowest.
    #[default]
    Grid,
    /// User supplied list of points drawn from the declared axis values.
    Explicit {
        /// One map of axis name to value per point.
        points: Vec<BTreeMap<String, f64>>,
    },
    /// Latin hypercube selection over the declared axis values.
    Lhs {
        /// Number of strata (and requested points).
        samples: usize,
        /// Master seed for the per-axis permutations.
        #[serde(default)]
        seed: u64,
    },
}

impl ExpansionStrategy {
    /// Stable identifier used in logs and reports.
    pub fn id(&self) -> &'static str {
        match self {
            ExpansionStrategy::Grid => "grid",
            ExpansionStrategy::Explicit { .. } => "explicit",
            ExpansionStrategy::Lhs { .. } => "lhs",
        }
    }
}

/// One coordinate of a state point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Axis name.
    pub axis: String,
    /// Concrete value on that axis.
    pub value: f64,
}

/// A concrete combination of axis values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePoint {
    /// Position in the expansion order.
    pub index: usize,
    /// Coordinates in axis declaration order.
    pub coordinates: Vec<Coordinate>,
}

impl StatePoint {
    /// Returns the value for the named axis.
    pub fn value(&self, axis: &str) -> Option<f64> {
        self.coordinates
            .iter()
            .find(|coordinate| coordinate.axis == axis)
            .map(|coordinate| coordinate.value)
    }

    /// Coordinate values in declaration order.
    pub fn values(&self) -> Vec<f64> {
        self.coordinates.iter().map(|c| c.value).collect()
    }

    /// Coordinates keyed (and therefore sorted) by axis name.
    pub fn sorted_tuple(&self) -> BTreeMap<String, f64> {
        self.coordinates
            .iter()
            .map(|c| (c.axis.clone(), c.value))
            .collect()
    }

    /// Human readable `axis=value` rendering in declaration order.
    pub fn label(&self) -> String {
        self.coordinates
            .iter()
            .map(|c| format!("{}={}", c.axis, c.value))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Expanded, ordered set of state points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSpace {
    axes: Vec<Axis>,
    strategy: ExpansionStrategy,
    points: Vec<StatePoint>,
}

impl StateSpace {
    /// Expands the provided axes with the selected strategy.
    pub fn new(axes: Vec<Axis>, strategy: ExpansionStrategy) -> Result<Self, OlmError> {
        if axes.is_empty() {
            return Err(OlmError::configuration(
                "space_no_axes",
                "the state space needs at least one axis",
            ));
        }
        let mut names = HashSet::new();
        for axis in &axes {
            if !names.insert(axis.name()) {
                return Err(OlmError::Configuration(
                    ErrorInfo::new(
                        "space_duplicate_axis",
                        format!("axis `{}` is declared twice", axis.name()),
                    )
                    .with_context("axis", axis.name()),
                ));
            }
        }

        let tuples = match &strategy {
            ExpansionStrategy::Grid => {
                let mut outputs = Vec::new();
                expand_grid(&axes, 0, Vec::with_capacity(axes.len()), &mut outputs);
                outputs
            }
            ExpansionStrategy::Explicit { points } => expand_explicit(&axes, points)?,
            ExpansionStrategy::Lhs { samples, seed } => expand_lhs(&axes, *samples, *seed)?,
        };
        if tuples.is_empty() {
            return Err(OlmError::configuration(
                "space_empty",
                format!("strategy `{}` produced no state points", strategy.id()),
            ));
        }

        let points = tuples
            .into_iter()
            .enumerate()
            .map(|(index, values)| StatePoint {
                index,
                coordinates: axes
                    .iter()
                    .zip(values)
                    .map(|(axis, value)| Coordinate {
                        axis: axis.name().to_string(),
                        value,
                    })
                    .collect(),
            })
            .collect();

        Ok(Self {
            axes,
            strategy,
            points,
        })
    }

    /// Validates axis declarations and expands them.
    pub fn from_specs(specs: &[AxisSpec], strategy: ExpansionStrategy) -> Result<Self, OlmError> {
        let axes = specs
            .iter()
            .map(Axis::from_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(axes, strategy)
    }

    /// Axes in declaration order.
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    /// Looks up an axis by name.
    pub fn axis(&self, name: &str) -> Option<&Axis> {
        self.axes.iter().find(|axis| axis.name() == name)
    }

    /// Strategy used for the expansion.
    pub fn strategy(&self) -> &ExpansionStrategy {
        &self.strategy
    }

    /// Points in expansion order.
    pub fn points(&self) -> &[StatePoint] {
        &self.points
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false for a constructed space.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

fn expand_grid(axes: &[Axis], idx: usize, current: Vec<f64>, outputs: &mut Vec<Vec<f64>>) {
    if idx == axes.len() {
        outputs.push(current);
        return;
    }
    for value in axes[idx].values() {
        let mut next = current.clone();
        next.push(*value);
        expand_grid(axes, idx + 1, next, outputs);
    }
}

fn expand_explicit(
    axes: &[Axis],
    points: &[BTreeMap<String, f64>],
) -> Result<Vec<Vec<f64>>, OlmError> {
    let mut seen = HashSet::new();
    let mut outputs = Vec::with_capacity(points.len());
    for (position, point) in points.iter().enumerate() {
        if let Some(unknown) = point.keys().find(|key| !axes.iter().any(|a| a.name() == *key)) {
            return Err(OlmError::Configuration(
                ErrorInfo::new(
                    "explicit_unknown_axis",
                    format!("explicit point {position} names unknown axis `{unknown}`"),
                )
                .with_context("point", position.to_string()),
            ));
        }
        let mut tuple = Vec::with_capacity(axes.len());
        for axis in axes {
            let value = point.get(axis.name()).copied().ok_or_else(|| {
                OlmError::Configuration(
                    ErrorInfo::new(
                        "explicit_missing_axis",
                        format!("explicit point {position} has no value for `{}`", axis.name()),
                    )
                    .with_context("point", position.to_string()),
                )
            })?;
            let index = axis.index_of(value).ok_or_else(|| {
                OlmError::Configuration(
                    ErrorInfo::new(
                        "explicit_undeclared_value",
                        format!(
                            "explicit point {position} uses {value} which axis `{}` does not declare",
                            axis.name()
                        ),
                    )
                    .with_context("point", position.to_string())
                    .with_context("axis", axis.name()),
                )
            })?;
            tuple.push(axis.values()[index]);
        }
        if !seen.insert(tuple_key(&tuple)) {
            return Err(OlmError::Configuration(
                ErrorInfo::new(
                    "explicit_duplicate_point",
                    format!("explicit point {position} repeats an earlier point"),
                )
                .with_context("point", position.to_string()),
            ));
        }
        outputs.push(tuple);
    }
    Ok(outputs)
}

fn expand_lhs(axes: &[Axis], samples: usize, seed: u64) -> Result<Vec<Vec<f64>>, OlmError> {
    if samples == 0 {
        return Err(OlmError::configuration(
            "lhs_no_samples",
            "latin hypercube expansion needs samples > 0",
        ));
    }
    let mut columns = Vec::with_capacity(axes.len());
    for (axis_idx, axis) in axes.iter().enumerate() {
        let mut rng = substream_rng(seed, axis_idx as u64);
        let mut slots: Vec<usize> = (0..samples).collect();
        slots.shuffle(&mut rng);
        let column: Vec<f64> = slots
            .into_iter()
            .map(|slot| axis.values()[slot * axis.len() / samples])
            .collect();
        columns.push(column);
    }
    let mut seen = HashSet::new();
    let mut outputs = Vec::with_capacity(samples);
    for sample in 0..samples {
        let tuple: Vec<f64> = columns.iter().map(|column| column[sample]).collect();
        if seen.insert(tuple_key(&tuple)) {
            outputs.push(tuple);
        }
    }
    Ok(outputs)
}

fn tuple_key(values: &[f64]) -> Vec<u64> {
    values.iter().map(|value| normalize(*value).to_bits()).collect()
}
