use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::provenance::{RunProvenance, SchemaVersion};
use olm_run::CaseResult;
use olm_space::{ExpansionStrategy, StatePoint, StateSpace};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::library::{
    AxisMeta, AxisRole, Decimation, Library, LibraryEntry, LibraryPoint, SubLibrary,
};
use crate::thin::thinned_indices;

/// Assembly options as they appear in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblySpec {
    /// Library name, written into the `assembly_type` tag.
    pub name: String,
    /// State axis name to interpolation dimension name.
    pub dim_map: BTreeMap<String, String>,
    /// Axes that partition the library instead of being interpolated.
    #[serde(default)]
    pub selection_axes: Vec<String>,
    /// Keep every N-th burnup step (ends always kept).
    #[serde(default = "AssemblySpec::default_keep_every")]
    pub keep_every: usize,
    /// Optional fuel type tag (e.g. `UOX`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_type: Option<String>,
}

impl AssemblySpec {
    fn default_keep_every() -> usize {
        1
    }
}

/// Builds a [`Library`] from completed case results.
#[derive(Debug, Clone)]
pub struct Assembler {
    spec: AssemblySpec,
}

impl Assembler {
    /// Validates the options that do not depend on the state space.
    pub fn new(spec: AssemblySpec) -> Result<Self, OlmError> {
        if spec.keep_every == 0 {
            return Err(OlmError::Configuration(
                ErrorInfo::new("keep_every_zero", "keep_every must be at least 1")
                    .with_hint("use 1 to keep every burnup step"),
            ));
        }
        if spec.name.trim().is_empty() {
            return Err(OlmError::configuration(
                "library_name_empty",
                "the library needs a name",
            ));
        }
        Ok(Self { spec })
    }

    /// Options in use.
    pub fn spec(&self) -> &AssemblySpec {
        &self.spec
    }

    /// Checks `dim_map` and `selection_axes` against the state space.
    pub fn axis_metadata(&self, space: &StateSpace) -> Result<Vec<AxisMeta>, OlmError> {
        for axis in self.spec.dim_map.keys() {
            if space.axis(axis).is_none() {
                return Err(schema_error(
                    "dim_map_unknown_axis",
                    format!("dim_map names unknown axis `{axis}`"),
                    axis,
                ));
            }
        }
        for axis in &self.spec.selection_axes {
            if space.axis(axis).is_none() {
                return Err(schema_error(
                    "selection_unknown_axis",
                    format!("selection_axes names unknown axis `{axis}`"),
                    axis,
                ));
            }
            if self.spec.dim_map.contains_key(axis) {
                return Err(schema_error(
                    "axis_mapped_and_selected",
                    format!("axis `{axis}` is both interpolated and selected"),
                    axis,
                ));
            }
        }
        let mut dims: BTreeMap<&str, &str> = BTreeMap::new();
        for (axis, dim) in &self.spec.dim_map {
            if let Some(other) = dims.insert(dim.as_str(), axis.as_str()) {
                return Err(OlmError::Schema(
                    ErrorInfo::new(
                        "dimension_collision",
                        format!("axes `{other}` and `{axis}` both map to dimension `{dim}`"),
                    )
                    .with_context("dim", dim.clone()),
                ));
            }
        }

        space
            .axes()
            .iter()
            .map(|axis| {
                let name = axis.name();
                let (dim, role) = if let Some(dim) = self.spec.dim_map.get(name) {
                    (dim.clone(), AxisRole::Interpolation)
                } else if self.spec.selection_axes.iter().any(|s| s == name) {
                    (name.to_string(), AxisRole::Selection)
                } else {
                    return Err(OlmError::Schema(
                        ErrorInfo::new(
                            "axis_unmapped",
                            format!("axis `{name}` has no interpolation dimension"),
                        )
                        .with_context("axis", name)
                        .with_hint("add it to dim_map or selection_axes"),
                    ));
                };
                Ok(AxisMeta {
                    name: name.to_string(),
                    dim,
                    unit: axis.unit().to_string(),
                    role,
                    values: used_values(space, name),
                })
            })
            .collect()
    }

    /// Assembles the completed results of a run over `space`.
    ///
    /// Every state point of `space` needs a complete result; the first point
    /// without one is reported as an incomplete grid. Grid spaces use the
    /// declared axis values as sub-library columns.
    pub fn assemble(
        &self,
        space: &StateSpace,
        results: &[CaseResult],
        provenance: RunProvenance,
    ) -> Result<Library, OlmError> {
        let axes = self.axis_metadata(space)?;
        let completed: Vec<&CaseResult> = results.iter().filter(|r| r.complete).collect();
        let Some(first) = completed.first() else {
            return Err(OlmError::IncompleteGrid(ErrorInfo::new(
                "library_empty",
                "no completed cases to assemble",
            )));
        };

        let interpolation: Vec<&AxisMeta> = axes
            .iter()
            .filter(|axis| axis.role == AxisRole::Interpolation)
            .collect();
        let selection: Vec<&AxisMeta> = axes
            .iter()
            .filter(|axis| axis.role == AxisRole::Selection)
            .collect();
        check_coverage(space, &axes, &interpolation, &selection, &completed)?;

        let schedule = &first.case.schedule;
        let burnups = schedule.burnups();
        let quantities = quantity_shapes(first)?;
        for result in &completed {
            check_case(result, &burnups, &quantities)?;
        }

        let kept_steps = thinned_indices(burnups.len(), self.spec.keep_every)?;
        debug!(
            original = burnups.len(),
            kept = kept_steps.len(),
            keep_every = self.spec.keep_every,
            "burnup decimation"
        );

        let declared_grid = matches!(space.strategy(), ExpansionStrategy::Grid);
        let mut groups: Vec<(Vec<f64>, Vec<&CaseResult>)> = Vec::new();
        for &result in &completed {
            let key = values_of(result, &selection)?;
            match groups.iter_mut().find(|(existing, _)| same_values(existing, &key)) {
                Some((_, members)) => members.push(result),
                None => groups.push((key, vec![result])),
            }
        }
        groups.sort_by(|(a, _), (b, _)| compare_values(a, b));

        let mut sublibraries = Vec::with_capacity(groups.len());
        for (key, members) in groups {
            let selection_map: BTreeMap<String, f64> = selection
                .iter()
                .zip(&key)
                .map(|(axis, value)| (axis.name.clone(), *value))
                .collect();
            sublibraries.push(self.build_sublibrary(
                selection_map,
                &interpolation,
                &members,
                &kept_steps,
                declared_grid,
            )?);
        }

        let library = Library {
            schema: SchemaVersion::default(),
            name: self.spec.name.clone(),
            idtags: self.idtags(),
            burnups: kept_steps.iter().map(|&k| burnups[k]).collect(),
            burnup_unit: schedule.burnup_unit().to_string(),
            time_unit: schedule.time_unit().to_string(),
            quantities,
            decimation: Decimation {
                keep_every: self.spec.keep_every,
                kept_steps,
                original_len: burnups.len(),
            },
            axes,
            sublibraries,
            provenance,
        };
        info!(
            library = %library.name,
            sublibraries = library.sublibraries.len(),
            points = library.points().count(),
            burnups = library.burnups.len(),
            "library assembled"
        );
        Ok(library)
    }

    fn idtags(&self) -> String {
        match &self.spec.fuel_type {
            Some(fuel) => format!("assembly_type={},fuel_type={fuel}", self.spec.name),
            None => format!("assembly_type={}", self.spec.name),
        }
    }

    fn build_sublibrary(
        &self,
        selection: BTreeMap<String, f64>,
        interpolation: &[&AxisMeta],
        members: &[&CaseResult],
        kept_steps: &[usize],
        declared_grid: bool,
    ) -> Result<SubLibrary, OlmError> {
        let mut grid: Vec<Vec<f64>> = if declared_grid {
            interpolation.iter().map(|axis| axis.values.clone()).collect()
        } else {
            vec![Vec::new(); interpolation.len()]
        };
        let mut by_coordinates: HashMap<Vec<u64>, &CaseResult> = HashMap::new();
        for &result in members {
            let values = values_of(result, interpolation)?;
            for (column, value) in grid.iter_mut().zip(&values) {
                if !column.contains(value) {
                    column.push(*value);
                }
            }
            if by_coordinates.insert(bits(&values), result).is_some() {
                return Err(OlmError::Schema(
                    ErrorInfo::new(
                        "duplicate_point",
                        format!("two cases share coordinates {}", tags(interpolation, &values)),
                    )
                    .with_context("case", result.case.id.to_string()),
                ));
            }
        }
        for column in &mut grid {
            column.sort_by(f64::total_cmp);
        }

        let shape: Vec<usize> = grid.iter().map(Vec::len).collect();
        let total: usize = shape.iter().product();
        let mut points = Vec::with_capacity(total);
        for flat in 0..total {
            let values = unravel(flat, &shape)
                .into_iter()
                .zip(&grid)
                .map(|(position, column)| column[position])
                .collect::<Vec<_>>();
            let interptags = tags(interpolation, &values);
            let Some(result) = by_coordinates.get(&bits(&values)) else {
                return Err(missing_point(interptags, &selection));
            };
            let steps = result.case.schedule.steps();
            let entries = kept_steps
                .iter()
                .map(|&k| LibraryEntry {
                    step: k,
                    burnup: steps[k].burnup,
                    time: steps[k].time,
                    quantities: result.outputs[k].quantities.clone(),
                })
                .collect();
            points.push(LibraryPoint {
                case_id: result.case.id.clone(),
                coordinates: interpolation
                    .iter()
                    .zip(&values)
                    .map(|(axis, value)| (axis.name.clone(), *value))
                    .collect(),
                interptags,
                entries,
            });
        }

        Ok(SubLibrary {
            selection,
            axes: interpolation.iter().map(|axis| axis.name.clone()).collect(),
            grid,
            points,
        })
    }
}

fn missing_point(combination: String, selection: &BTreeMap<String, f64>) -> OlmError {
    let mut info = ErrorInfo::new(
        "grid_missing_point",
        format!("missing grid combination {combination}"),
    )
    .with_context("combination", combination);
    if !selection.is_empty() {
        let selected = selection
            .iter()
            .map(|(axis, value)| format!("{axis}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        info = info.with_context("selection", selected);
    }
    OlmError::IncompleteGrid(info)
}

/// Sorted distinct values an axis takes over the expanded points.
fn used_values(space: &StateSpace, axis: &str) -> Vec<f64> {
    let mut values: Vec<f64> = Vec::new();
    for value in space.points().iter().filter_map(|point| point.value(axis)) {
        if !values.iter().any(|known| known.to_bits() == value.to_bits()) {
            values.push(value);
        }
    }
    values.sort_by(f64::total_cmp);
    values
}

fn point_key(point: &StatePoint, axes: &[AxisMeta]) -> Option<Vec<u64>> {
    axes.iter()
        .map(|axis| point.value(&axis.name).map(f64::to_bits))
        .collect()
}

/// Every expanded point needs a complete result and every result a point.
fn check_coverage(
    space: &StateSpace,
    axes: &[AxisMeta],
    interpolation: &[&AxisMeta],
    selection: &[&AxisMeta],
    completed: &[&CaseResult],
) -> Result<(), OlmError> {
    let present: HashSet<Option<Vec<u64>>> = completed
        .iter()
        .map(|result| point_key(&result.case.point, axes))
        .collect();
    for point in space.points() {
        if present.contains(&point_key(point, axes)) {
            continue;
        }
        let value = |axis: &&AxisMeta| point.value(&axis.name).unwrap_or(f64::NAN);
        let values: Vec<f64> = interpolation.iter().map(value).collect();
        let combination = tags(interpolation, &values);
        let selected = selection
            .iter()
            .map(|axis| (axis.name.clone(), value(axis)))
            .collect();
        return Err(missing_point(combination, &selected));
    }
    let expected: HashSet<Option<Vec<u64>>> = space
        .points()
        .iter()
        .map(|point| point_key(point, axes))
        .collect();
    if let Some(stray) = completed
        .iter()
        .find(|result| !expected.contains(&point_key(&result.case.point, axes)))
    {
        return Err(OlmError::Schema(
            ErrorInfo::new(
                "case_outside_space",
                format!("case {} is not a point of the state space", stray.case.id),
            )
            .with_context("case", stray.case.id.to_string()),
        ));
    }
    Ok(())
}

fn schema_error(code: &str, message: String, axis: &str) -> OlmError {
    OlmError::Schema(ErrorInfo::new(code, message).with_context("axis", axis))
}

fn quantity_shapes(result: &CaseResult) -> Result<BTreeMap<String, Option<usize>>, OlmError> {
    let output = result.outputs.first().ok_or_else(|| {
        OlmError::Schema(
            ErrorInfo::new("partial_burnup", "completed case has no step outputs")
                .with_context("case", result.case.id.to_string()),
        )
    })?;
    Ok(output
        .quantities
        .iter()
        .map(|(name, quantity)| (name.clone(), quantity.shape()))
        .collect())
}

fn check_case(
    result: &CaseResult,
    burnups: &[f64],
    quantities: &BTreeMap<String, Option<usize>>,
) -> Result<(), OlmError> {
    let case = result.case.id.to_string();
    if result.case.schedule.burnups() != burnups {
        return Err(OlmError::Schema(
            ErrorInfo::new(
                "burnup_mismatch",
                "case burnups differ from the first assembled case",
            )
            .with_context("case", case),
        ));
    }
    if result.outputs.len() != burnups.len() {
        return Err(OlmError::Schema(
            ErrorInfo::new(
                "partial_burnup",
                format!(
                    "case has {} outputs for {} burnup steps",
                    result.outputs.len(),
                    burnups.len()
                ),
            )
            .with_context("case", case),
        ));
    }
    for (step, output) in result.outputs.iter().enumerate() {
        let names: BTreeSet<&String> = output.quantities.keys().collect();
        let expected: BTreeSet<&String> = quantities.keys().collect();
        let shapes_match = output
            .quantities
            .iter()
            .all(|(name, quantity)| quantities.get(name) == Some(&quantity.shape()));
        if names != expected || !shapes_match {
            return Err(OlmError::Schema(
                ErrorInfo::new(
                    "quantity_mismatch",
                    format!("step {step} reports different quantity names or shapes"),
                )
                .with_context("case", case)
                .with_context("step", step.to_string()),
            ));
        }
    }
    Ok(())
}

fn values_of(result: &CaseResult, axes: &[&AxisMeta]) -> Result<Vec<f64>, OlmError> {
    axes.iter()
        .map(|axis| {
            result.case.point.value(&axis.name).ok_or_else(|| {
                OlmError::Schema(
                    ErrorInfo::new("case_missing_axis", format!("case has no `{}`", axis.name))
                        .with_context("case", result.case.id.to_string()),
                )
            })
        })
        .collect()
}

fn tags(axes: &[&AxisMeta], values: &[f64]) -> String {
    axes.iter()
        .zip(values)
        .map(|(axis, value)| format!("{}={}", axis.dim, value))
        .collect::<Vec<_>>()
        .join(",")
}

fn bits(values: &[f64]) -> Vec<u64> {
    values.iter().map(|value| value.to_bits()).collect()
}

fn same_values(a: &[f64], b: &[f64]) -> bool {
    bits(a) == bits(b)
}

fn compare_values(a: &[f64], b: &[f64]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.total_cmp(y))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Row-major multi-index of `flat` for the given shape.
fn unravel(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut index = vec![0; shape.len()];
    for (slot, extent) in index.iter_mut().zip(shape).rev() {
        *slot = flat % extent;
        flat /= extent;
    }
    index
}
