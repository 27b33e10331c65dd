use std::collections::BTreeMap;

use olm_core::provenance::{RunProvenance, SchemaVersion};
use olm_run::Quantities;
use olm_space::CaseId;
use serde::{Deserialize, Serialize};

/// How an axis participates in the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AxisRole {
    /// Interpolated over within a sub-library.
    Interpolation,
    /// Partitions the library into sub-libraries.
    Selection,
}

/// Axis metadata carried into the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisMeta {
    /// State space axis name.
    pub name: String,
    /// Interpolation dimension name; equal to `name` for selection axes.
    pub dim: String,
    /// Unit label.
    pub unit: String,
    /// Role of the axis.
    pub role: AxisRole,
    /// Declared values.
    pub values: Vec<f64>,
}

/// Result of one case at one retained burnup step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryEntry {
    /// Step index in the original schedule.
    pub step: usize,
    /// Cumulative burnup.
    pub burnup: f64,
    /// Cumulative irradiation time.
    pub time: f64,
    /// Named quantities.
    pub quantities: Quantities,
}

/// One state point of a sub-library with its retained entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryPoint {
    /// Case that produced the point.
    pub case_id: CaseId,
    /// Interpolation coordinates keyed by axis name.
    pub coordinates: BTreeMap<String, f64>,
    /// `dim=value,...` tag over the interpolation dimensions.
    pub interptags: String,
    /// Entries in burnup order.
    pub entries: Vec<LibraryEntry>,
}

impl LibraryPoint {
    /// Entry at exactly `burnup`, if retained.
    pub fn entry_at(&self, burnup: f64) -> Option<&LibraryEntry> {
        self.entries.iter().find(|entry| entry.burnup == burnup)
    }
}

/// Complete rectangular grid of points sharing one selection tuple.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubLibrary {
    /// Selection axis values.
    pub selection: BTreeMap<String, f64>,
    /// Interpolation axis names, outermost first.
    pub axes: Vec<String>,
    /// Grid values per interpolation axis, aligned with `axes`.
    pub grid: Vec<Vec<f64>>,
    /// Points in row-major order (last axis varies fastest).
    pub points: Vec<LibraryPoint>,
}

impl SubLibrary {
    /// Grid extent per interpolation axis.
    pub fn shape(&self) -> Vec<usize> {
        self.grid.iter().map(Vec::len).collect()
    }

    /// Row-major flat index of a multi-index, or `None` when out of range.
    pub fn flat_index(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.grid.len() {
            return None;
        }
        let mut flat = 0usize;
        for (position, values) in index.iter().zip(&self.grid) {
            if *position >= values.len() {
                return None;
            }
            flat = flat * values.len() + position;
        }
        Some(flat)
    }

    /// Inverse of [`SubLibrary::flat_index`].
    pub fn multi_index(&self, flat: usize) -> Vec<usize> {
        let mut index = vec![0; self.grid.len()];
        let mut rest = flat;
        for (slot, values) in index.iter_mut().zip(&self.grid).rev() {
            *slot = rest % values.len();
            rest /= values.len();
        }
        index
    }

    /// Positional addressing: `index[k]` indexes `grid[k]`.
    pub fn point_at(&self, index: &[usize]) -> Option<&LibraryPoint> {
        self.flat_index(index).and_then(|flat| self.points.get(flat))
    }

    /// Multi-index of the point with the given coordinates.
    pub fn index_of(&self, coordinates: &BTreeMap<String, f64>) -> Option<Vec<usize>> {
        self.axes
            .iter()
            .zip(&self.grid)
            .map(|(axis, values)| {
                let value = coordinates.get(axis)?;
                values.iter().position(|candidate| candidate == value)
            })
            .collect()
    }

    /// Point with the given coordinates.
    pub fn point(&self, coordinates: &BTreeMap<String, f64>) -> Option<&LibraryPoint> {
        self.index_of(coordinates)
            .and_then(|index| self.point_at(&index))
    }
}

/// Record of the burnup decimation applied during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decimation {
    /// Requested stride.
    pub keep_every: usize,
    /// Retained step indices of the original schedule.
    pub kept_steps: Vec<usize>,
    /// Number of steps before decimation.
    pub original_len: usize,
}

/// Interpolable reactor library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    /// Schema version of the serialized form.
    pub schema: SchemaVersion,
    /// Library name (assembly type).
    pub name: String,
    /// `assembly_type=...` identification tags.
    pub idtags: String,
    /// Axes in state space declaration order.
    pub axes: Vec<AxisMeta>,
    /// Retained burnups shared by every point.
    pub burnups: Vec<f64>,
    /// Burnup unit label.
    pub burnup_unit: String,
    /// Time unit label.
    pub time_unit: String,
    /// Quantity names with their vector length (`None` for scalars).
    pub quantities: BTreeMap<String, Option<usize>>,
    /// Decimation applied to every point.
    pub decimation: Decimation,
    /// Sub-libraries ordered by selection tuple.
    pub sublibraries: Vec<SubLibrary>,
    /// Where the data came from.
    pub provenance: RunProvenance,
}

impl Library {
    /// Interpolation axes in canonical order.
    pub fn interpolation_axes(&self) -> impl Iterator<Item = &AxisMeta> {
        self.axes
            .iter()
            .filter(|axis| axis.role == AxisRole::Interpolation)
    }

    /// Selection axes in canonical order.
    pub fn selection_axes(&self) -> impl Iterator<Item = &AxisMeta> {
        self.axes
            .iter()
            .filter(|axis| axis.role == AxisRole::Selection)
    }

    /// Sub-library for a selection tuple (empty map when there are no selection axes).
    pub fn sublibrary(&self, selection: &BTreeMap<String, f64>) -> Option<&SubLibrary> {
        self.sublibraries
            .iter()
            .find(|sub| &sub.selection == selection)
    }

    /// Every point across all sub-libraries.
    pub fn points(&self) -> impl Iterator<Item = &LibraryPoint> {
        self.sublibraries.iter().flat_map(|sub| sub.points.iter())
    }

    /// Positional addressing inside a sub-library.
    pub fn point_at(
        &self,
        selection: &BTreeMap<String, f64>,
        index: &[usize],
    ) -> Option<&LibraryPoint> {
        self.sublibrary(selection)?.point_at(index)
    }

    /// Entry at exact coordinates and retained burnup.
    pub fn lookup(
        &self,
        selection: &BTreeMap<String, f64>,
        coordinates: &BTreeMap<String, f64>,
        burnup: f64,
    ) -> Option<&LibraryEntry> {
        self.sublibrary(selection)?
            .point(coordinates)?
            .entry_at(burnup)
    }

    /// Counts and names for reporting.
    pub fn summary(&self) -> LibrarySummary {
        LibrarySummary {
            name: self.name.clone(),
            sublibraries: self.sublibraries.len(),
            points: self.points().count(),
            burnups: self.burnups.len(),
            original_burnups: self.decimation.original_len,
            interpolation_dims: self.interpolation_axes().map(|a| a.dim.clone()).collect(),
            selection_axes: self.selection_axes().map(|a| a.name.clone()).collect(),
            quantities: self.quantities.keys().cloned().collect(),
        }
    }
}

/// Compact description of a library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibrarySummary {
    /// Library name.
    pub name: String,
    /// Number of sub-libraries.
    pub sublibraries: usize,
    /// Total number of points.
    pub points: usize,
    /// Retained burnups per point.
    pub burnups: usize,
    /// Burnups per case before decimation.
    pub original_burnups: usize,
    /// Interpolation dimension names.
    pub interpolation_dims: Vec<String>,
    /// Selection axis names.
    pub selection_axes: Vec<String>,
    /// Quantity names.
    pub quantities: Vec<String>,
}
