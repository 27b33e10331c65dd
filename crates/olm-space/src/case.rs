use std::collections::{BTreeMap, HashSet};
use std::fmt;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::hash::{short_hash_string, stable_hash_string};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::burnup::BurnupSchedule;
use crate::composition::{Composition, CompositionSpec};
use crate::space::{StatePoint, StateSpace};

/// Static parameters passed through to every case unchanged.
pub type StaticParams = BTreeMap<String, Value>;

const CASE_ID_DIGITS: usize = 16;

/// Stable identifier of a case derived from its sorted coordinate tuple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(String);

impl CaseId {
    /// Hashes the coordinate map; key order is irrelevant because the map is sorted.
    pub fn from_coordinates(coordinates: &BTreeMap<String, f64>) -> Result<Self, OlmError> {
        Ok(Self(format!(
            "case-{}",
            short_hash_string(coordinates, CASE_ID_DIGITS)?
        )))
    }

    /// Identifier for a state point.
    pub fn for_point(point: &StatePoint) -> Result<Self, OlmError> {
        Self::from_coordinates(&point.sorted_tuple())
    }

    /// Borrowed string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fully specified simulation case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Stable identifier.
    pub id: CaseId,
    /// State point the case realises.
    pub point: StatePoint,
    /// Burnup history, already adjusted for any power override.
    pub schedule: BurnupSchedule,
    /// Static parameters shared by all cases.
    pub params: StaticParams,
    /// Fuel composition derived from the state point, empty without a calculator.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub composition: Composition,
}

impl Case {
    /// Position of the case in expansion order.
    pub fn index(&self) -> usize {
        self.point.index
    }
}

/// One line of the case manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Expansion index.
    pub index: usize,
    /// Case identifier.
    pub id: CaseId,
    /// Coordinates keyed by axis name.
    pub state: BTreeMap<String, f64>,
    /// Specific power applied to the case.
    pub specific_power: f64,
    /// Derived fuel composition.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub composition: Composition,
}

/// Cross product of a state space with its burnup schedule and static parameters.
#[derive(Debug, Clone)]
pub struct CaseSet {
    space: StateSpace,
    schedule: BurnupSchedule,
    power_axis: Option<String>,
    params: StaticParams,
    ids: Vec<CaseId>,
    overrides: Vec<Option<BurnupSchedule>>,
    composition: Option<CompositionSpec>,
    compositions: Vec<Composition>,
}

impl CaseSet {
    /// Validates identifiers and power overrides up front so iteration is infallible.
    pub fn new(
        space: StateSpace,
        schedule: BurnupSchedule,
        power_axis: Option<String>,
        params: StaticParams,
    ) -> Result<Self, OlmError> {
        if let Some(axis) = &power_axis {
            if space.axis(axis).is_none() {
                return Err(OlmError::Configuration(
                    ErrorInfo::new(
                        "power_axis_unknown",
                        format!("power axis `{axis}` is not a state space axis"),
                    )
                    .with_context("axis", axis.clone()),
                ));
            }
        }

        let mut ids = Vec::with_capacity(space.len());
        let mut overrides = Vec::with_capacity(space.len());
        let mut seen = HashSet::new();
        for point in space.points() {
            let id = CaseId::for_point(point)?;
            if !seen.insert(id.clone()) {
                return Err(OlmError::Configuration(
                    ErrorInfo::new("case_id_collision", "two state points share a case id")
                        .with_context("case", id.to_string()),
                ));
            }
            ids.push(id);
            let derived = match power_axis.as_deref().and_then(|axis| point.value(axis)) {
                Some(power) if power != schedule.specific_power() => {
                    Some(schedule.with_specific_power(power)?)
                }
                _ => None,
            };
            overrides.push(derived);
        }

        Ok(Self {
            compositions: vec![Composition::new(); space.len()],
            space,
            schedule,
            power_axis,
            params,
            ids,
            overrides,
            composition: None,
        })
    }

    /// Derives the fuel composition of every case; any out-of-range point
    /// rejects the whole set.
    pub fn with_composition(mut self, spec: CompositionSpec) -> Result<Self, OlmError> {
        self.compositions = self
            .space
            .points()
            .iter()
            .map(|point| {
                spec.compose(point).map_err(|err| match err {
                    OlmError::Configuration(info) => OlmError::Configuration(
                        info.with_context("case", self.ids[point.index].to_string()),
                    ),
                    other => other,
                })
            })
            .collect::<Result<_, _>>()?;
        self.composition = Some(spec);
        Ok(self)
    }

    /// Lazily yields the cases in expansion order; may be called repeatedly.
    pub fn cases(&self) -> Cases<'_> {
        Cases { set: self, next: 0 }
    }

    /// Materialises the case at `index`.
    pub fn get(&self, index: usize) -> Option<Case> {
        let point = self.space.points().get(index)?;
        let schedule = self.overrides[index]
            .clone()
            .unwrap_or_else(|| self.schedule.clone());
        Some(Case {
            id: self.ids[index].clone(),
            point: point.clone(),
            schedule,
            params: self.params.clone(),
            composition: self.compositions[index].clone(),
        })
    }

    /// Number of cases.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Always false for a constructed set.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Case identifiers in expansion order.
    pub fn ids(&self) -> &[CaseId] {
        &self.ids
    }

    /// Underlying state space.
    pub fn space(&self) -> &StateSpace {
        &self.space
    }

    /// Base schedule before any power override.
    pub fn base_schedule(&self) -> &BurnupSchedule {
        &self.schedule
    }

    /// Axis overriding the specific power, if any.
    pub fn power_axis(&self) -> Option<&str> {
        self.power_axis.as_deref()
    }

    /// Static parameters.
    pub fn params(&self) -> &StaticParams {
        &self.params
    }

    /// Composition calculator, if one was applied.
    pub fn composition(&self) -> Option<&CompositionSpec> {
        self.composition.as_ref()
    }

    /// Generation manifest listing every case with its state.
    pub fn manifest(&self) -> Vec<ManifestEntry> {
        self.cases()
            .map(|case| ManifestEntry {
                index: case.index(),
                state: case.point.sorted_tuple(),
                specific_power: case.schedule.specific_power(),
                composition: case.composition,
                id: case.id,
            })
            .collect()
    }

    /// Stable hash over the manifest, burnups and static parameters.
    pub fn hash(&self) -> Result<String, OlmError> {
        stable_hash_string(&(self.manifest(), self.schedule.burnups(), &self.params))
    }
}

/// Iterator over the cases of a [`CaseSet`].
#[derive(Debug, Clone)]
pub struct Cases<'a> {
    set: &'a CaseSet,
    next: usize,
}

impl Iterator for Cases<'_> {
    type Item = Case;

    fn next(&mut self) -> Option<Self::Item> {
        let case = self.set.get(self.next)?;
        self.next += 1;
        Some(case)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.set.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Cases<'_> {}
