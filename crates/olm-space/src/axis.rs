use olm_core::errors::{ErrorInfo, OlmError};
use serde::{Deserialize, Serialize};

/// Axis declaration as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    /// Name of the state variable.
    pub name: String,
    /// Values to visit along the axis, in any order.
    pub values: Vec<f64>,
    /// Unit label carried into the library metadata.
    #[serde(default)]
    pub unit: String,
}

/// A validated, normalized state-space axis.
///
/// Values are sorted ascending, unique and finite; `-0.0` is stored as `0.0`
/// so coordinate tuples compare and hash consistently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    name: String,
    values: Vec<f64>,
    unit: String,
}

impl Axis {
    /// Validates and normalizes an axis.
    pub fn new(
        name: impl Into<String>,
        values: Vec<f64>,
        unit: impl Into<String>,
    ) -> Result<Self, OlmError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(OlmError::configuration(
                "axis_name_empty",
                "axis names must be non-empty",
            ));
        }
        if values.is_empty() {
            return Err(OlmError::Configuration(
                ErrorInfo::new("axis_empty", format!("axis `{name}` has no values"))
                    .with_context("axis", name.clone()),
            ));
        }
        let mut normalized = Vec::with_capacity(values.len());
        for value in values {
            if !value.is_finite() {
                return Err(OlmError::Configuration(
                    ErrorInfo::new("axis_non_finite", format!("axis `{name}` has value {value}"))
                        .with_context("axis", name.clone()),
                ));
            }
            normalized.push(normalize(value));
        }
        normalized.sort_by(f64::total_cmp);
        if let Some(pair) = normalized.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(OlmError::Configuration(
                ErrorInfo::new(
                    "axis_duplicate_value",
                    format!("axis `{name}` lists value {} more than once", pair[0]),
                )
                .with_context("axis", name.clone())
                .with_context("value", pair[0].to_string()),
            ));
        }
        Ok(Self {
            name,
            values: normalized,
            unit: unit.into(),
        })
    }

    /// Builds an axis from its configuration declaration.
    pub fn from_spec(spec: &AxisSpec) -> Result<Self, OlmError> {
        Self::new(spec.name.clone(), spec.values.clone(), spec.unit.clone())
    }

    /// Axis name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sorted axis values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Unit label.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Number of values on the axis.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a validated axis.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of `value` on the axis, if declared.
    pub fn index_of(&self, value: f64) -> Option<usize> {
        let value = normalize(value);
        self.values.iter().position(|candidate| *candidate == value)
    }
}

/// Maps `-0.0` onto `0.0`.
pub(crate) fn normalize(value: f64) -> f64 {
    if value == 0.0 {
        0.0
    } else {
        value
    }
}
