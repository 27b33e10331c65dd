use olm_core::errors::{ErrorInfo, OlmError};
use serde::{Deserialize, Serialize};

/// Burnup history declaration as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnupSpec {
    /// Cumulative burnup checkpoints; the first must be zero.
    pub checkpoints: Vec<f64>,
    /// Specific power used to convert burnup to irradiation time.
    pub specific_power: f64,
    /// Axis whose value overrides the specific power per state point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_axis: Option<String>,
    /// Multiplier applied to every checkpoint (1000 converts GWd to MWd).
    #[serde(default = "BurnupSpec::default_scale")]
    pub burnup_scale: f64,
    /// Unit label for burnup values.
    #[serde(default = "BurnupSpec::default_burnup_unit")]
    pub burnup_unit: String,
    /// Unit label for time values.
    #[serde(default = "BurnupSpec::default_time_unit")]
    pub time_unit: String,
}

impl BurnupSpec {
    fn default_scale() -> f64 {
        1.0
    }

    fn default_burnup_unit() -> String {
        "MWd/MTIHM".to_string()
    }

    fn default_time_unit() -> String {
        "days".to_string()
    }
}

/// A single cumulative exposure checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurnupStep {
    /// Position within the schedule.
    pub index: usize,
    /// Cumulative burnup at the end of the step.
    pub burnup: f64,
    /// Specific power held during the step.
    pub specific_power: f64,
    /// Irradiation time since the previous checkpoint.
    pub delta_time: f64,
    /// Irradiation time since the unirradiated state.
    pub time: f64,
}

/// Ordered burnup history of a single state point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BurnupSchedule {
    steps: Vec<BurnupStep>,
    burnup_unit: String,
    time_unit: String,
}

impl BurnupSchedule {
    /// Derives the steps for `checkpoints` held at a constant `specific_power`.
    pub fn new(checkpoints: &[f64], specific_power: f64) -> Result<Self, OlmError> {
        Self::with_units(
            checkpoints,
            specific_power,
            &BurnupSpec::default_burnup_unit(),
            &BurnupSpec::default_time_unit(),
        )
    }

    /// Builds the base schedule described by a configuration block.
    pub fn from_spec(spec: &BurnupSpec) -> Result<Self, OlmError> {
        if !(spec.burnup_scale.is_finite() && spec.burnup_scale > 0.0) {
            return Err(OlmError::configuration(
                "burnup_scale_invalid",
                format!("burnup_scale must be positive, got {}", spec.burnup_scale),
            ));
        }
        let scaled: Vec<f64> = spec
            .checkpoints
            .iter()
            .map(|value| value * spec.burnup_scale)
            .collect();
        Self::with_units(
            &scaled,
            spec.specific_power,
            &spec.burnup_unit,
            &spec.time_unit,
        )
    }

    fn with_units(
        checkpoints: &[f64],
        specific_power: f64,
        burnup_unit: &str,
        time_unit: &str,
    ) -> Result<Self, OlmError> {
        validate_power(specific_power)?;
        let Some(&first) = checkpoints.first() else {
            return Err(OlmError::configuration(
                "burnup_empty",
                "at least the initial zero burnup checkpoint is required",
            ));
        };
        if first != 0.0 {
            return Err(OlmError::Configuration(
                ErrorInfo::new(
                    "burnup_nonzero_start",
                    format!("the first burnup checkpoint must be 0, got {first}"),
                )
                .with_hint("prepend 0.0 to describe the unirradiated state"),
            ));
        }
        for (index, pair) in checkpoints.windows(2).enumerate() {
            if !pair[1].is_finite() || pair[1] <= pair[0] {
                return Err(OlmError::Configuration(
                    ErrorInfo::new(
                        "burnup_not_increasing",
                        format!(
                            "checkpoint {} ({}) does not exceed checkpoint {} ({})",
                            index + 1,
                            pair[1],
                            index,
                            pair[0]
                        ),
                    )
                    .with_context("index", (index + 1).to_string()),
                ));
            }
        }

        let mut steps = Vec::with_capacity(checkpoints.len());
        let mut time = 0.0;
        let mut previous = 0.0;
        for (index, &burnup) in checkpoints.iter().enumerate() {
            let delta_time = (burnup - previous) / specific_power;
            time += delta_time;
            steps.push(BurnupStep {
                index,
                burnup,
                specific_power,
                delta_time,
                time,
            });
            previous = burnup;
        }
        Ok(Self {
            steps,
            burnup_unit: burnup_unit.to_string(),
            time_unit: time_unit.to_string(),
        })
    }

    /// Returns a copy held at a different specific power with recomputed times.
    pub fn with_specific_power(&self, specific_power: f64) -> Result<Self, OlmError> {
        let checkpoints = self.burnups();
        Self::with_units(
            &checkpoints,
            specific_power,
            &self.burnup_unit,
            &self.time_unit,
        )
    }

    /// Steps in order.
    pub fn steps(&self) -> &[BurnupStep] {
        &self.steps
    }

    /// Number of steps (including the initial state).
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Always false for a constructed schedule.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Cumulative burnup checkpoints.
    pub fn burnups(&self) -> Vec<f64> {
        self.steps.iter().map(|step| step.burnup).collect()
    }

    /// Time deltas between checkpoints (the first is zero).
    pub fn delta_times(&self) -> Vec<f64> {
        self.steps.iter().map(|step| step.delta_time).collect()
    }

    /// Specific power shared by every step.
    pub fn specific_power(&self) -> f64 {
        self.steps[0].specific_power
    }

    /// Burnup unit label.
    pub fn burnup_unit(&self) -> &str {
        &self.burnup_unit
    }

    /// Time unit label.
    pub fn time_unit(&self) -> &str {
        &self.time_unit
    }
}

fn validate_power(specific_power: f64) -> Result<(), OlmError> {
    if specific_power.is_finite() && specific_power > 0.0 {
        Ok(())
    } else {
        Err(OlmError::Configuration(
            ErrorInfo::new(
                "burnup_power_invalid",
                format!("specific power must be positive, got {specific_power}"),
            )
            .with_context("specific_power", specific_power.to_string()),
        ))
    }
}
