use std::collections::BTreeMap;

use olm_core::errors::{ErrorInfo, OlmError};
use serde::{Deserialize, Serialize};

use crate::space::StatePoint;

/// Derived material quantities of one case keyed by name (weight percents,
/// masses, densities).
pub type Composition = BTreeMap<String, f64>;

/// Fuel composition calculator applied to every state point.
///
/// UOX calculators read the `enrichment` axis; the MOX calculator reads the
/// `pu239` (Pu-239 share of plutonium) and `pu` (plutonium share of heavy
/// metal) axes. `prefix` is prepended to the axis names read and to the
/// nuclide keys written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CompositionSpec {
    /// U-235 at the enrichment, U-238 for the balance.
    #[serde(rename = "uox_simple")]
    UoxSimple {
        /// Key prefix.
        #[serde(default)]
        prefix: String,
    },
    /// VERA benchmark correlation, valid up to 10 wt%.
    #[serde(rename = "uox_vera")]
    UoxVera {
        /// Key prefix.
        #[serde(default)]
        prefix: String,
    },
    /// NUREG/CR-5625 correlation, valid up to 20 wt%.
    #[serde(rename = "uox_nuregcr5625")]
    UoxNuregcr5625 {
        /// Key prefix.
        #[serde(default)]
        prefix: String,
    },
    /// ORNL/TM-2003/2 plutonium vector with zoned pin contents.
    #[serde(rename = "mox_ornltm2003_2")]
    MoxOrnltm2003_2 {
        /// Pin counts of the inner, inside edge, edge and corner zones.
        pins_zone: [f64; 4],
        /// Oxide fuel density in g/cc.
        #[serde(default = "CompositionSpec::default_density_fuel")]
        density_fuel: f64,
        /// Gadolinia pins; only zero is supported.
        #[serde(default)]
        pins_gd: u32,
        /// Gadolinia weight percent in gadolinia pins.
        #[serde(default)]
        pct_gd: f64,
        /// Key prefix.
        #[serde(default)]
        prefix: String,
    },
}

const URANIUM_MASS: f64 = 238.0289;
const OXYGEN_MASS: f64 = 15.999;
const ZONE_RATIOS: [f64; 4] = [1.0, 0.9, 0.68, 0.5];
const ZONE_NAMES: [&str; 4] = ["inner", "inedge", "edge", "corner"];

impl CompositionSpec {
    fn default_density_fuel() -> f64 {
        10.4
    }

    /// Stable identifier used in logs and error context.
    pub fn id(&self) -> &'static str {
        match self {
            CompositionSpec::UoxSimple { .. } => "uox_simple",
            CompositionSpec::UoxVera { .. } => "uox_vera",
            CompositionSpec::UoxNuregcr5625 { .. } => "uox_nuregcr5625",
            CompositionSpec::MoxOrnltm2003_2 { .. } => "mox_ornltm2003_2",
        }
    }

    /// Computes the composition at `point`.
    pub fn compose(&self, point: &StatePoint) -> Result<Composition, OlmError> {
        match self {
            CompositionSpec::UoxSimple { prefix } => {
                let enrichment = self.read(point, prefix, "enrichment")?;
                self.check_range("enrichment", enrichment, 0.0, 100.0)?;
                Ok(uox(prefix, enrichment, 1.0e-20, 1.0e-20))
            }
            CompositionSpec::UoxVera { prefix } => {
                let enrichment = self.read(point, prefix, "enrichment")?;
                self.check_range("enrichment", enrichment, 0.0, 10.0)?;
                Ok(uox(
                    prefix,
                    enrichment,
                    0.007731 * enrichment.powf(1.0837),
                    0.0046 * enrichment,
                ))
            }
            CompositionSpec::UoxNuregcr5625 { prefix } => {
                let enrichment = self.read(point, prefix, "enrichment")?;
                self.check_range("enrichment", enrichment, 0.0, 20.0)?;
                Ok(uox(prefix, enrichment, 0.0089 * enrichment, 0.0046 * enrichment))
            }
            CompositionSpec::MoxOrnltm2003_2 {
                pins_zone,
                density_fuel,
                pins_gd,
                pct_gd,
                prefix,
            } => {
                if *pins_gd > 0 {
                    return Err(self.error(
                        "composition_gd_unsupported",
                        "gadolinia pins are not supported in MOX zoning".to_string(),
                    ));
                }
                if pins_zone.iter().any(|&n| !(n.is_finite() && n >= 0.0))
                    || pins_zone.iter().sum::<f64>() <= 0.0
                {
                    let message =
                        format!("pins_zone must be non-negative with a positive total, got {pins_zone:?}");
                    return Err(self.error("composition_pins_invalid", message));
                }
                if !(density_fuel.is_finite() && *density_fuel > 0.0) {
                    return Err(self.error(
                        "composition_density_invalid",
                        format!("density_fuel must be positive, got {density_fuel}"),
                    ));
                }
                let pu239 = self.read(point, prefix, "pu239")?;
                if !(pu239 > 0.0 && pu239 < 100.0) {
                    return Err(self.out_of_range("pu239", pu239, "between 0 and 100 exclusive"));
                }
                let pu = self.read(point, prefix, "pu")?;
                self.check_range("pu", pu, 0.0, 100.0)?;
                Ok(mox(prefix, pu239, pu, pins_zone, *density_fuel, *pct_gd))
            }
        }
    }

    fn read(&self, point: &StatePoint, prefix: &str, axis: &str) -> Result<f64, OlmError> {
        let name = format!("{prefix}{axis}");
        point.value(&name).ok_or_else(|| {
            OlmError::Configuration(
                ErrorInfo::new(
                    "composition_axis_missing",
                    format!("{} needs a `{name}` axis", self.id()),
                )
                .with_context("calculator", self.id())
                .with_context("axis", name),
            )
        })
    }

    fn check_range(&self, axis: &str, value: f64, low: f64, high: f64) -> Result<(), OlmError> {
        if (low..=high).contains(&value) {
            Ok(())
        } else {
            Err(self.out_of_range(axis, value, &format!("within [{low}, {high}]")))
        }
    }

    fn out_of_range(&self, axis: &str, value: f64, bounds: &str) -> OlmError {
        OlmError::Configuration(
            ErrorInfo::new(
                "composition_out_of_range",
                format!("{axis}={value} must be {bounds} to use {}", self.id()),
            )
            .with_context("calculator", self.id())
            .with_context("axis", axis)
            .with_context("value", value.to_string()),
        )
    }

    fn error(&self, code: &str, message: String) -> OlmError {
        OlmError::Configuration(ErrorInfo::new(code, message).with_context("calculator", self.id()))
    }
}

fn uox(prefix: &str, u235: f64, u234: f64, u236: f64) -> Composition {
    [
        ("u234", u234),
        ("u235", u235),
        ("u236", u236),
        ("u238", 100.0 - u234 - u235 - u236),
    ]
    .into_iter()
    .map(|(nuclide, wt)| (format!("{prefix}{nuclide}"), wt))
    .collect()
}

fn mox(
    prefix: &str,
    pu239: f64,
    pu: f64,
    pins_zone: &[f64; 4],
    density_fuel: f64,
    pct_gd: f64,
) -> Composition {
    let vector = [
        (238.0, 0.0045678 * pu239 * pu239 - 0.66370 * pu239 + 24.941),
        (239.0, pu239),
        (240.0, -0.0113290 * pu239 * pu239 + 1.02710 * pu239 + 4.7929),
        (241.0, 0.0018630 * pu239 * pu239 - 0.42787 * pu239 + 26.355),
        (242.0, 0.0048985 * pu239 * pu239 - 0.93553 * pu239 + 43.911),
    ];
    let total: f64 = vector.iter().map(|(_, wt)| wt).sum();
    let avg_a_pu = vector.iter().map(|(mass, wt)| mass * wt).sum::<f64>() / total;

    let hm_mass = ((100.0 - pu) * URANIUM_MASS + pu * avg_a_pu) / 100.0;
    let hm_in_one_pin = hm_mass / (hm_mass + 2.0 * OXYGEN_MASS) * density_fuel;
    let pins: f64 = pins_zone.iter().sum();
    let pu_in_pins = hm_in_one_pin * pins * pu / 100.0;
    let weighted: f64 = ZONE_RATIOS.iter().zip(pins_zone).map(|(r, n)| r * n).sum();
    let inner = 100.0 / hm_in_one_pin * pu_in_pins / weighted;

    let mut composition: Composition = vector
        .iter()
        .map(|(mass, wt)| (format!("{prefix}pu{}", *mass as u32), *wt))
        .collect();
    composition.insert(format!("{prefix}pu"), pu);
    composition.insert(format!("{prefix}gd"), pct_gd);
    for (zone, ratio) in ZONE_NAMES.iter().zip(ZONE_RATIOS) {
        composition.insert(format!("{prefix}{zone}"), inner * ratio);
    }
    composition.insert("avg_a_pu".to_string(), avg_a_pu);
    composition.insert("density_fuel".to_string(), density_fuel);
    composition
}
