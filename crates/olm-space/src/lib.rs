#![deny(missing_docs)]
#![doc = "State space expansion, burnup schedules and case sets for the OLM library pipeline."]

/// Validated axis declarations.
pub mod axis;
/// Burnup checkpoints and derived irradiation times.
pub mod burnup;
/// Cases and deterministic case identifiers.
pub mod case;
/// Fuel composition calculators.
pub mod composition;
/// Expansion strategies and state points.
pub mod space;

pub use axis::{Axis, AxisSpec};
pub use burnup::{BurnupSchedule, BurnupSpec, BurnupStep};
pub use case::{Case, CaseId, CaseSet, Cases, ManifestEntry, StaticParams};
pub use composition::{Composition, CompositionSpec};
pub use space::{Coordinate, ExpansionStrategy, StatePoint, StateSpace};
