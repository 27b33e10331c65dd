#![deny(missing_docs)]
#![doc = "Core error taxonomy, canonical serialization and provenance types for the OLM library pipeline."]

pub mod errors;
/// Canonical hashing helpers.
pub mod hash;
pub mod provenance;
pub mod rng;
/// Canonical JSON, YAML and bincode helpers.
pub mod serde;

pub use errors::{ErrorInfo, OlmError};
pub use hash::{short_hash_string, stable_hash_string};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, substream_rng};
