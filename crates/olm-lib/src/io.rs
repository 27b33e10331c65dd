use std::fs;
use std::path::Path;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_core::serde::{
    from_bincode_slice, from_json_slice, to_bincode_bytes, to_canonical_json_bytes,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::library::Library;

fn io_error(code: &str, err: impl ToString) -> OlmError {
    OlmError::io(code, err)
}

/// On-disk encoding of a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LibraryFormat {
    /// Canonical JSON with sorted keys.
    #[default]
    Json,
    /// Compact bincode.
    Bincode,
}

impl LibraryFormat {
    /// Picks the format from a file extension (`.bin`/`.bincode` vs anything else).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bin") | Some("bincode") => LibraryFormat::Bincode,
            _ => LibraryFormat::Json,
        }
    }

    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            LibraryFormat::Json => "json",
            LibraryFormat::Bincode => "bin",
        }
    }
}

/// Encodes a library.
pub fn library_to_bytes(library: &Library, format: LibraryFormat) -> Result<Vec<u8>, OlmError> {
    match format {
        LibraryFormat::Json => to_canonical_json_bytes(library),
        LibraryFormat::Bincode => to_bincode_bytes(library),
    }
}

/// Decodes a library and checks its schema major version.
pub fn library_from_bytes(bytes: &[u8], format: LibraryFormat) -> Result<Library, OlmError> {
    let library: Library = match format {
        LibraryFormat::Json => from_json_slice(bytes)?,
        LibraryFormat::Bincode => from_bincode_slice(bytes)?,
    };
    let supported = olm_core::provenance::SchemaVersion::default();
    if library.schema.major != supported.major {
        return Err(OlmError::Schema(
            ErrorInfo::new(
                "library_schema_version",
                format!(
                    "library schema {}.{}.{} is not readable by this version",
                    library.schema.major, library.schema.minor, library.schema.patch
                ),
            )
            .with_context("library", library.name),
        ));
    }
    Ok(library)
}

/// Writes a library to `path`, creating parent directories.
pub fn save_library(library: &Library, path: &Path, format: LibraryFormat) -> Result<(), OlmError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error("library_dir", err))?;
    }
    let bytes = library_to_bytes(library, format)?;
    fs::write(path, &bytes).map_err(|err| io_error("library_write", err))?;
    info!(path = %path.display(), bytes = bytes.len(), ?format, "library written");
    Ok(())
}

/// Reads a library from `path`.
pub fn load_library(path: &Path, format: LibraryFormat) -> Result<Library, OlmError> {
    let bytes = fs::read(path).map_err(|err| io_error("library_read", err))?;
    library_from_bytes(&bytes, format)
}
