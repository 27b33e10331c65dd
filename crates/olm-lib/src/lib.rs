#![deny(missing_docs)]
#![doc = "Library assembly, burnup decimation and library persistence."]

/// Conversion of run results into a library.
pub mod assemble;
/// JSON and bincode persistence.
pub mod io;
/// Library data model and addressing.
pub mod library;
/// Burnup decimation.
pub mod thin;

pub use assemble::{Assembler, AssemblySpec};
pub use io::{library_from_bytes, library_to_bytes, load_library, save_library, LibraryFormat};
pub use library::{
    AxisMeta, AxisRole, Decimation, Library, LibraryEntry, LibraryPoint, LibrarySummary,
    SubLibrary,
};
pub use thin::{thin, thinned_indices};
