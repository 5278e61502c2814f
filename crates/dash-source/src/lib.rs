//! Connectors implementing [`dash_core::QueryBackend`]
//!
//! - [`MemoryBackend`]: canned results keyed by query text, optionally loaded
//!   from CSV files. Used for offline runs and tests.
//! - [`FlightBackend`]: forwards SQL to an Arrow Flight server.

pub mod csv;
pub mod flight;
pub mod memory;

pub use csv::read_csv;
pub use flight::{FlightBackend, FlightOptions};
pub use memory::MemoryBackend;
