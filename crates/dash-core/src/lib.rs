pub mod backend;
pub mod error;
pub mod table;
pub mod types;

pub use backend::{BackendResult, QueryBackend};
pub use error::{DashError, Result};
pub use table::ResultTable;
pub use types::ScalarValue;
