pub mod export;
mod summary;
pub mod views;

pub use export::{write_csv_exports, ExportError};
pub use summary::AllocationReport;
