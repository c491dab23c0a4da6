pub mod analyze;
pub mod classify;
pub mod sheet;

pub use analyze::{analyze, ReportSummary};
pub use classify::{classify, classify_file, Classification};
pub use sheet::{Cell, ReportSheet};
