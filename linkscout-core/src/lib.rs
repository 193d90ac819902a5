pub mod analysis;
pub mod error;
pub mod report;

pub use analysis::{AnalysisHandle, AnalysisOptions, AnalysisStatus, start_analysis};
pub use error::AnalysisError;
