//! Business logic services.
//!
//! Services orchestrate the I/O layer and storage backends.

mod integrity;
mod pipeline;

pub use integrity::{
    DEFAULT_COMPARE_ROWS, IntegrityReport, IntegrityService, MissingField, RoundTripMismatch,
    TypeViolation, compare_tables,
};
pub use pipeline::{EXPORTED_MESSAGE, INSERTED_MESSAGE, Pipeline, PipelineConfig, PipelineOutcome};
