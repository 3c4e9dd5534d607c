//! The four lifecycle operations, one module each.
//!
//! Every operation takes the immutable [`Config`](crate::config::Config) and
//! the remote collaborators it needs as trait objects.

pub mod delete;
pub mod deploy;
pub mod predict;
pub mod prepare;

pub use delete::TeardownReport;
pub use deploy::unique_endpoint_name;
pub use predict::{PredictReport, SamplePrediction, SampleResult};
pub use prepare::PreparedArtifact;
