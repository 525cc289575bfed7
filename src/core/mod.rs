pub mod etl;
pub mod fetch;
pub mod load;
pub mod pipeline;
pub mod probe;
pub mod schedule;
pub mod schema;
pub mod transform;

pub use crate::domain::model::{FlatRow, RunContext, RunReport, SourcePayload, StagingArtifact, StepId, StepState};
pub use crate::domain::ports::{Pipeline, Storage, UserStore};
pub use crate::utils::error::Result;
pub use etl::EtlEngine;
