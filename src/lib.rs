pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use adapters::{LocalStorage, MemoryUserStore, PgUserStore};
pub use config::{Connections, PipelineConfig};
pub use core::{etl::EtlEngine, pipeline::UserPipeline, schedule::DailySchedule};
pub use domain::model::{RunContext, RunReport, StepId, StepState};
pub use utils::error::{EtlError, Result};
