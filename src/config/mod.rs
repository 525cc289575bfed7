#[cfg(feature = "cli")]
pub mod cli;
pub mod connections;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;
pub use connections::Connections;
pub use toml_config::PipelineConfig;
