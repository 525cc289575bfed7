use crate::config::toml_config::PipelineConfig;
use crate::utils::error::Result;
use clap::Parser;
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "configs/user_processing.toml";

#[derive(Debug, Clone, Parser)]
#[command(name = "user-processing-etl")]
#[command(about = "Fetch a random user, flatten it and bulk-load it into Postgres")]
pub struct CliConfig {
    /// Path to pipeline configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Run id for this manual run
    #[arg(long)]
    pub run_id: Option<String>,

    /// Keep running and trigger the pipeline on its daily schedule
    #[arg(long)]
    pub schedule: bool,

    /// Show the execution plan without executing
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process statistics after each step")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

impl CliConfig {
    /// 使用預設路徑且檔案不存在時，改用內建預設值
    pub fn uses_builtin_defaults(&self) -> bool {
        self.config == DEFAULT_CONFIG_PATH && !Path::new(&self.config).exists()
    }

    /// 載入設定檔。在 logger 初始化前呼叫，所以這裡不記錄日誌，
    /// 由呼叫端依 [`Self::uses_builtin_defaults`] 補上提示。
    pub fn load_pipeline_config(&self) -> Result<PipelineConfig> {
        if self.uses_builtin_defaults() {
            return Ok(PipelineConfig::default());
        }
        PipelineConfig::from_file(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let args = CliConfig::parse_from(["user-processing-etl", "--config", "no/such/file.toml"]);

        assert!(!args.uses_builtin_defaults());
        assert!(args.load_pipeline_config().is_err());
    }

    #[test]
    fn test_explicit_config_is_loaded() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[dag]\ncatchup = true").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let args = CliConfig::parse_from(["user-processing-etl", "-c", path.as_str(), "--dry-run"]);

        assert!(!args.uses_builtin_defaults());
        assert!(args.dry_run);
        assert!(args.load_pipeline_config().unwrap().dag.catchup);
    }
}
