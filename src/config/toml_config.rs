use crate::core::probe::ProbePolicy;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// 管線設定，所有區段都有預設值，空檔案也是合法設定
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub dag: DagConfig,
    pub connections: HashMap<String, ConnectionConfig>,
    pub probe: ProbeConfig,
    pub fetch: FetchConfig,
    pub staging: StagingConfig,
    pub load: LoadConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DagConfig {
    pub dag_id: String,
    pub schedule: String,
    pub start_date: NaiveDate,
    pub catchup: bool,
    pub tags: Vec<String>,
}

impl Default for DagConfig {
    fn default() -> Self {
        Self {
            dag_id: "user_processing".to_string(),
            schedule: "@daily".to_string(),
            start_date: NaiveDate::from_ymd_opt(2023, 5, 26).unwrap_or_default(),
            catchup: false,
            tags: vec!["quincytromp".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub connection: String,
    pub endpoint: String,
    pub poke_interval_seconds: u64,
    pub timeout_seconds: u64,
    pub max_attempts: Option<u32>,
    pub request_timeout_seconds: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connection: "user_api".to_string(),
            endpoint: "api/".to_string(),
            poke_interval_seconds: 5,
            timeout_seconds: 300,
            max_attempts: None,
            request_timeout_seconds: 10,
        }
    }
}

impl ProbeConfig {
    pub fn policy(&self) -> ProbePolicy {
        ProbePolicy {
            poke_interval: Duration::from_secs(self.poke_interval_seconds),
            timeout: Duration::from_secs(self.timeout_seconds),
            max_attempts: self.max_attempts,
            request_timeout: Duration::from_secs(self.request_timeout_seconds),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connection: String,
    pub endpoint: String,
    pub timeout_seconds: u64,
    pub log_response: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connection: "user_api".to_string(),
            endpoint: "api/".to_string(),
            timeout_seconds: 30,
            log_response: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    pub directory: String,
    /// 支援 {run_id}、{dag_id} 佔位符；不含 {run_id} 時所有執行共用同一檔案
    pub filename_template: String,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            directory: "/tmp".to_string(),
            filename_template: "processed_user_{run_id}.csv".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    pub connection: String,
    pub table: String,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            connection: "postgres".to_string(),
            table: "users".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    /// "compact" 或 "json"
    pub log_format: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_format: "compact".to_string(),
        }
    }
}

impl PipelineConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_toml_str_with_env(content, |name| std::env::var(name).ok())
    }

    /// 同 [`Self::from_toml_str`]，`${VAR}` 改由 `lookup` 取值
    pub fn from_toml_str_with_env<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let processed_content = Self::substitute_env_vars(content, lookup)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PG_PASSWORD})，未定義的變數保持原樣
    fn substitute_env_vars<F>(content: &str, lookup: F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            lookup(var_name).unwrap_or_else(|| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("dag.dag_id", &self.dag.dag_id)?;
        if self.dag.schedule != "@daily" {
            return Err(EtlError::InvalidConfigValueError {
                field: "dag.schedule".to_string(),
                value: self.dag.schedule.clone(),
                reason: "Only @daily is supported".to_string(),
            });
        }

        for (name, connection) in &self.connections {
            validation::validate_non_empty_string(&format!("connections.{}.uri", name), &connection.uri)?;
        }

        validation::validate_non_empty_string("probe.connection", &self.probe.connection)?;
        validation::validate_positive_number(
            "probe.poke_interval_seconds",
            self.probe.poke_interval_seconds as usize,
            1,
        )?;
        validation::validate_positive_number(
            "probe.timeout_seconds",
            self.probe.timeout_seconds as usize,
            1,
        )?;
        if let Some(attempts) = self.probe.max_attempts {
            validation::validate_positive_number("probe.max_attempts", attempts as usize, 1)?;
        }

        validation::validate_non_empty_string("fetch.connection", &self.fetch.connection)?;
        validation::validate_positive_number(
            "fetch.timeout_seconds",
            self.fetch.timeout_seconds as usize,
            1,
        )?;

        validation::validate_path("staging.directory", &self.staging.directory)?;
        validation::validate_path("staging.filename_template", &self.staging.filename_template)?;
        if self.staging.filename_template.contains('/') {
            return Err(EtlError::InvalidConfigValueError {
                field: "staging.filename_template".to_string(),
                value: self.staging.filename_template.clone(),
                reason: "Template must be a file name, not a path".to_string(),
            });
        }

        validation::validate_non_empty_string("load.connection", &self.load.connection)?;
        validation::validate_identifier("load.table", &self.load.table)?;

        let valid_formats = ["compact", "json"];
        if !valid_formats.contains(&self.monitoring.log_format.as_str()) {
            return Err(EtlError::InvalidConfigValueError {
                field: "monitoring.log_format".to_string(),
                value: self.monitoring.log_format.clone(),
                reason: format!("Valid formats: {}", valid_formats.join(", ")),
            });
        }

        Ok(())
    }

    /// 是否在 run 之間共用同一個暫存檔
    pub fn shares_staging_path(&self) -> bool {
        !self.staging.filename_template.contains("{run_id}")
    }
}

impl Validate for PipelineConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
