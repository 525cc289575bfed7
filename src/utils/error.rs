use crate::domain::model::StepId;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("API not available at {url} after {attempts} attempts ({elapsed:?})")]
    ProbeTimeout {
        url: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("Fetch from {url} failed with status {status}")]
    FetchStatusError { url: String, status: u16 },

    #[error("Response from {url} could not be decoded: {message}")]
    FetchDecodeError { url: String, message: String },

    #[error("Missing field '{path}' in source record")]
    MissingFieldError { path: String },

    #[error("Field '{path}' is not a string (found {found})")]
    MalformedFieldError { path: String, found: String },

    #[error("Source payload has an empty result set")]
    EmptyResultSet,

    #[error("Load into '{table}' failed: {message}")]
    LoadError { table: String, message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Schedule state '{key}' is unreadable: {message}")]
    ScheduleStateError { key: String, message: String },

    #[error("Unknown connection '{name}'")]
    UnknownConnection { name: String },

    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: StepId,
        source: Box<EtlError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Source,
    Transform,
    Load,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    /// 錯誤分類，StepFailed 取內層錯誤的分類
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) | EtlError::ProbeTimeout { .. } => ErrorCategory::Network,
            EtlError::FetchStatusError { .. } | EtlError::FetchDecodeError { .. } => {
                ErrorCategory::Source
            }
            EtlError::MissingFieldError { .. }
            | EtlError::MalformedFieldError { .. }
            | EtlError::EmptyResultSet
            | EtlError::CsvError(_)
            | EtlError::SerializationError(_) => ErrorCategory::Transform,
            EtlError::DatabaseError(_) | EtlError::LoadError { .. } => ErrorCategory::Load,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::UnknownConnection { .. } => ErrorCategory::Configuration,
            EtlError::IoError(_) | EtlError::ScheduleStateError { .. } => ErrorCategory::System,
            EtlError::StepFailed { source, .. } => source.category(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 上游暫時不可用，下一次排程可能恢復
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Source | ErrorCategory::Transform | ErrorCategory::Load => {
                ErrorSeverity::High
            }
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 失敗的步驟 (只有 runner 包裝過的錯誤才有)
    pub fn failed_step(&self) -> Option<StepId> {
        match self {
            EtlError::StepFailed { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::StepFailed { source, .. } => source.recovery_suggestion(),
            EtlError::ProbeTimeout { .. } | EtlError::ApiError(_) => {
                "Check that the user_api connection points to a reachable host, or raise probe.timeout_seconds"
            }
            EtlError::FetchStatusError { .. } | EtlError::FetchDecodeError { .. } => {
                "Inspect the API response; the endpoint must return a JSON object with a 'results' array"
            }
            EtlError::MissingFieldError { .. }
            | EtlError::MalformedFieldError { .. }
            | EtlError::EmptyResultSet => {
                "The upstream record shape changed; compare results[0] against the expected name/location/login/email fields"
            }
            EtlError::DatabaseError(_) | EtlError::LoadError { .. } => {
                "Check the postgres connection and that the users table has six NOT NULL text columns"
            }
            EtlError::ScheduleStateError { .. } => {
                "Fix the <dag_id>.last_run file in the staging directory, or delete it to schedule from start_date again"
            }
            EtlError::UnknownConnection { .. } => {
                "Define the connection under [connections.<name>] or export ETL_CONN_<NAME>"
            }
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. } => {
                "Fix the configuration file and run again"
            }
            EtlError::CsvError(_) | EtlError::SerializationError(_) | EtlError::IoError(_) => {
                "Check that the staging directory exists and is writable"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::StepFailed { step, source } => {
                format!("Run failed at step '{}': {}", step, source.user_friendly_message())
            }
            EtlError::ProbeTimeout { url, attempts, .. } => {
                format!("User API at {} did not answer after {} attempts", url, attempts)
            }
            EtlError::EmptyResultSet => "User API returned no records".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failed_delegates_category_and_severity() {
        let err = EtlError::StepFailed {
            step: StepId::ProcessUser,
            source: Box::new(EtlError::MissingFieldError {
                path: "email".to_string(),
            }),
        };

        assert_eq!(err.category(), ErrorCategory::Transform);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.failed_step(), Some(StepId::ProcessUser));
        assert!(err.to_string().contains("process_user"));
        assert!(err.user_friendly_message().contains("email"));
    }

    #[test]
    fn test_probe_timeout_is_medium_severity() {
        let err = EtlError::ProbeTimeout {
            url: "http://localhost/api/".to_string(),
            attempts: 3,
            elapsed: Duration::from_secs(2),
        };

        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.failed_step().is_none());
    }
}
