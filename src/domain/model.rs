use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Fetcher 解碼後的 API 回應 (JSON object)
pub type SourcePayload = serde_json::Map<String, serde_json::Value>;

/// 五個步驟，順序固定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepId {
    CreateTable,
    IsApiAvailable,
    ExtractUser,
    ProcessUser,
    StoreUser,
}

impl StepId {
    pub const CHAIN: [StepId; 5] = [
        StepId::CreateTable,
        StepId::IsApiAvailable,
        StepId::ExtractUser,
        StepId::ProcessUser,
        StepId::StoreUser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepId::CreateTable => "create_table",
            StepId::IsApiAvailable => "is_api_available",
            StepId::ExtractUser => "extract_user",
            StepId::ProcessUser => "process_user",
            StepId::StoreUser => "store_user",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StepId::CreateTable => "ensure destination table exists",
            StepId::IsApiAvailable => "wait for user API",
            StepId::ExtractUser => "fetch one user record",
            StepId::ProcessUser => "flatten record into staging CSV",
            StepId::StoreUser => "bulk-copy staged row into table",
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Pending,
    Running,
    Success,
    Failed,
}

/// 扁平化後的一列，欄位順序必須與 users 表一致
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRow {
    pub firstname: String,
    pub lastname: String,
    pub country: String,
    pub username: String,
    pub password: String,
    pub email: String,
}

impl FlatRow {
    pub const COLUMNS: [&'static str; 6] = [
        "firstname",
        "lastname",
        "country",
        "username",
        "password",
        "email",
    ];

    pub fn values(&self) -> [&str; 6] {
        [
            &self.firstname,
            &self.lastname,
            &self.country,
            &self.username,
            &self.password,
            &self.email,
        ]
    }
}

/// Transformer 寫出、Loader 讀取的暫存檔
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingArtifact {
    /// Storage 內的相對 key
    pub key: String,
    /// 實際檔案路徑 (log 用)
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Scheduled,
    Manual,
}

/// 單次執行的身分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub run_id: String,
    pub logical_date: DateTime<Utc>,
    pub kind: TriggerKind,
}

impl RunContext {
    pub fn manual(now: DateTime<Utc>) -> Self {
        Self {
            run_id: format!("manual__{}", now.to_rfc3339_opts(SecondsFormat::Micros, true)),
            logical_date: now,
            kind: TriggerKind::Manual,
        }
    }

    pub fn scheduled(logical_date: DateTime<Utc>) -> Self {
        Self {
            run_id: format!(
                "scheduled__{}",
                logical_date.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            logical_date,
            kind: TriggerKind::Scheduled,
        }
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// 可放進檔名的 run id
    pub fn slug(&self) -> String {
        self.run_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '-'
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: StepId,
    pub state: StepState,
    pub duration_ms: Option<u64>,
}

/// 一次執行的結果摘要
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub steps: Vec<StepReport>,
    pub failed_step: Option<StepId>,
    pub staging_path: Option<String>,
    pub rows_loaded: Option<u64>,
}

impl RunReport {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            steps: StepId::CHAIN
                .iter()
                .map(|step| StepReport {
                    step: *step,
                    state: StepState::Pending,
                    duration_ms: None,
                })
                .collect(),
            failed_step: None,
            staging_path: None,
            rows_loaded: None,
        }
    }

    pub fn state_of(&self, step: StepId) -> StepState {
        self.steps
            .iter()
            .find(|s| s.step == step)
            .map(|s| s.state)
            .unwrap_or(StepState::Pending)
    }

    pub fn set_state(&mut self, step: StepId, state: StepState, duration_ms: Option<u64>) {
        if let Some(report) = self.steps.iter_mut().find(|s| s.step == step) {
            report.state = state;
            if duration_ms.is_some() {
                report.duration_ms = duration_ms;
            }
        }
        if state == StepState::Failed {
            self.failed_step = Some(step);
        }
    }

    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|s| s.state == StepState::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_step_chain_order_matches_ids() {
        let ids: Vec<&str> = StepId::CHAIN.iter().map(|s| s.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "create_table",
                "is_api_available",
                "extract_user",
                "process_user",
                "store_user"
            ]
        );
    }

    #[test]
    fn test_run_context_ids_and_slug() {
        let date = Utc.with_ymd_and_hms(2023, 5, 26, 0, 0, 0).unwrap();
        let ctx = RunContext::scheduled(date);
        assert_eq!(ctx.run_id, "scheduled__2023-05-26T00:00:00Z");
        assert_eq!(ctx.slug(), "scheduled__2023-05-26T00-00-00Z");

        let manual = RunContext::manual(date);
        assert!(manual.run_id.starts_with("manual__2023-05-26T00:00:00.000000"));
        assert_eq!(manual.kind, TriggerKind::Manual);
    }

    #[test]
    fn test_run_report_tracks_failure() {
        let mut report = RunReport::new("r1");
        assert!(!report.is_success());

        report.set_state(StepId::CreateTable, StepState::Success, Some(3));
        report.set_state(StepId::IsApiAvailable, StepState::Failed, Some(10));

        assert_eq!(report.failed_step, Some(StepId::IsApiAvailable));
        assert_eq!(report.state_of(StepId::ExtractUser), StepState::Pending);
        assert_eq!(report.steps[0].duration_ms, Some(3));
    }
}
