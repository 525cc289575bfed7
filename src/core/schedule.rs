use crate::config::toml_config::DagConfig;
use crate::core::{EtlEngine, Pipeline, Storage};
use crate::domain::model::RunContext;
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Duration, NaiveTime, SecondsFormat, TimeZone, Utc};
use std::path::PathBuf;

/// `@daily` 排程：區間 [d, d+1)，在 d+1 的 00:00 UTC 觸發，logical date 為 d
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DailySchedule {
    start: DateTime<Utc>,
    catchup: bool,
}

impl DailySchedule {
    pub fn new(start: DateTime<Utc>, catchup: bool) -> Self {
        Self {
            start: floor_to_day(start),
            catchup,
        }
    }

    pub fn from_config(dag: &DagConfig) -> Self {
        let start = Utc.from_utc_datetime(&dag.start_date.and_time(NaiveTime::MIN));
        Self::new(start, dag.catchup)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// `now` 時最後一個已結束區間的 logical date
    pub fn latest_complete_interval(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let candidate = floor_to_day(now) - Duration::days(1);
        (candidate >= self.start).then_some(candidate)
    }

    /// 需要執行的 logical dates (由舊到新)。
    /// catchup 關閉時只補最新的一個區間。
    pub fn due_runs(
        &self,
        last_logical: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        let Some(latest) = self.latest_complete_interval(now) else {
            return Vec::new();
        };
        if last_logical.is_some_and(|last| last >= latest) {
            return Vec::new();
        }
        if !self.catchup {
            return vec![latest];
        }

        let mut next = match last_logical {
            Some(last) => (last + Duration::days(1)).max(self.start),
            None => self.start,
        };
        let mut due = Vec::new();
        while next <= latest {
            due.push(next);
            next += Duration::days(1);
        }
        due
    }

    /// 下一次觸發時間 (嚴格晚於 `now`)
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let first_fire = self.start + Duration::days(1);
        let next_midnight = floor_to_day(now) + Duration::days(1);
        next_midnight.max(first_fire)
    }
}

fn floor_to_day(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&at.date_naive().and_time(NaiveTime::MIN))
}

/// 最後一次排程執行的 logical date，存成 `<dag_id>.last_run`，重啟後接續
#[derive(Debug, Clone)]
pub struct RunMarker<S: Storage> {
    storage: S,
    key: String,
}

impl<S: Storage> RunMarker<S> {
    pub fn new(storage: S, dag_id: &str) -> Self {
        Self {
            storage,
            key: format!("{}.last_run", dag_id),
        }
    }

    pub fn location(&self) -> PathBuf {
        self.storage.locate(&self.key)
    }

    /// 檔案不存在代表從未執行過
    pub async fn load(&self) -> Result<Option<DateTime<Utc>>> {
        let data = match self.storage.read_file(&self.key).await {
            Ok(data) => data,
            Err(EtlError::IoError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(None)
            }
            Err(e) => return Err(e),
        };

        let text = String::from_utf8_lossy(&data);
        let text = text.trim();
        DateTime::parse_from_rfc3339(text)
            .map(|at| Some(at.with_timezone(&Utc)))
            .map_err(|e| EtlError::ScheduleStateError {
                key: self.key.clone(),
                message: format!("'{}' is not an RFC3339 timestamp: {}", text, e),
            })
    }

    pub async fn save(&self, logical_date: DateTime<Utc>) -> Result<()> {
        let line = format!("{}\n", logical_date.to_rfc3339_opts(SecondsFormat::Secs, true));
        self.storage.write_file(&self.key, line.as_bytes()).await
    }
}

/// 執行 `now` 時所有到期的區間，每跑完一個 (不論成敗) 就寫回 marker。
/// 回傳這次執行的 run 數。
pub async fn run_due<P: Pipeline, S: Storage>(
    engine: &EtlEngine<P>,
    schedule: &DailySchedule,
    marker: &RunMarker<S>,
    now: DateTime<Utc>,
) -> Result<usize> {
    let last_logical = marker.load().await?;
    let due = schedule.due_runs(last_logical, now);
    if let Some(last) = last_logical {
        tracing::debug!("📅 Last scheduled logical date: {}", last.to_rfc3339());
    }

    for logical_date in &due {
        let run = RunContext::scheduled(*logical_date);
        let (report, result) = engine.run_with_report(&run).await;
        match result {
            Ok(()) => tracing::info!(
                "📅 Scheduled run {} finished, {} row(s) loaded",
                report.run_id,
                report.rows_loaded.unwrap_or(0)
            ),
            Err(e) => tracing::error!(
                "📅 Scheduled run {} failed ({:?}): {}",
                report.run_id,
                e.category(),
                e.user_friendly_message()
            ),
        }
        marker.save(*logical_date).await?;
    }
    Ok(due.len())
}

/// 依排程持續執行，一次只跑一個 run；單次失敗不會中止排程
pub async fn run_scheduled<P: Pipeline, S: Storage>(
    engine: &EtlEngine<P>,
    schedule: &DailySchedule,
    marker: &RunMarker<S>,
) {
    loop {
        if let Err(e) = run_due(engine, schedule, marker, Utc::now()).await {
            tracing::error!("❌ Scheduling pass stopped: {}", e);
            tracing::error!("💡 {}", e.recovery_suggestion());
        }

        let now = Utc::now();
        let next = schedule.next_fire_after(now);
        tracing::info!("💤 Next run at {}", next.to_rfc3339());
        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
    }
}
