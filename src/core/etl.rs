use crate::core::Pipeline;
use crate::domain::model::{RunContext, RunReport, StepId, StepState};
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::SystemMonitor;
use std::future::Future;
use std::time::Instant;

/// 依序執行五個步驟，第一個失敗就停止，下游步驟維持 Pending
pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self, run: &RunContext) -> Result<RunReport> {
        let (report, result) = self.run_with_report(run).await;
        result.map(|_| report)
    }

    /// 執行並同時回傳報告；失敗時錯誤為 `StepFailed`
    pub async fn run_with_report(&self, run: &RunContext) -> (RunReport, Result<()>) {
        let mut report = RunReport::new(run.run_id.clone());
        tracing::info!("🚀 Starting run {}", run.run_id);

        let result = self.execute(run, &mut report).await;

        match &result {
            Ok(()) => tracing::info!("✅ Run {} succeeded", run.run_id),
            Err(e) => tracing::error!("❌ Run {} failed: {}", run.run_id, e),
        }
        self.monitor.log_final_stats();

        (report, result)
    }

    async fn execute(&self, run: &RunContext, report: &mut RunReport) -> Result<()> {
        self.step(report, StepId::CreateTable, self.pipeline.create_table())
            .await?;
        self.step(report, StepId::IsApiAvailable, self.pipeline.wait_for_api())
            .await?;

        let payload = self
            .step(report, StepId::ExtractUser, self.pipeline.extract())
            .await?;

        let artifact = self
            .step(
                report,
                StepId::ProcessUser,
                self.pipeline.transform(payload, run),
            )
            .await?;
        report.staging_path = Some(artifact.path.display().to_string());

        let rows = self
            .step(report, StepId::StoreUser, self.pipeline.load(&artifact))
            .await?;
        report.rows_loaded = Some(rows);

        Ok(())
    }

    async fn step<T, F>(&self, report: &mut RunReport, step: StepId, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        report.set_state(step, StepState::Running, None);
        tracing::info!("▶️ {}: {}", step, step.description());

        let started = Instant::now();
        let result = work.await;
        let elapsed = started.elapsed();
        let duration_ms = Some(elapsed.as_millis() as u64);

        match result {
            Ok(value) => {
                report.set_state(step, StepState::Success, duration_ms);
                tracing::info!("✔️ {} finished in {:?}", step, elapsed);
                self.monitor.log_stats(step.as_str());
                Ok(value)
            }
            Err(e) => {
                report.set_state(step, StepState::Failed, duration_ms);
                tracing::error!("✖️ {} failed after {:?}: {}", step, elapsed, e);
                tracing::error!("💡 {}", e.recovery_suggestion());
                Err(EtlError::StepFailed {
                    step,
                    source: Box::new(e),
                })
            }
        }
    }
}
