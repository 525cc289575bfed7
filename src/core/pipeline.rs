use crate::adapters::http::resolve_endpoint;
use crate::config::{Connections, PipelineConfig};
use crate::core::{fetch, load, probe, transform};
use crate::domain::model::{RunContext, SourcePayload, StagingArtifact};
use crate::domain::ports::{Pipeline, Storage, UserStore};
use crate::utils::error::Result;
use reqwest::Client;
use std::time::Duration;

/// user_processing 流程：建表 → 探測 API → 取一筆 → 扁平化暫存 → bulk copy
pub struct UserPipeline<S: Storage, D: UserStore> {
    storage: S,
    store: D,
    connections: Connections,
    config: PipelineConfig,
    client: Client,
}

impl<S: Storage, D: UserStore> UserPipeline<S, D> {
    pub fn new(storage: S, store: D, connections: Connections, config: PipelineConfig) -> Self {
        Self {
            storage,
            store,
            connections,
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn staging_artifact(&self, run: &RunContext) -> StagingArtifact {
        let key = transform::render_staging_key(
            &self.config.staging.filename_template,
            run,
            &self.config.dag.dag_id,
        );
        let path = self.storage.locate(&key);
        StagingArtifact { key, path }
    }
}

#[async_trait::async_trait]
impl<S: Storage, D: UserStore> Pipeline for UserPipeline<S, D> {
    async fn create_table(&self) -> Result<()> {
        self.store.ensure_schema().await?;
        tracing::info!("🗄️ Table '{}' is in place", self.config.load.table);
        Ok(())
    }

    async fn wait_for_api(&self) -> Result<()> {
        let url = resolve_endpoint(
            &self.connections,
            &self.config.probe.connection,
            &self.config.probe.endpoint,
        )?;
        probe::wait_until_available(&self.client, &url, &self.config.probe.policy()).await?;
        Ok(())
    }

    async fn extract(&self) -> Result<SourcePayload> {
        let url = resolve_endpoint(
            &self.connections,
            &self.config.fetch.connection,
            &self.config.fetch.endpoint,
        )?;
        let payload = fetch::fetch_json(
            &self.client,
            &url,
            Duration::from_secs(self.config.fetch.timeout_seconds),
            self.config.fetch.log_response,
        )
        .await?;

        tracing::info!("📥 Fetched payload with {} top-level keys", payload.len());
        Ok(payload)
    }

    async fn transform(&self, payload: SourcePayload, run: &RunContext) -> Result<StagingArtifact> {
        // 先完成所有欄位查找，失敗時不會留下半成品
        let row = transform::flatten_user(&payload)?;
        let bytes = transform::encode_row(&row)?;

        let artifact = self.staging_artifact(run);
        if self.config.shares_staging_path() {
            tracing::warn!(
                "⚠️ Staging path {} is shared by all runs",
                artifact.path.display()
            );
        }
        self.storage.write_file(&artifact.key, &bytes).await?;

        tracing::info!(
            "🔄 Staged user '{}' to {}",
            row.username,
            artifact.path.display()
        );
        Ok(artifact)
    }

    async fn load(&self, artifact: &StagingArtifact) -> Result<u64> {
        let rows =
            load::load_staged(&self.storage, &self.store, artifact, &self.config.load.table).await?;
        tracing::info!(
            "💾 Copied {} row(s) into '{}'",
            rows,
            self.config.load.table
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{LocalStorage, MemoryUserStore};
    use chrono::{TimeZone, Utc};
    use httpmock::prelude::*;
    use tempfile::TempDir;

    fn pipeline(
        temp_dir: &TempDir,
        base_url: &str,
        store: MemoryUserStore,
    ) -> UserPipeline<LocalStorage, MemoryUserStore> {
        let mut config = PipelineConfig::default();
        config.staging.directory = temp_dir.path().to_str().unwrap().to_string();
        config.probe.poke_interval_seconds = 1;
        config.probe.timeout_seconds = 1;

        let storage = LocalStorage::new(config.staging.directory.clone());
        let connections = Connections::default().with("user_api", base_url);
        UserPipeline::new(storage, store, connections, config)
    }

    fn run() -> RunContext {
        RunContext::scheduled(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_extract_uses_named_connection() {
        let temp_dir = TempDir::new().unwrap();
        let server = MockServer::start();
        let api_mock = server.mock(|when, then| {
            when.method(GET).path("/api/");
            then.status(200)
                .json_body(serde_json::json!({"results": []}));
        });

        let pipeline = pipeline(&temp_dir, &server.base_url(), MemoryUserStore::new("users"));
        let payload = pipeline.extract().await.unwrap();

        api_mock.assert();
        assert!(payload.contains_key("results"));
    }

    #[tokio::test]
    async fn test_transform_writes_run_scoped_artifact() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir, "http://unused", MemoryUserStore::new("users"));

        let payload = match serde_json::json!({
            "results": [{
                "name": {"first": "Ada", "last": "Lovelace"},
                "location": {"country": "UK"},
                "login": {"username": "ada99", "password": "secret"},
                "email": "a@x.com"
            }]
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };

        let artifact = pipeline.transform(payload, &run()).await.unwrap();

        assert_eq!(artifact.key, "processed_user_scheduled__2024-03-01T00-00-00Z.csv");
        let content = std::fs::read_to_string(&artifact.path).unwrap();
        assert_eq!(content, "Ada,Lovelace,UK,ada99,secret,a@x.com\n");
    }

    #[tokio::test]
    async fn test_transform_failure_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let pipeline = pipeline(&temp_dir, "http://unused", MemoryUserStore::new("users"));

        let payload = match serde_json::json!({"results": []}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };

        assert!(pipeline.transform(payload, &run()).await.is_err());
        assert!(!pipeline.staging_artifact(&run()).path.exists());
    }

    #[tokio::test]
    async fn test_wait_for_api_unknown_connection() {
        let temp_dir = TempDir::new().unwrap();
        let mut pipeline = pipeline(&temp_dir, "http://unused", MemoryUserStore::new("users"));
        pipeline.config.probe.connection = "not_configured_api".to_string();

        let err = pipeline.wait_for_api().await.unwrap_err();
        assert!(matches!(
            err,
            crate::utils::error::EtlError::UnknownConnection { .. }
        ));
    }
}
