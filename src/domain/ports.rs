use crate::domain::model::{RunContext, SourcePayload, StagingArtifact};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
    /// Storage key 對應的實際位置
    fn locate(&self, path: &str) -> std::path::PathBuf;
}

/// 目的資料庫，每次呼叫都以連線名稱重新解析
#[async_trait]
pub trait UserStore: Send + Sync {
    /// CREATE TABLE IF NOT EXISTS
    async fn ensure_schema(&self) -> Result<()>;

    /// 以 bulk copy 將 CSV 內容寫入目的表，回傳寫入列數
    async fn copy_csv(&self, data: &[u8]) -> Result<u64>;
}

/// 五段式流程，EtlEngine 依序呼叫
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn create_table(&self) -> Result<()>;
    async fn wait_for_api(&self) -> Result<()>;
    async fn extract(&self) -> Result<SourcePayload>;
    async fn transform(&self, payload: SourcePayload, run: &RunContext)
        -> Result<StagingArtifact>;
    async fn load(&self, artifact: &StagingArtifact) -> Result<u64>;
}
