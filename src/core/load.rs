use crate::domain::model::StagingArtifact;
use crate::domain::ports::{Storage, UserStore};
use crate::utils::error::{EtlError, Result};

/// 讀取暫存檔並 bulk copy 進目的表；失敗時暫存檔保持原樣
pub async fn load_staged<S, D>(storage: &S, store: &D, artifact: &StagingArtifact, table: &str) -> Result<u64>
where
    S: Storage,
    D: UserStore + ?Sized,
{
    let data = storage.read_file(&artifact.key).await?;
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(EtlError::LoadError {
            table: table.to_string(),
            message: format!("staging artifact {} is empty", artifact.path.display()),
        });
    }

    tracing::debug!(
        "💾 Copying {} bytes from {} into {}",
        data.len(),
        artifact.path.display(),
        table
    );
    let rows = store.copy_csv(&data).await?;
    Ok(rows)
}
