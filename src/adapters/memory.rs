use crate::domain::model::FlatRow;
use crate::domain::ports::UserStore;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct TableState {
    exists: bool,
    create_calls: usize,
    rows: Vec<Vec<String>>,
}

/// 記憶體內的目的表，COPY 行為比照 Postgres CSV 格式 (FORCE_NOT_NULL 全欄位)：
/// 欄位數必須剛好六個，空欄位存成空字串，整批成功或整批失敗。
#[derive(Debug, Clone)]
pub struct MemoryUserStore {
    table: String,
    state: Arc<Mutex<TableState>>,
    reachable: bool,
    copy_failure: Option<String>,
}

impl MemoryUserStore {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            state: Arc::new(Mutex::new(TableState::default())),
            reachable: true,
            copy_failure: None,
        }
    }

    /// 每個操作都回報連線失敗
    pub fn unreachable(table: impl Into<String>) -> Self {
        Self {
            reachable: false,
            ..Self::new(table)
        }
    }

    /// 建表正常，但每次 COPY 都以 `message` 失敗
    pub fn failing_copy(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            copy_failure: Some(message.into()),
            ..Self::new(table)
        }
    }

    pub async fn table_exists(&self) -> bool {
        self.state.lock().await.exists
    }

    pub async fn create_calls(&self) -> usize {
        self.state.lock().await.create_calls
    }

    pub async fn rows(&self) -> Vec<Vec<String>> {
        self.state.lock().await.rows.clone()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(self.load_error("connection refused"))
        }
    }

    fn load_error(&self, message: impl Into<String>) -> EtlError {
        EtlError::LoadError {
            table: self.table.clone(),
            message: message.into(),
        }
    }

    fn parse_rows(&self, data: &[u8]) -> Result<Vec<Vec<String>>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b',')
            .flexible(true)
            .from_reader(data);

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.len() != FlatRow::COLUMNS.len() {
                return Err(self.load_error(format!(
                    "expected {} columns, got {}",
                    FlatRow::COLUMNS.len(),
                    record.len()
                )));
            }
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn ensure_schema(&self) -> Result<()> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        state.create_calls += 1;
        state.exists = true;
        Ok(())
    }

    async fn copy_csv(&self, data: &[u8]) -> Result<u64> {
        self.check_reachable()?;
        let mut state = self.state.lock().await;
        if !state.exists {
            return Err(self.load_error(format!("relation \"{}\" does not exist", self.table)));
        }
        if let Some(message) = &self.copy_failure {
            return Err(self.load_error(message.clone()));
        }

        let rows = self.parse_rows(data)?;
        let count = rows.len() as u64;
        state.rows.extend(rows);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_requires_table() {
        let store = MemoryUserStore::new("users");
        let result = store.copy_csv(b"a,b,c,d,e,f\n").await;
        assert!(matches!(result, Err(EtlError::LoadError { .. })));
    }

    #[tokio::test]
    async fn test_copy_rejects_wrong_column_count_atomically() {
        let store = MemoryUserStore::new("users");
        store.ensure_schema().await.unwrap();

        let result = store.copy_csv(b"a,b,c,d,e,f\na,b,c\n").await;
        assert!(result.is_err());
        assert!(store.rows().await.is_empty());
    }

    #[tokio::test]
    async fn test_copy_keeps_empty_values() {
        let store = MemoryUserStore::new("users");
        store.ensure_schema().await.unwrap();

        let count = store.copy_csv(b"a,,c,d,e,\n").await.unwrap();

        assert_eq!(count, 1);
        assert_eq!(store.rows().await, vec![vec!["a", "", "c", "d", "e", ""]]);
    }

    #[tokio::test]
    async fn test_failing_copy_leaves_table_empty() {
        let store = MemoryUserStore::failing_copy("users", "disk full");
        store.ensure_schema().await.unwrap();

        let err = store.copy_csv(b"a,b,c,d,e,f\n").await.unwrap_err();

        assert!(err.to_string().contains("disk full"));
        assert!(store.table_exists().await);
        assert!(store.rows().await.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_store_fails_every_call() {
        let store = MemoryUserStore::unreachable("users");
        assert!(store.ensure_schema().await.is_err());
        assert!(!store.table_exists().await);
    }
}
