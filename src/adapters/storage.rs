use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// 本機檔案系統上的暫存區
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.locate(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.locate(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // 先寫暫存檔再 rename，讀取端不會看到寫一半的內容
        let mut tmp_name = full_path.as_os_str().to_owned();
        tmp_name.push(".partial");
        let tmp_path = PathBuf::from(tmp_name);
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &full_path).await?;
        Ok(())
    }

    fn locate(&self, path: &str) -> PathBuf {
        Path::new(&self.base_path).join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

        storage.write_file("nested/row.csv", b"a,b\n").await.unwrap();
        let data = storage.read_file("nested/row.csv").await.unwrap();

        assert_eq!(data, b"a,b\n");
        assert!(!temp_dir.path().join("nested/row.csv.partial").exists());
    }

    #[tokio::test]
    async fn test_write_overwrites_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

        storage.write_file("row.csv", b"old\n").await.unwrap();
        storage.write_file("row.csv", b"new\n").await.unwrap();

        assert_eq!(storage.read_file("row.csv").await.unwrap(), b"new\n");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());

        let result = storage.read_file("missing.csv").await;
        assert!(matches!(result, Err(crate::utils::error::EtlError::IoError(_))));
    }
}
