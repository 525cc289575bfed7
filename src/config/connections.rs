use crate::config::toml_config::PipelineConfig;
use crate::utils::error::{EtlError, Result};
use std::collections::HashMap;

/// 具名連線，每個步驟執行時才解析
///
/// 解析順序：環境變數 `ETL_CONN_<NAME>` 優先，其次是設定檔的 `[connections.<name>]`。
#[derive(Clone)]
pub struct Connections {
    entries: HashMap<String, String>,
    env: fn(&str) -> Option<String>,
}

impl Default for Connections {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

impl std::fmt::Debug for Connections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.entries.keys().collect();
        names.sort();
        // URI 可能含密碼，只列名稱
        f.debug_struct("Connections").field("names", &names).finish()
    }
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

impl Connections {
    pub const ENV_PREFIX: &'static str = "ETL_CONN_";

    pub fn new(entries: HashMap<String, String>) -> Self {
        Self {
            entries,
            env: process_env,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        let entries = config
            .connections
            .iter()
            .map(|(name, conn)| (name.clone(), conn.uri.clone()))
            .collect();
        Self::new(entries)
    }

    pub fn with(mut self, name: impl Into<String>, uri: impl Into<String>) -> Self {
        self.entries.insert(name.into(), uri.into());
        self
    }

    /// 替換環境變數的來源
    pub fn with_env_lookup(mut self, env: fn(&str) -> Option<String>) -> Self {
        self.env = env;
        self
    }

    pub fn env_var_name(name: &str) -> String {
        format!(
            "{}{}",
            Self::ENV_PREFIX,
            name.to_ascii_uppercase().replace('-', "_")
        )
    }

    pub fn resolve(&self, name: &str) -> Result<String> {
        if let Some(uri) = (self.env)(&Self::env_var_name(name)) {
            if !uri.trim().is_empty() {
                tracing::debug!("🔌 Connection '{}' resolved from environment", name);
                return Ok(uri);
            }
        }

        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| EtlError::UnknownConnection {
                name: name.to_string(),
            })
    }

    /// dry-run 顯示用，遮蔽密碼
    pub fn describe(&self, name: &str) -> String {
        match self.resolve(name) {
            Ok(uri) => match url::Url::parse(&uri) {
                Ok(mut parsed) => {
                    if parsed.password().is_some() {
                        let _ = parsed.set_password(Some("***"));
                    }
                    parsed.to_string()
                }
                Err(_) => uri,
            },
            Err(_) => "<unresolved>".to_string(),
        }
    }
}
