use crate::config::connections::Connections;
use crate::utils::error::Result;
use crate::utils::validation::validate_url;

/// 連線的 base URL 加上 endpoint，兩邊的斜線只保留一個
pub fn join_url(base: &str, endpoint: &str) -> String {
    let base = base.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    if endpoint.is_empty() {
        format!("{}/", base)
    } else {
        format!("{}/{}", base, endpoint)
    }
}

/// 解析具名 HTTP 連線並組出完整 URL
pub fn resolve_endpoint(connections: &Connections, connection: &str, endpoint: &str) -> Result<String> {
    let base = connections.resolve(connection)?;
    validate_url(&format!("connections.{}", connection), &base)?;
    Ok(join_url(&base, endpoint))
}
