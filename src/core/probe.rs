use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use std::time::{Duration, Instant};

/// 輪詢上限：間隔、總時間、次數 (可選)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbePolicy {
    pub poke_interval: Duration,
    pub timeout: Duration,
    pub max_attempts: Option<u32>,
    pub request_timeout: Duration,
}

impl Default for ProbePolicy {
    fn default() -> Self {
        Self {
            poke_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(300),
            max_attempts: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ProbePolicy {
    fn exhausted(&self, attempts: u32, elapsed: Duration) -> bool {
        let out_of_attempts = self.max_attempts.is_some_and(|max| attempts >= max);
        out_of_attempts || elapsed + self.poke_interval > self.timeout
    }
}

/// 重複 GET 直到回應 2xx；傳輸錯誤與非 2xx 都視為尚未就緒。
/// 回傳成功時用掉的次數。
pub async fn wait_until_available(client: &Client, url: &str, policy: &ProbePolicy) -> Result<u32> {
    let start = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match client.get(url).timeout(policy.request_timeout).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!(
                    "🟢 API available at {} (attempt {}, status {})",
                    url,
                    attempts,
                    response.status()
                );
                return Ok(attempts);
            }
            Ok(response) => {
                tracing::info!(
                    "⏳ Poking {}: status {} (attempt {})",
                    url,
                    response.status(),
                    attempts
                );
            }
            Err(e) => {
                tracing::info!("⏳ Poking {}: {} (attempt {})", url, e, attempts);
            }
        }

        let elapsed = start.elapsed();
        if policy.exhausted(attempts, elapsed) {
            tracing::error!(
                "🔴 API at {} not available after {} attempts ({:?})",
                url,
                attempts,
                elapsed
            );
            return Err(EtlError::ProbeTimeout {
                url: url.to_string(),
                attempts,
                elapsed,
            });
        }

        tokio::time::sleep(policy.poke_interval).await;
    }
}
