use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::ControllerError;

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Runs `fut` with an upper bound on its duration.
pub async fn bounded<F, T>(label: &'static str, timeout: Duration, fut: F) -> Result<T, ControllerError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| ControllerError::Timeout { label, timeout })
}
