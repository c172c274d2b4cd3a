//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race the outbound dial and the outbound request against the connection deadline
//! - Release whatever the losing side held
//!
//! # Design Decisions
//! - Uses Tokio's timer; the timer is dropped on every exit path
//! - A dial that loses is dropped, which closes any socket it opened
//! - A request that loses fires the connection's cancellation token so the
//!   body stream feeding it stops as well
//! - No retries here; the caller logs and tears down

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ProxyError;

/// Race a connect-style operation against `deadline`.
pub async fn connect<F, T, E>(operation: F, deadline: Duration) -> Result<T, ProxyError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ProxyError>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(ProxyError::Timeout {
            operation: "Connection",
            millis: millis(deadline),
        }),
    }
}

/// Race a request-style operation against `deadline`, cancelling `cancel` if the timer wins.
pub async fn request<F, T, E>(operation: F, deadline: Duration, cancel: &CancellationToken) -> Result<T, ProxyError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ProxyError>,
{
    tokio::select! {
        result = operation => result.map_err(Into::into),
        _ = tokio::time::sleep(deadline) => {
            cancel.cancel();
            Err(ProxyError::Timeout {
                operation: "Fetch",
                millis: millis(deadline),
            })
        }
        _ = cancel.cancelled() => Err(ProxyError::Cancelled),
    }
}

fn millis(deadline: Duration) -> u64 {
    u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX)
}
