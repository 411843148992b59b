//! Shutdown signal handling

use std::future::Future;
use std::io;

use tracing::error;

/// Resolve once `signal` reports a shutdown request
///
/// If the listener itself fails there is no request to act on: the error is
/// logged and the returned future never resolves.
pub async fn shutdown_requested<F>(signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
