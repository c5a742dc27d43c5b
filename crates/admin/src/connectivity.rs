//! Debounced backend reachability probing
//!
//! While the user types a backend URL into the login form, each keystroke
//! schedules a probe and cancels the previous one, so only the URL that
//! survives the quiet period actually gets pinged.

use std::future::Future;
use std::time::Duration;

use ltzf_client::{ApiClient, ClientConfig, ClientError};
use tokio::task::JoinHandle;
use tracing::debug;

/// Default quiet period before a scheduled probe fires
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Scheduler holding at most one pending probe
pub struct ConnectivityChecker {
    delay: Duration,
    task: Option<JoinHandle<()>>,
}

impl ConnectivityChecker {
    pub fn new() -> Self {
        Self::with_delay(DEFAULT_DEBOUNCE)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay, task: None }
    }

    /// Schedule `probe` after the quiet period, superseding any pending one
    pub fn schedule<F, Fut>(&mut self, probe: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            probe().await;
        }));
    }

    /// Drop the pending probe, if any
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("pending connectivity probe cancelled");
        }
    }
}

impl Default for ConnectivityChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ConnectivityChecker {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// One-shot reachability check against a backend URL, no credentials needed
pub async fn probe_backend(backend_url: &str, page_secure: bool) -> Result<(), ClientError> {
    let client = ApiClient::new(ClientConfig::new(backend_url, "", page_secure));
    client.ping().await
}
