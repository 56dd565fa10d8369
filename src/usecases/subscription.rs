use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SUBSCRIPTION_STARTED: &str = "SYNC_SUBSCRIPTION_STARTED";
const SUBSCRIPTION_CANCELLED: &str = "SYNC_SUBSCRIPTION_CANCELLED";

/// Handle to a live subscription task. Dropping it cancels the task.
#[derive(Debug)]
pub struct Subscription {
    name: &'static str,
    key: String,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn spawn<F, Fut>(name: &'static str, key: impl Into<String>, run: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(cancel.clone()));

        tracing::debug!(
            code = SUBSCRIPTION_STARTED,
            subscription = name,
            key = %key,
            "subscription started"
        );

        Self {
            name,
            key,
            cancel,
            task: Some(task),
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .task
                .as_ref()
                .is_some_and(|task| !task.is_finished())
    }

    /// Cancels and waits for the task to wind down.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.cancel.is_cancelled() {
            self.cancel.cancel();
            tracing::debug!(
                code = SUBSCRIPTION_CANCELLED,
                subscription = self.name,
                key = %self.key,
                "subscription cancelled"
            );
        }
    }
}
