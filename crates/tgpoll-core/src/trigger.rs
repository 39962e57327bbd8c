//! Trigger activation: runs the polling loop as a background task owned by a handle.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    polling::{run_polling_loop, PollingControl, PollingOptions},
    ports::{UpdateFetcher, UpdateSink},
    Error, Result,
};

/// A running trigger. Dropping it without [`deactivate`](Self::deactivate) aborts
/// the loop task.
pub struct TriggerHandle {
    control: Arc<PollingControl>,
    task: Option<JoinHandle<Result<()>>>,
}

/// Spawn the polling loop for one activation. Must be called inside a tokio runtime.
pub fn activate(
    fetcher: Arc<dyn UpdateFetcher>,
    sink: Arc<dyn UpdateSink>,
    options: PollingOptions,
) -> TriggerHandle {
    let control = Arc::new(PollingControl::new());

    tracing::info!(
        allowed_updates = ?options.allowed_updates,
        limit = options.limit,
        timeout = options.timeout,
        restricted_chats = options.restrict_chat_ids.len(),
        restricted_users = options.restrict_user_ids.len(),
        "telegram polling trigger activated"
    );

    let loop_control = control.clone();
    let task = tokio::spawn(async move {
        let res = run_polling_loop(
            fetcher.as_ref(),
            sink.as_ref(),
            &options,
            &loop_control,
            None,
        )
        .await;
        // However the loop ended, the activation is over.
        loop_control.signal_stop();
        res
    });

    TriggerHandle {
        control,
        task: Some(task),
    }
}

impl TriggerHandle {
    pub fn is_active(&self) -> bool {
        self.control.is_active()
    }

    /// Flip liveness off and cancel the in-flight request. Does not wait.
    pub fn signal_stop(&self) {
        self.control.signal_stop();
    }

    /// Resolves once the trigger is stopping, either via [`signal_stop`](Self::signal_stop)
    /// or because the loop ended on its own.
    pub async fn stopped(&self) {
        self.control.stopped().await
    }

    /// Stop the loop and wait for its task.
    ///
    /// A request aborted by our own cancellation is a clean stop. Any other loop
    /// error is returned.
    pub async fn deactivate(mut self) -> Result<()> {
        self.control.signal_stop();

        let Some(task) = self.task.take() else {
            return Ok(());
        };

        let res = match task.await {
            Ok(Ok(())) | Ok(Err(Error::Cancelled)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(Error::External(format!("polling task failed: {e}"))),
        };

        tracing::info!(clean = res.is_ok(), "telegram polling trigger deactivated");
        res
    }
}

impl Drop for TriggerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.control.signal_stop();
            task.abort();
        }
    }
}
