//! Adaptive status polling: fast while the position is unknown, relaxed once
//! it is known. Each tick re-evaluates availability and runs one request
//! cycle; while the position stays unknown the tick immediately spends one
//! more, larger retry budget.

use crate::constants::UNKNOWN_POSITION_RETRIES;
use crate::device::PowerShade;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct PollingScheduler {
    stop: Arc<Notify>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingScheduler {
    /// Start polling the session until [`shutdown`](Self::shutdown).
    pub fn spawn(session: Arc<PowerShade>) -> Self {
        let stop = Arc::new(Notify::new());
        let task = tokio::spawn(poll_loop(session, stop.clone()));
        Self {
            stop,
            task: Mutex::new(Some(task)),
        }
    }

    pub async fn shutdown(&self) {
        self.stop.notify_one();
        let task = self.task.lock().take();
        if let Some(task) = task {
            if timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("polling loop did not stop in time");
            }
        }
    }
}

async fn poll_loop(session: Arc<PowerShade>, stop: Arc<Notify>) {
    loop {
        let interval = session.poll_interval();
        tokio::select! {
            _ = stop.notified() => break,
            _ = sleep(interval) => {}
        }

        session.evaluate_availability();
        session.request_status().await;

        if session.available() && session.position().is_none() {
            debug!("position still unknown, requesting again");
            session
                .request_status_with_retry(UNKNOWN_POSITION_RETRIES)
                .await;
        }
    }
    debug!("polling loop stopped");
}
