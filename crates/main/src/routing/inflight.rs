use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Counts exchanges currently being processed by routes
#[derive(Debug, Default)]
pub struct InflightRepository {
    count: AtomicUsize,
    drained: Notify,
}

impl InflightRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an exchange as in flight until the returned guard drops
    pub fn begin(self: &Arc<Self>) -> InflightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InflightGuard {
            repository: Arc::clone(self),
        }
    }

    pub fn size(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Wait until nothing is in flight. Returns false if `timeout` elapsed first.
    pub async fn wait_drained(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.drained.notified();
            if self.size() == 0 {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.size() == 0;
            }
        }
    }
}

/// Decrements the in-flight count on drop
#[derive(Debug)]
pub struct InflightGuard {
    repository: Arc<InflightRepository>,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if self.repository.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.repository.drained.notify_waiters();
        }
    }
}
