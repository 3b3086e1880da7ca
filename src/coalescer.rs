use std::{future::Future, time::Duration};

use tokio::{task::JoinHandle, time::sleep};

/// Collapses a burst of triggers into a single trailing action.
///
/// Every [`Coalescer::schedule`] cancels whatever was still waiting and starts
/// a fresh quiet period. Only when a quiet period runs out without another
/// trigger does the most recently scheduled action run. Must be used from
/// inside a tokio runtime.
#[derive(Debug)]
pub struct Coalescer {
    quiet: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Coalescer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    /// (Re)start the quiet period with `action` as the thing to run at its end.
    pub fn schedule<F>(&mut self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let quiet = self.quiet;
        self.pending = Some(tokio::spawn(async move {
            sleep(quiet).await;
            action.await;
        }));
    }

    /// Drop the pending action, if any. Returns whether one was waiting.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Coalescer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn record(sent: &Arc<Mutex<Vec<u8>>>, value: u8) -> impl Future<Output = ()> + Send + 'static {
        let sent = sent.clone();
        async move { sent.lock().unwrap().push(value) }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_sends_only_last_value() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut coalescer = Coalescer::new(Duration::from_millis(200));

        for value in [1, 2, 3] {
            coalescer.schedule(record(&sent, value));
            sleep(Duration::from_millis(50)).await;
        }
        assert!(sent.lock().unwrap().is_empty());
        assert!(coalescer.is_pending());

        sleep(Duration::from_millis(300)).await;
        assert_eq!(*sent.lock().unwrap(), vec![3]);
        assert!(!coalescer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_each_send_once() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut coalescer = Coalescer::new(Duration::from_millis(200));

        coalescer.schedule(record(&sent, 1));
        coalescer.schedule(record(&sent, 2));
        sleep(Duration::from_millis(250)).await;

        coalescer.schedule(record(&sent, 3));
        sleep(Duration::from_millis(250)).await;

        assert_eq!(*sent.lock().unwrap(), vec![2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut coalescer = Coalescer::new(Duration::from_millis(200));

        coalescer.schedule(record(&sent, 1));
        assert!(coalescer.cancel());
        assert!(!coalescer.cancel());

        sleep(Duration::from_millis(500)).await;
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_period_restarts() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let mut coalescer = Coalescer::new(Duration::from_millis(200));

        // Triggers keep arriving just inside the window
        for value in 0..10 {
            coalescer.schedule(record(&sent, value));
            sleep(Duration::from_millis(150)).await;
        }
        assert!(sent.lock().unwrap().is_empty());

        sleep(Duration::from_millis(100)).await;
        assert_eq!(*sent.lock().unwrap(), vec![9]);
    }
}
