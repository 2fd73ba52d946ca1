//! Coalescing debounce
//!
//! Change events go into a bounded channel. A single drain task waits for the
//! first event, keeps absorbing events until none arrives for the debounce
//! interval, then runs one rebuild and awaits it before looking at the
//! channel again. Events arriving during a rebuild queue up and produce at
//! most one follow-up rebuild.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::compile::AssetKind;

/// Pending events beyond this are dropped; the queued ones already
/// guarantee a rebuild.
pub const CHANNEL_CAPACITY: usize = 64;

pub struct Debouncer {
    kind: AssetKind,
    sender: mpsc::Sender<PathBuf>,
    stopping: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Debouncer {
    /// Spawn the drain task. `rebuild` receives the sorted, deduplicated paths
    /// of one burst.
    pub fn spawn<F, Fut>(kind: AssetKind, interval: Duration, mut rebuild: F) -> Self
    where
        F: FnMut(Vec<PathBuf>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (sender, mut receiver) = mpsc::channel::<PathBuf>(CHANNEL_CAPACITY);
        let stopping = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stopping);

        let task = tokio::spawn(async move {
            while let Some(first) = receiver.recv().await {
                let mut batch = vec![first];
                loop {
                    match tokio::time::timeout(interval, receiver.recv()).await {
                        Ok(Some(path)) => batch.push(path),
                        Ok(None) | Err(_) => break,
                    }
                }
                if stop.load(Ordering::SeqCst) {
                    break;
                }

                batch.sort();
                batch.dedup();
                debug!("[{}] rebuilding after {} change(s)", kind, batch.len());
                trace!("[{}] changed: {:?}", kind, batch);
                rebuild(batch).await;
            }
            debug!("[{}] debouncer stopped", kind);
        });

        Self {
            kind,
            sender,
            stopping,
            task,
        }
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn sender(&self) -> mpsc::Sender<PathBuf> {
        self.sender.clone()
    }

    /// Stop scheduling rebuilds and wait for an in-flight one to finish.
    /// Every other sender must already be dropped for this to return.
    pub async fn shutdown(self) {
        self.stopping.store(true, Ordering::SeqCst);
        drop(self.sender);
        if let Err(e) = self.task.await {
            debug!("[{}] debounce task ended abnormally: {}", self.kind, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    fn counting(interval: Duration) -> (Debouncer, Arc<AtomicUsize>, Arc<Mutex<Vec<Vec<PathBuf>>>>) {
        let count = Arc::new(AtomicUsize::new(0));
        let batches = Arc::new(Mutex::new(Vec::new()));
        let (c, b) = (Arc::clone(&count), Arc::clone(&batches));
        let debouncer = Debouncer::spawn(AssetKind::Script, interval, move |paths| {
            let (c, b) = (Arc::clone(&c), Arc::clone(&b));
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                b.lock().unwrap().push(paths);
            }
        });
        (debouncer, count, batches)
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_rapid_events_trigger_one_rebuild() {
        let (debouncer, count, batches) = counting(Duration::from_millis(300));
        let sender = debouncer.sender();

        for i in 0..5 {
            sender.send(PathBuf::from(format!("src/file{}.js", i % 3))).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(batches.lock().unwrap()[0].len(), 3);

        drop(sender);
        debouncer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_bursts_rebuild_separately() {
        let (debouncer, count, _) = counting(Duration::from_millis(300));
        let sender = debouncer.sender();

        sender.send(PathBuf::from("src/a.js")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        sender.send(PathBuf::from("src/b.js")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        drop(sender);
        debouncer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_during_rebuild_coalesce_into_one_followup() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let debouncer = Debouncer::spawn(AssetKind::Style, Duration::from_millis(100), move |_| {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        });
        let sender = debouncer.sender();

        sender.send(PathBuf::from("a.scss")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        // First rebuild is running now
        for _ in 0..10 {
            sender.send(PathBuf::from("b.scss")).await.unwrap();
        }
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
        drop(sender);
        debouncer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_rebuild_after_shutdown() {
        let (debouncer, count, _) = counting(Duration::from_millis(300));
        let sender = debouncer.sender();

        sender.send(PathBuf::from("src/a.js")).await.unwrap();
        drop(sender);
        debouncer.shutdown().await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
