//! Completion delivery for queued cache requests

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::CoreError;

type Callback = Box<dyn FnOnce() + Send>;

/// FIFO queue on which queued request results are delivered
///
/// Results are handed over in the order the work queue completed them.
/// Cloning shares the same underlying queue.
#[derive(Clone)]
pub struct CallbackQueue {
    tx: mpsc::UnboundedSender<Callback>,
}

/// Receiving half of a [`CallbackQueue`], driven by the application
pub struct CallbackDispatcher {
    rx: mpsc::UnboundedReceiver<Callback>,
}

impl CallbackQueue {
    /// Create a queue whose callbacks run wherever the dispatcher is driven
    pub fn channel() -> (Self, CallbackDispatcher) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, CallbackDispatcher { rx })
    }

    /// Create a queue drained by a dedicated task on the current runtime
    pub fn spawn() -> Result<Self, CoreError> {
        let handle = tokio::runtime::Handle::try_current()?;
        let (queue, dispatcher) = Self::channel();
        handle.spawn(dispatcher.run());
        Ok(queue)
    }

    /// Enqueue a callback, `false` if the dispatcher is gone
    pub(crate) fn deliver(&self, callback: impl FnOnce() + Send + 'static) -> bool {
        if self.tx.send(Box::new(callback)).is_err() {
            warn!("Callback dispatcher stopped, dropping completion");
            return false;
        }
        true
    }
}

impl CallbackDispatcher {
    /// Run callbacks until every queue handle is dropped
    pub async fn run(mut self) {
        debug!("Callback dispatcher started");
        while let Some(callback) = self.rx.recv().await {
            callback();
        }
        debug!("Callback dispatcher stopped");
    }

    /// Run the callbacks that are ready now, returns how many ran
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.rx.try_recv() {
            callback();
            ran += 1;
        }
        ran
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_drain_runs_in_fifo_order() {
        let (queue, mut dispatcher) = CallbackQueue::channel();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let seen = seen.clone();
            assert!(queue.deliver(move || seen.lock().push(i)));
        }

        assert_eq!(dispatcher.drain(), 5);
        assert_eq!(*seen.lock(), vec![0, 1, 2, 3, 4]);
        assert_eq!(dispatcher.drain(), 0);
    }

    #[test]
    fn test_deliver_after_dispatcher_dropped() {
        let (queue, dispatcher) = CallbackQueue::channel();
        drop(dispatcher);
        assert!(!queue.deliver(|| {}));
    }

    #[test]
    fn test_spawn_requires_runtime() {
        assert!(matches!(CallbackQueue::spawn(), Err(CoreError::NoRuntime(_))));
    }

    #[tokio::test]
    async fn test_spawned_dispatcher_runs_callbacks() {
        let queue = CallbackQueue::spawn().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        assert!(queue.deliver(move || {
            let _ = tx.send("done");
        }));
        assert_eq!(rx.await.unwrap(), "done");
    }
}
