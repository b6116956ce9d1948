//! Serial work queue behind the queued cache API

use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tiercache_storage::{Deadline, Entry};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::backend::Backend;
use super::callback::CallbackQueue;
use super::router::TierRouter;

/// Receives the result of a request on the callback queue
pub(crate) type Reply<T> = Box<dyn FnOnce(T) + Send>;

/// Operation submitted to the work queue
pub(crate) enum Request {
    Fetch {
        key: String,
        backend: Backend,
        reply: Reply<Option<Entry>>,
    },
    Store {
        payload: Option<Bytes>,
        key: String,
        backend: Backend,
        deadline: Deadline,
        reply: Reply<bool>,
    },
    Remove {
        key: String,
        backend: Backend,
        reply: Reply<bool>,
    },
    Clear {
        backend: Backend,
        reply: Reply<()>,
    },
}

/// Result of a queued request
///
/// Resolves once the request has run and its result has passed through the
/// callback queue. If the request was dropped before completing (worker or
/// dispatcher gone), resolves to `T::default()`.
#[must_use = "a queued request runs regardless, but its result is lost unless awaited"]
pub struct Pending<T> {
    rx: oneshot::Receiver<T>,
}

impl<T: Send + 'static> Pending<T> {
    /// Create a pending result and the reply that completes it
    pub(crate) fn new() -> (Self, Reply<T>) {
        let (tx, rx) = oneshot::channel();
        let reply: Reply<T> = Box::new(move |value| {
            let _ = tx.send(value);
        });
        (Self { rx }, reply)
    }
}

impl<T: Default> Future for Pending<T> {
    type Output = T;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            Poll::Ready(Err(_)) => {
                warn!("Cache request dropped before completion");
                Poll::Ready(T::default())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Execute requests one at a time, in submission order
pub(crate) async fn run_worker(
    router: Arc<TierRouter>,
    mut requests: mpsc::UnboundedReceiver<Request>,
    callbacks: CallbackQueue,
) {
    debug!("Cache worker started");

    while let Some(request) = requests.recv().await {
        match request {
            Request::Fetch {
                key,
                backend,
                reply,
            } => {
                let entry = router.fetch(&key, backend).await;
                callbacks.deliver(move || reply(entry));
            }
            Request::Store {
                payload,
                key,
                backend,
                deadline,
                reply,
            } => {
                let stored = router.store(payload, &key, backend, deadline).await;
                callbacks.deliver(move || reply(stored));
            }
            Request::Remove {
                key,
                backend,
                reply,
            } => {
                let removed = router.remove(&key, backend).await;
                callbacks.deliver(move || reply(removed));
            }
            Request::Clear { backend, reply } => {
                router.clear(backend).await;
                callbacks.deliver(move || reply(()));
            }
        }
    }

    debug!("Cache worker stopped");
}
