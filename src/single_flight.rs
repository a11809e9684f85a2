//! Single-flight execution of an asynchronous operation
//!
//! A [`SingleFlight`] holds at most one in-progress operation. The first caller
//! launches it; every caller arriving while it is pending awaits the same
//! outcome instead of starting a duplicate. The slot is emptied as soon as the
//! operation settles, so the next caller after that starts a fresh one.
//!
//! The operation runs on its own task: a caller that stops awaiting does not
//! cancel it for the others.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinError;
use tracing::debug;

type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;
type Slot<T, E> = Arc<Mutex<Option<Flight<T, E>>>>;

pub struct SingleFlight<T, E> {
    inflight: Slot<T, E>,
}

impl<T, E> SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.inflight.lock().is_some()
    }

    /// Await the in-flight operation, or launch `work` if there is none.
    ///
    /// `work` is only invoked when this call launches the operation.
    pub async fn run<F, Fut>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let flight = {
            let mut slot = self.inflight.lock();
            match slot.as_ref().cloned() {
                Some(flight) => {
                    debug!("Joining in-flight operation");
                    flight
                }
                None => {
                    let flight = launch(Arc::clone(&self.inflight), work());
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        flight.await
    }
}

impl<T, E> Default for SingleFlight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Empties the slot when the operation's task finishes, panics included.
struct ClearOnSettle<T, E>(Slot<T, E>);

impl<T, E> Drop for ClearOnSettle<T, E> {
    fn drop(&mut self) {
        self.0.lock().take();
    }
}

fn launch<T, E, Fut>(slot: Slot<T, E>, work: Fut) -> Flight<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let _clear = ClearOnSettle(slot);
        work.await
    });

    async move {
        match task.await {
            Ok(outcome) => outcome,
            Err(err) => Err(E::from(err)),
        }
    }
    .boxed()
    .shared()
}
