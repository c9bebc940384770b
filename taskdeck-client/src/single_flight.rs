/// Request coalescing
///
/// [`SingleFlight`] holds at most one in-flight operation. The first caller
/// starts it; callers arriving while it runs await the same shared future and
/// receive a clone of its output. Once it completes the slot empties and the
/// next call starts a fresh operation.

use std::future::Future;

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

struct Flight<T> {
    id: u64,
    future: Shared<BoxFuture<'static, T>>,
}

struct Slot<T> {
    next_id: u64,
    current: Option<Flight<T>>,
}

/// Single-slot coalescing future
pub struct SingleFlight<T: Clone> {
    slot: Mutex<Slot<T>>,
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                next_id: 0,
                current: None,
            }),
        }
    }

    /// Joins the in-flight operation, or starts one with `start`
    ///
    /// `start` is only invoked when nothing is in flight. If the caller that
    /// started the operation is cancelled, the remaining waiters keep driving
    /// it to completion.
    pub async fn run<F, Fut>(&self, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (id, future) = {
            let mut slot = self.slot.lock().await;
            match &slot.current {
                Some(flight) => (flight.id, flight.future.clone()),
                None => {
                    slot.next_id += 1;
                    let id = slot.next_id;
                    let future = start().boxed().shared();
                    slot.current = Some(Flight {
                        id,
                        future: future.clone(),
                    });
                    (id, future)
                }
            }
        };

        let output = future.await;

        let mut slot = self.slot.lock().await;
        if slot.current.as_ref().map(|flight| flight.id) == Some(id) {
            slot.current = None;
        }

        output
    }

    /// Whether an operation is currently in flight
    pub async fn is_running(&self) -> bool {
        self.slot.lock().await.current.is_some()
    }
}

impl<T> Default for SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
