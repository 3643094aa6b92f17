//! FIFO replay of requests deferred while the guard was blocking.

use futures_util::future::{BoxFuture, FutureExt};
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::oneshot;

use crate::guard::{Guard, GuardError, GuardResult};
use crate::inflight::Permit;
use crate::observability::{metrics, Subscription};

/// A queued task with its reply channel, type-erased.
trait Job: Send {
    /// The caller dropped its future; running the task would waste a slot.
    fn is_abandoned(&self) -> bool;

    fn run(self: Box<Self>, permit: Permit) -> BoxFuture<'static, ()>;
}

struct Task<F, T> {
    task: F,
    reply: oneshot::Sender<T>,
}

impl<F, Fut, T> Job for Task<F, T>
where
    F: FnOnce(Permit) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }

    fn run(self: Box<Self>, permit: Permit) -> BoxFuture<'static, ()> {
        let Task { task, reply } = *self;
        Box::pin(async move {
            let output = task(permit).await;
            let _ = reply.send(output);
        })
    }
}

/// Runs queued tasks one at a time, in order, whenever the guard admits.
///
/// Clones share the same queue. Dropping the last clone resolves every task
/// still waiting with [`GuardError::QueueClosed`].
#[derive(Clone)]
pub struct RequestQueue {
    inner: Arc<Inner>,
}

struct Inner {
    guard: Guard,
    delay: Duration,
    state: Mutex<QueueState>,
    subscription: Mutex<Option<Subscription>>,
}

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Box<dyn Job>>,
    draining: bool,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        let subscription = self
            .subscription
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        metrics::record_queue_depth(0);
    }
}

impl RequestQueue {
    /// Create a queue that replays through `guard`, spaced by the configured
    /// inter-request delay.
    pub fn new(guard: Guard) -> Self {
        let delay = guard.config().admission.inter_request_delay();
        let inner = Arc::new(Inner {
            guard: guard.clone(),
            delay,
            state: Mutex::new(QueueState::default()),
            subscription: Mutex::new(None),
        });

        let weak = Arc::downgrade(&inner);
        let subscription = guard.subscribe(move |snapshot| {
            if snapshot.is_open || snapshot.is_paused {
                return;
            }
            if let Some(inner) = weak.upgrade() {
                RequestQueue { inner }.kick();
            }
        });
        *inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);

        Self { inner }
    }

    /// Queue `task`. It runs with an admission permit once every task ahead
    /// of it has finished and the guard admits again.
    ///
    /// The task is queued when this is called, not when the future is first
    /// polled. Dropping the returned future withdraws the task if it has not
    /// started yet. A task that panics resolves with
    /// [`GuardError::QueueClosed`] and the queue moves on.
    /// Must be called from within a tokio runtime.
    pub fn enqueue<F, Fut, T>(&self, task: F) -> impl Future<Output = GuardResult<T>> + Send + 'static
    where
        F: FnOnce(Permit) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();

        let depth = {
            let mut state = self.inner.lock_state();
            state.tasks.push_back(Box::new(Task { task, reply }));
            state.tasks.len()
        };
        metrics::record_queue_depth(depth);
        tracing::debug!(depth, "Request queued");

        self.kick();
        async move { rx.await.map_err(|_| GuardError::QueueClosed) }
    }

    pub fn len(&self) -> usize {
        self.inner.lock_state().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_draining(&self) -> bool {
        self.inner.lock_state().draining
    }

    /// Start the drain loop unless it is already running or has nothing to do.
    pub fn kick(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        {
            let mut state = self.inner.lock_state();
            if state.draining || state.tasks.is_empty() {
                return;
            }
            state.draining = true;
        }
        handle.spawn(drain(Arc::downgrade(&self.inner)));
    }
}

/// Admit and run queued tasks until the queue empties or the guard blocks.
async fn drain(weak: Weak<Inner>) {
    loop {
        let Some(inner) = weak.upgrade() else {
            return;
        };

        {
            let mut state = inner.lock_state();
            let before = state.tasks.len();
            while state.tasks.front().is_some_and(|job| job.is_abandoned()) {
                state.tasks.pop_front();
            }
            let withdrawn = before - state.tasks.len();
            if withdrawn > 0 {
                tracing::debug!(withdrawn, "Dropped abandoned queued requests");
                metrics::record_queue_depth(state.tasks.len());
            }
            if state.tasks.is_empty() {
                state.draining = false;
                return;
            }
        }

        // no queue lock held here: admission may notify our own listener
        let permit = match inner.guard.admit() {
            Ok(permit) => permit,
            Err(err) => {
                tracing::debug!(error = %err, "Queue drain stopped");
                inner.lock_state().draining = false;
                // a resume may have landed while we were still marked as draining
                if !inner.guard.should_block() {
                    RequestQueue { inner }.kick();
                }
                return;
            }
        };

        let (job, depth) = {
            let mut state = inner.lock_state();
            (state.tasks.pop_front(), state.tasks.len())
        };
        metrics::record_queue_depth(depth);
        let delay = inner.delay;
        drop(inner);

        if let Some(job) = job {
            if AssertUnwindSafe(job.run(permit)).catch_unwind().await.is_err() {
                tracing::warn!("Queued request panicked; continuing with the next one");
            }
        }
        tokio::time::sleep(delay).await;
    }
}
