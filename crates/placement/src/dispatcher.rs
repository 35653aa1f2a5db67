//! Bounded worker pool that runs placements off the caller's task.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use domain::OrderRequest;
use order_store::OrderRepository;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::coordinator::{Confirmation, OrderPlacementService};
use crate::error::{PlacementError, Result};
use crate::services::{EventPublisher, InventoryClient};

/// Placements allowed to wait for a worker unless configured otherwise.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Hands placements to spawned workers, at most `worker_pool_size` running
/// at once and at most `queue_capacity` more waiting for a worker. Callers
/// get a [`PlacementHandle`] back immediately; past that bound the handle
/// resolves to [`PlacementError::Overloaded`] without spawning anything.
pub struct OrderDispatcher<R, I, P>
where
    R: OrderRepository,
    I: InventoryClient,
    P: EventPublisher,
{
    service: Arc<OrderPlacementService<R, I, P>>,
    workers: Arc<Semaphore>,
    /// One permit per running or queued placement
    admission: Arc<Semaphore>,
    pool_size: usize,
    queue_capacity: usize,
}

impl<R, I, P> Clone for OrderDispatcher<R, I, P>
where
    R: OrderRepository,
    I: InventoryClient,
    P: EventPublisher,
{
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            workers: Arc::clone(&self.workers),
            admission: Arc::clone(&self.admission),
            pool_size: self.pool_size,
            queue_capacity: self.queue_capacity,
        }
    }
}

impl<R, I, P> OrderDispatcher<R, I, P>
where
    R: OrderRepository + 'static,
    I: InventoryClient + 'static,
    P: EventPublisher + 'static,
{
    pub fn new(service: Arc<OrderPlacementService<R, I, P>>, worker_pool_size: usize) -> Self {
        let pool_size = worker_pool_size.max(1);
        Self {
            service,
            workers: Arc::new(Semaphore::new(pool_size)),
            admission: Arc::new(Semaphore::new(pool_size + DEFAULT_QUEUE_CAPACITY)),
            pool_size,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Sets how many placements may wait for a worker. Call before the
    /// dispatcher is cloned or used.
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self.admission = Arc::new(Semaphore::new(self.pool_size + queue_capacity));
        self
    }

    pub fn service(&self) -> &Arc<OrderPlacementService<R, I, P>> {
        &self.service
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Workers not currently running a placement.
    pub fn idle_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// Submits a placement. Must be called from within a tokio runtime.
    pub fn place_order(&self, request: OrderRequest) -> PlacementHandle {
        let Ok(admitted) = Arc::clone(&self.admission).try_acquire_owned() else {
            tracing::warn!(
                workers = self.pool_size,
                queue_capacity = self.queue_capacity,
                "Placement queue full, rejecting order"
            );
            metrics::counter!("order_placements_rejected_total").increment(1);
            return PlacementHandle {
                inner: HandleInner::Rejected,
            };
        };

        let service = Arc::clone(&self.service);
        let workers = Arc::clone(&self.workers);

        let task = async move {
            let _admitted = admitted;
            let _worker = workers
                .acquire_owned()
                .await
                .map_err(|_| PlacementError::WorkerFailed("worker pool is closed".to_string()))?;
            service.place(request).await
        };

        PlacementHandle {
            inner: HandleInner::Running(tokio::spawn(task.in_current_span())),
        }
    }

    /// Stops admitting placements. Queued ones resolve with `WorkerFailed`.
    pub fn close(&self) {
        self.workers.close();
    }
}

/// Resolves to the outcome of a submitted placement.
///
/// Dropping the handle does not cancel the placement.
#[must_use = "a placement handle does nothing unless awaited"]
pub struct PlacementHandle {
    inner: HandleInner,
}

enum HandleInner {
    Running(JoinHandle<Result<Confirmation>>),
    /// Turned away at submission because the queue was full
    Rejected,
}

impl PlacementHandle {
    /// Cancels the placement. Awaiting the handle then yields `WorkerFailed`.
    pub fn abort(&self) {
        if let HandleInner::Running(task) = &self.inner {
            task.abort();
        }
    }
}

impl Future for PlacementHandle {
    type Output = Result<Confirmation>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let task = match &mut self.inner {
            HandleInner::Running(task) => task,
            HandleInner::Rejected => return Poll::Ready(Err(PlacementError::Overloaded)),
        };
        Pin::new(task).poll(cx).map(|joined| {
            joined.unwrap_or_else(|err| {
                tracing::error!(error = %err, "Placement worker did not finish");
                Err(PlacementError::WorkerFailed(err.to_string()))
            })
        })
    }
}
