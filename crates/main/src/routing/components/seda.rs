//! Asynchronous in-process queue. Senders enqueue and return immediately;
//! `concurrentConsumers` worker tasks feed the consuming route.

use crate::container::FromProperty;
use crate::errors::MainError;
use crate::routing::component::attribute_matches;
use crate::routing::{Component, Endpoint, EndpointUri, Exchange, Processor};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_QUEUE_SIZE: usize = 1000;
pub const DEFAULT_CONCURRENT_CONSUMERS: usize = 1;

#[derive(Debug)]
struct SedaSettings {
    queue_size: AtomicUsize,
    concurrent_consumers: AtomicUsize,
}

/// The `seda` component
#[derive(Debug)]
pub struct SedaComponent {
    settings: Arc<SedaSettings>,
}

impl SedaComponent {
    pub fn new() -> Self {
        Self {
            settings: Arc::new(SedaSettings {
                queue_size: AtomicUsize::new(DEFAULT_QUEUE_SIZE),
                concurrent_consumers: AtomicUsize::new(DEFAULT_CONCURRENT_CONSUMERS),
            }),
        }
    }

    /// Capacity of queues opened by this component
    pub fn queue_size(&self) -> usize {
        self.settings.queue_size.load(Ordering::SeqCst)
    }

    pub fn set_queue_size(&self, size: usize) -> Result<(), MainError> {
        if size == 0 {
            return Err(MainError::type_coercion("queueSize", "0", "a positive queue size"));
        }
        self.settings.queue_size.store(size, Ordering::SeqCst);
        Ok(())
    }

    /// Number of worker tasks consuming each queue
    pub fn concurrent_consumers(&self) -> usize {
        self.settings.concurrent_consumers.load(Ordering::SeqCst)
    }

    pub fn set_concurrent_consumers(&self, consumers: usize) -> Result<(), MainError> {
        if consumers == 0 {
            return Err(MainError::type_coercion(
                "concurrentConsumers",
                "0",
                "at least one consumer",
            ));
        }
        self.settings
            .concurrent_consumers
            .store(consumers, Ordering::SeqCst);
        Ok(())
    }
}

impl Default for SedaComponent {
    fn default() -> Self {
        Self::new()
    }
}

impl Component for SedaComponent {
    fn name(&self) -> &str {
        "seda"
    }

    fn configure_attribute(&self, attribute: &str, value: &str) -> Result<(), MainError> {
        if attribute_matches(attribute, "queueSize") {
            self.set_queue_size(usize::coerce(attribute, value)?)
        } else if attribute_matches(attribute, "concurrentConsumers") {
            self.set_concurrent_consumers(usize::coerce(attribute, value)?)
        } else {
            Err(MainError::unknown_attribute(self.name(), attribute))
        }
    }

    fn attributes(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (
                "concurrentConsumers".to_string(),
                self.concurrent_consumers().to_string(),
            ),
            ("queueSize".to_string(), self.queue_size().to_string()),
        ])
    }

    fn create_endpoint(&self, uri: &EndpointUri) -> Result<Arc<dyn Endpoint>, MainError> {
        Ok(Arc::new(SedaEndpoint {
            uri: uri.to_string(),
            settings: Arc::clone(&self.settings),
            queue: RwLock::new(None),
            consumer: RwLock::new(None),
            workers: Mutex::new(Vec::new()),
            outstanding: Arc::new(AtomicUsize::new(0)),
            shutdown: CancellationToken::new(),
        }))
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

type SharedReceiver = Arc<tokio::sync::Mutex<mpsc::Receiver<Exchange>>>;

/// Channel opened when the endpoint starts, sized from the component
/// settings at that moment
#[derive(Debug)]
struct SedaQueue {
    queue_size: usize,
    concurrent_consumers: usize,
    sender: Option<mpsc::Sender<Exchange>>,
    receiver: SharedReceiver,
}

/// A `seda:` queue endpoint
///
/// The queue only exists between `start` and `stop`; sends outside that
/// window fail with a delivery error.
pub struct SedaEndpoint {
    uri: String,
    settings: Arc<SedaSettings>,
    queue: RwLock<Option<SedaQueue>>,
    consumer: RwLock<Option<Arc<dyn Processor>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    // accepted but not yet fully processed exchanges
    outstanding: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl SedaEndpoint {
    /// Queue capacity, fixed once the endpoint has started
    pub fn queue_size(&self) -> usize {
        match self.queue.read().as_ref() {
            Some(queue) => queue.queue_size,
            None => self.settings.queue_size.load(Ordering::SeqCst),
        }
    }

    /// Worker count, fixed once the endpoint has started
    pub fn concurrent_consumers(&self) -> usize {
        match self.queue.read().as_ref() {
            Some(queue) => queue.concurrent_consumers,
            None => self.settings.concurrent_consumers.load(Ordering::SeqCst),
        }
    }

    pub fn is_started(&self) -> bool {
        self.queue.read().is_some()
    }

    /// Messages waiting in the queue
    pub fn pending(&self) -> usize {
        match self.queue.read().as_ref().and_then(|q| q.sender.as_ref()) {
            Some(sender) => sender.max_capacity() - sender.capacity(),
            None => 0,
        }
    }

    /// Accepted exchanges that are queued or still being processed
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.lock().len()
    }
}

impl std::fmt::Debug for SedaEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SedaEndpoint")
            .field("uri", &self.uri)
            .field("queue_size", &self.queue_size())
            .field("concurrent_consumers", &self.concurrent_consumers())
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

async fn run_worker(
    uri: String,
    receiver: SharedReceiver,
    consumer: Arc<dyn Processor>,
    outstanding: Arc<AtomicUsize>,
    shutdown: CancellationToken,
) {
    loop {
        let next = {
            let mut receiver = receiver.lock().await;
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                exchange = receiver.recv() => exchange,
            }
        };

        let Some(exchange) = next else {
            break;
        };
        let exchange_id = exchange.id();
        if let Err(e) = consumer.process(exchange).await {
            tracing::error!("Exchange {} from '{}' failed: {}", exchange_id, uri, e);
        }
        outstanding.fetch_sub(1, Ordering::SeqCst);
    }
    tracing::debug!("Consumer worker for '{}' finished", uri);
}

#[async_trait]
impl Endpoint for SedaEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    async fn send(&self, exchange: Exchange) -> Result<Exchange, MainError> {
        let sender = self
            .queue
            .read()
            .as_ref()
            .and_then(|queue| queue.sender.clone())
            .ok_or_else(|| MainError::delivery(&self.uri, "queue is not open"))?;

        // counted before enqueueing so a worker can never decrement first
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        match sender.try_send(exchange.clone()) {
            Ok(()) => Ok(exchange),
            Err(e) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                Err(match e {
                    TrySendError::Full(_) => MainError::delivery(
                        &self.uri,
                        format!("queue full (capacity {})", sender.max_capacity()),
                    ),
                    TrySendError::Closed(_) => MainError::delivery(&self.uri, "queue is closed"),
                })
            }
        }
    }

    fn bind_consumer(&self, consumer: Arc<dyn Processor>) -> Result<(), MainError> {
        let mut slot = self.consumer.write();
        if slot.is_some() {
            return Err(MainError::route_install(
                &self.uri,
                "multiple consumers for the same seda endpoint are not allowed",
            ));
        }
        *slot = Some(consumer);
        Ok(())
    }

    async fn start(&self) -> Result<(), MainError> {
        let mut queue = self.queue.write();
        if queue.is_some() {
            return Ok(());
        }

        let queue_size = self.settings.queue_size.load(Ordering::SeqCst);
        let concurrent_consumers = self.settings.concurrent_consumers.load(Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(queue_size);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        if let Some(consumer) = self.consumer.read().clone() {
            let mut workers = self.workers.lock();
            for _ in 0..concurrent_consumers {
                workers.push(tokio::spawn(run_worker(
                    self.uri.clone(),
                    Arc::clone(&receiver),
                    Arc::clone(&consumer),
                    Arc::clone(&self.outstanding),
                    self.shutdown.clone(),
                )));
            }
            tracing::debug!(
                "Started {} consumer(s) on '{}' (queue size {})",
                concurrent_consumers,
                self.uri,
                queue_size
            );
        }

        *queue = Some(SedaQueue {
            queue_size,
            concurrent_consumers,
            sender: Some(sender),
            receiver,
        });
        Ok(())
    }

    fn is_idle(&self) -> bool {
        // nothing will consume a queue without workers, so it cannot get busier
        self.outstanding() == 0 || self.worker_count() == 0
    }

    async fn drain(&self, timeout: Duration) {
        // Dropping the only sender lets workers exit once the queue is empty
        let pending = self.pending();
        if let Some(queue) = self.queue.write().as_mut() {
            queue.sender.take();
        }

        let workers: Vec<_> = std::mem::take(&mut *self.workers.lock());
        if workers.is_empty() {
            if pending > 0 {
                tracing::warn!("Discarding {} unconsumed message(s) on '{}'", pending, self.uri);
            }
            return;
        }

        let aborts: Vec<_> = workers.iter().map(JoinHandle::abort_handle).collect();
        let mut joined = join_workers(workers);
        if tokio::time::timeout(timeout, &mut joined).await.is_err() {
            tracing::warn!(
                "Consumers on '{}' did not drain within {}ms, cancelling",
                self.uri,
                timeout.as_millis()
            );
            self.shutdown.cancel();
            for abort in &aborts {
                abort.abort();
            }
            joined.await;
        }
    }

    fn stop(&self) {
        self.shutdown.cancel();
        self.consumer.write().take();
        self.queue.write().take();
    }

    fn as_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Await every worker handle, logging panics
fn join_workers(
    workers: Vec<JoinHandle<()>>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
    Box::pin(async move {
        for worker in workers {
            if let Err(e) = worker.await {
                if e.is_panic() {
                    tracing::error!("Consumer worker panicked: {}", e);
                }
            }
        }
    })
}
