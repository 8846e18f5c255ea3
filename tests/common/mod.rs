#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::{stream, FutureExt, StreamExt};
use lapin::BasicProperties;
use rabbitmq_supervisor::{
    errors::AmqpError,
    exchange::ExchangeKind,
    message::{Delivery, Message},
    queue::{QueueBinding, QueueDefinition},
    supervisor::{ConnectionStatus, ConnectionSupervisor},
    transport::{
        AmqpChannel, AmqpConnection, AmqpTransport, CloseNotification, DeliveryStream, Prefetch,
        TransportConfig,
    },
};
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::sync::{mpsc, watch};

type DeliverySender = mpsc::UnboundedSender<Result<Delivery, AmqpError>>;

struct Consumer {
    connection: usize,
    channel: usize,
    queue: String,
    tx: DeliverySender,
}

#[derive(Default)]
pub struct BrokerState {
    pub dialed: Vec<(String, TransportConfig)>,
    pub refuse_dials: usize,
    pub dial_delay: Option<Duration>,
    pub exchanges: HashMap<String, bool>,
    pub exchange_declarations: usize,
    pub queues: HashMap<String, bool>,
    pub bindings: Vec<(String, String, String)>,
    pub published: Vec<(String, String, Vec<u8>)>,
    pub acked: Vec<u64>,
    consumers: Vec<Consumer>,
    connections: Vec<Arc<FakeConnection>>,
    next_tag: u64,
    next_channel: usize,
}

/// In-memory broker able to drop connections and refuse dials.
#[derive(Clone, Default)]
pub struct FakeBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl FakeBroker {
    pub fn new() -> FakeBroker {
        FakeBroker::default()
    }

    pub fn transport(&self) -> Arc<dyn AmqpTransport> {
        Arc::new(self.clone())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut BrokerState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn dials(&self) -> usize {
        self.with(|s| s.dialed.len())
    }

    pub fn refuse_dials(&self, count: usize) {
        self.with(|s| s.refuse_dials = count);
    }

    /// Delays every dial, leaving room for calls racing a handshake.
    pub fn slow_dials(&self, delay: Duration) {
        self.with(|s| s.dial_delay = Some(delay));
    }

    pub fn consumers(&self, queue: &str) -> usize {
        self.with(|s| s.consumers.iter().filter(|c| c.queue == queue).count())
    }

    pub fn live_connections(&self) -> usize {
        self.with(|s| s.connections.iter().filter(|c| c.is_connected()).count())
    }

    /// Drops every live connection from the broker side.
    pub fn kill_connections(&self) {
        let connections = self.with(|s| s.connections.clone());
        for conn in connections {
            conn.shutdown();
        }
    }

    /// Drops every connection and forgets all topology, like a broker restart.
    pub fn restart(&self) {
        self.with(|s| {
            s.exchanges.clear();
            s.queues.clear();
            s.bindings.clear();
        });
        self.kill_connections();
    }
}

#[async_trait]
impl AmqpTransport for FakeBroker {
    async fn dial(
        &self,
        url: &str,
        config: &TransportConfig,
    ) -> Result<Arc<dyn AmqpConnection>, AmqpError> {
        let delay = self.with(|s| s.dial_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        state.dialed.push((url.to_owned(), config.clone()));

        if state.refuse_dials > 0 {
            state.refuse_dials -= 1;
            return Err(AmqpError::ConnectionError("connection refused".into()));
        }

        let (alive, _) = watch::channel(true);
        let conn = Arc::new(FakeConnection {
            id: state.connections.len(),
            broker: Arc::clone(&self.state),
            alive,
        });
        state.connections.push(Arc::clone(&conn));

        Ok(conn)
    }
}

pub struct FakeConnection {
    id: usize,
    broker: Arc<Mutex<BrokerState>>,
    alive: watch::Sender<bool>,
}

impl FakeConnection {
    fn shutdown(&self) {
        self.alive.send_replace(false);
        self.broker
            .lock()
            .unwrap()
            .consumers
            .retain(|c| c.connection != self.id);
    }
}

#[async_trait]
impl AmqpConnection for FakeConnection {
    async fn open_channel(&self, prefetch: Prefetch) -> Result<Arc<dyn AmqpChannel>, AmqpError> {
        if !self.is_connected() {
            return Err(AmqpError::ChannelError("connection is closed".into()));
        }

        let id = {
            let mut state = self.broker.lock().unwrap();
            state.next_channel += 1;
            state.next_channel
        };

        Ok(Arc::new(FakeChannel {
            id,
            connection: self.id,
            alive: self.alive.subscribe(),
            broker: Arc::clone(&self.broker),
            closed: AtomicBool::new(false),
            prefetch,
        }))
    }

    fn notify_close(&self) -> CloseNotification {
        let mut alive = self.alive.subscribe();
        async move {
            let _ = alive.wait_for(|alive| !*alive).await;
            Some(AmqpError::ConnectionError("connection dropped".into()))
        }
        .boxed()
    }

    fn is_connected(&self) -> bool {
        *self.alive.borrow()
    }

    async fn close(&self) -> Result<(), AmqpError> {
        self.shutdown();
        Ok(())
    }
}

pub struct FakeChannel {
    id: usize,
    connection: usize,
    alive: watch::Receiver<bool>,
    broker: Arc<Mutex<BrokerState>>,
    closed: AtomicBool,
    prefetch: Prefetch,
}

impl FakeChannel {
    fn usable(&self) -> Result<std::sync::MutexGuard<'_, BrokerState>, AmqpError> {
        if !*self.alive.borrow() || self.closed.load(Ordering::SeqCst) {
            return Err(AmqpError::ChannelError("channel is closed".into()));
        }
        Ok(self.broker.lock().unwrap())
    }
}

fn routes(binding_key: &str, routing_key: &str) -> bool {
    binding_key == "#" || binding_key == routing_key
}

#[async_trait]
impl AmqpChannel for FakeChannel {
    async fn declare_exchange(
        &self,
        name: &str,
        _kind: &ExchangeKind,
        durable: bool,
    ) -> Result<(), AmqpError> {
        let mut state = self.usable()?;
        if let Some(existing) = state.exchanges.get(name) {
            if *existing != durable {
                return Err(AmqpError::DeclareExchangeError(name.to_owned()));
            }
        }
        state.exchanges.insert(name.to_owned(), durable);
        state.exchange_declarations += 1;
        Ok(())
    }

    async fn declare_queue(&self, def: &QueueDefinition) -> Result<(), AmqpError> {
        let mut state = self.usable()?;
        state.queues.insert(def.name().to_owned(), def.is_durable());
        Ok(())
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        binding: &QueueBinding,
    ) -> Result<(), AmqpError> {
        let mut state = self.usable()?;
        if !state.queues.contains_key(queue) || !state.exchanges.contains_key(exchange) {
            return Err(AmqpError::BindingExchangeToQueueError(
                exchange.to_owned(),
                queue.to_owned(),
            ));
        }
        let entry = (
            queue.to_owned(),
            exchange.to_owned(),
            binding.routing_key().to_owned(),
        );
        if !state.bindings.contains(&entry) {
            state.bindings.push(entry);
        }
        Ok(())
    }

    async fn consume(&self, queue: &str, _auto_ack: bool) -> Result<DeliveryStream, AmqpError> {
        let mut state = self.usable()?;
        if !state.queues.contains_key(queue) {
            return Err(AmqpError::BindingConsumerError(queue.to_owned()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        state.consumers.push(Consumer {
            connection: self.connection,
            channel: self.id,
            queue: queue.to_owned(),
            tx,
        });

        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|delivery| (delivery, rx))
        })
        .boxed())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        msg: &Message,
    ) -> Result<(), AmqpError> {
        let mut state = self.usable()?;
        if !exchange.is_empty() && !state.exchanges.contains_key(exchange) {
            return Err(AmqpError::PublishingError(format!("no exchange `{exchange}`")));
        }
        state.published.push((
            exchange.to_owned(),
            routing_key.to_owned(),
            msg.body.clone(),
        ));

        let targets: Vec<String> = state
            .bindings
            .iter()
            .filter(|(_, ex, key)| ex == exchange && routes(key, routing_key))
            .map(|(queue, _, _)| queue.clone())
            .collect();

        for queue in targets {
            state.next_tag += 1;
            let delivery = Delivery {
                delivery_tag: state.next_tag,
                exchange: exchange.to_owned(),
                routing_key: routing_key.to_owned(),
                redelivered: false,
                properties: BasicProperties::default(),
                data: msg.body.clone(),
            };
            if let Some(consumer) = state.consumers.iter().rev().find(|c| c.queue == queue) {
                let _ = consumer.tx.send(Ok(delivery));
            }
        }

        Ok(())
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), AmqpError> {
        let mut state = self.usable()?;
        state.acked.push(delivery_tag);
        Ok(())
    }

    async fn nack(&self, _delivery_tag: u64, _requeue: bool) -> Result<(), AmqpError> {
        self.usable()?;
        Ok(())
    }

    fn prefetch(&self) -> Prefetch {
        self.prefetch
    }

    async fn close(&self) -> Result<(), AmqpError> {
        self.closed.store(true, Ordering::SeqCst);
        self.broker
            .lock()
            .unwrap()
            .consumers
            .retain(|c| c.channel != self.id);
        Ok(())
    }
}

/// Polls `check` every 10ms until it holds or `limit` elapses.
pub async fn eventually<F, Fut>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Waits until the supervisor reaches `status`.
pub async fn wait_status(
    supervisor: &Arc<ConnectionSupervisor>,
    status: ConnectionStatus,
    limit: Duration,
) -> bool {
    eventually(limit, || {
        let supervisor = Arc::clone(supervisor);
        async move { supervisor.status().await == status }
    })
    .await
}
