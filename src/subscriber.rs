// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Subscriber
//!
//! `RabbitMQSubscriber` consumes one queue through a `ConnectionSupervisor`
//! and hands every delivery to a `ConsumerHandler` inside a consumer span.
//!
//! A delivery stream ends whenever its channel or connection goes away. The
//! subscriber treats that as "subscribe again": it waits on the supervisor's
//! readiness gate, then declares, consumes and binds the queue on a fresh
//! channel. It stops once the supervisor is closed or its `Subscription` is
//! unsubscribed.

use crate::{
    errors::AmqpError,
    message::Delivery,
    otel,
    queue::{QueueBinding, QueueDefinition},
    supervisor::{ConnectionStatus, ConnectionSupervisor},
    transport::AmqpChannel,
};
use async_trait::async_trait;
use futures_util::{future, StreamExt};
use opentelemetry::{
    global,
    trace::{Span, Status},
    Context,
};
use std::{borrow::Cow, sync::Arc, time::Duration};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{debug, error, info, warn};

/// Processes deliveries of a subscribed queue.
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    async fn exec(&self, ctx: &Context, delivery: &Delivery) -> Result<(), AmqpError>;
}

/// Called with every delivery whose `ConsumerHandler` failed, before the
/// delivery is nacked.
#[async_trait]
pub trait ConsumerErrorHandler: Send + Sync {
    async fn handle(&self, ctx: &Context, delivery: &Delivery, err: &AmqpError);
}

pub struct RabbitMQSubscriber {
    supervisor: Arc<ConnectionSupervisor>,
    queue: QueueDefinition,
    binding: QueueBinding,
    handler: Arc<dyn ConsumerHandler>,
    error_handler: Option<Arc<dyn ConsumerErrorHandler>>,
    auto_ack: bool,
    requeue_on_error: bool,
}

impl RabbitMQSubscriber {
    /// Creates a subscriber acknowledging deliveries automatically.
    ///
    /// # Parameters
    /// * `supervisor` - Supervisor owning the connection, shared with publishers
    /// * `queue` - Queue declared on every subscription
    /// * `binding` - Binding of `queue` to the supervisor's exchange
    /// * `handler` - Handler executed for each delivery
    ///
    /// # Returns
    /// A subscriber that does nothing until `spawn` or `consume_blocking`
    pub fn new(
        supervisor: Arc<ConnectionSupervisor>,
        queue: QueueDefinition,
        binding: QueueBinding,
        handler: Arc<dyn ConsumerHandler>,
    ) -> RabbitMQSubscriber {
        RabbitMQSubscriber {
            supervisor,
            queue,
            binding,
            handler,
            error_handler: None,
            auto_ack: true,
            requeue_on_error: false,
        }
    }

    /// Acks after a successful handler run and nacks after a failed one.
    pub fn manual_ack(mut self) -> Self {
        self.auto_ack = false;
        self
    }

    /// Requeues deliveries whose handler failed. Only used with manual acks.
    pub fn requeue_on_error(mut self, requeue: bool) -> Self {
        self.requeue_on_error = requeue;
        self
    }

    pub fn on_error(mut self, handler: Arc<dyn ConsumerErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Runs the subscription on a background task.
    ///
    /// Dropping the returned `Subscription` detaches the task, it keeps
    /// consuming until the supervisor is closed.
    pub fn spawn(self) -> Subscription {
        let queue = self.queue.name().to_owned();
        let (stop, stopped) = watch::channel(false);
        let task = tokio::spawn(async move { self.run(stopped).await });

        Subscription { queue, stop, task }
    }

    /// Consumes until the supervisor is closed, subscribing again after every
    /// connection loss.
    pub async fn consume_blocking(&self) -> Result<(), AmqpError> {
        let (_stop, stopped) = watch::channel(false);
        self.run(stopped).await
    }

    /// A subscription attempt failing on a connection that is still reported
    /// as usable is retried on the supervisor's retry policy, since the
    /// watcher may not have observed the loss yet.
    async fn run(&self, mut stop: watch::Receiver<bool>) -> Result<(), AmqpError> {
        let retry = self.supervisor.retry_policy();
        let mut failures: u32 = 0;

        loop {
            let mut readiness = self.supervisor.readiness();
            tokio::select! {
                ready = readiness.wait() => {
                    if let Err(err) = ready {
                        return self.stopped(err).await;
                    }
                }
                _ = stop_requested(&mut stop) => return self.unsubscribed(),
            }

            let (channel, mut deliveries) = match self
                .supervisor
                .consume(&self.queue, &self.binding, self.auto_ack)
                .await
            {
                Ok(subscription) => subscription,
                Err(AmqpError::ConnectionClosedError) => return Ok(()),
                Err(AmqpError::NotConnectedError) => {
                    if pause(retry.delay_for_attempt(0), &mut stop).await {
                        return self.unsubscribed();
                    }
                    continue;
                }
                Err(err) => {
                    failures += 1;
                    if retry.exhausted(failures) {
                        error!(
                            error = err.to_string(),
                            queue = self.queue.name(),
                            "failure to subscribe"
                        );
                        return Err(err);
                    }

                    let delay = retry.delay_for_attempt(failures - 1);
                    warn!(
                        error = err.to_string(),
                        queue = self.queue.name(),
                        delay_ms = delay.as_millis() as u64,
                        "subscribe failed, retrying"
                    );
                    if pause(delay, &mut stop).await {
                        return self.unsubscribed();
                    }
                    continue;
                }
            };
            failures = 0;
            info!(queue = self.queue.name(), "consuming");

            loop {
                tokio::select! {
                    next = deliveries.next() => match next {
                        Some(Ok(delivery)) => self.dispatch(channel.as_ref(), delivery).await,
                        Some(Err(err)) => error!(error = err.to_string(), "errors consume msg"),
                        None => break,
                    },
                    _ = stop_requested(&mut stop) => {
                        self.release(channel.as_ref()).await;
                        return self.unsubscribed();
                    }
                }
            }

            warn!(queue = self.queue.name(), "delivery stream ended");
            self.release(channel.as_ref()).await;
        }
    }

    async fn release(&self, channel: &dyn AmqpChannel) {
        if let Err(err) = channel.close().await {
            debug!(
                error = err.to_string(),
                queue = self.queue.name(),
                "failure to close consumer channel"
            );
        }
    }

    fn unsubscribed(&self) -> Result<(), AmqpError> {
        info!(queue = self.queue.name(), "unsubscribed");
        Ok(())
    }

    async fn stopped(&self, err: AmqpError) -> Result<(), AmqpError> {
        if self.supervisor.status().await == ConnectionStatus::Closed {
            debug!(queue = self.queue.name(), "subscriber stopped");
            return Ok(());
        }
        Err(err)
    }

    async fn dispatch(&self, channel: &dyn AmqpChannel, delivery: Delivery) {
        let msg_type = delivery.msg_type();
        let tracer = global::tracer("amqp consumer");
        let (ctx, mut span) = otel::new_span(&delivery.properties, &tracer, &msg_type);

        debug!("received: {} - exchange: {}", msg_type, delivery.exchange);

        let result = self.handler.exec(&ctx, &delivery).await;
        if let Err(err) = &result {
            warn!(error = err.to_string(), "error whiling handling msg");
            span.record_error(err);
            span.set_status(Status::Error {
                description: Cow::from("handler failure"),
            });

            if let Some(error_handler) = &self.error_handler {
                error_handler.handle(&ctx, &delivery, err).await;
            }
        }

        if self.auto_ack {
            if result.is_ok() {
                span.set_status(Status::Ok);
            }
            return;
        }

        let settled = match result {
            Ok(()) => channel.ack(delivery.delivery_tag).await,
            Err(_) => {
                channel
                    .nack(delivery.delivery_tag, self.requeue_on_error)
                    .await
            }
        };

        match settled {
            Err(err) => {
                span.record_error(&err);
                span.set_status(Status::Error {
                    description: Cow::from("error to settle msg"),
                });
            }
            Ok(()) if result.is_ok() => span.set_status(Status::Ok),
            Ok(()) => {}
        }
    }
}

/// Handle on a spawned subscriber.
pub struct Subscription {
    queue: String,
    stop: watch::Sender<bool>,
    task: JoinHandle<Result<(), AmqpError>>,
}

impl Subscription {
    /// Name of the consumed queue.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops consuming and closes the consumer channel, which hands unacked
    /// deliveries back to the broker. Waits for the subscriber to finish.
    pub async fn unsubscribe(self) -> Result<(), AmqpError> {
        let _ = self.stop.send(true);
        join(self.task).await
    }

    /// Waits until the subscriber stops on its own.
    pub async fn wait(self) -> Result<(), AmqpError> {
        let Subscription { task, stop, .. } = self;
        let result = join(task).await;
        drop(stop);
        result
    }
}

async fn join(task: JoinHandle<Result<(), AmqpError>>) -> Result<(), AmqpError> {
    match task.await {
        Ok(result) => result,
        Err(err) => {
            error!(error = err.to_string(), "subscriber task failed");
            Err(AmqpError::ConsumerError(err.to_string()))
        }
    }
}

/// Resolves once an unsubscribe was requested. Never resolves when the
/// `Subscription` was dropped instead.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    let requested = stop.wait_for(|stopped| *stopped).await.is_ok();
    if !requested {
        future::pending::<()>().await;
    }
}

/// Sleeps for `delay`. Returns whether an unsubscribe arrived meanwhile.
async fn pause(delay: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = stop_requested(stop) => true,
    }
}
