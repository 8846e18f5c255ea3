// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel
//!
//! lapin implementation of `AmqpChannel`. A channel is opened on a live
//! connection with the supervisor's prefetch settings and exposes the
//! topology operations (exchange and queue declaration, binding) and the
//! data operations (publish, consume, ack) scoped to it.
//!
//! A channel must not outlive the connection it was opened on: after a
//! reconnection the supervisor opens new ones and callers holding an old
//! channel have to request a new one.

use crate::{
    errors::AmqpError,
    exchange::ExchangeKind,
    message::{Delivery, Message},
    queue::{QueueBinding, QueueDefinition},
    transport::{AmqpChannel, DeliveryStream, Prefetch},
};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
    Channel, Connection,
};
use tracing::{debug, error};
use uuid::Uuid;

/// Reply code sent when closing a channel or connection on purpose.
pub(crate) const REPLY_SUCCESS: u16 = 200;

pub struct LapinChannel {
    channel: Channel,
    prefetch: Prefetch,
}

impl LapinChannel {
    /// Opens a channel on `conn` and applies the prefetch settings.
    pub async fn open(conn: &Connection, prefetch: Prefetch) -> Result<LapinChannel, AmqpError> {
        debug!("creating amqp channel...");
        let channel = match conn.create_channel().await {
            Ok(c) => Ok(c),
            Err(err) => {
                error!(error = err.to_string(), "error to create the channel");
                Err(AmqpError::ChannelError(err.to_string()))
            }
        }?;

        if prefetch.count > 0 {
            if let Err(err) = channel
                .basic_qos(
                    prefetch.count,
                    BasicQosOptions {
                        global: prefetch.global,
                    },
                )
                .await
            {
                error!(error = err.to_string(), "error to configure qos");
                let _ = channel.close(REPLY_SUCCESS, "qos failure").await;
                return Err(AmqpError::QoSDeclarationError(err.to_string()));
            }
        }

        debug!(id = channel.id(), "channel created");
        Ok(LapinChannel { channel, prefetch })
    }
}

#[async_trait]
impl AmqpChannel for LapinChannel {
    async fn declare_exchange(
        &self,
        name: &str,
        kind: &ExchangeKind,
        durable: bool,
    ) -> Result<(), AmqpError> {
        debug!("creating exchange: {}", name);

        match self
            .channel
            .exchange_declare(
                name,
                kind.into(),
                ExchangeDeclareOptions {
                    passive: false,
                    durable,
                    auto_delete: false,
                    internal: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(
                    error = err.to_string(),
                    name = name,
                    "error to declare the exchange"
                );
                Err(AmqpError::DeclareExchangeError(name.to_owned()))
            }
            _ => {
                debug!("exchange: {} was created", name);
                Ok(())
            }
        }
    }

    async fn declare_queue(&self, def: &QueueDefinition) -> Result<(), AmqpError> {
        debug!("creating queue: {}", def.name);

        match self
            .channel
            .queue_declare(
                &def.name,
                QueueDeclareOptions {
                    passive: false,
                    durable: def.durable,
                    exclusive: def.exclusive,
                    auto_delete: def.delete,
                    nowait: false,
                },
                def.arguments_table(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "failure to declare queue");
                Err(AmqpError::DeclareQueueError(def.name.clone()))
            }
            _ => {
                debug!("queue: {} was created", def.name);
                Ok(())
            }
        }
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        binding: &QueueBinding,
    ) -> Result<(), AmqpError> {
        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            queue, exchange, binding.routing_key
        );

        match self
            .channel
            .queue_bind(
                queue,
                exchange,
                &binding.routing_key,
                QueueBindOptions { nowait: false },
                binding.headers_table(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to bind queue to exchange");
                Err(AmqpError::BindingExchangeToQueueError(
                    exchange.to_owned(),
                    queue.to_owned(),
                ))
            }
            _ => Ok(()),
        }
    }

    async fn consume(&self, queue: &str, auto_ack: bool) -> Result<DeliveryStream, AmqpError> {
        let tag = format!("{}-{}", queue, Uuid::new_v4());

        let consumer = match self
            .channel
            .basic_consume(
                queue,
                &tag,
                BasicConsumeOptions {
                    no_local: false,
                    no_ack: auto_ack,
                    exclusive: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to create the consumer");
                Err(AmqpError::BindingConsumerError(queue.to_owned()))
            }
            Ok(c) => Ok(c),
        }?;

        Ok(consumer
            .map(|result| {
                result
                    .map(Delivery::from)
                    .map_err(|err| AmqpError::ConsumerError(err.to_string()))
            })
            .boxed())
    }

    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        msg: &Message,
    ) -> Result<(), AmqpError> {
        match self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &msg.body,
                msg.properties(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error publishing message");
                Err(AmqpError::PublishingError(err.to_string()))
            }
            _ => Ok(()),
        }
    }

    async fn ack(&self, delivery_tag: u64) -> Result<(), AmqpError> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions { multiple: false })
            .await
            .map_err(|err| {
                error!(error = err.to_string(), "error whiling ack msg");
                AmqpError::AckMessageError
            })
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), AmqpError> {
        self.channel
            .basic_nack(
                delivery_tag,
                BasicNackOptions {
                    multiple: false,
                    requeue,
                },
            )
            .await
            .map_err(|err| {
                error!(error = err.to_string(), "error whiling nack msg");
                AmqpError::NackMessageError
            })
    }

    fn prefetch(&self) -> Prefetch {
        self.prefetch
    }

    async fn close(&self) -> Result<(), AmqpError> {
        if !self.channel.status().connected() {
            return Ok(());
        }

        self.channel
            .close(REPLY_SUCCESS, "closing channel")
            .await
            .map_err(|err| AmqpError::ChannelError(err.to_string()))
    }
}
