// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Publisher
//!
//! `RabbitMQPublisher` publishes through a `ConnectionSupervisor`, so it keeps
//! working across reconnections without being rebuilt. Each message is
//! stamped with a content type, a message id and the caller's trace context.
//! Publishing during an outage fails; nothing is buffered.

use crate::{
    errors::AmqpError,
    message::{Message, JSON_CONTENT_TYPE},
    otel,
    supervisor::ConnectionSupervisor,
};
use async_trait::async_trait;
use lapin::types::{AMQPValue, LongInt, LongLongInt, LongString, LongUInt, ShortString};
use opentelemetry::Context;
use std::{collections::HashMap, sync::Arc};
use tracing::error;

/// Typed header values accepted by `PublishMessage`.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValues {
    Bool(bool),
    Int(i32),
    LongInt(i64),
    Uint(u32),
    Text(String),
}

impl From<HeaderValues> for AMQPValue {
    fn from(value: HeaderValues) -> Self {
        match value {
            HeaderValues::Bool(v) => AMQPValue::Boolean(v),
            HeaderValues::Int(v) => AMQPValue::LongInt(LongInt::from(v)),
            HeaderValues::LongInt(v) => AMQPValue::LongLongInt(LongLongInt::from(v)),
            HeaderValues::Uint(v) => AMQPValue::LongUInt(LongUInt::from(v)),
            HeaderValues::Text(v) => AMQPValue::LongString(LongString::from(v)),
        }
    }
}

/// A message to publish.
#[derive(Debug, Clone, Default)]
pub struct PublishMessage {
    /// Target exchange. `None` publishes to the supervisor's exchange.
    pub to: Option<String>,
    pub key: String,
    pub msg_type: Option<String>,
    pub data: Vec<u8>,
    pub headers: HashMap<String, HeaderValues>,
}

impl PublishMessage {
    pub fn new(key: &str, data: &[u8]) -> PublishMessage {
        PublishMessage {
            key: key.to_owned(),
            data: data.to_vec(),
            ..Default::default()
        }
    }

    pub fn to(mut self, exchange: &str) -> Self {
        self.to = Some(exchange.to_owned());
        self
    }

    pub fn msg_type(mut self, msg_type: &str) -> Self {
        self.msg_type = Some(msg_type.to_owned());
        self
    }

    pub fn header(mut self, key: &str, value: HeaderValues) -> Self {
        self.headers.insert(key.to_owned(), value);
        self
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, ctx: &Context, infos: &PublishMessage) -> Result<(), AmqpError>;
}

pub struct RabbitMQPublisher {
    supervisor: Arc<ConnectionSupervisor>,
}

impl RabbitMQPublisher {
    pub fn new(supervisor: Arc<ConnectionSupervisor>) -> Arc<RabbitMQPublisher> {
        Arc::new(RabbitMQPublisher { supervisor })
    }

    fn message(&self, ctx: &Context, infos: &PublishMessage) -> Message {
        let mut msg = Message::new(&infos.data).with_content_type(JSON_CONTENT_TYPE);
        msg.msg_type = infos.msg_type.clone();
        msg.ensure_message_id();

        otel::inject_context(ctx, &mut msg.headers);
        for (key, value) in &infos.headers {
            msg.headers
                .insert(ShortString::from(key.as_str()), value.clone().into());
        }

        msg
    }
}

#[async_trait]
impl Publisher for RabbitMQPublisher {
    async fn publish(&self, ctx: &Context, infos: &PublishMessage) -> Result<(), AmqpError> {
        let msg = self.message(ctx, infos);
        let exchange = infos
            .to
            .as_deref()
            .unwrap_or(&self.supervisor.exchange().name);

        self.supervisor
            .publish(exchange, &infos.key, &msg)
            .await
            .map_err(|err| {
                error!(
                    error = err.to_string(),
                    exchange = exchange,
                    key = infos.key.as_str(),
                    "error publishing message"
                );
                err
            })
    }
}
