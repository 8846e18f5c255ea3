// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consumer Queue Definitions
//!
//! Types describing the queue a consumer declares and the binding that
//! attaches it to the supervisor's managed exchange. Both are re-applied on
//! every subscription, so declarations must stay idempotent.

use lapin::types::{AMQPValue, FieldTable, LongInt, ShortString};
use std::collections::BTreeMap;

/// Constant for the header field used to specify message TTL
pub const AMQP_HEADERS_MESSAGE_TTL: &str = "x-message-ttl";
/// Constant for the header field used to specify maximum queue length
pub const AMQP_HEADERS_MAX_LENGTH: &str = "x-max-length";
/// Constant for the binding argument selecting how header matches combine
pub const AMQP_HEADERS_MATCH: &str = "x-match";

/// Definition of a queue with its declaration arguments.
#[derive(Debug, Clone, Default)]
pub struct QueueDefinition {
    pub(crate) name: String,
    pub(crate) durable: bool,
    pub(crate) exclusive: bool,
    pub(crate) delete: bool,
    pub(crate) arguments: BTreeMap<ShortString, AMQPValue>,
}

impl QueueDefinition {
    /// Creates a new non-durable, non-exclusive queue definition.
    pub fn new(name: &str) -> QueueDefinition {
        QueueDefinition {
            name: name.to_owned(),
            ..Default::default()
        }
    }

    /// Makes the queue durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Sets whether the queue is durable.
    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Makes the queue exclusive to the connection.
    ///
    /// Exclusive queues are deleted when the connection closes.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Sets the queue to auto-delete when no longer used.
    pub fn delete(mut self) -> Self {
        self.delete = true;
        self
    }

    /// Sets the message Time-To-Live (TTL) for the queue, in milliseconds.
    pub fn ttl(mut self, ttl: i32) -> Self {
        self.arguments.insert(
            ShortString::from(AMQP_HEADERS_MESSAGE_TTL),
            AMQPValue::LongInt(LongInt::from(ttl)),
        );
        self
    }

    /// Sets the maximum number of messages the queue can hold.
    pub fn max_length(mut self, max: i32) -> Self {
        self.arguments.insert(
            ShortString::from(AMQP_HEADERS_MAX_LENGTH),
            AMQPValue::LongInt(LongInt::from(max)),
        );
        self
    }

    /// Adds a raw declaration argument.
    pub fn argument(mut self, key: &str, value: AMQPValue) -> Self {
        self.arguments.insert(ShortString::from(key), value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub(crate) fn arguments_table(&self) -> FieldTable {
        FieldTable::from(self.arguments.clone())
    }
}

/// Routing key and header-match arguments binding a queue to the managed
/// exchange.
#[derive(Debug, Clone, Default)]
pub struct QueueBinding {
    pub(crate) routing_key: String,
    pub(crate) headers: BTreeMap<ShortString, AMQPValue>,
}

impl QueueBinding {
    /// Creates a binding for the given routing key.
    pub fn new(routing_key: &str) -> QueueBinding {
        QueueBinding {
            routing_key: routing_key.to_owned(),
            headers: BTreeMap::default(),
        }
    }

    /// Adds a header the broker matches against when routing on a headers
    /// exchange.
    pub fn header(mut self, key: &str, value: AMQPValue) -> Self {
        self.headers.insert(ShortString::from(key), value);
        self
    }

    /// Requires every header to match (`x-match: all`) instead of any.
    pub fn match_all(self) -> Self {
        self.header(AMQP_HEADERS_MATCH, AMQPValue::LongString("all".into()))
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub(crate) fn headers_table(&self) -> FieldTable {
        FieldTable::from(self.headers.clone())
    }
}
