// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Managed Exchange Descriptor
//!
//! The supervisor owns exactly one exchange. It is declared on every
//! successful handshake, so it survives a broker restart or a dropped
//! connection without any action from the caller.

use serde::Deserialize;

/// Name used when the configuration does not provide one.
pub const DEFAULT_EXCHANGE_NAME: &str = "rabbitmq-supervisor";

/// Represents the types of exchanges available in RabbitMQ.
///
/// - Direct: Routes messages to queues based on an exact match of routing keys
/// - Fanout: Broadcasts messages to all bound queues regardless of routing keys
/// - Topic: Routes messages based on wildcard pattern matching of routing keys
/// - Headers: Routes based on message header values instead of routing keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Direct,
    Fanout,
    #[default]
    Topic,
    Headers,
}

impl From<&ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: &ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Headers => lapin::ExchangeKind::Headers,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
        }
    }
}

/// Name, durability and kind of the exchange managed by a supervisor.
///
/// Read-only once handed to the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Exchange {
    pub name: String,
    pub durable: bool,
    pub kind: ExchangeKind,
}

impl Exchange {
    /// Creates a non-durable topic exchange descriptor.
    pub fn new(name: &str) -> Exchange {
        Exchange {
            name: name.to_owned(),
            durable: false,
            kind: ExchangeKind::default(),
        }
    }

    /// Makes the exchange durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Sets the exchange type.
    pub fn kind(mut self, kind: ExchangeKind) -> Self {
        self.kind = kind;
        self
    }
}

impl Default for Exchange {
    fn default() -> Self {
        Exchange::new(DEFAULT_EXCHANGE_NAME)
    }
}
