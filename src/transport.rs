// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Transport Capabilities
//!
//! The connection supervisor never touches a concrete client type. It talks to
//! the broker through the three traits defined here:
//!
//! - `AmqpTransport`: dials a connection
//! - `AmqpConnection`: opens channels and reports closure
//! - `AmqpChannel`: topology and data operations scoped to one channel
//!
//! The lapin implementations live in `connection` and `channel`.

use crate::{
    errors::AmqpError,
    exchange::ExchangeKind,
    message::{Delivery, Message},
    queue::{QueueBinding, QueueDefinition},
};
use async_trait::async_trait;
use futures_util::{future::BoxFuture, stream::BoxStream};
use std::{sync::Arc, time::Duration};

#[cfg(test)]
use mockall::automock;

/// Heartbeat negotiated when the caller provides no transport configuration.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(10);
/// Locale negotiated when the caller provides no transport configuration.
pub const DEFAULT_LOCALE: &str = "en_US";

/// Resolves once the connection it was registered on is closed, yielding the
/// close reason when the transport reports one.
pub type CloseNotification = BoxFuture<'static, Option<AmqpError>>;

/// Unterminated stream of deliveries. It ends when the channel or the
/// connection goes away; the consumer must then subscribe again.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, AmqpError>>;

/// TLS material used for `amqps` connections.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM encoded CA chain used to verify the broker.
    pub cert_chain: Option<String>,
    /// Asks for any broker certificate to be accepted. `LapinTransport`
    /// cannot disable peer verification: it logs a warning and verifies
    /// against `cert_chain`, or the system roots when there is none.
    pub skip_verification: bool,
}

impl TlsConfig {
    /// Configuration applied when a secure connection is requested without
    /// any TLS material.
    ///
    /// With `LapinTransport` the broker certificate must still chain to a
    /// system root, see `skip_verification`.
    pub fn permissive() -> TlsConfig {
        TlsConfig {
            cert_chain: None,
            skip_verification: true,
        }
    }
}

/// Settings forwarded to the transport when dialing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub heartbeat: Duration,
    pub locale: String,
    pub connection_name: Option<String>,
    pub tls: Option<TlsConfig>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            heartbeat: DEFAULT_HEARTBEAT,
            locale: DEFAULT_LOCALE.to_owned(),
            connection_name: None,
            tls: None,
        }
    }
}

/// Number of unacknowledged deliveries a channel may hold, and whether the
/// limit is shared by every consumer on the connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Prefetch {
    pub count: u16,
    pub global: bool,
}

/// Opens connections to a broker.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AmqpTransport: Send + Sync {
    async fn dial(
        &self,
        url: &str,
        config: &TransportConfig,
    ) -> Result<Arc<dyn AmqpConnection>, AmqpError>;
}

/// A live transport connection.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AmqpConnection: Send + Sync {
    /// Opens a new channel with the given prefetch settings.
    async fn open_channel(&self, prefetch: Prefetch) -> Result<Arc<dyn AmqpChannel>, AmqpError>;

    /// Registers for the closure of this connection. Resolves immediately if
    /// the connection is already down.
    fn notify_close(&self) -> CloseNotification;

    fn is_connected(&self) -> bool;

    async fn close(&self) -> Result<(), AmqpError>;
}

/// One channel multiplexed over a connection. Valid only as long as the
/// connection that opened it.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AmqpChannel: Send + Sync {
    async fn declare_exchange(
        &self,
        name: &str,
        kind: &ExchangeKind,
        durable: bool,
    ) -> Result<(), AmqpError>;

    async fn declare_queue(&self, def: &QueueDefinition) -> Result<(), AmqpError>;

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        binding: &QueueBinding,
    ) -> Result<(), AmqpError>;

    async fn consume(&self, queue: &str, auto_ack: bool) -> Result<DeliveryStream, AmqpError>;

    async fn publish(&self, exchange: &str, routing_key: &str, msg: &Message)
        -> Result<(), AmqpError>;

    async fn ack(&self, delivery_tag: u64) -> Result<(), AmqpError>;

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), AmqpError>;

    fn prefetch(&self) -> Prefetch;

    async fn close(&self) -> Result<(), AmqpError>;
}
