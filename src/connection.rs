// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Connection
//!
//! lapin implementation of `AmqpTransport` and `AmqpConnection`. Dialing
//! applies the heartbeat, locale, connection name and TLS material from
//! `TransportConfig`; closure is reported through lapin's error callback.

use crate::{
    channel::{LapinChannel, REPLY_SUCCESS},
    errors::AmqpError,
    transport::{
        AmqpChannel, AmqpConnection, AmqpTransport, CloseNotification, Prefetch, TransportConfig,
    },
};
use async_trait::async_trait;
use futures_util::{future, FutureExt};
use lapin::{
    tcp::OwnedTLSConfig, types::LongString, uri::AMQPUri, Connection, ConnectionProperties,
};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

/// Dials connections with lapin.
#[derive(Debug, Clone, Default)]
pub struct LapinTransport;

impl LapinTransport {
    pub fn new() -> Arc<LapinTransport> {
        Arc::new(LapinTransport)
    }
}

#[async_trait]
impl AmqpTransport for LapinTransport {
    async fn dial(
        &self,
        url: &str,
        config: &TransportConfig,
    ) -> Result<Arc<dyn AmqpConnection>, AmqpError> {
        debug!("creating amqp connection...");

        let mut uri = url.parse::<AMQPUri>().map_err(|err| {
            error!(error = err.as_str(), "invalid amqp uri");
            AmqpError::InvalidConfigsError(err)
        })?;
        uri.query.heartbeat = Some(u16::try_from(config.heartbeat.as_secs()).unwrap_or(u16::MAX));

        let mut options = ConnectionProperties::default();
        options.locale = config.locale.clone();
        if let Some(name) = &config.connection_name {
            options = options.with_connection_name(LongString::from(name.clone()));
        }

        let result = match &config.tls {
            Some(tls) => {
                if tls.skip_verification {
                    warn!("peer verification skipping requested, using the configured trust roots");
                }
                let tls_config = OwnedTLSConfig {
                    cert_chain: tls.cert_chain.clone(),
                    ..Default::default()
                };
                Connection::connect_uri_with_config(uri, options, tls_config).await
            }
            None => Connection::connect_uri(uri, options).await,
        };

        let conn = match result {
            Ok(c) => Ok(c),
            Err(err) => {
                error!(error = err.to_string(), "failure to connect");
                Err(AmqpError::ConnectionError(err.to_string()))
            }
        }?;
        debug!("amqp connected");

        Ok(Arc::new(LapinConnection { conn }))
    }
}

/// A lapin connection.
///
/// lapin keeps a single error handler per connection, so only the most recent
/// `notify_close` registration is live; earlier ones resolve with `None`.
pub struct LapinConnection {
    conn: Connection,
}

#[async_trait]
impl AmqpConnection for LapinConnection {
    async fn open_channel(&self, prefetch: Prefetch) -> Result<Arc<dyn AmqpChannel>, AmqpError> {
        let channel = LapinChannel::open(&self.conn, prefetch).await?;
        Ok(Arc::new(channel))
    }

    fn notify_close(&self) -> CloseNotification {
        let (tx, rx) = oneshot::channel::<AmqpError>();
        let tx = Mutex::new(Some(tx));

        self.conn.on_error(move |err| {
            let sender = match tx.lock() {
                Ok(mut guard) => guard.take(),
                Err(_) => None,
            };
            if let Some(sender) = sender {
                let _ = sender.send(AmqpError::ConnectionError(err.to_string()));
            }
        });

        // a connection that dropped before the handler was installed never
        // calls it
        if !self.conn.status().connected() {
            return future::ready(Some(AmqpError::NotConnectedError)).boxed();
        }

        rx.map(|reason| reason.ok()).boxed()
    }

    fn is_connected(&self) -> bool {
        self.conn.status().connected()
    }

    async fn close(&self) -> Result<(), AmqpError> {
        if !self.conn.status().connected() {
            return Ok(());
        }

        self.conn
            .close(REPLY_SUCCESS, "closing connection")
            .await
            .map_err(|err| {
                error!(error = err.to_string(), "failure to close connection");
                AmqpError::CloseError(err.to_string())
            })
    }
}
