// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for the Connection Supervisor
//!
//! This module provides the error type shared by every layer of the crate:
//! transport, protocol channels, the connection supervisor, and the
//! publisher/subscriber built on top of it. Each variant identifies which
//! operation failed; the underlying client error is rendered into the variant
//! when it helps the caller.

use thiserror::Error;

/// Represents errors that can occur while talking to the broker.
///
/// Handshake failures, topology failures, and publish failures are returned
/// synchronously to the caller of the operation. Connection loss is never
/// surfaced directly; callers only observe it as `NotConnectedError` until
/// the supervisor recovers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmqpError {
    /// Internal errors that don't fit into other categories
    #[error("internal error")]
    InternalError,

    /// Error in the supplied configuration
    #[error("invalid configuration `{0}`")]
    InvalidConfigsError(String),

    /// Error establishing a connection to the broker
    #[error("failure to connect `{0}`")]
    ConnectionError(String),

    /// Error creating a channel from an established connection
    #[error("failure to create a channel `{0}`")]
    ChannelError(String),

    /// Error configuring Quality of Service parameters
    #[error("failure to configure qos `{0}`")]
    QoSDeclarationError(String),

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding a queue to an exchange
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error opening a delivery stream on a queue
    #[error("failure to declare consumer `{0}`")]
    BindingConsumerError(String),

    /// Error publishing a message
    #[error("failure to publish `{0}`")]
    PublishingError(String),

    /// Error serializing a message payload
    #[error("failure to parse payload")]
    ParsePayloadError,

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// Error reading from a delivery stream
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// Error returned by a consumer handler
    #[error("handler failure `{0}`")]
    HandlerError(String),

    /// The connection is currently down
    #[error("not connected")]
    NotConnectedError,

    /// The background watcher is re-establishing the connection
    #[error("reconnection in progress")]
    ReconnectingError,

    /// The supervisor was closed
    #[error("connection closed")]
    ConnectionClosedError,

    /// Error closing the underlying connection
    #[error("failure to close connection `{0}`")]
    CloseError(String),
}
