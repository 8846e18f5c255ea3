// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Connection Supervisor
//!
//! Publish and consume against a RabbitMQ broker without dealing with
//! connection loss. A `ConnectionSupervisor` owns one connection, declares
//! the managed exchange on every handshake, and re-establishes the link in
//! the background when the broker drops it. `RabbitMQPublisher` and
//! `RabbitMQSubscriber` are built on top of it.
//!
//! ```no_run
//! use rabbitmq_supervisor::{configs::RabbitMQConfigs, message::Message, supervisor::ConnectionSupervisor};
//!
//! # async fn run() -> Result<(), rabbitmq_supervisor::errors::AmqpError> {
//! let cfg = RabbitMQConfigs::default();
//! let supervisor = ConnectionSupervisor::lapin(&cfg);
//! supervisor.connect_with_configs(&cfg).await?;
//! supervisor
//!     .publish_default("order.created", &Message::new(b"hello"))
//!     .await?;
//! supervisor.close().await
//! # }
//! ```

mod otel;

pub mod channel;
pub mod configs;
pub mod connection;
pub mod errors;
pub mod exchange;
pub mod gate;
pub mod message;
pub mod publisher;
pub mod queue;
pub mod retry;
pub mod subscriber;
pub mod supervisor;
pub mod transport;
