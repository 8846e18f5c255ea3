// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Messages
//!
//! `Message` is what callers hand to `publish`; `Delivery` is what a
//! consumer's delivery stream yields. `Delivery` is detached from the wire
//! client: acknowledgement goes through the consumer channel that produced it.

use crate::errors::AmqpError;
use lapin::{
    types::{AMQPValue, FieldTable, LongString, ShortString},
    BasicProperties,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::error;
use uuid::Uuid;

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// An outbound message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub body: Vec<u8>,
    pub headers: BTreeMap<ShortString, AMQPValue>,
    pub content_type: Option<String>,
    pub msg_type: Option<String>,
    pub message_id: Option<String>,
}

impl Message {
    pub fn new(body: &[u8]) -> Message {
        Message {
            body: body.to_vec(),
            ..Default::default()
        }
    }

    /// Serializes `payload` as JSON and tags the message accordingly.
    pub fn json<T: Serialize>(payload: &T) -> Result<Message, AmqpError> {
        let body = serde_json::to_vec(payload).map_err(|err| {
            error!(error = err.to_string(), "failure to serialize payload");
            AmqpError::ParsePayloadError
        })?;

        Ok(Message {
            body,
            content_type: Some(JSON_CONTENT_TYPE.to_owned()),
            ..Default::default()
        })
    }

    pub fn with_type(mut self, msg_type: &str) -> Self {
        self.msg_type = Some(msg_type.to_owned());
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_owned());
        self
    }

    pub fn with_message_id(mut self, id: &str) -> Self {
        self.message_id = Some(id.to_owned());
        self
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(
            ShortString::from(key),
            AMQPValue::LongString(LongString::from(value)),
        );
        self
    }

    /// Fills the message id with a random uuid when none was set.
    pub fn ensure_message_id(&mut self) {
        if self.message_id.is_none() {
            self.message_id = Some(Uuid::new_v4().to_string());
        }
    }

    pub(crate) fn properties(&self) -> BasicProperties {
        let mut props = BasicProperties::default();

        if let Some(content_type) = &self.content_type {
            props = props.with_content_type(ShortString::from(content_type.as_str()));
        }
        if let Some(msg_type) = &self.msg_type {
            props = props.with_type(ShortString::from(msg_type.as_str()));
        }
        if let Some(id) = &self.message_id {
            props = props.with_message_id(ShortString::from(id.as_str()));
        }
        if !self.headers.is_empty() {
            props = props.with_headers(FieldTable::from(self.headers.clone()));
        }

        props
    }
}

/// A message received from a consumer delivery stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub delivery_tag: u64,
    pub exchange: String,
    pub routing_key: String,
    pub redelivered: bool,
    pub properties: BasicProperties,
    pub data: Vec<u8>,
}

impl Delivery {
    /// The message type carried in the `type` property, or an empty string.
    pub fn msg_type(&self) -> String {
        self.properties
            .kind()
            .as_ref()
            .map(|kind| kind.to_string())
            .unwrap_or_default()
    }
}

impl From<lapin::message::Delivery> for Delivery {
    fn from(delivery: lapin::message::Delivery) -> Self {
        Delivery {
            delivery_tag: delivery.delivery_tag,
            exchange: delivery.exchange.to_string(),
            routing_key: delivery.routing_key.to_string(),
            redelivered: delivery.redelivered,
            properties: delivery.properties,
            data: delivery.data,
        }
    }
}
