// SPDX-License-Identifier: Apache-2.0

//! MQTT backend: publishes outbound frames to `{base_topic}/tx` and
//! subscribes to `{base_topic}/rx`, wrapping each line in the `{"ts":
//! ..., "msg": ...}` JSON envelope the HA add-on's MQTT gateway bridge uses.

use chrono::Utc;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::error::TransportMqttError;

/// One line wrapped for transit over MQTT.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// RFC 3339 timestamp assigned by the sender.
    pub ts: String,
    /// The raw (unframed) wire line.
    pub msg: String,
}

impl Envelope {
    /// Wrap `line` with the current time.
    #[must_use]
    pub fn wrap(line: &str, now: chrono::DateTime<Utc>) -> Self {
        Self { ts: now.to_rfc3339(), msg: line.to_string() }
    }
}

/// MQTT transport backend: a thin wrapper over an `AsyncClient`/`EventLoop`
/// pair, topic-scoped under `base_topic`.
pub struct MqttBackend {
    client: AsyncClient,
    eventloop: EventLoop,
    base_topic: String,
}

fn parse_qos(query: Option<&str>) -> QoS {
    match query.and_then(|q| q.strip_prefix("qos=")).and_then(|v| v.parse::<u8>().ok()) {
        Some(1) => QoS::AtLeastOnce,
        Some(2) => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

impl MqttBackend {
    /// Connect to `host:port` and subscribe to `{base_topic}/rx`.
    ///
    /// `query` is the raw query string off a `mqtt://host:port/base/topic?qos=1`
    /// URL, if any.
    ///
    /// # Errors
    /// Returns [`TransportMqttError::Connection`] if the initial subscribe
    /// fails.
    pub async fn connect(
        client_id: &str,
        host: &str,
        port: u16,
        base_topic: &str,
        query: Option<&str>,
    ) -> Result<Self, TransportMqttError> {
        let mut opts = MqttOptions::new(client_id, host, port);
        opts.set_keep_alive(std::time::Duration::from_secs(30));
        let (client, eventloop) = AsyncClient::new(opts, 64);

        let qos = parse_qos(query);
        let rx_topic = format!("{base_topic}/rx");
        client
            .subscribe(&rx_topic, qos)
            .await
            .map_err(|e| TransportMqttError::Connection(e.to_string()))?;

        Ok(Self { client, eventloop, base_topic: base_topic.to_string() })
    }

    /// Publish one wire line to `{base_topic}/tx`.
    ///
    /// # Errors
    /// Returns [`TransportMqttError::Connection`] if the publish fails, or
    /// [`TransportMqttError::BadEnvelope`] if the envelope fails to
    /// serialise (should not happen for well-formed UTF-8 lines).
    pub async fn publish(&self, line: &str, now: chrono::DateTime<Utc>) -> Result<(), TransportMqttError> {
        let envelope = Envelope::wrap(line, now);
        let payload = serde_json::to_vec(&envelope)?;
        let tx_topic = format!("{}/tx", self.base_topic);
        self.client
            .publish(&tx_topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| TransportMqttError::Connection(e.to_string()))?;
        Ok(())
    }

    /// Poll the event loop for the next incoming line, if any. Non-publish
    /// events (ping responses, ack confirmations) are silently consumed.
    ///
    /// # Errors
    /// Returns [`TransportMqttError::Connection`] if the connection drops,
    /// or [`TransportMqttError::BadEnvelope`] if a publish's payload isn't
    /// the expected JSON envelope.
    pub async fn next_line(&mut self) -> Result<Option<String>, TransportMqttError> {
        loop {
            let event = self
                .eventloop
                .poll()
                .await
                .map_err(|e| TransportMqttError::Connection(e.to_string()))?;
            match event {
                Event::Incoming(Packet::Publish(publish)) => {
                    let envelope: Envelope = serde_json::from_slice(&publish.payload)?;
                    trace!(topic = %publish.topic, "mqtt publish received");
                    return Ok(Some(envelope.msg));
                }
                Event::Incoming(Packet::Disconnect) => {
                    warn!("mqtt broker sent disconnect");
                    return Ok(None);
                }
                _ => continue,
            }
        }
    }
}
