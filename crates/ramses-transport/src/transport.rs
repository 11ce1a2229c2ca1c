// SPDX-License-Identifier: Apache-2.0

//! The unifying `Transport`: wires line reassembly, write pacing, sync-cycle
//! avoidance, and the active-gateway signature handshake around whichever
//! backend a `port_config` URL names (spec.md §4.6, §6).
//!
//! Generic over `ramses_core::env::Environment` so the exact same pacing and
//! sync-avoidance arithmetic drives both production wall-clock time and
//! `ramses-harness`'s virtual clock.

use std::ops::Add;
use std::time::Duration;

use chrono::Utc;
use ramses_core::config::PortConfig;
use ramses_core::env::Environment;
use ramses_core::packet::{Packet, parse_log_line};
use ramses_proto::frame::Frame;
use tracing::{info, warn};
use url::Url;

use crate::error::{TransportMqttError, TransportSerialError, TransportSourceInvalid};
use crate::gateway::GatewayKind;
use crate::line::LineReader;
use crate::mqtt::MqttBackend;
use crate::pacing::DutyCycleLimiter;
use crate::replay::ReplayBackend;
use crate::serial::SerialPort;
use crate::signature::{SignatureAction, SignatureHandshake};
use crate::sync_tracker::SyncTracker;

/// Which concrete backend a `Transport` is driving.
enum Backend {
    Serial { port: SerialPort, reader: LineReader },
    Mqtt(MqttBackend),
    Replay(ReplayBackend),
}

/// Parsed form of a `port_config`-style transport URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSource {
    /// `serial:///dev/ttyUSB0` or a bare path.
    Serial {
        /// OS device path.
        path: String,
    },
    /// `mqtt://host:1883/ramses/gateway?qos=1`.
    Mqtt {
        /// Broker host.
        host: String,
        /// Broker port.
        port: u16,
        /// Topic prefix (path component, slashes preserved).
        base_topic: String,
        /// Raw query string, if any.
        query: Option<String>,
    },
    /// `replay:/path/to/packet.log`: a recorded log replayed for testing.
    Replay {
        /// Log file path.
        path: String,
    },
}

impl TransportSource {
    /// Parse a `port_config` URL. Bare paths with no scheme are treated as
    /// serial devices, matching the original package's CLI convention.
    ///
    /// # Errors
    /// Returns [`TransportSourceInvalid::BadUrl`] if a `mqtt://` URL is
    /// malformed, or [`TransportSourceInvalid::UnsupportedScheme`] for any
    /// scheme other than `serial`, `mqtt`, and `replay`.
    pub fn parse(raw: &str) -> Result<Self, TransportSourceInvalid> {
        if !raw.contains("://") && !raw.starts_with("replay:") {
            return Ok(Self::Serial { path: raw.to_string() });
        }
        let url = Url::parse(raw).map_err(|_| TransportSourceInvalid::BadUrl(raw.to_string()))?;
        match url.scheme() {
            "serial" => Ok(Self::Serial { path: url.path().to_string() }),
            // RFC2217 (networked serial) and `alt://` (vendor-specific
            // alternate framing) both still resolve to a path the
            // `serialport`/`tokio-serial` backend opens directly; we don't
            // need to special-case them beyond stripping the scheme.
            "rfc2217" | "alt" => {
                Ok(Self::Serial { path: raw.to_string() })
            }
            "mqtt" => {
                let host = url
                    .host_str()
                    .ok_or_else(|| TransportSourceInvalid::BadUrl(raw.to_string()))?
                    .to_string();
                let port = url.port().unwrap_or(1883);
                let base_topic = url.path().trim_start_matches('/').to_string();
                let query = url.query().map(str::to_string);
                Ok(Self::Mqtt { host, port, base_topic, query })
            }
            "replay" => Ok(Self::Replay { path: url.path().to_string() }),
            other => Err(TransportSourceInvalid::UnsupportedScheme(other.to_string())),
        }
    }
}

/// Everything that can go wrong opening, reading from, or writing to a
/// [`Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The serial backend failed mid-write.
    #[error(transparent)]
    Serial(#[from] TransportSerialError),
    /// The MQTT backend failed mid-publish.
    #[error(transparent)]
    Mqtt(#[from] TransportMqttError),
    /// [`Transport::send`] was called on a `disable_sending` transport.
    #[error("transport is read-only (disable_sending is set)")]
    ReadOnly,
}

/// A live (or replayed) connection to the RF network, with pacing and
/// sync-cycle avoidance applied to every outbound write.
pub struct Transport<E: Environment>
where
    E::Instant: Add<Duration, Output = E::Instant>,
{
    backend: Backend,
    env: E,
    pacing: DutyCycleLimiter<E::Instant>,
    sync: SyncTracker<E::Instant>,
    /// The active gateway's device id, resolved once the signature
    /// handshake completes (or immediately, for replay sources).
    pub active_hgi: Option<String>,
    /// `None` until a serial port has been classified.
    pub gateway_kind: Option<GatewayKind>,
    /// Read-only mode (spec.md §6 `disable_sending`): [`Transport::send`]
    /// refuses to write anything.
    disable_sending: bool,
}

impl<E> Transport<E>
where
    E: Environment,
    E::Instant: Add<Duration, Output = E::Instant>,
{
    /// Open `source` and, for serial ports, run the active-gateway signature
    /// handshake to discover the real HGI id. Replay and MQTT sources skip
    /// the handshake (there is no RF echo to correlate against), and so
    /// does a serial source when `disable_sending` is set (spec.md §6: a
    /// read-only transport never writes, so there is nothing to echo).
    ///
    /// # Errors
    /// Propagates whatever the backend's own open/connect call returns, and
    /// [`TransportSerialError::SignatureTimeout`] if a serial source's
    /// handshake exhausts its retry budget.
    pub async fn open(
        source: &TransportSource,
        env: E,
        port_config: &PortConfig,
        disable_sending: bool,
    ) -> Result<Self, TransportError> {
        match source {
            TransportSource::Serial { path } => {
                let port = SerialPort::open(path, port_config.baud)?;
                let kind = port.kind;
                info!(path = %path, baud = port_config.baud, ?kind, disable_sending, "serial transport opened");
                let mut transport = Self {
                    backend: Backend::Serial { port, reader: LineReader::new() },
                    env,
                    pacing: DutyCycleLimiter::new(),
                    sync: SyncTracker::new(),
                    active_hgi: None,
                    gateway_kind: Some(kind),
                    disable_sending,
                };
                if !disable_sending {
                    transport.run_signature_handshake().await?;
                }
                Ok(transport)
            }
            TransportSource::Mqtt { host, port, base_topic, query } => {
                let backend = MqttBackend::connect(
                    "ramses-engine",
                    host,
                    *port,
                    base_topic,
                    query.as_deref(),
                )
                .await?;
                Ok(Self {
                    backend: Backend::Mqtt(backend),
                    env,
                    pacing: DutyCycleLimiter::new(),
                    sync: SyncTracker::new(),
                    active_hgi: None,
                    gateway_kind: None,
                    disable_sending,
                })
            }
            TransportSource::Replay { path } => {
                let text = std::fs::read_to_string(path).unwrap_or_default();
                let backend = ReplayBackend::from_log_text(&text).unwrap_or_default();
                Ok(Self {
                    backend: Backend::Replay(backend),
                    env,
                    pacing: DutyCycleLimiter::new(),
                    sync: SyncTracker::new(),
                    active_hgi: None,
                    gateway_kind: None,
                    disable_sending,
                })
            }
        }
    }

    async fn run_signature_handshake(&mut self) -> Result<(), TransportError> {
        let nonce = self.env.random_u32();
        let mut hs = SignatureHandshake::start(nonce);
        let SignatureAction::Send(first_frame) = hs.first_send(self.env.now()) else {
            unreachable!("SignatureHandshake::first_send always returns Send")
        };
        self.write_raw_frame(&first_frame).await?;

        loop {
            self.env.sleep(crate::signature::RETRY_INTERVAL).await;
            if let Some(line) = self.read_raw_line().await? {
                if let Ok(frame) = Frame::parse(&line) {
                    if let Some(SignatureAction::Resolved(id)) = hs.on_frame(&frame) {
                        self.active_hgi = Some(id);
                        return Ok(());
                    }
                }
            }
            match hs.tick(self.env.now()) {
                Some(SignatureAction::Send(frame)) => self.write_raw_frame(&frame).await?,
                Some(SignatureAction::Failed(e)) => return Err(e.into()),
                Some(SignatureAction::Resolved(id)) => {
                    self.active_hgi = Some(id);
                    return Ok(());
                }
                None => {}
            }
        }
    }

    async fn read_raw_line(&mut self) -> Result<Option<String>, TransportError> {
        match &mut self.backend {
            Backend::Serial { port, reader } => {
                if let Some(line) = reader.next_line() {
                    return Ok(Some(line));
                }
                port.read_into(reader).await?;
                Ok(reader.next_line())
            }
            Backend::Mqtt(mqtt) => Ok(mqtt.next_line().await?),
            Backend::Replay(replay) => Ok(replay.next_line()),
        }
    }

    async fn write_raw_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        let line = frame.render();
        match &mut self.backend {
            Backend::Serial { port, .. } => port.write_line(&line).await?,
            Backend::Mqtt(mqtt) => mqtt.publish(&line, Utc::now()).await?,
            Backend::Replay(replay) => replay.record_write(&line),
        }
        Ok(())
    }

    /// Receive the next packet, blocking (asynchronously) until one arrives
    /// or the source is exhausted.
    ///
    /// # Errors
    /// Propagates the backend's read error; a malformed line is logged at
    /// `warn` and skipped rather than surfaced (spec.md §4.6: "a malformed
    /// line never halts the read loop").
    pub async fn recv(&mut self) -> Result<Option<Packet>, TransportError> {
        loop {
            let Some(line) = self.read_raw_line().await? else { return Ok(None) };
            let stamped = format!("{} {line}", self.env_timestamp());
            match parse_log_line(&stamped).or_else(|_| {
                Frame::parse(&line).map(|frame| Packet::new(Utc::now(), frame))
            }) {
                Ok(packet) => {
                    if packet.frame.code == "1F09" {
                        self.record_sync(&packet.frame);
                    }
                    return Ok(Some(packet));
                }
                Err(e) => warn!(error = %e, line, "dropping unparseable line"),
            }
        }
    }

    fn env_timestamp(&self) -> String {
        Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }

    fn record_sync(&mut self, frame: &Frame) {
        if frame.payload.len() < 6 {
            return;
        }
        if let Ok(raw) = u16::from_str_radix(&frame.payload[2..6], 16) {
            self.sync.record(frame.addrs.src.id(), self.env.now(), f64::from(raw) / 10.0);
        }
    }

    /// Send one frame, applying the duty-cycle/inter-write-gap pacing and
    /// sync-cycle deferral before writing.
    ///
    /// # Errors
    /// Propagates the backend's write error.
    pub async fn send(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if self.disable_sending {
            return Err(TransportError::ReadOnly);
        }
        let now = self.env.now();
        if let Some(defer) = self.sync.deferral(now) {
            self.env.sleep(defer).await;
        }
        let wait = self.pacing.reserve(self.env.now(), frame.payload.len());
        if wait > Duration::ZERO {
            self.env.sleep(wait).await;
        }
        self.write_raw_frame(frame).await
    }
}

#[cfg(test)]
mod tests {
    use ramses_core::env::RealEnv;
    use ramses_proto::address::pkt_addrs;
    use ramses_proto::frame::{Frame, Verb};

    use super::{PortConfig, Transport, TransportError, TransportSource};

    #[tokio::test]
    async fn read_only_transport_refuses_to_send() {
        let source = TransportSource::Replay { path: "/nonexistent".to_string() };
        let mut transport = Transport::open(&source, RealEnv, &PortConfig::default(), true)
            .await
            .expect("replay source always opens");

        let addrs = pkt_addrs("01:145038 --:------ 01:145038").expect("valid triple");
        let frame = Frame::new(Verb::I, "---", addrs, "30C9", "0007D0");
        assert!(matches!(transport.send(&frame).await, Err(TransportError::ReadOnly)));
    }

    #[test]
    fn parses_rfc2217_and_alt_schemes_as_serial() {
        assert!(matches!(
            TransportSource::parse("rfc2217://rfc2217-host:2217/ttyUSB0"),
            Ok(TransportSource::Serial { .. })
        ));
        assert!(matches!(TransportSource::parse("alt://foo"), Ok(TransportSource::Serial { .. })));
    }
}
