// SPDX-License-Identifier: Apache-2.0

//! Manual smoke-test front end: wires `ramses-transport`, `ramses-protocol`,
//! and `ramses-core`'s device filter behind a minimal `clap` CLI.
//!
//! This binary is scaffolding, not a product: it opens one transport,
//! decodes and prints whatever crosses it, and replays queued test commands
//! through the QoS FSM. It is not the specified surface of any crate in the
//! workspace.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ramses_core::command::Command;
use ramses_core::config::EngineConfig;
use ramses_core::env::RealEnv;
use ramses_core::filter::DeviceFilter;
use ramses_core::message::Message;
use ramses_protocol::{Fsm, FsmAction};
use ramses_proto::frame::Frame;
use ramses_transport::{Transport, TransportSource};
use tracing::{info, warn};

/// Open a RAMSES-II transport, decode traffic, and drive the QoS FSM.
#[derive(Parser, Debug)]
#[command(name = "ramses-cli")]
#[command(about = "Smoke-test front end for the RAMSES-II engine crates")]
#[command(version)]
struct Args {
    /// Transport URL: a bare serial path, `serial:///dev/ttyUSB0`,
    /// `mqtt://host:1883/ramses`, or `replay:/path/to/packet.log`.
    source: String,

    /// Path to a JSON config file shaped like `EngineConfig` (spec.md §6).
    /// Defaults are used for anything the file omits or if it is absent.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frame to send once, after startup (e.g. a hand-built hex payload).
    /// Mutually informational: accepts a full rendered line such as
    /// `"000  I --- 01:145038 --:------ 01:145038 30C9 003 0007D0"`.
    #[arg(long)]
    send: Option<String>,

    /// Tracing filter directive, e.g. `debug` or `ramses_transport=trace`.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn load_config(path: Option<&PathBuf>) -> EngineConfig {
    let Some(path) = path else { return EngineConfig::default() };
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(error = %e, path = %path.display(), "failed to parse config, using defaults");
            EngineConfig::default()
        }),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "failed to read config, using defaults");
            EngineConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&args.log_level))
        .with_target(false)
        .init();

    let config = load_config(args.config.as_ref());
    let mut filter = DeviceFilter::try_from(&config)?;
    let qos_mode = config.qos_mode();

    let source = TransportSource::parse(&args.source)?;
    let mut transport =
        Transport::open(&source, RealEnv, &config.port_config, config.disable_sending).await?;

    if let Some(hgi) = transport.active_hgi.clone() {
        info!(hgi = %hgi, "active gateway resolved");
        filter.set_active_hgi(hgi);
    }

    let mut fsm: Fsm<std::time::Instant> = Fsm::new(qos_mode);
    if let Some(hgi) = transport.active_hgi.clone() {
        fsm.set_active_hgi(hgi);
    }

    if let Some(line) = args.send {
        let frame = Frame::parse(&line)?;
        fsm.enqueue(Command::new(frame), std::time::Instant::now())?;
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down on ctrl-c");
                return Ok(());
            }
            _ = ticker.tick() => {
                for action in fsm.poll(std::time::Instant::now()) {
                    run_action(&mut transport, action).await;
                }
            }
            packet = transport.recv() => {
                let Some(packet) = packet? else {
                    info!("transport exhausted");
                    return Ok(());
                };
                let src = packet.frame.addrs.src.id().to_string();
                let dst = packet.frame.addrs.dst.id().to_string();
                if let Err(e) = filter.check(&src, &dst) {
                    warn!(error = %e, "dropping filtered packet");
                    continue;
                }
                if filter.note_foreign_gateway(&src) {
                    warn!(device = %src, "observed a second, unrecognised 18: gateway on this network");
                }

                for action in fsm.on_frame(&packet.frame, std::time::Instant::now()) {
                    run_action(&mut transport, action).await;
                }

                match Message::decode(packet) {
                    Ok(msg) => info!(code = msg.code(), header = msg.header(), payload = ?msg.as_scalar(), "decoded"),
                    Err(e) => warn!(error = %e, "undecodable payload"),
                }
            }
        }
    }
}

async fn run_action(transport: &mut Transport<RealEnv>, action: FsmAction) {
    match action {
        FsmAction::SendFrame(frame) | FsmAction::ImpersonationAlert(frame) => {
            if let Err(e) = transport.send(&frame).await {
                warn!(error = %e, "send failed");
            }
        }
        FsmAction::JobDone { tx_header } => info!(header = %tx_header, "command completed"),
        FsmAction::JobFailed(failure) => warn!(?failure, "command failed"),
    }
}
