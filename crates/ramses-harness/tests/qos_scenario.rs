// SPDX-License-Identifier: Apache-2.0

//! Scenario 6: `Command::get_zone_temp` driven through the QoS FSM under a
//! virtual clock. `turmoil` intercepts `tokio::time`, so the 0.5s+ echo
//! waits and the 30s outer timeout resolve in a simulation step rather
//! than real wall-clock time.

use ramses_core::command::get_zone_temp;
use ramses_core::config::QosMode;
use ramses_core::env::Environment;
use ramses_proto::address::pkt_addrs;
use ramses_proto::frame::{Frame, Verb};
use ramses_protocol::error::{FailureKind, ProtocolSendFailed};
use ramses_protocol::fsm::FsmAction;
use ramses_harness::{SimDriver, SimEnv};
use std::time::Duration;

const CTL_ID: &str = "01:145038";
const REAL_HGI: &str = "18:013393";

fn echo_frame(command: &ramses_core::command::Command, src_hgi: &str) -> Frame {
    let addrs = pkt_addrs(&format!(
        "{src_hgi} {} {}",
        command.frame.addrs.addr1.id(),
        ramses_proto::address::NON_DEVICE_ID
    ))
    .expect("valid legacy point-to-point triple");
    Frame::new(command.frame.verb, "---", addrs, &command.frame.code, &command.frame.payload)
}

fn reply_frame() -> Frame {
    let addrs = pkt_addrs(&format!("{CTL_ID} {REAL_HGI} {}", ramses_proto::address::NON_DEVICE_ID))
        .expect("valid legacy point-to-point triple");
    Frame::new(Verb::RP, "---", addrs, "30C9", "0008D9")
}

#[test]
fn echo_then_reply_resolves_the_job() {
    let mut sim = turmoil::Builder::new().build();

    sim.client("gateway", async move {
        let env = SimEnv::new(1);
        let mut driver = SimDriver::new(env, QosMode::Full);
        driver.set_active_hgi(REAL_HGI);

        let command = get_zone_temp(CTL_ID, 0).expect("valid command");
        driver.enqueue(command.clone()).expect("queue has room");

        let sent = driver.poll();
        assert!(matches!(sent.as_slice(), [FsmAction::SendFrame(_)]));

        let echo = echo_frame(&command, REAL_HGI);
        assert!(driver.on_frame(&echo).is_empty());

        let reply = reply_frame();
        let settled = driver.run_until_settled(Duration::from_secs(5)).await;
        // No reply fed yet: still waiting, nothing terminal.
        assert!(settled.is_none());

        let actions = driver.on_frame(&reply);
        assert!(matches!(
            actions.as_slice(),
            [FsmAction::JobDone { tx_header }] if tx_header == "30C9|RQ|01:145038|00"
        ));

        Ok(())
    });

    sim.run().expect("simulation failed");
}

#[test]
fn three_consecutive_timeouts_fail_the_job() {
    let mut sim = turmoil::Builder::new().build();

    sim.client("gateway", async move {
        let env = SimEnv::new(2);
        let mut driver = SimDriver::new(env, QosMode::Full);
        driver.set_active_hgi(REAL_HGI);

        let command = get_zone_temp(CTL_ID, 0).expect("valid command");
        let max_retries = command.max_retries;
        driver.enqueue(command).expect("queue has room");
        driver.poll();

        // No echo ever arrives: the FSM resends up to max_retries times
        // and then fails with EchoFailed.
        let settled = driver
            .run_until_settled(Duration::from_secs(30))
            .await
            .expect("job should fail within the outer timeout");

        match settled {
            FsmAction::JobFailed(ProtocolSendFailed { retries, kind, .. }) => {
                assert_eq!(retries, max_retries);
                assert_eq!(kind, FailureKind::EchoFailed);
            },
            other => panic!("expected JobFailed, got {other:?}"),
        }

        Ok(())
    });

    sim.run().expect("simulation failed");
}
