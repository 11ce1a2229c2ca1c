// SPDX-License-Identifier: Apache-2.0

//! The QoS send/retry state machine.
//!
//! One job active at a time: echo/reply correlation against
//! [`ramses_proto::frame::Frame::header`], the generic-HGI-id substitution
//! rule (our own commands are built against [`HGI_DEVICE_ID`] before the
//! real active gateway id is known), impersonation alerts, and selective
//! QoS (spec.md §4.7, §4.8).
//!
//! Pure action pattern: every method takes `now: I` and returns the actions
//! the driver should execute.
//! No I/O happens here — `ramses-transport::Transport` (or a harness) drives
//! it with frames and periodic `poll` calls.

use std::ops::Sub;
use std::time::Duration;

use ramses_core::command::Command;
use ramses_core::config::{QosMode, SELECTIVE_QOS_CODES};
use ramses_proto::address::{ALL_DEVICE_ID, HGI_DEVICE_ID, NON_DEVICE_ID, pkt_addrs};
use ramses_proto::frame::{Frame, Verb};
use ramses_proto::puzzle;
use tracing::warn;

use crate::error::{FailureKind, ProtocolFsmError, ProtocolSendFailed};
use crate::queue::SendQueue;

/// Base echo-wait timer; grows by [`ECHO_RETRY_STEP`] per retry already
/// attempted (spec.md §4.7: `0.50s + retry * 0.05s`).
pub const ECHO_BASE_TIMEOUT: Duration = Duration::from_millis(500);
/// Per-retry growth of the echo timer.
pub const ECHO_RETRY_STEP: Duration = Duration::from_millis(50);

fn echo_timeout(retries: u8) -> Duration {
    ECHO_BASE_TIMEOUT + ECHO_RETRY_STEP * u32::from(retries)
}

/// Whether the serial gateway driving this FSM can transmit frames under an
/// address other than its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayCapability {
    /// evofw3 / ramses_esp: can send as another device (impersonation).
    CanImpersonate,
    /// HGI80: the RF chip always stamps its own hardware address.
    Hgi80Only,
}

/// Observable state of the one-job-at-a-time send pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmState {
    /// QoS is disabled, or there is no active job and nothing queued.
    Inactive,
    /// No active job, but the queue holds work for the next [`poll`](Fsm::poll).
    IsInIdle,
    /// A frame was just written; waiting to hear it echoed back.
    WantEcho,
    /// The echo arrived; waiting for the correlated reply.
    WantRply,
    /// The active job was sent without QoS tracking and is about to
    /// complete on the next [`poll`](Fsm::poll) (fire-and-forget path).
    IsPaused,
    /// The most recently active job exhausted its retries or outer
    /// timeout; cleared the next time a job starts.
    IsFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobPhase {
    WantEcho,
    WantRply,
    Settling,
}

#[derive(Debug, Clone)]
struct ActiveJob<I> {
    command: Command,
    phase: JobPhase,
    retries: u8,
    enqueued_at: I,
    sent_at: I,
    /// The echoed frame's `src.id`, recorded once the echo arrives so the
    /// reply phase can check `dst.id == echo.src.id` (spec.md §4.7).
    echo_src: Option<String>,
}

/// Side effects the driver must carry out.
#[derive(Debug, Clone)]
pub enum FsmAction {
    /// Write this frame to the transport.
    SendFrame(Frame),
    /// A `7FFF` impersonation notice; send this immediately before the
    /// `SendFrame` action that follows it.
    ImpersonationAlert(Frame),
    /// The active job's echo/reply correlation completed.
    JobDone {
        /// The completed command's tx header.
        tx_header: String,
    },
    /// The active job exhausted its retries or outer timeout.
    JobFailed(ProtocolSendFailed),
}

/// The QoS send/retry state machine.
#[derive(Debug)]
pub struct Fsm<I> {
    queue: SendQueue<I>,
    active: Option<ActiveJob<I>>,
    qos_mode: QosMode,
    active_hgi: Option<String>,
    gateway: Option<GatewayCapability>,
    had_failure: bool,
}

impl<I> Fsm<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Build an FSM around an empty queue.
    #[must_use]
    pub fn new(qos_mode: QosMode) -> Self {
        Self {
            queue: SendQueue::new(),
            active: None,
            qos_mode,
            active_hgi: None,
            gateway: None,
            had_failure: false,
        }
    }

    /// Record the active gateway's real device id, resolved by the
    /// transport's signature handshake.
    pub fn set_active_hgi(&mut self, id: String) {
        self.active_hgi = Some(id);
    }

    /// Record which firmware family is driving the serial port.
    pub fn set_gateway_capability(&mut self, capability: GatewayCapability) {
        self.gateway = Some(capability);
    }

    /// Current observable state.
    #[must_use]
    pub fn state(&self) -> FsmState {
        match &self.active {
            Some(job) => match job.phase {
                JobPhase::WantEcho => FsmState::WantEcho,
                JobPhase::WantRply => FsmState::WantRply,
                JobPhase::Settling => FsmState::IsPaused,
            },
            None if self.qos_mode == QosMode::Disabled => FsmState::Inactive,
            None if self.had_failure => FsmState::IsFailed,
            None if self.queue.is_empty() => FsmState::Inactive,
            None => FsmState::IsInIdle,
        }
    }

    /// Enqueue a command for transmission, stamping it with `now` as its
    /// enqueue time for the outer wall-clock timeout (spec.md §4.7, §5).
    ///
    /// # Errors
    /// [`ProtocolFsmError::QueueFull`] if the send queue is already full.
    pub fn enqueue(&mut self, command: Command, now: I) -> Result<(), ProtocolFsmError> {
        self.queue.push(command, now)
    }

    fn wants_qos(&self, command: &Command) -> bool {
        match self.qos_mode {
            QosMode::Full => true,
            QosMode::Disabled => false,
            QosMode::Selective => SELECTIVE_QOS_CODES.contains(&command.frame.code.as_str()),
        }
    }

    /// True if `command` purports to come from a device other than the
    /// active gateway itself — the generic placeholder address counts as
    /// "the gateway" even before the real id is learned.
    fn is_impersonating(&self, command: &Command) -> bool {
        let src = command.frame.addrs.src.id();
        if src == HGI_DEVICE_ID {
            return false;
        }
        match &self.active_hgi {
            Some(real) => src != real,
            None => false,
        }
    }

    fn impersonation_frame(&self, tx_header: &str) -> Frame {
        let sender = self.active_hgi.as_deref().unwrap_or(HGI_DEVICE_ID);
        let addrs = pkt_addrs(&format!("{NON_DEVICE_ID} {NON_DEVICE_ID} {sender}"))
            .expect("NON/NON/device is always a valid broadcast address set");
        let payload = puzzle::encode_impersonation(tx_header);
        Frame::new(Verb::I, "---", addrs, "7FFF", &payload)
    }

    /// The frame we expect to see echoed: `command`'s own frame, with any
    /// address slot equal to the generic HGI placeholder resolved to the
    /// real active gateway id once known (spec.md §4.6, §4.7). Compared by
    /// [`Frame`]'s `PartialEq` (`frame[4:] == frame[4:]`, spec.md §4.2), not
    /// just the header, so two outbound frames that share a header (same
    /// code/verb/device/context) but differ in payload can't be confused.
    fn expected_echo_frame(&self, command: &Command) -> Frame {
        let Some(real) = &self.active_hgi else { return command.frame.clone() };
        let frame = &command.frame;
        let sub = |id: &str| if id == HGI_DEVICE_ID { real.clone() } else { id.to_string() };
        let a0 = sub(frame.addrs.addr0.id());
        let a1 = sub(frame.addrs.addr1.id());
        let a2 = sub(frame.addrs.addr2.id());
        match pkt_addrs(&format!("{a0} {a1} {a2}")) {
            Ok(addrs) => Frame::new(frame.verb, &frame.seqn, addrs, &frame.code, &frame.payload),
            Err(_) => frame.clone(),
        }
    }

    /// Periodic maintenance: starts the next queued job if idle, retries or
    /// fails the active job's echo wait, and fails it on outer timeout.
    /// Call at least as often as the shortest echo timer.
    pub fn poll(&mut self, now: I) -> Vec<FsmAction> {
        let mut actions = Vec::new();

        if let Some(job) = &mut self.active {
            let waited = now - job.enqueued_at;
            match job.phase {
                JobPhase::WantEcho if job.retries >= job.command.max_retries => {
                    let failed = ProtocolSendFailed {
                        tx_header: job.command.tx_header.clone(),
                        retries: job.retries,
                        kind: FailureKind::EchoFailed,
                    };
                    self.active = None;
                    self.had_failure = true;
                    actions.push(FsmAction::JobFailed(failed));
                    return actions;
                }
                JobPhase::WantEcho if waited > job.command.timeout => {
                    let failed = ProtocolSendFailed {
                        tx_header: job.command.tx_header.clone(),
                        retries: job.retries,
                        kind: FailureKind::WaitFailed,
                    };
                    self.active = None;
                    self.had_failure = true;
                    actions.push(FsmAction::JobFailed(failed));
                    return actions;
                }
                JobPhase::WantEcho if now - job.sent_at > echo_timeout(job.retries) => {
                    job.retries += 1;
                    job.sent_at = now;
                    actions.push(FsmAction::SendFrame(job.command.frame.clone()));
                    return actions;
                }
                JobPhase::WantRply if waited > job.command.timeout => {
                    let failed = ProtocolSendFailed {
                        tx_header: job.command.tx_header.clone(),
                        retries: job.retries,
                        kind: FailureKind::RplyFailed,
                    };
                    self.active = None;
                    self.had_failure = true;
                    actions.push(FsmAction::JobFailed(failed));
                    return actions;
                }
                JobPhase::Settling => {
                    let tx_header = job.command.tx_header.clone();
                    self.active = None;
                    actions.push(FsmAction::JobDone { tx_header });
                    return actions;
                }
                JobPhase::WantEcho | JobPhase::WantRply => return actions,
            }
        }

        let (ready, timed_out) = self.queue.pop(now);
        actions.extend(timed_out.into_iter().map(FsmAction::JobFailed));
        let Some(ready) = ready else { return actions };
        let command = ready.command;
        self.had_failure = false;

        if self.is_impersonating(&command) {
            if self.gateway == Some(GatewayCapability::Hgi80Only) {
                warn!(tx_header = %command.tx_header, "impersonation requested on an HGI80 gateway, which cannot fake its own address");
            }
            actions.push(FsmAction::ImpersonationAlert(self.impersonation_frame(&command.tx_header)));
        }
        actions.push(FsmAction::SendFrame(command.frame.clone()));

        let phase = if self.wants_qos(&command) { JobPhase::WantEcho } else { JobPhase::Settling };
        self.active = Some(ActiveJob {
            command,
            phase,
            retries: 0,
            enqueued_at: ready.enqueued_at,
            sent_at: now,
            echo_src: None,
        });
        actions
    }

    /// Feed a received frame to the active job's echo/reply correlation.
    /// Frames unrelated to the active job are ignored (`vec![]`).
    pub fn on_frame(&mut self, frame: &Frame, now: I) -> Vec<FsmAction> {
        let Some(job) = &mut self.active else { return Vec::new() };

        match job.phase {
            JobPhase::WantEcho => {
                let expected = self.expected_echo_frame(&job.command);
                if *frame != expected {
                    return Vec::new();
                }
                let echo_src = frame.addrs.src.id().to_string();
                if job.command.should_wait_for_reply() {
                    job.phase = JobPhase::WantRply;
                    job.sent_at = now;
                    job.echo_src = Some(echo_src);
                    Vec::new()
                } else {
                    let tx_header = job.command.tx_header.clone();
                    self.active = None;
                    vec![FsmAction::JobDone { tx_header }]
                }
            }
            JobPhase::WantRply => {
                if job.command.rx_header.as_deref() != Some(frame.header()) {
                    return Vec::new();
                }
                if job.echo_src.as_deref() != Some(frame.addrs.dst.id()) {
                    return Vec::new();
                }
                let tx_header = job.command.tx_header.clone();
                self.active = None;
                vec![FsmAction::JobDone { tx_header }]
            }
            JobPhase::Settling => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use ramses_core::command::get_zone_temp;
    use ramses_proto::address::pkt_addrs;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    struct Tick(u64);

    impl Sub for Tick {
        type Output = Duration;
        fn sub(self, rhs: Self) -> Duration {
            Duration::from_millis(self.0.saturating_sub(rhs.0))
        }
    }

    fn ms(n: u64) -> Tick {
        Tick(n)
    }

    fn echo_for(command: &Command, src_hgi: &str) -> Frame {
        // Re-address the command's own frame as the gateway would echo it:
        // dst was the real ctl id already, src substitutes the real HGI id.
        let addrs =
            pkt_addrs(&format!("{src_hgi} {} {}", command.frame.addrs.addr1.id(), NON_DEVICE_ID))
                .expect("valid legacy point-to-point triple");
        Frame::new(
            command.frame.verb,
            "---",
            addrs,
            &command.frame.code,
            &command.frame.payload,
        )
    }

    /// An `RP` addressed back to the gateway that asked (spec.md §8 scenario
    /// 3: `RP --- 01:145038 18:013393 --:------ 30C9 003 0008D9`).
    fn reply_for(ctl_id: &str, hgi_id: &str, code: &str, payload: &str) -> Frame {
        let addrs = pkt_addrs(&format!("{ctl_id} {hgi_id} {NON_DEVICE_ID}"))
            .expect("valid legacy point-to-point triple");
        Frame::new(Verb::RP, "---", addrs, code, payload)
    }

    #[test]
    fn idle_with_empty_queue_is_inactive() {
        let fsm: Fsm<Tick> = Fsm::new(QosMode::Full);
        assert_eq!(fsm.state(), FsmState::Inactive);
    }

    #[test]
    fn poll_dequeues_and_enters_want_echo() {
        let mut fsm: Fsm<Tick> = Fsm::new(QosMode::Full);
        fsm.enqueue(get_zone_temp("01:145038", 0).unwrap(), ms(0)).unwrap();
        assert_eq!(fsm.state(), FsmState::IsInIdle);

        let actions = fsm.poll(ms(0));
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], FsmAction::SendFrame(_)));
        assert_eq!(fsm.state(), FsmState::WantEcho);
    }

    #[test]
    fn echo_then_reply_completes_the_job() {
        let mut fsm: Fsm<Tick> = Fsm::new(QosMode::Full);
        fsm.set_active_hgi("18:013393".to_string());
        let command = get_zone_temp("01:145038", 0).unwrap();
        fsm.enqueue(command.clone(), ms(0)).unwrap();
        fsm.poll(ms(0));

        let echo = echo_for(&command, "18:013393");
        assert!(fsm.on_frame(&echo, ms(10)).is_empty());
        assert_eq!(fsm.state(), FsmState::WantRply);

        let reply = reply_for("01:145038", "18:013393", "30C9", "0007D0");
        let actions = fsm.on_frame(&reply, ms(20));
        assert!(matches!(&actions[0], FsmAction::JobDone { tx_header } if tx_header == "30C9|RQ|01:145038|00"));
        assert_eq!(fsm.state(), FsmState::Inactive);
    }

    #[test]
    fn echo_with_matching_header_but_wrong_payload_is_not_accepted() {
        // Regression: two commands to the same device/code/idx share a
        // header but must not be confused by payload (spec.md §4.2, §4.7).
        let mut fsm: Fsm<Tick> = Fsm::new(QosMode::Full);
        fsm.set_active_hgi("18:013393".to_string());
        let command = get_zone_temp("01:145038", 0).unwrap();
        fsm.enqueue(command.clone(), ms(0)).unwrap();
        fsm.poll(ms(0));

        let mut wrong_payload_echo = echo_for(&command, "18:013393");
        wrong_payload_echo =
            Frame::new(wrong_payload_echo.verb, "---", wrong_payload_echo.addrs, &wrong_payload_echo.code, "FF");
        assert!(fsm.on_frame(&wrong_payload_echo, ms(10)).is_empty());
        assert_eq!(fsm.state(), FsmState::WantEcho);

        let correct_echo = echo_for(&command, "18:013393");
        assert!(fsm.on_frame(&correct_echo, ms(11)).is_empty());
        assert_eq!(fsm.state(), FsmState::WantRply);
    }

    #[test]
    fn reply_from_the_wrong_destination_is_not_accepted() {
        // Regression: a header/context match alone isn't enough — the reply
        // must be addressed back to the gateway that echoed, not to some
        // other device that happens to share the routing index (spec.md
        // §4.7: "whose dst.id equals the echo packet's src.id").
        let mut fsm: Fsm<Tick> = Fsm::new(QosMode::Full);
        fsm.set_active_hgi("18:013393".to_string());
        let command = get_zone_temp("01:145038", 0).unwrap();
        fsm.enqueue(command.clone(), ms(0)).unwrap();
        fsm.poll(ms(0));
        fsm.on_frame(&echo_for(&command, "18:013393"), ms(10));
        assert_eq!(fsm.state(), FsmState::WantRply);

        let misdirected_reply = reply_for("01:145038", "18:999999", "30C9", "0007D0");
        assert!(fsm.on_frame(&misdirected_reply, ms(20)).is_empty());
        assert_eq!(fsm.state(), FsmState::WantRply);

        let reply = reply_for("01:145038", "18:013393", "30C9", "0007D0");
        let actions = fsm.on_frame(&reply, ms(21));
        assert!(matches!(&actions[0], FsmAction::JobDone { .. }));
    }

    #[test]
    fn echo_timeout_retries_then_fails() {
        let mut fsm: Fsm<Tick> = Fsm::new(QosMode::Full);
        let command = get_zone_temp("01:145038", 0).unwrap();
        let max_retries = command.max_retries;
        fsm.enqueue(command, ms(0)).unwrap();
        fsm.poll(ms(0));

        let mut now = ms(0);
        let mut failed = None;
        for _ in 0..=u32::from(max_retries) {
            now = Tick(now.0 + 600);
            let actions = fsm.poll(now);
            if let Some(FsmAction::JobFailed(f)) = actions.into_iter().next() {
                failed = Some(f);
                break;
            }
        }
        let failed = failed.expect("job should have failed by now");
        assert_eq!(failed.kind, FailureKind::EchoFailed);
        assert_eq!(fsm.state(), FsmState::IsFailed);
    }

    #[test]
    fn disabled_qos_completes_without_waiting() {
        let mut fsm: Fsm<Tick> = Fsm::new(QosMode::Disabled);
        fsm.enqueue(get_zone_temp("01:145038", 0).unwrap(), ms(0)).unwrap();
        let sent = fsm.poll(ms(0));
        assert!(matches!(sent[0], FsmAction::SendFrame(_)));
        assert_eq!(fsm.state(), FsmState::IsPaused);

        let done = fsm.poll(ms(1));
        assert!(matches!(&done[0], FsmAction::JobDone { .. }));
        assert_eq!(fsm.state(), FsmState::Inactive);
    }

    #[test]
    fn selective_mode_skips_qos_for_non_selective_codes() {
        let mut fsm: Fsm<Tick> = Fsm::new(QosMode::Selective);
        // 30C9 is not in SELECTIVE_QOS_CODES.
        fsm.enqueue(get_zone_temp("01:145038", 0).unwrap(), ms(0)).unwrap();
        fsm.poll(ms(0));
        assert_eq!(fsm.state(), FsmState::IsPaused);
    }

    #[test]
    fn queued_job_past_its_outer_timeout_is_failed_and_skipped() {
        let mut fsm: Fsm<Tick> = Fsm::new(QosMode::Full);
        let mut stale = get_zone_temp("01:145038", 0).unwrap();
        stale.timeout = Duration::from_millis(1);
        fsm.enqueue(stale, ms(0)).unwrap();
        fsm.enqueue(get_zone_temp("01:145038", 1).unwrap(), ms(0)).unwrap();

        let actions = fsm.poll(ms(1_000));
        assert_eq!(actions.len(), 2);
        assert!(matches!(&actions[0], FsmAction::JobFailed(f) if f.kind == FailureKind::WaitFailed));
        assert!(matches!(actions[1], FsmAction::SendFrame(_)));
        assert_eq!(fsm.state(), FsmState::WantEcho);
    }

    #[test]
    fn impersonation_alert_precedes_the_send_when_faking_another_device() {
        let mut fsm: Fsm<Tick> = Fsm::new(QosMode::Full);
        fsm.set_active_hgi("18:013393".to_string());
        fsm.set_gateway_capability(GatewayCapability::Hgi80Only);

        let addrs = pkt_addrs("--:------ --:------ 01:145038").unwrap();
        let frame = Frame::new(Verb::I, "---", addrs, "30C9", "0007D0");
        let command = Command::new(frame);
        fsm.enqueue(command, ms(0)).unwrap();

        let actions = fsm.poll(ms(0));
        assert!(matches!(actions[0], FsmAction::ImpersonationAlert(_)));
        assert!(matches!(actions[1], FsmAction::SendFrame(_)));
    }
}
