//! The session: a single-threaded actor that owns the UDP socket, the job
//! queue, and the retry/timeout state machine. Talk to it through
//! [`crate::handle::SnmpHandle`]; nothing here is driven from more than
//! one task.

pub mod pdu;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::job::{AgentError, Binding, ErrorStatus, Job, JobAction, JobOutcome};
use crate::value::Value;

/// SNMP protocol version carried in the message envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnmpVersion {
    V1,
    V2c,
}

impl Default for SnmpVersion {
    /// Two source revisions disagree on the default: the older one
    /// hard-codes v1, the newer one defaults to v2c. This follows the
    /// newer behavior.
    fn default() -> Self {
        SnmpVersion::V2c
    }
}

impl SnmpVersion {
    fn wire_value(self) -> i32 {
        match self {
            SnmpVersion::V1 => 0,
            SnmpVersion::V2c => 1,
        }
    }
}

/// Maximum number of retransmits before a job is abandoned. The original
/// client gives up after the 5th retry (6 datagrams total); kept as-is.
const MAX_RETRIES: u32 = 5;

/// Default capacity of the job queue. Enqueuing past this drops the new job
/// and logs a warning; see [`SessionConfig::queue_capacity`].
const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// How many past wire request-ids are kept for diagnostic logging when an
/// unexpected response arrives.
const REQUEST_ID_HISTORY: usize = 10;

/// Inbound datagrams are drained as soon as the socket signals readable;
/// this tick is a pure liveness heartbeat alongside that, not a polling
/// substitute for it.
const LIVENESS_TICK: Duration = Duration::from_millis(300);

/// Everything needed to open a session against one SNMP agent.
///
/// Implements `Serialize`/`Deserialize` with per-field defaults so it can be
/// loaded from YAML (see [`crate::config::load_config`]) or built inline
/// with `..Default::default()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub agent_addr: SocketAddr,
    pub community: String,
    pub version: SnmpVersion,
    #[serde(with = "humantime_millis")]
    pub response_timeout: Duration,
    /// 0 means unlimited: a GET-REQUEST carries every outstanding OID.
    pub get_request_limit: usize,
    pub queue_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            agent_addr: "0.0.0.0:161".parse().unwrap(),
            community: "public".to_string(),
            version: SnmpVersion::default(),
            response_timeout: Duration::from_millis(10_000),
            get_request_limit: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Serialize/deserialize `Duration` as plain milliseconds, the unit the
/// config file and the historical client both use for the response timeout.
mod humantime_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        (value.as_millis() as u64).serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(de)?))
    }
}

impl SessionConfig {
    pub fn new(agent_addr: SocketAddr, community: impl Into<String>) -> Self {
        SessionConfig {
            agent_addr,
            community: community.into(),
            ..Default::default()
        }
    }

    /// Reject configurations the session could never run with. Diverges
    /// deliberately from the historical client, which accepted a
    /// non-positive timeout silently and then simply never retried.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.response_timeout.is_zero() {
            return Err(SessionError::InvalidTimeout(0));
        }
        if self.community.is_empty() {
            return Err(SessionError::EmptyCommunity);
        }
        Ok(())
    }
}

/// A unit of work submitted to the session, tagged with the job id the
/// caller was handed back synchronously by [`crate::handle::SnmpHandle`].
pub struct Enqueued {
    pub job_id: u16,
    pub job: Job,
}

/// Commands the handle marshals onto the session's owner task.
pub enum Command {
    Enqueue(Enqueued),
    Shutdown,
}

/// Terminal notifications the session fans out to every handle subscriber.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ResponseReceived { job_id: u16, values: Vec<Binding> },
    RequestFailed { job_id: u16 },
}

/// The running actor. Build with [`Session::spawn`]; all further
/// interaction goes through the returned channel handles, normally wrapped
/// in a [`crate::handle::SnmpHandle`].
pub struct Session {
    config: SessionConfig,
    socket: UdpSocket,
    commands: mpsc::Receiver<Command>,
    events: broadcast::Sender<SessionEvent>,
    current: Option<(u16, Job)>,
    /// Mirrors `current.is_some()` for [`crate::handle::SnmpHandle::is_busy`],
    /// which runs on a different task and cannot read `current` directly.
    busy: Arc<AtomicBool>,
    outstanding_request_id: Option<i32>,
    request_history: VecDeque<i32>,
    timeout_count: u32,
    last_sent_pdu: Option<Value>,
    last_sent_community: String,
    deadline: Option<Instant>,
}

impl Session {
    /// Bind a UDP socket and spawn the actor task. Returns the command
    /// sender and event broadcaster a [`crate::handle::SnmpHandle`] wraps.
    pub async fn spawn(
        config: SessionConfig,
    ) -> Result<(mpsc::Sender<Command>, broadcast::Sender<SessionEvent>, Arc<AtomicBool>), SessionError> {
        config.validate()?;
        let bind_addr: SocketAddr = if config.agent_addr.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(config.agent_addr).await?;

        let (command_tx, command_rx) = mpsc::channel(config.queue_capacity);
        let (event_tx, _) = broadcast::channel(256);
        let events = event_tx.clone();
        let busy = Arc::new(AtomicBool::new(false));

        let session = Session {
            config,
            socket,
            commands: command_rx,
            events: event_tx,
            current: None,
            busy: busy.clone(),
            outstanding_request_id: None,
            request_history: VecDeque::with_capacity(REQUEST_ID_HISTORY),
            timeout_count: 0,
            last_sent_pdu: None,
            last_sent_community: String::new(),
            deadline: None,
        };

        tokio::spawn(session.run());
        Ok((command_tx, events, busy))
    }

    async fn run(mut self) {
        let mut buf = vec![0u8; 65_507];
        let mut liveness = tokio::time::interval(LIVENESS_TICK);
        liveness.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            let armed_deadline = self.deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));
            tokio::select! {
                result = self.socket.recv(&mut buf) => {
                    match result {
                        Ok(len) => self.on_datagram(&buf[..len]).await,
                        Err(err) => warn!(error = %err, "error reading from the agent socket"),
                    }
                }
                _ = tokio::time::sleep_until(armed_deadline), if self.deadline.is_some() => {
                    self.on_timeout().await;
                }
                maybe_cmd = self.commands.recv(), if self.current.is_none() => {
                    match maybe_cmd {
                        Some(Command::Enqueue(work)) => self.start(work).await,
                        Some(Command::Shutdown) | None => break,
                    }
                }
                _ = liveness.tick() => {
                    debug!(busy = self.current.is_some(), "liveness tick");
                }
            }
        }
    }

    /// Start a freshly-dequeued job. The bounded command channel itself is
    /// the FIFO job queue (capacity `queue_capacity`): the session only
    /// drains it while idle (see the `recv()` guard in `run`), so once it
    /// fills up the handle's `try_send` starts failing, which is the
    /// historical queue-overflow-drops-silently behaviour for free.
    async fn start(&mut self, work: Enqueued) {
        let Enqueued { job_id, mut job } = work;
        let description = job.description();
        let action = job.start();
        self.current = Some((job_id, job));
        self.busy.store(true, Ordering::Relaxed);
        match action {
            JobAction::Send(pdu, community) => {
                self.send_new_request(community, pdu, &description).await;
            }
            JobAction::Done(_) | JobAction::Failed(_) => {
                unreachable!("job start() must always request a send")
            }
        }
    }

    async fn send_new_request(&mut self, community: Option<String>, pdu: Value, description: &str) {
        let community = community.unwrap_or_else(|| self.config.community.clone());
        let request_id = self.fresh_request_id();
        let envelope = pdu::wrap(self.config.version.wire_value(), &community, request_id, pdu.clone());
        if self.transmit(&envelope).await {
            self.last_sent_pdu = Some(pdu);
            self.last_sent_community = community;
            self.outstanding_request_id = Some(request_id);
            self.timeout_count = 0;
            self.deadline = Some(Instant::now() + self.config.response_timeout);
        } else if let Some((job_id, _)) = self.current.take() {
            warn!(job_id, description, "failed to transmit SNMP request; abandoning job");
            self.reset_wait_state();
            let _ = self.events.send(SessionEvent::RequestFailed { job_id });
            // Deliberately does not retry: an unsendable datagram means
            // the local network path is broken, not the remote agent.
        }
    }

    async fn transmit(&self, envelope: &Value) -> bool {
        match self.socket.send(&envelope.encode()).await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, agent = %self.config.agent_addr, "unable to send datagram to agent");
                false
            }
        }
    }

    fn fresh_request_id(&mut self) -> i32 {
        let previous = self.outstanding_request_id;
        let mut id;
        loop {
            id = rand::thread_rng().gen_range(1..=0x7FFF);
            if Some(id) != previous {
                break;
            }
        }
        self.request_history.push_back(id);
        while self.request_history.len() > REQUEST_ID_HISTORY {
            self.request_history.pop_front();
        }
        id
    }

    async fn on_datagram(&mut self, datagram: &[u8]) {
        let (messages, trailing) = Value::decode_with_trailing(datagram);
        if trailing > 0 {
            warn!(
                trailing,
                agent = %self.config.agent_addr,
                "dropping unparseable trailing bytes of a datagram"
            );
        }
        for message in messages {
            let Some(expected) = self.outstanding_request_id else {
                continue;
            };
            match pdu::parse_message(&message, expected) {
                pdu::ParsedResponse::Matched { bindings, error } => {
                    self.outstanding_request_id = None;
                    self.deadline = None;
                    self.timeout_count = 0;
                    self.handle_response(bindings, error).await;
                }
                pdu::ParsedResponse::Mismatched { response_id } => {
                    debug!(
                        response_id,
                        expected,
                        history = ?self.request_history,
                        "ignoring SNMP response with an unexpected request-id"
                    );
                }
                pdu::ParsedResponse::Malformed(reason) => {
                    warn!(reason, agent = %self.config.agent_addr, "discarding malformed SNMP response");
                }
            }
        }
    }

    async fn handle_response(&mut self, bindings: Vec<Binding>, error: Option<AgentError>) {
        let Some((job_id, mut job)) = self.current.take() else {
            return;
        };
        let description = job.description();
        let action = job.process(bindings, error);
        self.current = Some((job_id, job));
        match action {
            JobAction::Send(pdu, community) => {
                self.send_new_request(community, pdu, &description).await;
            }
            JobAction::Done(values) => {
                self.finish(job_id, JobOutcome::Values(values));
            }
            JobAction::Failed(err) => {
                debug!(job_id, status = %err.status, index = err.index, "agent reported an error");
                self.finish(job_id, JobOutcome::Error(err));
            }
        }
    }

    async fn on_timeout(&mut self) {
        let Some((job_id, _)) = self.current.as_ref() else {
            self.deadline = None;
            return;
        };
        let job_id = *job_id;
        self.timeout_count += 1;
        if self.timeout_count > MAX_RETRIES {
            warn!(
                job_id,
                agent = %self.config.agent_addr,
                "no SNMP response after {} retries; abandoning job",
                MAX_RETRIES
            );
            self.finish(job_id, JobOutcome::Error(AgentError { status: ErrorStatus::Other(-1), index: 0 }));
            return;
        }

        let Some(pdu) = self.last_sent_pdu.clone() else {
            return;
        };
        let community = self.last_sent_community.clone();
        let request_id = self.fresh_request_id();
        let envelope = pdu::wrap(self.config.version.wire_value(), &community, request_id, pdu);
        if self.transmit(&envelope).await {
            self.outstanding_request_id = Some(request_id);
            self.deadline = Some(Instant::now() + self.config.response_timeout);
            info!(job_id, attempt = self.timeout_count, "retransmitting SNMP request with a fresh request-id");
        } else {
            self.finish(job_id, JobOutcome::Error(AgentError { status: ErrorStatus::Other(-1), index: 0 }));
        }
    }

    fn finish(&mut self, job_id: u16, outcome: JobOutcome) {
        self.current = None;
        self.busy.store(false, Ordering::Relaxed);
        self.reset_wait_state();
        let event = match outcome {
            JobOutcome::Values(values) => SessionEvent::ResponseReceived { job_id, values },
            JobOutcome::Error(_) => SessionEvent::RequestFailed { job_id },
        };
        let _ = self.events.send(event);
    }

    fn reset_wait_state(&mut self) {
        self.outstanding_request_id = None;
        self.deadline = None;
        self.timeout_count = 0;
        self.last_sent_pdu = None;
    }
}
