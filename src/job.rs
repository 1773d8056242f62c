//! Job state machines: the unit of work a [`crate::session::Session`] drives
//! to completion against the agent.
//!
//! Each job owns nothing about the socket or the wire; it only decides what
//! PDU to send next given what came back from the last one. The session
//! interprets the [`JobAction`] a job returns and performs the actual I/O -
//! this keeps jobs pure and easy to unit test without a live UDP socket.

use crate::oid::Oid;
use crate::value::Value;

/// One SNMP agent error reported back in a GET-RESPONSE (status, index).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentError {
    pub status: ErrorStatus,
    pub index: i64,
}

/// The `error-status` field of a GET-RESPONSE, per RFC 1157 section 4.1.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenError,
    Other(i64),
}

impl ErrorStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ErrorStatus::NoError,
            1 => ErrorStatus::TooBig,
            2 => ErrorStatus::NoSuchName,
            3 => ErrorStatus::BadValue,
            4 => ErrorStatus::ReadOnly,
            5 => ErrorStatus::GenError,
            other => ErrorStatus::Other(other),
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, ErrorStatus::NoError)
    }

    pub fn text(self) -> &'static str {
        match self {
            ErrorStatus::NoError => "No errors",
            ErrorStatus::TooBig => "Too big",
            ErrorStatus::NoSuchName => "No such name",
            ErrorStatus::BadValue => "Bad value",
            ErrorStatus::ReadOnly => "Read only",
            ErrorStatus::GenError => "Other errors",
            ErrorStatus::Other(_) => "Unsupported error",
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorStatus::Other(code) => write!(f, "Unsupported error({code})"),
            other => write!(f, "{}", other.text()),
        }
    }
}

/// A single resolved `OBJECT -> value` pair, as handed back to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub oid: Oid,
    pub value: Value,
}

/// What a job wants the session to do after `start()` or `process()`.
pub enum JobAction {
    /// Send this PDU to the agent and wait for a matching response. The
    /// community is `None` for jobs that use the session's configured
    /// community, or `Some` for a `SET` that supplies its own.
    Send(Value, Option<String>),
    /// The job is done; hand these bindings back to the caller.
    Done(Vec<Binding>),
    /// The agent reported an error for this request; fail the job.
    Failed(AgentError),
}

/// Outcome of a completed job, delivered to the caller via
/// [`crate::session::SessionEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Values(Vec<Binding>),
    Error(AgentError),
}

/// The three request shapes the client exposes. Each variant is its own
/// small state machine; `Session` owns the transport and simply calls into
/// whichever job is current.
pub enum Job {
    GetValues(GetValuesJob),
    WalkSubtree(WalkSubtreeJob),
    SetValue(SetValueJob),
}

impl Job {
    pub fn start(&mut self) -> JobAction {
        match self {
            Job::GetValues(j) => j.start(),
            Job::WalkSubtree(j) => j.start(),
            Job::SetValue(j) => j.start(),
        }
    }

    /// Feed in the bindings and/or agent error extracted from a matching
    /// response and get back what to do next.
    pub fn process(&mut self, bindings: Vec<Binding>, error: Option<AgentError>) -> JobAction {
        match self {
            Job::GetValues(j) => j.process(bindings, error),
            Job::WalkSubtree(j) => j.process(bindings, error),
            Job::SetValue(j) => j.process(bindings, error),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Job::GetValues(j) => j.description(),
            Job::WalkSubtree(j) => j.description(),
            Job::SetValue(j) => j.description(),
        }
    }
}

/// `GET` one or more OIDs, batching the request list in chunks of at most
/// `batch_limit` (0 means unlimited) and accumulating results across
/// batches until every requested OID has been answered.
pub struct GetValuesJob {
    remaining: Vec<Oid>,
    batch_limit: usize,
    results: Vec<Binding>,
    description: String,
}

impl GetValuesJob {
    pub fn new(oids: Vec<Oid>, batch_limit: usize) -> Self {
        let description = format!(
            "requestValues: {}",
            oids.iter().map(Oid::to_text).collect::<Vec<_>>().join("; ")
        );
        GetValuesJob {
            remaining: oids,
            batch_limit,
            results: Vec::new(),
            description,
        }
    }

    fn next_batch(&mut self) -> Vec<Oid> {
        let size = if self.batch_limit > 0 {
            self.batch_limit.min(self.remaining.len())
        } else {
            self.remaining.len()
        };
        self.remaining.drain(..size).collect()
    }

    fn start(&mut self) -> JobAction {
        JobAction::Send(build_get_request(self.next_batch()), None)
    }

    fn process(&mut self, bindings: Vec<Binding>, error: Option<AgentError>) -> JobAction {
        if let Some(err) = error {
            return JobAction::Failed(err);
        }
        self.results.extend(bindings);
        if self.remaining.is_empty() {
            JobAction::Done(std::mem::take(&mut self.results))
        } else {
            JobAction::Send(build_get_request(self.next_batch()), None)
        }
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

/// Walk an OID subtree with repeated GET-NEXT requests, stopping as soon as
/// the agent returns an OID outside `base`.
pub struct WalkSubtreeJob {
    base: Oid,
    found: Vec<Binding>,
    description: String,
}

impl WalkSubtreeJob {
    pub fn new(base: Oid) -> Self {
        let description = format!("requestSubValues: {}", base.to_text());
        WalkSubtreeJob {
            base,
            found: Vec::new(),
            description,
        }
    }

    fn start(&mut self) -> JobAction {
        JobAction::Send(build_get_next_request(&self.base), None)
    }

    fn process(&mut self, mut bindings: Vec<Binding>, error: Option<AgentError>) -> JobAction {
        if let Some(err) = error {
            return JobAction::Failed(err);
        }
        // Anything but exactly one binding ends the walk with whatever has
        // already been accumulated: zero means no further answer, more than
        // one means the reply isn't the single GET-NEXT result this job expects.
        if bindings.len() != 1 {
            return JobAction::Done(std::mem::take(&mut self.found));
        }
        let binding = bindings.remove(0);
        if binding.oid.is_strict_descendant_of(&self.base) {
            let next = binding.oid.clone();
            self.found.push(binding);
            JobAction::Send(build_get_next_request(&next), None)
        } else {
            JobAction::Done(std::mem::take(&mut self.found))
        }
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

/// `SET` a single OID to a new value. A single request/response round trip;
/// the returned binding is the agent's echo of the new value.
pub struct SetValueJob {
    community: String,
    oid: Oid,
    value: Value,
    description: String,
}

impl SetValueJob {
    pub fn new(community: String, oid: Oid, value: Value) -> Self {
        let description = format!("requestSetValue: {}", oid.to_text());
        SetValueJob {
            community,
            oid,
            value,
            description,
        }
    }

    fn start(&mut self) -> JobAction {
        JobAction::Send(
            build_set_request(&self.community, &self.oid, &self.value),
            Some(self.community.clone()),
        )
    }

    fn process(&mut self, bindings: Vec<Binding>, error: Option<AgentError>) -> JobAction {
        if let Some(err) = error {
            return JobAction::Failed(err);
        }
        JobAction::Done(bindings)
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

fn build_get_request(oids: Vec<Oid>) -> Value {
    let mut bindings = Value::sequence();
    for oid in oids {
        let mut pair = Value::sequence();
        pair.add_child(value_oid(&oid));
        pair.add_child(Value::null());
        bindings.add_child(pair);
    }
    let mut pdu = Value::pdu(crate::ber::tag::GET_REQUEST);
    pdu.add_child(Value::integer(0)); // request-id, overwritten by the session
    pdu.add_child(Value::integer(0)); // error-status
    pdu.add_child(Value::integer(0)); // error-index
    pdu.add_child(bindings);
    pdu
}

fn build_get_next_request(oid: &Oid) -> Value {
    let mut bindings = Value::sequence();
    let mut pair = Value::sequence();
    pair.add_child(value_oid(oid));
    pair.add_child(Value::null());
    bindings.add_child(pair);
    let mut pdu = Value::pdu(crate::ber::tag::GET_NEXT_REQUEST);
    pdu.add_child(Value::integer(0));
    pdu.add_child(Value::integer(0));
    pdu.add_child(Value::integer(0));
    pdu.add_child(bindings);
    pdu
}

fn build_set_request(_community: &str, oid: &Oid, value: &Value) -> Value {
    let mut bindings = Value::sequence();
    let mut pair = Value::sequence();
    pair.add_child(value_oid(oid));
    pair.add_child(value.clone());
    bindings.add_child(pair);
    let mut pdu = Value::pdu(crate::ber::tag::SET_REQUEST);
    pdu.add_child(Value::integer(0));
    pdu.add_child(Value::integer(0));
    pdu.add_child(Value::integer(0));
    pdu.add_child(bindings);
    pdu
}

/// An already-validated [`Oid`] always round-trips through [`Value::oid`].
fn value_oid(oid: &Oid) -> Value {
    Value::oid(&oid.to_text()).expect("Oid is already validated")
}
