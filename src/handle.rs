//! [`SnmpHandle`]: the thread-safe façade callers actually hold. It never
//! touches session state directly - every call marshals onto the session's
//! owner task over a channel, mirroring how the historical client's
//! `Session` object marshaled cross-thread calls through `QMetaObject`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::error::SessionError;
use crate::job::{GetValuesJob, Job, SetValueJob, WalkSubtreeJob};
use crate::oid::Oid;
use crate::session::{Command, Enqueued, Session, SessionConfig, SessionEvent};
use crate::value::Value;

/// Job ids wrap at `0x7FFF` back to `1`, never `0`; matches the historical
/// client's `work_id` range exactly (see `createWorkId` in the source this
/// client descends from).
const MAX_JOB_ID: u16 = 0x7FFF;

/// A cheap-to-clone handle to a running [`Session`]. Safe to share across
/// threads and tasks: every method either returns immediately (recording
/// just enough state to assign a job id) or sends a command into the
/// session's inbox without waiting for it to be processed.
#[derive(Clone)]
pub struct SnmpHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
    next_job_id: Arc<AtomicU16>,
    default_batch_limit: usize,
    busy: Arc<AtomicBool>,
}

impl SnmpHandle {
    /// Open a session against `config.agent_addr` and return a handle to it.
    pub async fn connect(config: SessionConfig) -> Result<Self, SessionError> {
        let default_batch_limit = config.get_request_limit;
        let (commands, events, busy) = Session::spawn(config).await?;
        Ok(SnmpHandle {
            commands,
            events,
            next_job_id: Arc::new(AtomicU16::new(1)),
            default_batch_limit,
            busy,
        })
    }

    /// `GET` a single OID. Convenience wrapper around [`Self::request_values`].
    pub fn request_value(&self, oid: Oid) -> u16 {
        self.request_values(vec![oid])
    }

    /// `GET` a batch of OIDs, requesting at most `get_request_limit` (from
    /// the session's config) per datagram; `0` means send them all at once.
    pub fn request_values(&self, oids: Vec<Oid>) -> u16 {
        self.request_values_limited(oids, self.default_batch_limit)
    }

    /// Like [`Self::request_values`], overriding the session's configured
    /// batch size for this call only.
    pub fn request_values_limited(&self, oids: Vec<Oid>, batch_limit: usize) -> u16 {
        let job = Job::GetValues(GetValuesJob::new(oids, batch_limit));
        self.dispatch(job)
    }

    /// Walk every OID in the subtree rooted at `base` via repeated
    /// GET-NEXT requests.
    pub fn request_sub_values(&self, base: Oid) -> u16 {
        let job = Job::WalkSubtree(WalkSubtreeJob::new(base));
        self.dispatch(job)
    }

    /// `SET` a single OID to `value`, authenticating with `community`
    /// (which may differ from the session's default read community).
    pub fn set_value(&self, community: impl Into<String>, oid: Oid, value: Value) -> u16 {
        let job = Job::SetValue(SetValueJob::new(community.into(), oid, value));
        self.dispatch(job)
    }

    /// Subscribe to this session's `response_received`/`request_failed`
    /// events. Each subscriber gets every event broadcast from here on.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// True if the session has a request in flight or commands waiting to
    /// be picked up - an approximation of the historical `isBusy()`, which
    /// could inspect the owner thread's queue synchronously because it ran
    /// on that thread. The in-flight half is a flag the session flips as it
    /// takes and releases `current`; the backlog half is the channel depth.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed) || self.commands.capacity() != self.commands.max_capacity()
    }

    fn dispatch(&self, job: Job) -> u16 {
        let job_id = self.allocate_job_id();
        let work = Enqueued { job_id, job };
        if let Err(err) = self.commands.try_send(Command::Enqueue(work)) {
            warn!(job_id, "SNMP job queue is full or the session has shut down; dropping job: {err}");
        }
        job_id
    }

    fn allocate_job_id(&self) -> u16 {
        loop {
            let current = self.next_job_id.load(Ordering::Relaxed);
            let next = if current >= MAX_JOB_ID { 1 } else { current + 1 };
            if self
                .next_job_id
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return next;
            }
        }
    }
}

/// Convenience for the common case of one handle per agent address with
/// defaults taken from [`SessionConfig::new`].
pub async fn connect(agent_addr: SocketAddr, community: impl Into<String>) -> Result<SnmpHandle, SessionError> {
    SnmpHandle::connect(SessionConfig::new(agent_addr, community)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_id_wraps_without_zero() {
        let counter = Arc::new(AtomicU16::new(MAX_JOB_ID));
        let handle_stub = SnmpHandle {
            commands: mpsc::channel(1).0,
            events: broadcast::channel(1).0,
            next_job_id: counter,
            default_batch_limit: 0,
            busy: Arc::new(AtomicBool::new(false)),
        };
        assert_eq!(handle_stub.allocate_job_id(), 1);
        assert_eq!(handle_stub.allocate_job_id(), 2);
    }
}
