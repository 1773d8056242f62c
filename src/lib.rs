//! snmp-client - an asynchronous SNMPv1/v2c client over UDP.
//!
//! A BER codec ([`ber`], [`value`]) and OID type ([`oid`]) sit underneath a
//! job-driven session actor ([`session`]) that owns the socket and the
//! retry/timeout state machine. Callers talk to it through [`handle`],
//! never the session directly.
//!
//! ```no_run
//! # async fn example() -> anyhow::Result<()> {
//! use snmp_client::{handle, oid::Oid};
//!
//! let client = handle::connect("192.0.2.1:161".parse()?, "public").await?;
//! let mut events = client.events();
//! let job_id = client.request_value(".1.3.6.1.2.1.1.5.0".parse::<Oid>()?);
//! let event = events.recv().await?;
//! # let _ = (job_id, event);
//! # Ok(())
//! # }
//! ```

pub mod ber;
pub mod config;
pub mod error;
pub mod handle;
pub mod job;
pub mod oid;
pub mod session;
pub mod util;
pub mod value;

pub use error::{CodecError, SessionError};
pub use handle::{connect, SnmpHandle};
pub use job::{AgentError, Binding, ErrorStatus};
pub use oid::Oid;
pub use session::{SessionConfig, SessionEvent, SnmpVersion};
pub use value::Value;

/// Crate version, exposed for CLI `--version` output and diagnostics.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
