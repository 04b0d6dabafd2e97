//! # agentry
//!
//! A thread-per-agent actor substrate for AI agent orchestration: named
//! workers on their own OS threads share one addressed mailbox, scan it for
//! packs addressed to them, and exchange messages through their couriers. An
//! agency owns the mailbox, registers and kills workers, and answers to
//! agency-wide control verbs; an ownership registry lets several workers
//! jointly keep long-lived helpers (transcripts, talkers) alive without a
//! garbage collector.

pub mod agency;
pub mod errors;
pub mod logging;
pub mod owns;
pub mod pack;
pub mod queue;
pub mod transcript;
pub mod worker;
pub mod workers;

pub use agency::{Agency, AGENCY_NAME};
pub use errors::{AgencyError, OwnsError, WorkerError};
pub use owns::{Owns, Token};
pub use pack::{Pack, Payload, EXIT_SIGNALER};
pub use queue::{Held, PackQueue};
pub use worker::{spawn_worker, Courier, Flow, Worker, WorkerHandle, WorkerProfile};
pub use workers::{EchoWorker, RelayWorker};

/// Library version.
pub const VERSION: &str = "0.2.0";
