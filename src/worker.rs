//! Worker behavior contract, outbound messaging capability, and the
//! scan-and-skip scheduling loop.
//!
//! Every worker runs on its own OS thread and shares one [`PackQueue`] with
//! all of its peers. Each loop iteration the worker holds the queue, peeks at
//! the front pack and either leaves it (not addressed to this worker, or the
//! shutdown sentinel) or consumes it and dispatches to the behavior's
//! [`handle`](Worker::handle) hook. Because the peek and the consume happen
//! under a single hold, no two workers can ever both claim the same pack.
//!
//! The scan is deliberately front-of-queue only: a pack addressed to a busy
//! or absent recipient delays everything behind it until that recipient
//! consumes it or the agency purges its mail. A single shared mailbox with
//! per-tick scanning trades O(queue length) polling for implementation
//! simplicity; keep mailboxes short-lived.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::{AgencyError, WorkerError};
use crate::pack::{Pack, Payload};
use crate::queue::PackQueue;

/// Whether a worker keeps running after a behavior hook returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep scanning the mailbox.
    Continue,
    /// Leave the scheduling loop; the worker thread finishes.
    Stop,
}

// ---------------------------------------------------------------------------
// Worker behavior
// ---------------------------------------------------------------------------

/// Behavior contract for a scheduled worker.
///
/// The scheduling loop drives [`tick`](Self::tick) and
/// [`handle`](Self::handle). Failures from either are wrapped with the
/// worker's name and reported through [`ouch`](Self::ouch), after which the
/// loop continues: a worker only stops via [`Flow::Stop`], its dying flag, or
/// the exit sentinel.
pub trait Worker<T: Payload>: Send {
    /// Short type tag used in rosters and describe strings.
    fn kind(&self) -> &str {
        "worker"
    }

    /// Cooperative per-iteration hook, called before the mailbox scan.
    fn tick(&mut self, _courier: &mut Courier<T>) -> Result<Flow, WorkerError> {
        Ok(Flow::Continue)
    }

    /// Process one pack addressed to this worker.
    fn handle(
        &mut self,
        courier: &mut Courier<T>,
        sender: &str,
        item: T,
    ) -> Result<Flow, WorkerError>;

    /// Failure sink for `tick`/`handle` errors.
    fn ouch(&mut self, err: &WorkerError) {
        log::error!("{err}");
    }
}

// ---------------------------------------------------------------------------
// Worker profile
// ---------------------------------------------------------------------------

/// Serializable snapshot of a worker's identity and peers, consumed by
/// higher layers for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    /// Unique name within the owning agency.
    pub name: String,
    /// Behavior type tag.
    pub kind: String,
    /// Addressable peers this worker messages by default.
    pub recipients: Vec<String>,
}

impl WorkerProfile {
    /// Human-readable one-liner for rosters and dumps.
    pub fn describe(&self) -> String {
        let peers = if self.recipients.is_empty() {
            "<nobody>".to_string()
        } else {
            format!("'{}'", self.recipients.join("', '"))
        };
        format!(
            "Worker '{}' is a(n) '{}' worker, talking to {}.",
            self.name, self.kind, peers
        )
    }
}

// ---------------------------------------------------------------------------
// Courier
// ---------------------------------------------------------------------------

/// Outbound messaging capability handed to a worker's behavior hooks.
///
/// Holds the worker's identity, its recipient list and a handle to the shared
/// mailbox. Available to the behavior only; outside callers talk to a worker
/// by producing packs, never through its courier.
pub struct Courier<T: Payload> {
    name: String,
    kind: String,
    recipients: Arc<Mutex<Vec<String>>>,
    queue: Arc<PackQueue<T>>,
}

impl<T: Payload> Courier<T> {
    fn new(
        name: String,
        kind: String,
        recipients: Arc<Mutex<Vec<String>>>,
        queue: Arc<PackQueue<T>>,
    ) -> Self {
        Self {
            name,
            kind,
            recipients,
            queue,
        }
    }

    /// This worker's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the current recipient list.
    pub fn recipients(&self) -> Vec<String> {
        self.recipients.lock().clone()
    }

    /// Address `item` to every registered recipient.
    pub fn send(&self, item: T) -> Result<(), AgencyError> {
        for recipient in self.recipients() {
            self.send_to(&recipient, item.clone())?;
        }
        Ok(())
    }

    /// Address `item` to one recipient by name.
    pub fn send_to(&self, recipient: &str, item: T) -> Result<(), AgencyError> {
        if recipient == self.name {
            return Err(AgencyError::SelfSend {
                name: self.name.clone(),
            });
        }
        self.queue.produce(Pack::new(item, self.name.clone(), recipient));
        Ok(())
    }

    /// Enqueue the shutdown poison pill for every worker on this mailbox.
    pub fn exit(&self) {
        self.queue.produce(Pack::exit_signal());
    }

    /// Merge `more` into the recipient list, skipping duplicates.
    pub fn add_recipients(&self, more: &[String]) {
        let mut recipients = self.recipients.lock();
        for name in more {
            if !recipients.contains(name) {
                recipients.push(name.clone());
            }
        }
    }

    /// Replace the recipient list.
    pub fn set_recipients(&self, recipients: Vec<String>) {
        *self.recipients.lock() = recipients;
    }

    /// Remove every name in `gone` from the recipient list.
    pub fn remove_recipients(&self, gone: &[String]) {
        self.recipients.lock().retain(|name| !gone.contains(name));
    }

    /// Recipients whose name contains `keyword`; all of them for an empty
    /// keyword.
    pub fn find_recipients(&self, keyword: &str) -> Vec<String> {
        self.recipients
            .lock()
            .iter()
            .filter(|name| keyword.is_empty() || name.contains(keyword))
            .cloned()
            .collect()
    }

    /// Snapshot this worker's identity and peers.
    pub fn profile(&self) -> WorkerProfile {
        WorkerProfile {
            name: self.name.clone(),
            kind: self.kind.clone(),
            recipients: self.recipients(),
        }
    }

    /// Re-apply the recipient list from a stored profile.
    pub fn restore(&self, profile: &WorkerProfile) {
        self.set_recipients(profile.recipients.clone());
    }

    /// Human-readable one-liner about this worker.
    pub fn describe(&self) -> String {
        self.profile().describe()
    }
}

// ---------------------------------------------------------------------------
// Worker handle
// ---------------------------------------------------------------------------

/// Registry-side handle to a spawned worker thread.
///
/// The behavior itself lives on the worker's thread; the handle carries the
/// lifecycle flags and the join handle the agency needs to close, reap and
/// describe the worker.
pub struct WorkerHandle {
    name: String,
    kind: String,
    recipients: Arc<Mutex<Vec<String>>>,
    dying: Arc<AtomicBool>,
    exited: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// The worker's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The behavior type tag captured at spawn.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Ask the worker to leave its loop at the next iteration.
    pub fn close(&self) {
        self.dying.store(true, Ordering::SeqCst);
    }

    /// Whether the worker's scheduling loop has finished.
    pub fn is_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }

    /// Live snapshot of the worker's identity and peers.
    pub fn profile(&self) -> WorkerProfile {
        WorkerProfile {
            name: self.name.clone(),
            kind: self.kind.clone(),
            recipients: self.recipients.lock().clone(),
        }
    }

    /// Human-readable one-liner about this worker.
    pub fn describe(&self) -> String {
        self.profile().describe()
    }

    /// Join the worker thread. Idempotent; a panicked behavior thread is
    /// absorbed here (the panic was already reported on that thread).
    pub fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.close();
        self.join();
    }
}

// ---------------------------------------------------------------------------
// Spawning and the scan loop
// ---------------------------------------------------------------------------

/// Start `worker` on its own named OS thread, scanning `queue` every `pace`.
///
/// Prefer [`Agency::spawn`](crate::agency::Agency::spawn), which also
/// enforces name uniqueness; this free function is the building block and is
/// handy for single-worker setups and tests.
pub fn spawn_worker<T, W>(
    name: &str,
    recipients: Vec<String>,
    queue: Arc<PackQueue<T>>,
    pace: Duration,
    worker: W,
) -> Result<WorkerHandle, AgencyError>
where
    T: Payload,
    W: Worker<T> + 'static,
{
    let dying = Arc::new(AtomicBool::new(false));
    let exited = Arc::new(AtomicBool::new(false));
    let shared_recipients = Arc::new(Mutex::new(recipients));
    let kind = worker.kind().to_string();
    let courier = Courier::new(
        name.to_string(),
        kind.clone(),
        Arc::clone(&shared_recipients),
        queue,
    );

    let loop_dying = Arc::clone(&dying);
    let loop_exited = Arc::clone(&exited);
    let thread = thread::Builder::new()
        .name(format!("worker-{name}"))
        .spawn(move || {
            run_scan_loop(worker, courier, pace, &loop_dying);
            loop_exited.store(true, Ordering::SeqCst);
        })
        .map_err(|source| AgencyError::ThreadSpawn {
            name: name.to_string(),
            source,
        })?;

    Ok(WorkerHandle {
        name: name.to_string(),
        kind,
        recipients: shared_recipients,
        dying,
        exited,
        thread: Some(thread),
    })
}

enum Scan<T> {
    Idle,
    Skip,
    ExitObserved,
    Claimed(Pack<T>),
}

fn run_scan_loop<T: Payload, W: Worker<T>>(
    mut worker: W,
    mut courier: Courier<T>,
    pace: Duration,
    dying: &AtomicBool,
) {
    while !dying.load(Ordering::SeqCst) {
        if !pace.is_zero() {
            thread::sleep(pace);
        }

        match worker.tick(&mut courier) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Stop) => break,
            Err(err) => {
                let err = named(&courier, err);
                worker.ouch(&err);
                continue;
            }
        }

        // Peek-then-act under one hold, so no other worker can take the
        // front pack between the inspection and the consume.
        let scan = {
            let mut held = courier.queue.hold();
            match held.peek() {
                None => Scan::Idle,
                // The sentinel stays queued: every other worker polling this
                // mailbox must get its own chance to observe it.
                Some(pack) if pack.is_exit_signal() => Scan::ExitObserved,
                Some(pack) if pack.recipient != courier.name => Scan::Skip,
                Some(_) => match held.consume() {
                    Some(pack) => Scan::Claimed(pack),
                    None => Scan::Idle,
                },
            }
        };

        match scan {
            Scan::Idle | Scan::Skip => continue,
            Scan::ExitObserved => break,
            Scan::Claimed(pack) => match worker.handle(&mut courier, &pack.sender, pack.item) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(err) => {
                    let err = named(&courier, err);
                    worker.ouch(&err);
                }
            },
        }
    }
}

fn named<T: Payload>(courier: &Courier<T>, err: WorkerError) -> WorkerError {
    WorkerError::new(format!("worker '{}' error: {}", courier.name, err.message))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
