//! Registry and router owning the shared mailbox and its workers.
//!
//! The agency is itself a worker: it answers to its own name on the shared
//! queue and understands two plain-text control verbs, `"exit"` (close every
//! worker and the agency, then drain the mailbox) and `"list"` (log the
//! roster). It is also the only component allowed to mutate the worker
//! registry: `spawn` enforces name uniqueness, `kill` purges the victim's
//! pending mail so cancellation never races with delivery.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::errors::AgencyError;
use crate::owns::Owns;
use crate::pack::{Pack, Payload};
use crate::queue::PackQueue;
use crate::worker::{spawn_worker, Flow, Worker, WorkerHandle, WorkerProfile};

/// Name every agency answers to on the shared mailbox.
pub const AGENCY_NAME: &str = "agency";

/// Default pacing for the agency's own scheduling loop.
const AGENCY_PACE: Duration = Duration::from_millis(100);

/// Default pacing for spawned worker loops.
const WORKER_PACE: Duration = Duration::from_millis(10);

enum Scan<T> {
    Idle,
    Foreign,
    Sentinel,
    Claimed(Pack<T>),
}

/// Registrar and router for a set of named workers sharing one mailbox.
pub struct Agency<T: Payload> {
    name: String,
    queue: Arc<PackQueue<T>>,
    owns: Arc<Owns>,
    registry: HashMap<String, WorkerHandle>,
    pace: Duration,
    worker_pace: Duration,
    closing: bool,
}

impl<T: Payload> Default for Agency<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Payload> Agency<T> {
    /// Create an agency with default pacing.
    pub fn new() -> Self {
        Self::with_pacing(AGENCY_PACE, WORKER_PACE)
    }

    /// Create an agency with explicit pacing for its own loop and for the
    /// loops of the workers it spawns.
    pub fn with_pacing(pace: Duration, worker_pace: Duration) -> Self {
        Self {
            name: AGENCY_NAME.to_string(),
            queue: Arc::new(PackQueue::new()),
            owns: Arc::new(Owns::new()),
            registry: HashMap::new(),
            pace,
            worker_pace,
            closing: false,
        }
    }

    /// The agency's own addressable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to the shared mailbox, for producing packs from the outside.
    pub fn queue(&self) -> Arc<PackQueue<T>> {
        Arc::clone(&self.queue)
    }

    /// The agency-scoped shared-ownership registry, for helper objects
    /// jointly held by this agency's workers.
    pub fn owns(&self) -> Arc<Owns> {
        Arc::clone(&self.owns)
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Register `worker` under `name` and start it immediately on its own
    /// thread, sharing this agency's mailbox.
    ///
    /// Fails with [`AgencyError::DuplicateWorker`] when a live worker (or the
    /// agency itself) already answers to that name; the rejected worker is
    /// discarded and the registry is left unchanged.
    pub fn spawn<W>(&mut self, name: &str, recipients: Vec<String>, worker: W) -> Result<(), AgencyError>
    where
        W: Worker<T> + 'static,
    {
        if name == self.name || self.registry.contains_key(name) {
            return Err(AgencyError::DuplicateWorker {
                name: name.to_string(),
            });
        }
        let handle = spawn_worker(
            name,
            recipients,
            Arc::clone(&self.queue),
            self.worker_pace,
            worker,
        )?;
        log::info!("worker '{}' spawned as '{}'", name, handle.kind());
        self.registry.insert(name.to_string(), handle);
        Ok(())
    }

    /// Close the named worker, purge its pending mail and deregister it.
    ///
    /// Returns whether a worker with that name was found. The victim's thread
    /// is joined; it leaves its loop within one pacing interval.
    pub fn kill(&mut self, name: &str) -> bool {
        match self.registry.remove(name) {
            Some(mut handle) => {
                handle.close();
                self.queue.drop_for(name);
                handle.join();
                log::info!("worker '{name}' killed");
                true
            }
            None => false,
        }
    }

    /// Whether a live worker with this name is registered.
    pub fn has_worker(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    /// Number of registered workers.
    pub fn worker_count(&self) -> usize {
        self.registry.len()
    }

    /// Sorted names of all registered workers.
    pub fn roster(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.keys().cloned().collect();
        names.sort();
        names
    }

    /// Registered workers whose name contains `keyword`; all of them for an
    /// empty keyword.
    pub fn find_workers(&self, keyword: &str) -> Vec<String> {
        self.roster()
            .into_iter()
            .filter(|name| keyword.is_empty() || name.contains(keyword))
            .collect()
    }

    /// One describe line per requested name, in request order.
    pub fn describe_workers(&self, names: &[String]) -> String {
        names
            .iter()
            .map(|name| match self.registry.get(name) {
                Some(handle) => handle.describe(),
                None => format!("worker '{name}' is not registered"),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Profile snapshots of every registered worker, sorted by name.
    /// Higher layers persist these.
    pub fn profiles(&self) -> Vec<WorkerProfile> {
        self.roster()
            .iter()
            .filter_map(|name| self.registry.get(name))
            .map(WorkerHandle::profile)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// The agency's own message handler, for packs addressed to
    /// [`AGENCY_NAME`]. Control verbs never fail: unknown items are logged
    /// and ignored.
    pub fn handle(&mut self, sender: &str, item: &T)
    where
        T: AsRef<str>,
    {
        match item.as_ref() {
            "exit" => {
                log::info!("exit indicated by '{sender}'");
                self.shutdown();
            }
            "list" => {
                log::info!("workers in the agency:");
                for name in self.roster() {
                    log::info!(" - {name}");
                }
            }
            other => {
                log::debug!("agency ignoring '{other}' from '{sender}'");
            }
        }
    }

    /// One scheduling pass: reap exited workers, then drain packs currently
    /// queued for the agency's own name. Observing the shutdown sentinel
    /// yields [`Flow::Stop`] (the sentinel itself is left queued, like any
    /// worker would).
    pub fn tick(&mut self) -> Flow
    where
        T: AsRef<str>,
    {
        self.reap();
        loop {
            let scan = {
                let mut held = self.queue.hold();
                match held.peek() {
                    None => Scan::Idle,
                    Some(pack) if pack.is_exit_signal() => Scan::Sentinel,
                    // Front pack belongs to a worker; its own thread takes it.
                    Some(pack) if pack.recipient != self.name => Scan::Foreign,
                    Some(_) => match held.consume() {
                        Some(pack) => Scan::Claimed(pack),
                        None => Scan::Idle,
                    },
                }
            };
            match scan {
                Scan::Claimed(pack) => self.handle(&pack.sender, &pack.item),
                Scan::Sentinel => {
                    self.closing = true;
                    break;
                }
                Scan::Idle | Scan::Foreign => break,
            }
        }
        if self.closing {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    /// Drive [`tick`](Self::tick) with pacing until no workers remain or a
    /// shutdown was signalled, then close and join any stragglers and drain
    /// the mailbox (removing a leftover sentinel along with everything else).
    pub fn run(&mut self)
    where
        T: AsRef<str>,
    {
        while !self.registry.is_empty() && !self.closing {
            if self.tick() == Flow::Stop {
                break;
            }
            if !self.pace.is_zero() {
                thread::sleep(self.pace);
            }
        }
        self.shutdown();
    }

    /// Close every worker and the agency itself, then drain the mailbox.
    fn shutdown(&mut self) {
        self.closing = true;
        for handle in self.registry.values() {
            handle.close();
        }
        for (_, mut handle) in self.registry.drain() {
            handle.join();
        }
        self.queue.finish();
        let dropped = self.queue.drain();
        if !dropped.is_empty() {
            log::debug!("dropped {} undelivered pack(s) at shutdown", dropped.len());
        }
    }

    /// Deregister workers whose loops have finished, purging mail addressed
    /// to them that will now never be read.
    fn reap(&mut self) {
        let exited: Vec<String> = self
            .registry
            .iter()
            .filter(|(_, handle)| handle.is_exited())
            .map(|(name, _)| name.clone())
            .collect();
        for name in exited {
            if let Some(mut handle) = self.registry.remove(&name) {
                self.queue.drop_for(&name);
                handle.join();
                log::info!("worker '{name}' exited and was reaped");
            }
        }
    }
}

impl<T: Payload> Drop for Agency<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
