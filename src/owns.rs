//! Manual shared-ownership registry for helper objects jointly held by
//! several actors.
//!
//! Two or more workers often need one long-lived helper — a shared chat
//! transcript, a talker, a cache — to stay alive exactly as long as at least
//! one of them still references it. `Owns` tracks that explicitly: values
//! enter through [`allocate`](Owns::allocate), every holder registers a claim
//! with [`reserve`](Owns::reserve) and gives it back with
//! [`release`](Owns::release), and the value is dropped the instant its
//! owner set empties. Claims still open at teardown are *reported*, not
//! fatal, which makes leaks visible without turning them into crashes.
//!
//! Tokens are typed handles; there are no raw pointers anywhere in this API.
//! The registry is fully lock-guarded and safe to share across worker
//! threads behind an `Arc`.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::errors::OwnsError;

/// Typed handle to a value managed by [`Owns`].
///
/// Cheap to copy; carries no ownership by itself. A token is only meaningful
/// together with a claim registered through [`Owns::reserve`].
pub struct Token<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Token<T> {
    /// Numeric identity of the underlying allocation.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl<T> Clone for Token<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Token<T> {}

impl<T> fmt::Debug for Token<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token#{}", self.id)
    }
}

struct Entry {
    value: Box<dyn Any + Send>,
    owners: HashSet<String>,
    trail: Vec<String>,
}

/// Instance-scoped shared-ownership tracker.
#[derive(Default)]
pub struct Owns {
    entries: Mutex<HashMap<u64, Entry>>,
    next_id: AtomicU64,
}

impl Owns {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` with the registry and return its managed token.
    ///
    /// The value starts with an empty owner set; holders must claim it with
    /// [`reserve`](Self::reserve) before relying on its lifetime.
    pub fn allocate<T: Send + 'static>(&self, value: T) -> Token<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().insert(
            id,
            Entry {
                value: Box::new(value),
                owners: HashSet::new(),
                trail: Vec::new(),
            },
        );
        Token {
            id,
            _marker: PhantomData,
        }
    }

    /// Add `owner` to the token's owner set, recording `label` in the debug
    /// trail for the teardown leak report.
    ///
    /// Fails for tokens that did not come out of [`allocate`](Self::allocate).
    pub fn reserve<T>(
        &self,
        owner: &str,
        token: Token<T>,
        label: &str,
    ) -> Result<Token<T>, OwnsError> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(&token.id)
            .ok_or(OwnsError::ReserveUnallocated { id: token.id })?;
        let label = if label.is_empty() { "<untracked>" } else { label };
        entry.owners.insert(owner.to_string());
        entry.trail.push(format!("reserved by '{owner}' at {label}"));
        Ok(token)
    }

    /// Remove `owner` from the token's owner set. When the set empties the
    /// tracked value is dropped, exactly once, and the token is forgotten.
    ///
    /// Fails for tokens that did not come out of [`allocate`](Self::allocate)
    /// or that have already been fully released.
    pub fn release<T>(&self, owner: &str, token: Token<T>) -> Result<(), OwnsError> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(&token.id)
            .ok_or(OwnsError::ReleaseUnallocated { id: token.id })?;
        entry.owners.remove(owner);
        if entry.owners.is_empty() {
            entries.remove(&token.id);
        }
        Ok(())
    }

    /// Run `f` against the tracked value.
    ///
    /// The registry lock is held for the duration of the closure, so other
    /// actors observe each access as atomic. Keep the closure short.
    pub fn with<T: 'static, R>(
        &self,
        token: Token<T>,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, OwnsError> {
        let entries = self.entries.lock();
        let entry = entries
            .get(&token.id)
            .ok_or(OwnsError::AccessUnallocated { id: token.id })?;
        let value = entry
            .value
            .downcast_ref::<T>()
            .ok_or(OwnsError::TypeMismatch { id: token.id })?;
        Ok(f(value))
    }

    /// Run `f` against the tracked value, mutably. Same locking contract as
    /// [`with`](Self::with).
    pub fn with_mut<T: 'static, R>(
        &self,
        token: Token<T>,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, OwnsError> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(&token.id)
            .ok_or(OwnsError::AccessUnallocated { id: token.id })?;
        let value = entry
            .value
            .downcast_mut::<T>()
            .ok_or(OwnsError::TypeMismatch { id: token.id })?;
        Ok(f(value))
    }

    /// Number of owners currently holding a claim on the token. Zero for
    /// unmanaged or fully-released tokens.
    pub fn owner_count<T>(&self, token: Token<T>) -> usize {
        self.entries
            .lock()
            .get(&token.id)
            .map(|entry| entry.owners.len())
            .unwrap_or(0)
    }

    /// Number of values still tracked by the registry.
    pub fn tracked(&self) -> usize {
        self.entries.lock().len()
    }
}

impl Drop for Owns {
    fn drop(&mut self) {
        let mut entries = self.entries.lock();
        for (id, entry) in entries.drain() {
            if !entry.owners.is_empty() {
                log::warn!(
                    "handle #{} still held by {} owner(s) at teardown:\n{}",
                    id,
                    entry.owners.len(),
                    entry.trail.join("\n")
                );
            }
            // The tracked value drops here either way.
        }
    }
}

impl fmt::Debug for Owns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owns")
            .field("tracked", &self.tracked())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Counts drops so tests can verify the deleter runs exactly once.
    struct DropProbe {
        drops: Arc<AtomicUsize>,
    }

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn probe() -> (Arc<AtomicUsize>, DropProbe) {
        let drops = Arc::new(AtomicUsize::new(0));
        let value = DropProbe {
            drops: Arc::clone(&drops),
        };
        (drops, value)
    }

    #[test]
    fn test_allocate_and_access() {
        let owns = Owns::new();
        let token = owns.allocate(42);
        assert_eq!(owns.with(token, |v| *v).unwrap(), 42);
        assert_eq!(owns.tracked(), 1);
    }

    #[test]
    fn test_with_mut() {
        let owns = Owns::new();
        let token = owns.allocate(vec![1, 2]);
        owns.with_mut(token, |v| v.push(3)).unwrap();
        assert_eq!(owns.with(token, |v| v.len()).unwrap(), 3);
    }

    #[test]
    fn test_reserve_tracks_owners() {
        let owns = Owns::new();
        let token = owns.allocate(42);
        owns.reserve("alice", token, "test").unwrap();
        assert_eq!(owns.owner_count(token), 1);
        owns.reserve("bob", token, "test").unwrap();
        assert_eq!(owns.owner_count(token), 2);
    }

    #[test]
    fn test_release_drops_on_last_owner() {
        let owns = Owns::new();
        let (drops, value) = probe();
        let token = owns.allocate(value);
        owns.reserve("alice", token, "a").unwrap();
        owns.reserve("bob", token, "b").unwrap();

        owns.release("alice", token).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(owns.owner_count(token), 1);

        owns.release("bob", token).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert_eq!(owns.tracked(), 0);
    }

    #[test]
    fn test_release_is_exactly_once() {
        let owns = Owns::new();
        let (drops, value) = probe();
        let token = owns.allocate(value);
        owns.reserve("alice", token, "a").unwrap();
        owns.release("alice", token).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        // The token is forgotten; a second release is protocol misuse.
        assert!(owns.release("alice", token).is_err());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reserve_unallocated_errors() {
        let owns = Owns::new();
        let token = owns.allocate(1);
        owns.reserve("alice", token, "a").unwrap();
        owns.release("alice", token).unwrap();
        let err = owns.reserve("alice", token, "a").unwrap_err();
        assert!(err.to_string().contains("unallocated"));
    }

    #[test]
    fn test_release_unallocated_errors() {
        let owns = Owns::new();
        let stranger: Token<i32> = Token {
            id: 9999,
            _marker: PhantomData,
        };
        let err = owns.release("alice", stranger).unwrap_err();
        assert!(err.to_string().contains("unallocated"));
    }

    #[test]
    fn test_teardown_drops_survivors() {
        crate::logging::init();
        let (drops, value) = probe();
        {
            let owns = Owns::new();
            let token = owns.allocate(value);
            owns.reserve("alice", token, "leaked on purpose").unwrap();
            // Dropped with a claim still open: reported as a leak, value
            // still cleaned up.
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_teardown_drops_unclaimed() {
        let (drops, value) = probe();
        {
            let owns = Owns::new();
            let _token = owns.allocate(value);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shared_across_threads() {
        let owns = Arc::new(Owns::new());
        let token = owns.allocate(0u64);
        owns.reserve("main", token, "counter").unwrap();

        let mut handles = Vec::new();
        for i in 0..4 {
            let owns = Arc::clone(&owns);
            let name = format!("worker{i}");
            owns.reserve(&name, token, "counter").unwrap();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    owns.with_mut(token, |v| *v += 1).unwrap();
                }
                owns.release(&name, token).unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(owns.with(token, |v| *v).unwrap(), 400);
        assert_eq!(owns.owner_count(token), 1);
        owns.release("main", token).unwrap();
        assert_eq!(owns.tracked(), 0);
    }
}
