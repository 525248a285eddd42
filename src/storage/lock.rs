use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use crate::contracts::{LockBackend, LockError, LockResultExt};

/// Configuration for the in-process lock backend.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// How long a holder keeps the lock before others may reclaim it.
    pub lease: Duration,
    /// Upper bound for a single `wait` call.
    pub max_wait: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            lease: Duration::from_secs(30),
            max_wait: Duration::from_millis(1000),
        }
    }
}

impl LockConfig {
    /// Creates a LockConfig from environment variables.
    ///
    /// Environment variables:
    /// - `FOLIO_LOCK_LEASE_SECS`: lease length in seconds (default: 30)
    /// - `FOLIO_LOCK_WAIT_MS`: longest single wait in ms (default: 1000)
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            lease: std::env::var("FOLIO_LOCK_LEASE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(default.lease),
            max_wait: std::env::var("FOLIO_LOCK_WAIT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(default.max_wait),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Holder {
    owner: ThreadId,
    expires_at: Instant,
}

impl Holder {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local named locks with lease expiry.
///
/// A lock is owned by the thread that acquired it. Once the lease runs out
/// the lock counts as free, so a holder that died or hung cannot block the
/// others forever, and a stale holder's `release` will not free a lock that
/// someone else has since taken.
pub struct LocalLockBackend {
    held: Mutex<HashMap<String, Holder>>,
    released: Condvar,
    config: LockConfig,
}

impl Default for LocalLockBackend {
    fn default() -> Self {
        Self::new(LockConfig::default())
    }
}

impl LocalLockBackend {
    pub fn new(config: LockConfig) -> Self {
        Self {
            held: Mutex::new(HashMap::new()),
            released: Condvar::new(),
            config,
        }
    }

    /// Returns true if some caller holds a live lease on `name`.
    pub fn is_held(&self, name: &str) -> Result<bool, LockError> {
        let held = self.held.lock().map_lock_err()?;
        Ok(held.get(name).is_some_and(|h| h.is_live(Instant::now())))
    }
}

impl LockBackend for LocalLockBackend {
    fn acquire(&self, name: &str) -> Result<bool, LockError> {
        let mut held = self.held.lock().map_lock_err()?;
        let now = Instant::now();

        if let Some(holder) = held.get(name) {
            if holder.is_live(now) {
                return Ok(false);
            }
            tracing::warn!(lock = name, "Reclaiming expired lock lease");
        }

        held.insert(
            name.to_string(),
            Holder {
                owner: thread::current().id(),
                expires_at: now + self.config.lease,
            },
        );
        Ok(true)
    }

    fn wait(&self, name: &str) -> Result<(), LockError> {
        let deadline = Instant::now() + self.config.max_wait;
        let mut held = self.held.lock().map_lock_err()?;

        loop {
            let now = Instant::now();
            let until = match held.get(name) {
                Some(holder) if holder.is_live(now) => holder.expires_at.min(deadline),
                _ => return Ok(()),
            };
            if now >= until {
                return Ok(());
            }
            held = self.released.wait_timeout(held, until - now).map_lock_err()?.0;
        }
    }

    fn release(&self, name: &str) -> Result<(), LockError> {
        let mut held = self.held.lock().map_lock_err()?;
        let owner = held.get(name).map(|holder| holder.owner);
        match owner {
            Some(owner) if owner == thread::current().id() => {
                held.remove(name);
                drop(held);
                self.released.notify_all();
            }
            Some(_) => {
                tracing::warn!(lock = name, "Not releasing lock held by another caller");
            }
            None => {}
        }
        Ok(())
    }
}

/// Scoped hold on a named lock.
///
/// Acquisition spins on the backend's own wait primitive with no timeout of
/// its own. The lock is released on drop, so every early return and every
/// `?` inside the critical section still frees it.
pub struct LockGuard<'a, L: LockBackend + ?Sized> {
    backend: &'a L,
    name: &'a str,
    waits: u64,
    released: bool,
}

impl<'a, L: LockBackend + ?Sized> LockGuard<'a, L> {
    /// Blocks until `name` is held.
    pub fn acquire(backend: &'a L, name: &'a str) -> Result<Self, LockError> {
        let mut waits = 0;
        while !backend.acquire(name)? {
            waits += 1;
            backend.wait(name)?;
        }
        Ok(Self {
            backend,
            name,
            waits,
            released: false,
        })
    }

    /// Number of times acquisition had to wait.
    pub fn waits(&self) -> u64 {
        self.waits
    }

    /// Releases the lock, reporting backend failures to the caller.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        self.backend.release(self.name)
    }
}

impl<L: LockBackend + ?Sized> Drop for LockGuard<'_, L> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.backend.release(self.name) {
            tracing::warn!(lock = self.name, error = %e, "Failed to release lock");
        }
    }
}
