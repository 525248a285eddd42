use crate::contracts::error::LockError;

/// Named mutual-exclusion provider.
///
/// Contention is not an error: `acquire` returns `Ok(false)` and callers are
/// expected to `wait` on the same name before retrying. Errors are reserved
/// for a failing backend.
pub trait LockBackend: Send + Sync {
    /// Tries to take the lock. Returns `Ok(true)` when the caller now holds it.
    fn acquire(&self, name: &str) -> Result<bool, LockError>;

    /// Blocks until the lock looks free or the backend's wait slice elapses.
    fn wait(&self, name: &str) -> Result<(), LockError>;

    /// Releases a lock held by the caller.
    fn release(&self, name: &str) -> Result<(), LockError>;
}
