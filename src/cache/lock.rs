use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::warn;

/// Acquire a read guard, recovering the inner state if a writer panicked.
pub(crate) fn rw_read<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockReadGuard<'a, T> {
    lock.read()
        .unwrap_or_else(|poisoned| recover(poisoned, op, "rwlock.read"))
}

/// Acquire a write guard, recovering the inner state if a writer panicked.
pub(crate) fn rw_write<'a, T>(lock: &'a RwLock<T>, op: &'static str) -> RwLockWriteGuard<'a, T> {
    lock.write()
        .unwrap_or_else(|poisoned| recover(poisoned, op, "rwlock.write"))
}

fn recover<G>(poisoned: PoisonError<G>, op: &'static str, lock_kind: &'static str) -> G {
    warn!(
        op,
        lock_kind,
        result = "poisoned_recovered",
        hint = "entries written before the panic are still served",
        "Recovered from poisoned page cache lock"
    );
    poisoned.into_inner()
}
