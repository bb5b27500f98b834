//! Atomically swappable snapshot pointers
//!
//! Mapping and patch snapshots are immutable once published; the control
//! plane swaps the pointer, readers clone the `Arc` once per use and keep
//! reading their copy for the rest of the operation. A swap during an
//! update batch therefore only affects subsequent batches.

use std::sync::Arc;

use parking_lot::RwLock;

/// A published, swappable snapshot.
#[derive(Debug)]
pub struct SnapshotCell<T> {
    inner: RwLock<Arc<T>>,
}

impl<T> SnapshotCell<T> {
    /// Publish an initial snapshot.
    pub fn new(value: T) -> Self {
        Self {
            inner: RwLock::new(Arc::new(value)),
        }
    }

    /// Grab the current snapshot. The returned handle stays valid across
    /// later swaps.
    pub fn load(&self) -> Arc<T> {
        self.inner.read().clone()
    }

    /// Publish a new snapshot, visible to every subsequent [`load`].
    ///
    /// [`load`]: SnapshotCell::load
    pub fn store(&self, value: T) {
        *self.inner.write() = Arc::new(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_survives_swap() {
        let cell = SnapshotCell::new(1);
        let before = cell.load();

        cell.store(2);

        assert_eq!(*before, 1);
        assert_eq!(*cell.load(), 2);
    }
}
