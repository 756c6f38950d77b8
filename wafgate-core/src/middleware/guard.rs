use crate::engine::Transaction;
use std::ops::{Deref, DerefMut};
use tracing::warn;

/// RAII guard for a transaction.
///
/// Invariants:
/// - Logging and close run exactly once, on Drop, whatever path the request
///   took (early return, error, unwinding)
/// - A failing close is logged and never propagated
pub struct TransactionGuard<T: Transaction> {
    tx: T,
}

impl<T: Transaction> TransactionGuard<T> {
    pub fn new(tx: T) -> Self {
        Self { tx }
    }
}

impl<T: Transaction> Deref for TransactionGuard<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.tx
    }
}

impl<T: Transaction> DerefMut for TransactionGuard<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.tx
    }
}

impl<T: Transaction> Drop for TransactionGuard<T> {
    fn drop(&mut self) {
        self.tx.process_logging();
        if let Err(err) = self.tx.close() {
            warn!(
                transaction_id = self.tx.id(),
                error = %err,
                "Failed to close transaction"
            );
        }
    }
}
