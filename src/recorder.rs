//! Transaction recorder: appends to and reads from the record log.

use std::future::Future;
use std::time::Duration;

use crate::model::{NewRecord, TxRecord, UserId};
use crate::store::{LedgerStore, StoreError, UnitOfWork};

/// Appends transaction records and reads a user's history.
pub trait TransactionRecorder: Send + Sync {
    /// Append `record` as part of the in-flight unit of work.
    fn append(&self, uow: &mut UnitOfWork<'_>, record: NewRecord) -> Result<TxRecord, StoreError>;

    /// Records owned by `user`, newest first (ties broken by sequence, descending).
    fn history(&self, uow: &UnitOfWork<'_>, user: UserId) -> Result<Vec<TxRecord>, StoreError>;

    /// Append `record` in a unit of work of its own.
    ///
    /// No balance changes alongside the record, so callers must not use this
    /// for a record that is meant to mirror one.
    fn append_standalone(
        &self,
        store: &LedgerStore,
        deadline: Duration,
        record: NewRecord,
    ) -> impl Future<Output = Result<TxRecord, StoreError>> + Send
    where
        Self: Sized,
    {
        async move { store.run_atomic(deadline, |uow| self.append(uow, record)).await }
    }
}

/// [`TransactionRecorder`] backed directly by the ledger store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreRecorder;

impl TransactionRecorder for StoreRecorder {
    /// Records may only be owned by users that have a wallet.
    fn append(&self, uow: &mut UnitOfWork<'_>, record: NewRecord) -> Result<TxRecord, StoreError> {
        if uow.wallet(record.user).is_none() {
            return Err(StoreError::MissingWallet(record.user));
        }
        Ok(uow.append_record(record))
    }

    fn history(&self, uow: &UnitOfWork<'_>, user: UserId) -> Result<Vec<TxRecord>, StoreError> {
        let mut records = uow.records_for(user);
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.seq.cmp(&a.seq)));
        Ok(records)
    }
}
