//! Ledger store: committed wallet balances and the append-only record log.
//!
//! All access goes through a [`UnitOfWork`]. Write units hold the store's
//! write lock from their first read until commit, so concurrent writers are
//! serialized and always observe the latest committed balances. Changes made
//! through a unit are staged and only become visible when the whole unit
//! commits; a unit that fails or runs past its deadline leaves no trace.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::{Instant, timeout};
use tracing::debug;

use crate::model::{NewRecord, SeqNo, TxRecord, UserId, Wallet};

/// Infrastructure failures raised by the store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unit of work exceeded its {0:?} deadline")]
    Timeout(Duration),

    #[error("wallet for user {0} already exists")]
    DuplicateWallet(UserId),

    #[error("no stored wallet for user {0}")]
    MissingWallet(UserId),

    #[error("write rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Default)]
struct LedgerState {
    wallets: HashMap<UserId, Wallet>,
    records: Vec<TxRecord>,
    /// Positions in `records` per owner, in append order.
    by_user: HashMap<UserId, Vec<usize>>,
}

impl LedgerState {
    fn apply(&mut self, changes: Changes) {
        self.wallets.extend(changes.wallets);
        for record in changes.records {
            self.by_user
                .entry(record.user)
                .or_default()
                .push(self.records.len());
            self.records.push(record);
        }
    }
}

/// Writes staged by a unit of work, detached from the committed state.
#[derive(Debug, Default)]
struct Changes {
    wallets: HashMap<UserId, Wallet>,
    records: Vec<TxRecord>,
}

/// In-process ledger store.
#[derive(Debug, Default)]
pub struct LedgerStore {
    state: RwLock<LedgerState>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` as one atomic unit of work.
    ///
    /// The unit commits only if `f` returns `Ok` and the whole unit, lock
    /// wait included, finished within `deadline`. Otherwise every staged
    /// change is discarded.
    pub async fn run_atomic<T, E, F>(&self, deadline: Duration, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut UnitOfWork<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let started = Instant::now();
        let mut state = timeout(deadline, self.state.write())
            .await
            .map_err(|_| StoreError::Timeout(deadline))?;

        let mut uow = UnitOfWork::new(&state);
        let value = f(&mut uow)?;
        let changes = uow.into_changes();

        if started.elapsed() > deadline {
            debug!(
                wallets = changes.wallets.len(),
                records = changes.records.len(),
                "unit of work past deadline, discarding"
            );
            return Err(StoreError::Timeout(deadline).into());
        }

        state.apply(changes);
        Ok(value)
    }

    /// Run `f` against the latest committed state without writing.
    pub async fn read<T, E, F>(&self, deadline: Duration, f: F) -> Result<T, E>
    where
        F: FnOnce(&UnitOfWork<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let state = timeout(deadline, self.state.read())
            .await
            .map_err(|_| StoreError::Timeout(deadline))?;

        f(&UnitOfWork::new(&state))
    }
}

/// Transactional handle passed to every store call that must share atomicity
/// with its siblings. Valid only for the duration of one
/// [`LedgerStore::run_atomic`] or [`LedgerStore::read`] call.
#[derive(Debug)]
pub struct UnitOfWork<'a> {
    committed: &'a LedgerState,
    staged: Changes,
}

impl<'a> UnitOfWork<'a> {
    fn new(committed: &'a LedgerState) -> Self {
        Self {
            committed,
            staged: Changes::default(),
        }
    }

    fn into_changes(self) -> Changes {
        self.staged
    }

    /// Look up a wallet, seeing this unit's own staged writes.
    pub fn wallet(&self, user: UserId) -> Option<Wallet> {
        self.staged
            .wallets
            .get(&user)
            .or_else(|| self.committed.wallets.get(&user))
            .copied()
    }

    /// Every wallet, ordered by user.
    pub fn wallets(&self) -> Vec<Wallet> {
        let mut wallets: HashMap<UserId, Wallet> = self.committed.wallets.clone();
        wallets.extend(self.staged.wallets.iter().map(|(k, v)| (*k, *v)));

        let mut wallets: Vec<Wallet> = wallets.into_values().collect();
        wallets.sort_by_key(|w| w.user);
        wallets
    }

    /// Stage a new wallet. Fails if the user already has one.
    pub fn insert_wallet(&mut self, wallet: Wallet) -> Result<(), StoreError> {
        if self.wallet(wallet.user).is_some() {
            return Err(StoreError::DuplicateWallet(wallet.user));
        }
        self.staged.wallets.insert(wallet.user, wallet);
        Ok(())
    }

    /// Stage an update of an existing wallet.
    pub fn update_wallet(&mut self, wallet: Wallet) -> Result<(), StoreError> {
        if self.wallet(wallet.user).is_none() {
            return Err(StoreError::MissingWallet(wallet.user));
        }
        self.staged.wallets.insert(wallet.user, wallet);
        Ok(())
    }

    /// Stage a record, assigning its sequence number and timestamp.
    ///
    /// Timestamps never go backwards within the log, so creation order and
    /// sequence order agree.
    pub fn append_record(&mut self, record: NewRecord) -> TxRecord {
        let seq = (self.committed.records.len() + self.staged.records.len()) as SeqNo + 1;
        let created_at = match self.last_created_at() {
            Some(last) => Utc::now().max(last),
            None => Utc::now(),
        };

        let record = TxRecord::from_new(record, seq, created_at);
        self.staged.records.push(record.clone());
        record
    }

    /// All records owned by `user`, oldest first, staged ones included.
    pub fn records_for(&self, user: UserId) -> Vec<TxRecord> {
        let committed = self
            .committed
            .by_user
            .get(&user)
            .into_iter()
            .flatten()
            .map(|&idx| self.committed.records[idx].clone());
        let staged = self
            .staged
            .records
            .iter()
            .filter(|r| r.user == user)
            .cloned();

        committed.chain(staged).collect()
    }

    fn last_created_at(&self) -> Option<DateTime<Utc>> {
        self.staged
            .records
            .last()
            .or_else(|| self.committed.records.last())
            .map(|r| r.created_at)
    }
}
