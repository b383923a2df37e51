//! Wallet ledger engine.
//!
//! The engine validates requests and performs every balance change together
//! with its transaction record inside one atomic unit of work. It keeps no
//! mutable state of its own; all shared state lives in the [`LedgerStore`].
//! Also supports an async stream of commands.

use std::sync::Arc;
use std::time::Duration;

use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error};

use crate::Amount;
use crate::config::LedgerConfig;
use crate::model::{Command, NewRecord, SeqNo, TxKind, TxRecord, UserId, Wallet};
use crate::recorder::{StoreRecorder, TransactionRecorder};
use crate::store::{LedgerStore, UnitOfWork};
use crate::wallets::{StoreWallets, WalletAccessor};

mod error;
pub use error::{ErrorKind, LedgerError, Party};

mod log;
use log::{OpLog, Operation};

/// Result of replaying a wallet's records against its stored balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub user: UserId,
    pub balance: Amount,
    /// Sum of the signed record amounts, starting from zero.
    pub replayed: Amount,
    pub records: usize,
    /// First record whose `balance_after` disagrees with the running sum.
    pub first_mismatch: Option<SeqNo>,
}

impl Reconciliation {
    pub fn is_consistent(&self) -> bool {
        self.balance == self.replayed && self.first_mismatch.is_none()
    }
}

/// The wallet ledger engine.
///
/// Generic over its wallet accessor and transaction recorder so alternative
/// collaborators can be injected; [`Engine::new`] wires the store-backed ones.
pub struct Engine<W = StoreWallets, R = StoreRecorder> {
    store: Arc<LedgerStore>,
    wallets: W,
    recorder: R,
    config: LedgerConfig,
}

impl Engine {
    pub fn new(store: Arc<LedgerStore>, config: LedgerConfig) -> Self {
        Self::with_parts(store, StoreWallets, StoreRecorder, config)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Arc::new(LedgerStore::new()), LedgerConfig::default())
    }
}

/// Public API
impl<W: WalletAccessor, R: TransactionRecorder> Engine<W, R> {
    pub fn with_parts(
        store: Arc<LedgerStore>,
        wallets: W,
        recorder: R,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            wallets,
            recorder,
            config,
        }
    }

    /// Open the zero-balance wallet of a newly registered user.
    pub async fn open_wallet(&self, user: UserId) -> Result<Wallet, LedgerError> {
        let result = self
            .store
            .run_atomic(self.deadline(), |uow| {
                let wallet = Wallet::new(user);
                self.wallets.create(uow, wallet)?;
                Ok(wallet)
            })
            .await;

        OpLog::new(Operation::Open, user).emit(&result);
        result
    }

    /// Current balance of `user`'s wallet.
    pub async fn balance(&self, user: UserId) -> Result<Amount, LedgerError> {
        let result = self
            .store
            .read(self.deadline(), |uow| self.load(uow, user))
            .await
            .map(|wallet| wallet.balance);

        match &result {
            Ok(balance) => debug!(user, balance = balance.minor(), "balance read"),
            Err(err) => OpLog::new(Operation::Balance, user).failed(err),
        }
        result
    }

    /// Credit `amount` to `user`, returning the new balance.
    pub async fn deposit(&self, user: UserId, amount: Amount) -> Result<Amount, LedgerError> {
        let result = self.apply_deposit(user, amount).await;
        OpLog::new(Operation::Deposit, user).amount(amount).emit(&result);
        result
    }

    /// Debit `amount` from `user`, returning the new balance.
    pub async fn withdraw(&self, user: UserId, amount: Amount) -> Result<Amount, LedgerError> {
        let result = self.apply_withdraw(user, amount).await;
        OpLog::new(Operation::Withdraw, user).amount(amount).emit(&result);
        result
    }

    /// Move `amount` from `from` to `to`, returning both new balances.
    pub async fn transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: Amount,
    ) -> Result<(Amount, Amount), LedgerError> {
        let result = self.apply_transfer(from, to, amount).await;
        OpLog::new(Operation::Transfer, from)
            .counterparty(to)
            .amount(amount)
            .emit(&result);
        result
    }

    /// Records of `user`, newest first.
    pub async fn history(&self, user: UserId) -> Result<Vec<TxRecord>, LedgerError> {
        let result = self
            .store
            .read(self.deadline(), |uow| {
                self.load(uow, user)?;
                Ok(self.recorder.history(uow, user)?)
            })
            .await;

        match &result {
            Ok(records) => debug!(user, records = records.len(), "history read"),
            Err(err) => OpLog::new(Operation::History, user).failed(err),
        }
        result
    }

    /// Replay `user`'s records and compare them with the stored balance.
    pub async fn reconcile(&self, user: UserId) -> Result<Reconciliation, LedgerError> {
        let result = self
            .store
            .read(self.deadline(), |uow| {
                let wallet = self.load(uow, user)?;
                let mut records = self.recorder.history(uow, user)?;
                records.reverse();
                Self::replay(wallet, &records)
            })
            .await;

        match &result {
            Ok(rec) if rec.is_consistent() => {
                debug!(user, records = rec.records, "wallet reconciled")
            }
            Ok(rec) => error!(
                user,
                balance = rec.balance.minor(),
                replayed = rec.replayed.minor(),
                first_mismatch = rec.first_mismatch,
                "wallet does not match its records"
            ),
            Err(err) => OpLog::new(Operation::Reconcile, user).failed(err),
        }
        result
    }

    /// Every wallet, ordered by user.
    pub async fn wallets(&self) -> Result<Vec<Wallet>, LedgerError> {
        self.store
            .read(self.deadline(), |uow| Ok(uow.wallets()))
            .await
    }

    /// Apply a single command.
    pub async fn apply(&self, command: Command) -> Result<(), LedgerError> {
        match command {
            Command::Open { user } => self.open_wallet(user).await.map(|_| ()),
            Command::Deposit { user, amount } => self.deposit(user, amount).await.map(|_| ()),
            Command::Withdraw { user, amount } => self.withdraw(user, amount).await.map(|_| ()),
            Command::Transfer { from, to, amount } => {
                self.transfer(from, to, amount).await.map(|_| ())
            }
        }
    }

    /// Run the engine over a stream of commands
    pub async fn run(&self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            // failures are already logged by the operation; keep going
            let _ = self.apply(command).await;
        }
    }
}

/// Private API
impl<W: WalletAccessor, R: TransactionRecorder> Engine<W, R> {
    fn deadline(&self) -> Duration {
        self.config.op_timeout
    }

    fn load(&self, uow: &UnitOfWork<'_>, user: UserId) -> Result<Wallet, LedgerError> {
        self.wallets
            .find_by_user(uow, user)?
            .ok_or(LedgerError::NotFound(user))
    }

    fn load_party(
        &self,
        uow: &UnitOfWork<'_>,
        user: UserId,
        party: Party,
    ) -> Result<Wallet, LedgerError> {
        self.wallets
            .find_by_user(uow, user)?
            .ok_or(LedgerError::PartyNotFound(party, user))
    }

    fn ensure_positive(amount: Amount) -> Result<(), LedgerError> {
        if amount.is_positive() {
            Ok(())
        } else {
            Err(LedgerError::InvalidAmount(amount))
        }
    }

    /// Deposit:
    /// - Ensure amount is positive
    /// - Load the wallet inside the unit of work
    /// - Credit it, save it, append a `deposit` record
    async fn apply_deposit(&self, user: UserId, amount: Amount) -> Result<Amount, LedgerError> {
        Self::ensure_positive(amount)?;

        self.store
            .run_atomic(self.deadline(), |uow| {
                let mut wallet = self.load(uow, user)?;
                wallet.balance = wallet
                    .balance
                    .checked_add(amount)
                    .ok_or(LedgerError::BalanceOverflow(user))?;

                self.wallets.save(uow, wallet)?;
                self.recorder.append(
                    uow,
                    NewRecord {
                        user,
                        kind: TxKind::Deposit,
                        amount,
                        counterparty: None,
                        balance_after: wallet.balance,
                    },
                )?;

                Ok(wallet.balance)
            })
            .await
    }

    /// Withdraw:
    /// - Ensure amount is positive
    /// - Load the wallet inside the unit of work and check its balance there
    /// - Debit it, save it, append a `withdraw` record
    async fn apply_withdraw(&self, user: UserId, amount: Amount) -> Result<Amount, LedgerError> {
        Self::ensure_positive(amount)?;

        self.store
            .run_atomic(self.deadline(), |uow| {
                let mut wallet = self.load(uow, user)?;
                wallet.balance = Self::debit(&wallet, amount)?;

                self.wallets.save(uow, wallet)?;
                self.recorder.append(
                    uow,
                    NewRecord {
                        user,
                        kind: TxKind::Withdraw,
                        amount,
                        counterparty: None,
                        balance_after: wallet.balance,
                    },
                )?;

                Ok(wallet.balance)
            })
            .await
    }

    /// Transfer:
    /// - Reject self-transfers and non-positive amounts
    /// - Load both wallets in ascending user order
    /// - Check the source balance against the freshly loaded value
    /// - Debit source, credit destination, save both
    /// - Append `transfer_sent` and `transfer_received`
    async fn apply_transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: Amount,
    ) -> Result<(Amount, Amount), LedgerError> {
        if from == to {
            return Err(LedgerError::SelfTransfer(from));
        }
        Self::ensure_positive(amount)?;

        self.store
            .run_atomic(self.deadline(), |uow| {
                let (mut source, mut destination) = if from < to {
                    let source = self.load_party(uow, from, Party::Source)?;
                    (source, self.load_party(uow, to, Party::Destination)?)
                } else {
                    let destination = self.load_party(uow, to, Party::Destination)?;
                    (self.load_party(uow, from, Party::Source)?, destination)
                };

                source.balance = Self::debit(&source, amount)?;
                destination.balance = destination
                    .balance
                    .checked_add(amount)
                    .ok_or(LedgerError::BalanceOverflow(to))?;

                self.wallets.save(uow, source)?;
                self.wallets.save(uow, destination)?;

                self.recorder.append(
                    uow,
                    NewRecord {
                        user: from,
                        kind: TxKind::TransferSent,
                        amount,
                        counterparty: Some(to),
                        balance_after: source.balance,
                    },
                )?;
                self.recorder.append(
                    uow,
                    NewRecord {
                        user: to,
                        kind: TxKind::TransferReceived,
                        amount,
                        counterparty: Some(from),
                        balance_after: destination.balance,
                    },
                )?;

                Ok((source.balance, destination.balance))
            })
            .await
    }

    /// Balance after taking `amount` out of `wallet`, if it covers it.
    fn debit(wallet: &Wallet, amount: Amount) -> Result<Amount, LedgerError> {
        let insufficient = || LedgerError::InsufficientFunds {
            user: wallet.user,
            balance: wallet.balance,
            requested: amount,
        };

        if wallet.balance < amount {
            return Err(insufficient());
        }
        wallet.balance.checked_sub(amount).ok_or_else(insufficient)
    }

    /// Walk `records` oldest first, checking each `balance_after`.
    fn replay(wallet: Wallet, records: &[TxRecord]) -> Result<Reconciliation, LedgerError> {
        let mut running = Amount::ZERO;
        let mut first_mismatch = None;

        for record in records {
            running = running
                .checked_add(record.signed_amount())
                .ok_or(LedgerError::BalanceOverflow(wallet.user))?;
            if first_mismatch.is_none() && running != record.balance_after {
                first_mismatch = Some(record.seq);
            }
        }

        Ok(Reconciliation {
            user: wallet.user,
            balance: wallet.balance,
            replayed: running,
            records: records.len(),
            first_mismatch,
        })
    }
}
