//! Structured outcome events for engine operations.

use tracing::{error, info, warn};

use super::error::LedgerError;
use crate::Amount;
use crate::model::{UserId, Wallet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Operation {
    Open,
    Deposit,
    Withdraw,
    Transfer,
    Balance,
    History,
    Reconcile,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Open => "open",
            Operation::Deposit => "deposit",
            Operation::Withdraw => "withdraw",
            Operation::Transfer => "transfer",
            Operation::Balance => "balance",
            Operation::History => "history",
            Operation::Reconcile => "reconcile",
        }
    }
}

/// Resulting balances reported by a successful mutation.
pub(super) trait Outcome {
    fn balance(&self) -> Amount;

    fn counterparty_balance(&self) -> Option<Amount> {
        None
    }
}

impl Outcome for Amount {
    fn balance(&self) -> Amount {
        *self
    }
}

impl Outcome for Wallet {
    fn balance(&self) -> Amount {
        self.balance
    }
}

impl Outcome for (Amount, Amount) {
    fn balance(&self) -> Amount {
        self.0
    }

    fn counterparty_balance(&self) -> Option<Amount> {
        Some(self.1)
    }
}

/// Fixed schema shared by every operation's log event.
#[derive(Debug, Clone, Copy)]
pub(super) struct OpLog {
    op: Operation,
    user: UserId,
    counterparty: Option<UserId>,
    amount: Option<Amount>,
}

impl OpLog {
    pub(super) fn new(op: Operation, user: UserId) -> Self {
        Self {
            op,
            user,
            counterparty: None,
            amount: None,
        }
    }

    pub(super) fn amount(mut self, amount: Amount) -> Self {
        self.amount = Some(amount);
        self
    }

    pub(super) fn counterparty(mut self, counterparty: UserId) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    /// Log the result of a balance-changing operation.
    pub(super) fn emit<T: Outcome>(&self, result: &Result<T, LedgerError>) {
        match result {
            Ok(outcome) => {
                let op = self.op.as_str();
                info!(
                    op,
                    user = self.user,
                    counterparty = self.counterparty,
                    amount = self.amount.map(Amount::minor),
                    balance = outcome.balance().minor(),
                    counterparty_balance = outcome.counterparty_balance().map(Amount::minor),
                    "{op} applied"
                );
            }
            Err(err) => self.failed(err),
        }
    }

    /// Log a failed operation at the severity its error class deserves.
    ///
    /// Business outcomes stay below error level; storage faults are logged
    /// with their cause, which is never shown to callers.
    pub(super) fn failed(&self, err: &LedgerError) {
        let op = self.op.as_str();
        let amount = self.amount.map(Amount::minor);

        match err {
            LedgerError::Storage(cause) => {
                error!(
                    op,
                    user = self.user,
                    counterparty = self.counterparty,
                    amount,
                    cause = %cause,
                    "{op} failed"
                );
            }
            LedgerError::InsufficientFunds { balance, .. } => {
                warn!(
                    op,
                    user = self.user,
                    counterparty = self.counterparty,
                    amount,
                    balance = balance.minor(),
                    "{op} rejected: insufficient funds"
                );
            }
            other => {
                info!(
                    op,
                    user = self.user,
                    counterparty = self.counterparty,
                    amount,
                    reason = %other,
                    "{op} skipped"
                );
            }
        }
    }
}
