//! Core domain types for the wallet ledger.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Amount;

/// Owner of a wallet. One wallet per user.
pub type UserId = u64;

/// Sequence number of a transaction record, assigned by the store.
pub type SeqNo = u64;

/// A user's wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub user: UserId,
    pub balance: Amount,
}

impl Wallet {
    /// A freshly opened wallet with a zero balance.
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            balance: Amount::ZERO,
        }
    }
}

/// The kind of balance change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Deposit,
    Withdraw,
    TransferSent,
    TransferReceived,
}

impl TxKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TxKind::Deposit => "deposit",
            TxKind::Withdraw => "withdraw",
            TxKind::TransferSent => "transfer_sent",
            TxKind::TransferReceived => "transfer_received",
        }
    }

    /// Whether records of this kind add to the owner's balance.
    pub fn is_credit(self) -> bool {
        matches!(self, TxKind::Deposit | TxKind::TransferReceived)
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that has not been appended yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub user: UserId,
    pub kind: TxKind,
    pub amount: Amount,
    /// Set only for transfer kinds.
    pub counterparty: Option<UserId>,
    pub balance_after: Amount,
}

/// An appended, immutable entry of the transaction log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub seq: SeqNo,
    pub user: UserId,
    pub kind: TxKind,
    pub amount: Amount,
    pub counterparty: Option<UserId>,
    pub balance_after: Amount,
    pub created_at: DateTime<Utc>,
}

impl TxRecord {
    pub(crate) fn from_new(record: NewRecord, seq: SeqNo, created_at: DateTime<Utc>) -> Self {
        Self {
            seq,
            user: record.user,
            kind: record.kind,
            amount: record.amount,
            counterparty: record.counterparty,
            balance_after: record.balance_after,
            created_at,
        }
    }

    /// The amount with the sign of its effect on the owner's balance.
    pub fn signed_amount(&self) -> Amount {
        if self.kind.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}

/// A command accepted by [`Engine::apply`](crate::Engine::apply).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Open a zero-balance wallet for a newly registered user.
    Open { user: UserId },
    /// Credit funds to a wallet.
    Deposit { user: UserId, amount: Amount },
    /// Debit funds from a wallet.
    Withdraw { user: UserId, amount: Amount },
    /// Move funds from one wallet to another.
    Transfer {
        from: UserId,
        to: UserId,
        amount: Amount,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: TxKind, amount: i64) -> TxRecord {
        TxRecord::from_new(
            NewRecord {
                user: 1,
                kind,
                amount: Amount::from_minor(amount),
                counterparty: None,
                balance_after: Amount::ZERO,
            },
            1,
            Utc::now(),
        )
    }

    #[test]
    fn new_wallet_is_empty() {
        assert_eq!(Wallet::new(7).balance, Amount::ZERO);
    }

    #[test]
    fn signed_amount_follows_kind() {
        assert_eq!(record(TxKind::Deposit, 10).signed_amount(), Amount::from_minor(10));
        assert_eq!(
            record(TxKind::TransferReceived, 10).signed_amount(),
            Amount::from_minor(10)
        );
        assert_eq!(record(TxKind::Withdraw, 10).signed_amount(), Amount::from_minor(-10));
        assert_eq!(
            record(TxKind::TransferSent, 10).signed_amount(),
            Amount::from_minor(-10)
        );
    }

    #[test]
    fn kind_names_match_log_vocabulary() {
        assert_eq!(TxKind::TransferSent.to_string(), "transfer_sent");
        assert_eq!(TxKind::TransferReceived.as_str(), "transfer_received");
    }
}
