//! Error types for ledger operations.

use std::fmt;

use thiserror::Error;

use crate::Amount;
use crate::model::UserId;
use crate::store::StoreError;

/// Side of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Source,
    Destination,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Party::Source => f.write_str("source"),
            Party::Destination => f.write_str("destination"),
        }
    }
}

/// Error returned by every [`Engine`](super::Engine) operation.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("wallet not found for user {0}")]
    NotFound(UserId),

    #[error("{0} wallet not found for user {1}")]
    PartyNotFound(Party, UserId),

    #[error("invalid amount {0}: must be positive")]
    InvalidAmount(Amount),

    #[error("insufficient funds for user {user}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        user: UserId,
        balance: Amount,
        requested: Amount,
    },

    #[error("user {0} cannot transfer to themselves")]
    SelfTransfer(UserId),

    #[error("wallet for user {0} already exists")]
    WalletExists(UserId),

    #[error("balance of user {0} would overflow")]
    BalanceOverflow(UserId),

    /// Details stay in the source chain; the message itself is generic.
    #[error("storage failure")]
    Storage(#[source] StoreError),
}

/// Coarse classification callers translate into responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input, never retried by the engine.
    Validation,
    NotFound,
    InsufficientFunds,
    /// The request clashes with existing state.
    Conflict,
    Storage,
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidAmount(_)
            | LedgerError::SelfTransfer(_)
            | LedgerError::BalanceOverflow(_) => ErrorKind::Validation,
            LedgerError::NotFound(_) | LedgerError::PartyNotFound(..) => ErrorKind::NotFound,
            LedgerError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            LedgerError::WalletExists(_) => ErrorKind::Conflict,
            LedgerError::Storage(_) => ErrorKind::Storage,
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateWallet(user) => LedgerError::WalletExists(user),
            other => LedgerError::Storage(other),
        }
    }
}
