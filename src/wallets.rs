//! Wallet accessor: single-wallet reads and writes through a unit of work.

use crate::model::{UserId, Wallet};
use crate::store::{StoreError, UnitOfWork};

/// Reads and writes one wallet at a time. No business rules live here.
pub trait WalletAccessor: Send + Sync {
    fn find_by_user(&self, uow: &UnitOfWork<'_>, user: UserId) -> Result<Option<Wallet>, StoreError>;

    fn create(&self, uow: &mut UnitOfWork<'_>, wallet: Wallet) -> Result<(), StoreError>;

    fn save(&self, uow: &mut UnitOfWork<'_>, wallet: Wallet) -> Result<(), StoreError>;
}

/// [`WalletAccessor`] backed directly by the ledger store.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreWallets;

impl WalletAccessor for StoreWallets {
    fn find_by_user(&self, uow: &UnitOfWork<'_>, user: UserId) -> Result<Option<Wallet>, StoreError> {
        Ok(uow.wallet(user))
    }

    fn create(&self, uow: &mut UnitOfWork<'_>, wallet: Wallet) -> Result<(), StoreError> {
        uow.insert_wallet(wallet)
    }

    fn save(&self, uow: &mut UnitOfWork<'_>, wallet: Wallet) -> Result<(), StoreError> {
        uow.update_wallet(wallet)
    }
}
