pub mod amount;
pub mod config;
pub mod csv;
pub mod engine;
pub mod model;
pub mod recorder;
pub mod store;
pub mod wallets;

pub use amount::Amount;
pub use config::LedgerConfig;
pub use engine::{Engine, ErrorKind, LedgerError};
pub use model::{Command, TxKind, TxRecord, UserId, Wallet};
pub use store::LedgerStore;
