//! Persistence contract for accounts.
//!
//! Handlers and the auth middleware only see `Arc<dyn AccountStore>`. The
//! relational backend is [`PgStore`]; [`MemoryStore`] is the in-process double
//! used by tests and local runs without a database.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::{account::Account, error::Result};
use async_trait::async_trait;

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create the schema if absent. Safe to call more than once.
    async fn init(&self) -> Result<()>;

    /// Insert a new account and return it with its assigned `id`.
    async fn create_account(&self, account: &Account) -> Result<Account>;

    async fn get_account_by_id(&self, id: i64) -> Result<Account>;

    /// Lookup by external account number, used by login.
    async fn get_account_by_number(&self, number: i64) -> Result<Account>;

    /// All accounts ordered by `id`.
    async fn get_accounts(&self) -> Result<Vec<Account>>;

    /// Remove an account; `Error::NotFound` if it does not exist.
    async fn delete_account(&self, id: i64) -> Result<()>;

    /// Atomically replace the mutable fields (names, balance) of an
    /// existing account and return the stored row.
    async fn update_account(&self, account: &Account) -> Result<Account>;

    /// Connectivity check for health reporting.
    async fn ping(&self) -> Result<()>;
}
