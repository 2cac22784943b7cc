use super::AccountStore;
use crate::{
    account::Account,
    error::{Error, Result},
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    accounts: BTreeMap<i64, Account>,
    // Every number ever handed out; never pruned on delete.
    issued_numbers: HashSet<i64>,
}

/// In-process account storage with the same contract as [`super::PgStore`].
///
/// Ids come from a counter that is never rewound, and account numbers are
/// remembered after delete, so neither is ever reused.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn init(&self) -> Result<()> {
        Ok(())
    }

    async fn create_account(&self, account: &Account) -> Result<Account> {
        let mut tables = self.tables.write().await;

        if !tables.issued_numbers.insert(account.number) {
            return Err(Error::Storage(format!(
                "account number {} already exists",
                account.number
            )));
        }

        tables.last_id += 1;
        let stored = Account {
            id: tables.last_id,
            ..account.clone()
        };
        tables.accounts.insert(stored.id, stored.clone());

        Ok(stored)
    }

    async fn get_account_by_id(&self, id: i64) -> Result<Account> {
        self.tables
            .read()
            .await
            .accounts
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("account {id}")))
    }

    async fn get_account_by_number(&self, number: i64) -> Result<Account> {
        self.tables
            .read()
            .await
            .accounts
            .values()
            .find(|account| account.number == number)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("account number {number}")))
    }

    async fn get_accounts(&self) -> Result<Vec<Account>> {
        Ok(self.tables.read().await.accounts.values().cloned().collect())
    }

    async fn delete_account(&self, id: i64) -> Result<()> {
        self.tables
            .write()
            .await
            .accounts
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("account {id}")))
    }

    async fn update_account(&self, account: &Account) -> Result<Account> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .accounts
            .get_mut(&account.id)
            .ok_or_else(|| Error::NotFound(format!("account {}", account.id)))?;

        stored.first_name.clone_from(&account.first_name);
        stored.last_name.clone_from(&account.last_name);
        stored.balance = account.balance;

        Ok(stored.clone())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
