use super::AccountStore;
use crate::{
    account::Account,
    error::{Error, Result},
};
use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Connection, PgPool, Row,
};
use std::time::Duration;
use tracing::{info_span, instrument, Instrument, Span};

const CREATE_ACCOUNT_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS account (
        id BIGSERIAL PRIMARY KEY,
        first_name VARCHAR(50) NOT NULL,
        last_name VARCHAR(50) NOT NULL,
        number BIGINT NOT NULL UNIQUE,
        encrypted_password TEXT NOT NULL,
        balance BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL
    )
";

// Numbers stay here after their account is deleted, so they are never reissued.
const CREATE_ACCOUNT_NUMBER_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS account_number (
        number BIGINT PRIMARY KEY
    )
";

const INSERT_ACCOUNT_NUMBER: &str = "INSERT INTO account_number (number) VALUES ($1)";

const ACCOUNT_COLUMNS: &str =
    "id, first_name, last_name, number, encrypted_password, balance, created_at";

fn query_span(operation: &'static str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

fn account_from_row(row: &PgRow) -> Result<Account> {
    Ok(Account {
        id: row.try_get("id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        number: row.try_get("number")?,
        encrypted_password: row.try_get("encrypted_password")?,
        balance: row.try_get("balance")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Account storage backed by a PostgreSQL connection pool.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool against `dsn`.
    ///
    /// # Errors
    /// Returns `Error::Database` if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await?;

        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AccountStore for PgStore {
    #[instrument(skip(self))]
    async fn init(&self) -> Result<()> {
        sqlx::query(CREATE_ACCOUNT_TABLE)
            .execute(&self.pool)
            .instrument(query_span("CREATE", CREATE_ACCOUNT_TABLE))
            .await?;

        sqlx::query(CREATE_ACCOUNT_NUMBER_TABLE)
            .execute(&self.pool)
            .instrument(query_span("CREATE", CREATE_ACCOUNT_NUMBER_TABLE))
            .await?;

        Ok(())
    }

    #[instrument(skip(self, account), fields(number = account.number))]
    async fn create_account(&self, account: &Account) -> Result<Account> {
        let query = format!(
            r"
            INSERT INTO account
                (first_name, last_name, number, encrypted_password, balance, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ACCOUNT_COLUMNS}
            "
        );

        let duplicate = |err: sqlx::Error| {
            if is_unique_violation(&err) {
                Error::Storage(format!("account number {} already exists", account.number))
            } else {
                Error::Database(err)
            }
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(INSERT_ACCOUNT_NUMBER)
            .bind(account.number)
            .execute(&mut *tx)
            .instrument(query_span("INSERT", INSERT_ACCOUNT_NUMBER))
            .await
            .map_err(duplicate)?;

        let row = sqlx::query(&query)
            .bind(&account.first_name)
            .bind(&account.last_name)
            .bind(account.number)
            .bind(&account.encrypted_password)
            .bind(account.balance)
            .bind(account.created_at)
            .fetch_one(&mut *tx)
            .instrument(query_span("INSERT", &query))
            .await
            .map_err(duplicate)?;

        tx.commit().await?;

        account_from_row(&row)
    }

    #[instrument(skip(self))]
    async fn get_account_by_id(&self, id: i64) -> Result<Account> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = $1");

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;

        row.as_ref()
            .map(account_from_row)
            .ok_or_else(|| Error::NotFound(format!("account {id}")))?
    }

    #[instrument(skip(self))]
    async fn get_account_by_number(&self, number: i64) -> Result<Account> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM account WHERE number = $1");

        let row = sqlx::query(&query)
            .bind(number)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;

        row.as_ref()
            .map(account_from_row)
            .ok_or_else(|| Error::NotFound(format!("account number {number}")))?
    }

    #[instrument(skip(self))]
    async fn get_accounts(&self) -> Result<Vec<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM account ORDER BY id");

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", &query))
            .await?;

        rows.iter().map(account_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, id: i64) -> Result<()> {
        let query = "DELETE FROM account WHERE id = $1";

        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(query_span("DELETE", query))
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("account {id}")));
        }

        Ok(())
    }

    #[instrument(skip(self, account), fields(id = account.id))]
    async fn update_account(&self, account: &Account) -> Result<Account> {
        // Single statement, so concurrent readers see either the old or the new row.
        let query = format!(
            r"
            UPDATE account
            SET first_name = $2, last_name = $3, balance = $4
            WHERE id = $1
            RETURNING {ACCOUNT_COLUMNS}
            "
        );

        let row = sqlx::query(&query)
            .bind(account.id)
            .bind(&account.first_name)
            .bind(&account.last_name)
            .bind(account.balance)
            .fetch_optional(&self.pool)
            .instrument(query_span("UPDATE", &query))
            .await?;

        row.as_ref()
            .map(account_from_row)
            .ok_or_else(|| Error::NotFound(format!("account {}", account.id)))?
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .instrument(info_span!(
                "db.acquire",
                db.system = "postgresql",
                db.operation = "ACQUIRE"
            ))
            .await?;

        conn.ping()
            .instrument(info_span!(
                "db.ping",
                db.system = "postgresql",
                db.operation = "PING"
            ))
            .await?;

        Ok(())
    }
}
