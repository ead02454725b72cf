#![deny(warnings)]

//! Persistence layer: SQLite schema, game rows and settlement history.
//!
//! Money is stored as integer cents. History rows are append-only; a reset
//! flips their `is_deleted` flag instead of removing them.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use sim_core::{GameId, GameState, SettlementRecord, Visibility};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised by the store. All write paths are transactional, so any of
/// these leaves the stored game untouched.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    /// Another writer advanced the game since it was read.
    #[error("{game_id} is no longer at quarter {expected_quarter}")]
    StaleState { game_id: GameId, expected_quarter: u32 },
    #[error("amount {0} does not fit in i64 cents")]
    CentsOverflow(Decimal),
    #[error("owner identity must not be empty")]
    InvalidIdentity,
    #[error("corrupt row: {0}")]
    Corrupt(&'static str),
}

impl PersistenceError {
    /// Failures that may clear up on a fresh attempt. Bad amounts, bad
    /// identities and corrupt rows will fail the same way again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PersistenceError::Sqlx(_) | PersistenceError::StaleState { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

const SUM_VISIBLE_NET_INCOME: &str = "SELECT COALESCE(SUM(net_income_cents), 0) AS total
     FROM game_history WHERE game_id = ? AND is_deleted = 0";

/// A game row with its owner and store-assigned id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoredGame {
    pub id: GameId,
    pub owner: String,
    pub state: GameState,
}

/// Returns the default SQLite URL used for local saves.
pub fn default_sqlite_url() -> &'static str {
    "sqlite://./saves/main.db"
}

/// Convert a USD amount to whole cents, rounding half away from zero.
pub fn decimal_to_cents_i64(v: Decimal) -> Option<i64> {
    v.checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

pub fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

fn to_cents(v: Decimal) -> Result<i64> {
    decimal_to_cents_i64(v).ok_or(PersistenceError::CentsOverflow(v))
}

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Open (or create) the database at `url` and apply migrations.
pub async fn init_db(url: &str) -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(opts)
        .await?;
    migrate(&pool).await?;
    info!(url, "database ready");
    Ok(pool)
}

/// In-memory database on a single connection (each connection to
/// `sqlite::memory:` is a separate database).
pub async fn init_memory_db() -> Result<SqlitePool> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await?;
    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

fn check_owner(owner: &str) -> Result<()> {
    if owner.trim().is_empty() {
        return Err(PersistenceError::InvalidIdentity);
    }
    Ok(())
}

fn u32_col(row: &SqliteRow, col: &'static str) -> Result<u32> {
    let v: i64 = row.try_get(col)?;
    u32::try_from(v).map_err(|_| PersistenceError::Corrupt(col))
}

fn game_from_row(row: &SqliteRow) -> Result<StoredGame> {
    Ok(StoredGame {
        id: GameId(row.try_get("id")?),
        owner: row.try_get("owner")?,
        state: GameState {
            cash: cents_to_decimal(row.try_get("cash_cents")?),
            current_quarter: u32_col(row, "current_quarter")?,
            engineers: u32_col(row, "engineers")?,
            sales_staff: u32_col(row, "sales_staff")?,
        },
    })
}

fn settlement_from_row(row: &SqliteRow) -> Result<SettlementRecord> {
    let deleted: i64 = row.try_get("is_deleted")?;
    Ok(SettlementRecord {
        quarter: u32_col(row, "quarter")?,
        revenue: cents_to_decimal(row.try_get("revenue_cents")?),
        net_income: cents_to_decimal(row.try_get("net_income_cents")?),
        cash: cents_to_decimal(row.try_get("cash_cents")?),
        visibility: if deleted != 0 {
            Visibility::Deleted
        } else {
            Visibility::Visible
        },
    })
}

/// Load the game owned by `owner`, if any.
pub async fn load_game(pool: &SqlitePool, owner: &str) -> Result<Option<StoredGame>> {
    check_owner(owner)?;
    let row = sqlx::query(
        "SELECT id, owner, cash_cents, current_quarter, engineers, sales_staff
         FROM games WHERE owner = ?",
    )
    .bind(owner)
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(game_from_row).transpose()
}

/// Create a game for `owner` with the given starting state. An existing game
/// is returned unchanged.
pub async fn create_game(pool: &SqlitePool, owner: &str, start: &GameState) -> Result<StoredGame> {
    check_owner(owner)?;
    let res = sqlx::query(
        "INSERT INTO games (owner, cash_cents, current_quarter, engineers, sales_staff, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(owner) DO NOTHING",
    )
    .bind(owner)
    .bind(to_cents(start.cash)?)
    .bind(i64::from(start.current_quarter))
    .bind(i64::from(start.engineers))
    .bind(i64::from(start.sales_staff))
    .bind(now_stamp())
    .execute(pool)
    .await?;
    if res.rows_affected() == 1 {
        info!(owner, "created game");
    }
    load_game(pool, owner)
        .await?
        .ok_or(PersistenceError::Corrupt("game missing after insert"))
}

/// Atomically write a resolved turn: the new game state and its settlement.
///
/// The update only applies if the stored quarter still equals
/// `expected_quarter`; otherwise a concurrent writer got there first and
/// nothing is written. Returns the cumulative profit as of this commit.
pub async fn commit_turn(
    pool: &SqlitePool,
    game_id: GameId,
    expected_quarter: u32,
    next: &GameState,
    settlement: &SettlementRecord,
) -> Result<Decimal> {
    let cash_cents = to_cents(next.cash)?;
    let revenue_cents = to_cents(settlement.revenue)?;
    let net_cents = to_cents(settlement.net_income)?;
    let settled_cash_cents = to_cents(settlement.cash)?;
    let stamp = now_stamp();

    let mut tx = pool.begin().await?;
    let updated = sqlx::query(
        "UPDATE games
         SET cash_cents = ?, current_quarter = ?, engineers = ?, sales_staff = ?, updated_at = ?
         WHERE id = ? AND current_quarter = ?",
    )
    .bind(cash_cents)
    .bind(i64::from(next.current_quarter))
    .bind(i64::from(next.engineers))
    .bind(i64::from(next.sales_staff))
    .bind(stamp.as_str())
    .bind(game_id.0)
    .bind(i64::from(expected_quarter))
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() != 1 {
        warn!(%game_id, expected_quarter, "stale turn commit rejected");
        tx.rollback().await?;
        return Err(PersistenceError::StaleState {
            game_id,
            expected_quarter,
        });
    }
    sqlx::query(
        "INSERT INTO game_history
            (game_id, quarter, revenue_cents, net_income_cents, cash_cents, is_deleted, created_at)
         VALUES (?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(game_id.0)
    .bind(i64::from(settlement.quarter))
    .bind(revenue_cents)
    .bind(net_cents)
    .bind(settled_cash_cents)
    .bind(stamp.as_str())
    .execute(&mut *tx)
    .await?;
    let total: i64 = sqlx::query(SUM_VISIBLE_NET_INCOME)
        .bind(game_id.0)
        .fetch_one(&mut *tx)
        .await?
        .try_get("total")?;
    tx.commit().await?;
    debug!(%game_id, quarter = settlement.quarter, "turn committed");
    Ok(cents_to_decimal(total))
}

/// Put `owner`'s game back to `start` and hide its history, creating the game
/// if it does not exist yet. Repeating the call yields the same state.
pub async fn reset_game(pool: &SqlitePool, owner: &str, start: &GameState) -> Result<StoredGame> {
    check_owner(owner)?;
    let mut tx = pool.begin().await?;
    sqlx::query(
        "INSERT INTO games (owner, cash_cents, current_quarter, engineers, sales_staff, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)
         ON CONFLICT(owner) DO UPDATE SET
            cash_cents = excluded.cash_cents,
            current_quarter = excluded.current_quarter,
            engineers = excluded.engineers,
            sales_staff = excluded.sales_staff,
            updated_at = excluded.updated_at",
    )
    .bind(owner)
    .bind(to_cents(start.cash)?)
    .bind(i64::from(start.current_quarter))
    .bind(i64::from(start.engineers))
    .bind(i64::from(start.sales_staff))
    .bind(now_stamp())
    .execute(&mut *tx)
    .await?;
    let id: i64 = sqlx::query("SELECT id FROM games WHERE owner = ?")
        .bind(owner)
        .fetch_one(&mut *tx)
        .await?
        .try_get("id")?;
    let hidden = sqlx::query("UPDATE game_history SET is_deleted = 1 WHERE game_id = ? AND is_deleted = 0")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;
    info!(owner, game_id = id, hidden, "game reset");
    Ok(StoredGame {
        id: GameId(id),
        owner: owner.to_string(),
        state: start.clone(),
    })
}

/// The `limit` most recent visible settlements, newest first.
pub async fn recent_history(
    pool: &SqlitePool,
    game_id: GameId,
    limit: u32,
) -> Result<Vec<SettlementRecord>> {
    let rows = sqlx::query(
        "SELECT quarter, revenue_cents, net_income_cents, cash_cents, is_deleted
         FROM game_history
         WHERE game_id = ? AND is_deleted = 0
         ORDER BY quarter DESC
         LIMIT ?",
    )
    .bind(game_id.0)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;
    rows.iter().map(settlement_from_row).collect()
}

/// All visible settlements, oldest first.
pub async fn all_history(pool: &SqlitePool, game_id: GameId) -> Result<Vec<SettlementRecord>> {
    let rows = sqlx::query(
        "SELECT quarter, revenue_cents, net_income_cents, cash_cents, is_deleted
         FROM game_history
         WHERE game_id = ? AND is_deleted = 0
         ORDER BY quarter ASC",
    )
    .bind(game_id.0)
    .fetch_all(pool)
    .await?;
    rows.iter().map(settlement_from_row).collect()
}

/// Every settlement ever written for the game, hidden ones included, in
/// insertion order.
pub async fn audit_history(pool: &SqlitePool, game_id: GameId) -> Result<Vec<SettlementRecord>> {
    let rows = sqlx::query(
        "SELECT quarter, revenue_cents, net_income_cents, cash_cents, is_deleted
         FROM game_history
         WHERE game_id = ?
         ORDER BY id ASC",
    )
    .bind(game_id.0)
    .fetch_all(pool)
    .await?;
    rows.iter().map(settlement_from_row).collect()
}
