// 🗄️ Participant Store - sellers + catalog sync state in SQLite
//
// Both tables are keyed by (seller_id, domain, registry_env). Sellers are
// never deleted, only flagged inactive. A catalog state row is created once,
// at NOT_SYNCED, when its seller is first inserted; later transitions belong
// to the catalog-pull worker.

use crate::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

// ============================================================================
// SELLER
// ============================================================================

/// A registry participant as stored locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seller {
    // ========================================================================
    // IDENTITY (composite key - immutable)
    // ========================================================================
    pub seller_id: String,
    pub domain: String,
    pub registry_env: String,

    // ========================================================================
    // REGISTRY VALUES (refreshed on every observation)
    // ========================================================================
    /// Registry lifecycle status, e.g. "SUBSCRIBED"
    pub status: String,

    #[serde(rename = "type")]
    pub seller_type: String,

    pub subscriber_url: String,
    pub country: String,
    pub city: String,

    /// None when the registry sent no parseable timestamp
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,

    /// false = gone from the latest registry snapshot, kept for history
    pub active: bool,

    /// Registry entry as received, kept for audit
    pub registry_raw: String,

    pub last_seen_in_registry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Seller {
    pub fn key(&self) -> SellerKey<'_> {
        SellerKey {
            seller_id: &self.seller_id,
            domain: &self.domain,
            registry_env: &self.registry_env,
        }
    }
}

/// Borrowed composite key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SellerKey<'a> {
    pub seller_id: &'a str,
    pub domain: &'a str,
    pub registry_env: &'a str,
}

impl fmt::Display for SellerKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.registry_env, self.domain, self.seller_id)
    }
}

// ============================================================================
// CATALOG SYNC STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalogStatus {
    NotSynced,
    Syncing,
    Synced,
    Failed,
}

impl CatalogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogStatus::NotSynced => "NOT_SYNCED",
            CatalogStatus::Syncing => "SYNCING",
            CatalogStatus::Synced => "SYNCED",
            CatalogStatus::Failed => "FAILED",
        }
    }

    /// Statuses the pending listing uses when no filter is given
    pub fn pending_default() -> Vec<CatalogStatus> {
        vec![CatalogStatus::NotSynced, CatalogStatus::Failed]
    }
}

impl fmt::Display for CatalogStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CatalogStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "NOT_SYNCED" => Ok(CatalogStatus::NotSynced),
            "SYNCING" => Ok(CatalogStatus::Syncing),
            "SYNCED" => Ok(CatalogStatus::Synced),
            "FAILED" => Ok(CatalogStatus::Failed),
            other => Err(SyncError::Persistence(format!("unknown catalog status {other:?}"))),
        }
    }
}

/// Per-seller progress of the (external) catalog pull
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerCatalogState {
    pub seller_id: String,
    pub domain: String,
    pub registry_env: String,
    pub status: CatalogStatus,
    pub last_pull_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,

    /// Monotonic counter owned by the catalog-pull worker
    pub sync_version: i64,

    pub updated_at: DateTime<Utc>,
}

impl SellerCatalogState {
    /// Initial state for a newly discovered seller
    pub fn not_synced(seller: &Seller, now: DateTime<Utc>) -> Self {
        SellerCatalogState {
            seller_id: seller.seller_id.clone(),
            domain: seller.domain.clone(),
            registry_env: seller.registry_env.clone(),
            status: CatalogStatus::NotSynced,
            last_pull_at: None,
            last_success_at: None,
            last_error: None,
            sync_version: 0,
            updated_at: now,
        }
    }
}

// ============================================================================
// READ MODELS (catalog sync status / pending listing)
// ============================================================================

/// One row of the pending catalog sync listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerInfo {
    pub seller_id: String,
    pub status: CatalogStatus,
    pub last_pull_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    pub limit: usize,
    pub page: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSellersPage {
    pub domain: String,
    pub registry_env: String,
    pub status_filter: Vec<CatalogStatus>,
    pub sellers: Vec<SellerInfo>,
    pub page: PageInfo,
}

/// Catalog state of one seller plus when the registry last listed it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSyncStatus {
    pub seller_id: String,
    pub domain: String,
    pub registry_env: String,
    pub status: CatalogStatus,
    pub last_pull_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub sync_version: i64,
    pub registry_last_seen_at: DateTime<Utc>,
}

// ============================================================================
// REPOSITORY
// ============================================================================

/// Writes and reads the reconciliation engine needs from the store
pub trait SellerRepository: Send + Sync {
    /// Insert new sellers as one batch. A key that already exists (an
    /// inactive seller coming back) is refreshed and reactivated in place.
    fn insert_sellers(&self, sellers: &[Seller]) -> Result<usize>;

    /// Refresh existing sellers, all-or-nothing. Fails if any record
    /// matches no row.
    fn update_sellers(&self, sellers: &[Seller]) -> Result<usize>;

    fn get_active_sellers(&self, domain: &str, registry_env: &str) -> Result<Vec<Seller>>;

    /// Flag sellers inactive; returns how many rows changed
    fn deactivate_sellers(
        &self,
        seller_ids: &[String],
        domain: &str,
        registry_env: &str,
        now: DateTime<Utc>,
    ) -> Result<usize>;

    /// Create the state row if it does not exist yet. Returns true when a
    /// row was created; an existing row is left untouched.
    fn upsert_catalog_state(&self, state: &SellerCatalogState) -> Result<bool>;
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases ignore it
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sellers (
            seller_id TEXT NOT NULL,
            domain TEXT NOT NULL,
            registry_env TEXT NOT NULL,
            status TEXT NOT NULL,
            type TEXT NOT NULL,
            subscriber_url TEXT NOT NULL,
            country TEXT NOT NULL,
            city TEXT NOT NULL,
            valid_from TEXT,
            valid_until TEXT,
            active INTEGER NOT NULL DEFAULT 1,
            registry_raw TEXT NOT NULL,
            last_seen_in_reg TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (seller_id, domain, registry_env)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS seller_catalog_state (
            seller_id TEXT NOT NULL,
            domain TEXT NOT NULL,
            registry_env TEXT NOT NULL,
            status TEXT NOT NULL,
            last_pull_at TEXT,
            last_success_at TEXT,
            last_error TEXT,
            sync_version INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (seller_id, domain, registry_env),
            FOREIGN KEY (seller_id, domain, registry_env)
                REFERENCES sellers (seller_id, domain, registry_env)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sellers_domain_env_active
            ON sellers(domain, registry_env, active)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_catalog_state_status
            ON seller_catalog_state(domain, registry_env, status)",
        [],
    )?;

    Ok(())
}

const SELLER_COLUMNS: &str = "seller_id, domain, registry_env, status, type, subscriber_url,
    country, city, valid_from, valid_until, active, registry_raw, last_seen_in_reg,
    created_at, updated_at";

/// Seller ids bound per deactivation statement
const DEACTIVATE_CHUNK_SIZE: usize = 500;

const STATE_COLUMNS: &str = "seller_id, domain, registry_env, status, last_pull_at,
    last_success_at, last_error, sync_version, updated_at";

/// SQLite-backed participant store.
///
/// The connection is owned by the handle; the process bootstrap opens it
/// and passes the handle to the engine.
pub struct SqliteSellerStore {
    conn: Mutex<Connection>,
}

impl SqliteSellerStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Opening participant store at {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteSellerStore {
            conn: Mutex::new(conn),
        })
    }

    /// Direct connection access for maintenance tooling and tests
    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SyncError::Persistence("participant store lock poisoned".to_string()))
    }

    /// Flush and close the underlying connection
    pub fn close(self) -> Result<()> {
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| SyncError::Persistence("participant store lock poisoned".to_string()))?;
        conn.close().map_err(|(_, e)| SyncError::from(e))
    }

    pub fn get_seller(&self, seller_id: &str, domain: &str, registry_env: &str) -> Result<Option<Seller>> {
        let conn = self.lock()?;
        let seller = conn
            .query_row(
                &format!(
                    "SELECT {SELLER_COLUMNS} FROM sellers
                     WHERE seller_id = ?1 AND domain = ?2 AND registry_env = ?3"
                ),
                params![seller_id, domain, registry_env],
                seller_from_row,
            )
            .optional()?;
        Ok(seller)
    }

    pub fn get_all_sellers(&self) -> Result<Vec<Seller>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELLER_COLUMNS} FROM sellers ORDER BY registry_env, domain, seller_id"
        ))?;
        let sellers = stmt
            .query_map([], seller_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sellers)
    }

    pub fn get_catalog_state(
        &self,
        seller_id: &str,
        domain: &str,
        registry_env: &str,
    ) -> Result<Option<SellerCatalogState>> {
        let conn = self.lock()?;
        let state = conn
            .query_row(
                &format!(
                    "SELECT {STATE_COLUMNS} FROM seller_catalog_state
                     WHERE seller_id = ?1 AND domain = ?2 AND registry_env = ?3"
                ),
                params![seller_id, domain, registry_env],
                state_from_row,
            )
            .optional()?;
        Ok(state)
    }

    pub fn count_catalog_states(&self, domain: &str, registry_env: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM seller_catalog_state WHERE domain = ?1 AND registry_env = ?2",
            params![domain, registry_env],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Catalog sync status of one seller.
    ///
    /// None if the seller is unknown. A seller without a state row reports
    /// NOT_SYNCED with empty pull fields.
    pub fn get_sync_status(
        &self,
        seller_id: &str,
        domain: &str,
        registry_env: &str,
    ) -> Result<Option<CatalogSyncStatus>> {
        let Some(seller) = self.get_seller(seller_id, domain, registry_env)? else {
            return Ok(None);
        };
        let state = self.get_catalog_state(seller_id, domain, registry_env)?;

        Ok(Some(match state {
            Some(state) => CatalogSyncStatus {
                seller_id: state.seller_id,
                domain: state.domain,
                registry_env: state.registry_env,
                status: state.status,
                last_pull_at: state.last_pull_at,
                last_success_at: state.last_success_at,
                last_error: state.last_error,
                sync_version: state.sync_version,
                registry_last_seen_at: seller.last_seen_in_registry,
            },
            None => CatalogSyncStatus {
                seller_id: seller.seller_id,
                domain: seller.domain,
                registry_env: seller.registry_env,
                status: CatalogStatus::NotSynced,
                last_pull_at: None,
                last_success_at: None,
                last_error: None,
                sync_version: 0,
                registry_last_seen_at: seller.last_seen_in_registry,
            },
        }))
    }

    /// Active sellers whose catalog state is in `statuses`, ordered by id.
    ///
    /// An empty filter means NOT_SYNCED or FAILED. Sellers without a state
    /// row count as NOT_SYNCED. Fetches at most `limit + 1` rows so the
    /// caller can tell whether another page exists.
    pub fn get_pending_sellers(
        &self,
        domain: &str,
        registry_env: &str,
        statuses: &[CatalogStatus],
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SellerInfo>> {
        let statuses = if statuses.is_empty() {
            CatalogStatus::pending_default()
        } else {
            statuses.to_vec()
        };

        let mut args: Vec<Value> = vec![
            Value::Text(domain.to_string()),
            Value::Text(registry_env.to_string()),
        ];
        let mut conditions = Vec::new();
        for status in &statuses {
            args.push(Value::Text(status.as_str().to_string()));
            let placeholder = format!("?{}", args.len());
            if *status == CatalogStatus::NotSynced {
                conditions.push(format!("(scs.status = {placeholder} OR scs.status IS NULL)"));
            } else {
                conditions.push(format!("scs.status = {placeholder}"));
            }
        }
        args.push(Value::Integer(limit as i64 + 1));
        let limit_idx = args.len();
        args.push(Value::Integer(offset as i64));
        let offset_idx = args.len();

        let sql = format!(
            "SELECT s.seller_id, scs.status, scs.last_pull_at, scs.last_success_at, scs.last_error
             FROM sellers AS s
             LEFT JOIN seller_catalog_state AS scs
               ON s.seller_id = scs.seller_id
              AND s.domain = scs.domain
              AND s.registry_env = scs.registry_env
             WHERE s.domain = ?1 AND s.registry_env = ?2 AND s.active = 1
               AND ({})
             ORDER BY s.seller_id
             LIMIT ?{limit_idx} OFFSET ?{offset_idx}",
            conditions.join(" OR ")
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let sellers = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                let status: Option<String> = row.get(1)?;
                let status = match status {
                    Some(raw) => raw.parse::<CatalogStatus>().map_err(|e| conversion_error(1, e))?,
                    None => CatalogStatus::NotSynced,
                };
                Ok(SellerInfo {
                    seller_id: row.get(0)?,
                    status,
                    last_pull_at: opt_ts(row, 2)?,
                    last_success_at: opt_ts(row, 3)?,
                    last_error: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(sellers)
    }

    /// One page of the pending listing; `page` starts at 1.
    pub fn pending_sellers_page(
        &self,
        domain: &str,
        registry_env: &str,
        statuses: &[CatalogStatus],
        limit: usize,
        page: usize,
    ) -> Result<PendingSellersPage> {
        let page = page.max(1);
        let offset = (page - 1) * limit;
        let mut sellers = self.get_pending_sellers(domain, registry_env, statuses, limit, offset)?;

        let has_more = sellers.len() > limit;
        sellers.truncate(limit);

        let status_filter = if statuses.is_empty() {
            CatalogStatus::pending_default()
        } else {
            statuses.to_vec()
        };

        Ok(PendingSellersPage {
            domain: domain.to_string(),
            registry_env: registry_env.to_string(),
            status_filter,
            sellers,
            page: PageInfo { limit, page, has_more },
        })
    }
}

impl SellerRepository for SqliteSellerStore {
    fn insert_sellers(&self, sellers: &[Seller]) -> Result<usize> {
        tracing::info!("Attempting to insert {} new sellers...", sellers.len());

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO sellers ({SELLER_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT (seller_id, domain, registry_env) DO UPDATE SET
                    status = excluded.status,
                    type = excluded.type,
                    subscriber_url = excluded.subscriber_url,
                    country = excluded.country,
                    city = excluded.city,
                    valid_from = excluded.valid_from,
                    valid_until = excluded.valid_until,
                    active = excluded.active,
                    registry_raw = excluded.registry_raw,
                    last_seen_in_reg = excluded.last_seen_in_reg,
                    updated_at = excluded.updated_at"
            ))?;

            for seller in sellers {
                stmt.execute(params![
                    seller.seller_id,
                    seller.domain,
                    seller.registry_env,
                    seller.status,
                    seller.seller_type,
                    seller.subscriber_url,
                    seller.country,
                    seller.city,
                    seller.valid_from.map(|t| t.to_rfc3339()),
                    seller.valid_until.map(|t| t.to_rfc3339()),
                    seller.active,
                    seller.registry_raw,
                    seller.last_seen_in_registry.to_rfc3339(),
                    seller.created_at.to_rfc3339(),
                    seller.updated_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;

        Ok(sellers.len())
    }

    fn update_sellers(&self, sellers: &[Seller]) -> Result<usize> {
        tracing::info!("Attempting to update {} existing sellers...", sellers.len());

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE sellers SET
                    status = ?4,
                    type = ?5,
                    subscriber_url = ?6,
                    country = ?7,
                    city = ?8,
                    valid_from = ?9,
                    valid_until = ?10,
                    active = ?11,
                    registry_raw = ?12,
                    last_seen_in_reg = ?13,
                    updated_at = ?14
                 WHERE seller_id = ?1 AND domain = ?2 AND registry_env = ?3",
            )?;

            for seller in sellers {
                let changed = stmt.execute(params![
                    seller.seller_id,
                    seller.domain,
                    seller.registry_env,
                    seller.status,
                    seller.seller_type,
                    seller.subscriber_url,
                    seller.country,
                    seller.city,
                    seller.valid_from.map(|t| t.to_rfc3339()),
                    seller.valid_until.map(|t| t.to_rfc3339()),
                    seller.active,
                    seller.registry_raw,
                    seller.last_seen_in_registry.to_rfc3339(),
                    seller.updated_at.to_rfc3339(),
                ])?;

                // Dropping `tx` without commit rolls the whole batch back
                if changed == 0 {
                    return Err(SyncError::Persistence(format!(
                        "update matched no row for seller {}",
                        seller.key()
                    )));
                }
            }
        }
        tx.commit()?;

        Ok(sellers.len())
    }

    fn get_active_sellers(&self, domain: &str, registry_env: &str) -> Result<Vec<Seller>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELLER_COLUMNS} FROM sellers
             WHERE domain = ?1 AND registry_env = ?2 AND active = 1"
        ))?;
        let sellers = stmt
            .query_map(params![domain, registry_env], seller_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sellers)
    }

    fn deactivate_sellers(
        &self,
        seller_ids: &[String],
        domain: &str,
        registry_env: &str,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        if seller_ids.is_empty() {
            return Ok(0);
        }
        tracing::info!("Attempting to deactivate {} sellers...", seller_ids.len());

        let now = now.to_rfc3339();
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut changed = 0;

        // Stay well under SQLite's bound-variable limit
        for chunk in seller_ids.chunks(DEACTIVATE_CHUNK_SIZE) {
            let placeholders = (0..chunk.len())
                .map(|i| format!("?{}", i + 4))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE sellers SET active = 0, updated_at = ?1
                 WHERE domain = ?2 AND registry_env = ?3 AND active = 1
                   AND seller_id IN ({placeholders})"
            );

            let args = [now.as_str(), domain, registry_env]
                .into_iter()
                .chain(chunk.iter().map(String::as_str));
            changed += tx.execute(&sql, params_from_iter(args))?;
        }
        tx.commit()?;

        Ok(changed)
    }

    fn upsert_catalog_state(&self, state: &SellerCatalogState) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            &format!(
                "INSERT INTO seller_catalog_state ({STATE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (seller_id, domain, registry_env) DO NOTHING"
            ),
            params![
                state.seller_id,
                state.domain,
                state.registry_env,
                state.status.as_str(),
                state.last_pull_at.map(|t| t.to_rfc3339()),
                state.last_success_at.map(|t| t.to_rfc3339()),
                state.last_error,
                state.sync_version,
                state.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(changed == 1)
    }
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn seller_from_row(row: &Row<'_>) -> rusqlite::Result<Seller> {
    Ok(Seller {
        seller_id: row.get(0)?,
        domain: row.get(1)?,
        registry_env: row.get(2)?,
        status: row.get(3)?,
        seller_type: row.get(4)?,
        subscriber_url: row.get(5)?,
        country: row.get(6)?,
        city: row.get(7)?,
        valid_from: opt_ts(row, 8)?,
        valid_until: opt_ts(row, 9)?,
        active: row.get(10)?,
        registry_raw: row.get(11)?,
        last_seen_in_registry: ts(row, 12)?,
        created_at: ts(row, 13)?,
        updated_at: ts(row, 14)?,
    })
}

fn state_from_row(row: &Row<'_>) -> rusqlite::Result<SellerCatalogState> {
    let status: String = row.get(3)?;
    Ok(SellerCatalogState {
        seller_id: row.get(0)?,
        domain: row.get(1)?,
        registry_env: row.get(2)?,
        status: status.parse().map_err(|e| conversion_error(3, e))?,
        last_pull_at: opt_ts(row, 4)?,
        last_success_at: opt_ts(row, 5)?,
        last_error: row.get(6)?,
        sync_version: row.get(7)?,
        updated_at: ts(row, 8)?,
    })
}
