//! SQLite implementation of the store traits.
//!
//! The primary backend. Uses rusqlite with bundled SQLite, wrapped in
//! async via tokio::spawn_blocking. Records persist in their wire (JSON +
//! base64) form, so every read re-validates the stored field lengths.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use sealmint_core::{
    compute_integrity_hash, wire, ChannelData, EncryptedMetadataRecord, Policy, PolicyId,
    PromoData, RecipientPublicKey, TokenId, WalletAddress,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{check_policy_params, Merchant, MetadataStore, PolicyStore};

/// SQLite-based store implementing both [`PolicyStore`] and
/// [`MetadataStore`].
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking to
/// avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn poisoned(msg: impl std::fmt::Display) -> StoreError {
    StoreError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
        Some(format!("mutex poisoned: {}", msg)),
    ))
}

fn join_failed(msg: impl std::fmt::Display) -> StoreError {
    StoreError::Database(rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
        Some(format!("spawn_blocking failed: {}", msg)),
    ))
}

/// Run a closure on the connection inside spawn_blocking.
async fn with_conn<T, F>(conn: Arc<Mutex<Connection>>, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let conn = conn.lock().map_err(|e| poisoned(e))?;
        f(&conn)
    })
    .await
    .map_err(|e| join_failed(e))?
}

// Helper to convert a row to Policy
fn row_to_policy(row: &rusqlite::Row<'_>) -> rusqlite::Result<Policy> {
    let policy_id: String = row.get("policy_id")?;
    let delegatee_bytes: Vec<u8> = row.get("delegatee")?;

    let delegatee: [u8; 32] = delegatee_bytes.try_into().map_err(|_| {
        rusqlite::Error::InvalidColumnType(1, "delegatee".into(), rusqlite::types::Type::Blob)
    })?;

    Ok(Policy {
        policy_id: PolicyId::new(policy_id),
        delegatee: RecipientPublicKey::from_bytes(delegatee),
        ttl_seconds: row.get::<_, i64>("ttl_seconds")? as u64,
        max_reencryptions: row.get::<_, i64>("max_reencryptions")? as u32,
        created_at: row.get("created_at")?,
        reencryption_count: row.get::<_, i64>("reencryption_count")? as u32,
    })
}

fn load_record(conn: &Connection, token_id: &TokenId) -> Result<Option<EncryptedMetadataRecord>> {
    let json: Option<String> = conn
        .query_row(
            "SELECT record_json FROM records WHERE token_id = ?1",
            params![token_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    match json {
        Some(json) => Ok(Some(wire::from_json(&json)?)),
        None => Ok(None),
    }
}

fn save_record(conn: &Connection, record: &EncryptedMetadataRecord) -> Result<()> {
    let json = wire::to_json(record)?;
    conn.execute(
        "INSERT INTO records (token_id, owner, record_json) VALUES (?1, ?2, ?3)
         ON CONFLICT(token_id) DO UPDATE SET
             owner = excluded.owner,
             record_json = excluded.record_json",
        params![record.token_id.as_str(), record.owner.as_str(), json],
    )?;
    Ok(())
}

#[async_trait]
impl PolicyStore for SqliteStore {
    async fn create_policy(
        &self,
        policy_id: &PolicyId,
        delegatee: &RecipientPublicKey,
        ttl_seconds: u64,
        max_reencryptions: u32,
    ) -> Result<Policy> {
        check_policy_params(ttl_seconds, max_reencryptions)?;

        let policy_id = policy_id.clone();
        let delegatee = *delegatee;

        with_conn(self.conn.clone(), move |conn| {
            // Upsert: attributes are overwritten, created_at and the usage
            // counter are preserved for an existing id.
            conn.execute(
                "INSERT INTO policies (
                    policy_id, delegatee, ttl_seconds, max_reencryptions,
                    created_at, reencryption_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, 0)
                ON CONFLICT(policy_id) DO UPDATE SET
                    delegatee = excluded.delegatee,
                    ttl_seconds = excluded.ttl_seconds,
                    max_reencryptions = excluded.max_reencryptions",
                params![
                    policy_id.as_str(),
                    delegatee.as_bytes().as_slice(),
                    ttl_seconds as i64,
                    max_reencryptions as i64,
                    now_seconds(),
                ],
            )?;

            let policy = conn.query_row(
                "SELECT policy_id, delegatee, ttl_seconds, max_reencryptions,
                        created_at, reencryption_count
                 FROM policies WHERE policy_id = ?1",
                params![policy_id.as_str()],
                row_to_policy,
            )?;

            tracing::debug!(%policy_id, ttl_seconds, max_reencryptions, "policy upserted");
            Ok(policy)
        })
        .await
    }

    async fn put_policy(&self, policy: &Policy) -> Result<()> {
        let policy = policy.clone();

        with_conn(self.conn.clone(), move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO policies (
                    policy_id, delegatee, ttl_seconds, max_reencryptions,
                    created_at, reencryption_count
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    policy.policy_id.as_str(),
                    policy.delegatee.as_bytes().as_slice(),
                    policy.ttl_seconds as i64,
                    policy.max_reencryptions as i64,
                    policy.created_at,
                    policy.reencryption_count as i64,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_policy(&self, policy_id: &PolicyId) -> Result<Option<Policy>> {
        let policy_id = policy_id.clone();

        with_conn(self.conn.clone(), move |conn| {
            let policy = conn
                .query_row(
                    "SELECT policy_id, delegatee, ttl_seconds, max_reencryptions,
                            created_at, reencryption_count
                     FROM policies WHERE policy_id = ?1",
                    params![policy_id.as_str()],
                    row_to_policy,
                )
                .optional()?;
            Ok(policy)
        })
        .await
    }

    async fn reserve_reencryption(&self, policy_id: &PolicyId) -> Result<Option<u32>> {
        let policy_id = policy_id.clone();

        with_conn(self.conn.clone(), move |conn| {
            // Limit check and increment in one guarded UPDATE; no
            // read-modify-write race between concurrent grants.
            let updated = conn.execute(
                "UPDATE policies SET reencryption_count = reencryption_count + 1
                 WHERE policy_id = ?1 AND reencryption_count < max_reencryptions",
                params![policy_id.as_str()],
            )?;

            if updated == 0 {
                // Distinguish a missing policy from an exhausted one.
                let exists: bool = conn.query_row(
                    "SELECT COUNT(*) > 0 FROM policies WHERE policy_id = ?1",
                    params![policy_id.as_str()],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(StoreError::PolicyNotFound(policy_id.clone()));
                }
                return Ok(None);
            }

            let count: i64 = conn.query_row(
                "SELECT reencryption_count FROM policies WHERE policy_id = ?1",
                params![policy_id.as_str()],
                |row| row.get(0),
            )?;
            Ok(Some(count as u32))
        })
        .await
    }

    async fn release_reencryption(&self, policy_id: &PolicyId) -> Result<()> {
        let policy_id = policy_id.clone();

        with_conn(self.conn.clone(), move |conn| {
            let updated = conn.execute(
                "UPDATE policies SET reencryption_count = reencryption_count - 1
                 WHERE policy_id = ?1 AND reencryption_count > 0",
                params![policy_id.as_str()],
            )?;

            if updated == 0 {
                let exists: bool = conn.query_row(
                    "SELECT COUNT(*) > 0 FROM policies WHERE policy_id = ?1",
                    params![policy_id.as_str()],
                    |row| row.get(0),
                )?;
                if !exists {
                    return Err(StoreError::PolicyNotFound(policy_id.clone()));
                }
            }
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn store_user_data(
        &self,
        token_id: &TokenId,
        owner: &WalletAddress,
        user_data: ChannelData,
        preview: serde_json::Value,
    ) -> Result<EncryptedMetadataRecord> {
        let token_id = token_id.clone();
        let owner = owner.clone();

        with_conn(self.conn.clone(), move |conn| {
            let record = match load_record(conn, &token_id)? {
                Some(existing) => {
                    let mut updated = existing;
                    updated.owner = owner;
                    updated.user_data_hash = compute_integrity_hash(&user_data);
                    updated.user_data = user_data;
                    updated.preview = preview;
                    updated
                }
                None => EncryptedMetadataRecord::new(token_id.clone(), owner, user_data, preview),
            };

            save_record(conn, &record)?;
            Ok(record)
        })
        .await
    }

    async fn store_promo_data(
        &self,
        token_id: &TokenId,
        promo: PromoData,
    ) -> Result<EncryptedMetadataRecord> {
        let token_id = token_id.clone();

        with_conn(self.conn.clone(), move |conn| {
            let mut record = load_record(conn, &token_id)?
                .ok_or_else(|| StoreError::RecordNotFound(token_id.clone()))?;

            record.promo_data = Some(promo);
            save_record(conn, &record)?;
            Ok(record)
        })
        .await
    }

    async fn get_by_token(&self, token_id: &TokenId) -> Result<Option<EncryptedMetadataRecord>> {
        let token_id = token_id.clone();
        with_conn(self.conn.clone(), move |conn| load_record(conn, &token_id)).await
    }

    async fn get_by_owner(&self, owner: &WalletAddress) -> Result<Vec<EncryptedMetadataRecord>> {
        let owner = owner.clone();

        with_conn(self.conn.clone(), move |conn| {
            let mut stmt =
                conn.prepare("SELECT record_json FROM records WHERE owner = ?1 ORDER BY token_id")?;
            let rows = stmt.query_map(params![owner.as_str()], |row| row.get::<_, String>(0))?;

            let mut records = Vec::new();
            for json in rows {
                records.push(wire::from_json(&json?)?);
            }
            Ok(records)
        })
        .await
    }

    async fn transfer_ownership(
        &self,
        token_id: &TokenId,
        new_owner: &WalletAddress,
    ) -> Result<EncryptedMetadataRecord> {
        let token_id = token_id.clone();
        let new_owner = new_owner.clone();

        with_conn(self.conn.clone(), move |conn| {
            let mut record = load_record(conn, &token_id)?
                .ok_or_else(|| StoreError::RecordNotFound(token_id.clone()))?;

            record.owner = new_owner.clone();
            save_record(conn, &record)?;

            tracing::debug!(%token_id, %new_owner, "ownership transferred");
            Ok(record)
        })
        .await
    }

    async fn resolve_merchant(&self, name: &str) -> Result<Merchant> {
        let name = name.to_string();

        with_conn(self.conn.clone(), move |conn| {
            // Atomic insert-if-absent; concurrent callers converge on the
            // row whichever INSERT wins.
            conn.execute(
                "INSERT OR IGNORE INTO merchants (name, created_at) VALUES (?1, ?2)",
                params![name, now_seconds()],
            )?;

            let merchant = conn.query_row(
                "SELECT name, created_at FROM merchants WHERE name = ?1",
                params![name],
                |row| {
                    Ok(Merchant {
                        name: row.get(0)?,
                        created_at: row.get(1)?,
                    })
                },
            )?;
            Ok(merchant)
        })
        .await
    }
}

/// Get current time in Unix seconds.
fn now_seconds() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealmint_core::{engine, Capsule};

    fn make_channel(policy: &str) -> ChannelData {
        let (payload, _) = engine::encrypt(b"sqlite payload").unwrap();
        ChannelData {
            capsule: Capsule::from_bytes(vec![5, 5, 5]),
            payload,
            policy_id: PolicyId::new(policy),
        }
    }

    fn delegatee() -> RecipientPublicKey {
        RecipientPublicKey::from_bytes([0x33; 32])
    }

    #[tokio::test]
    async fn test_policy_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let id = PolicyId::new("p1");

        let created = store
            .create_policy(&id, &delegatee(), 3600, 5)
            .await
            .unwrap();
        let loaded = store.get_policy(&id).await.unwrap().unwrap();
        assert_eq!(created, loaded);
    }

    #[tokio::test]
    async fn test_policy_upsert_preserves_created_at_and_count() {
        let store = SqliteStore::open_memory().unwrap();
        let id = PolicyId::new("p1");

        let first = store
            .create_policy(&id, &delegatee(), 3600, 5)
            .await
            .unwrap();
        store.reserve_reencryption(&id).await.unwrap();

        let second = store
            .create_policy(&id, &delegatee(), 60, 1)
            .await
            .unwrap();
        assert_eq!(second.created_at, first.created_at);
        assert_eq!(second.reencryption_count, 1);
        assert_eq!(second.ttl_seconds, 60);
    }

    #[tokio::test]
    async fn test_record_roundtrip_through_wire_json() {
        let store = SqliteStore::open_memory().unwrap();
        let token = TokenId::new("42");
        let owner = WalletAddress::new("0xAAA");

        let stored = store
            .store_user_data(
                &token,
                &owner,
                make_channel("p1"),
                serde_json::json!({"merchant": "Deli"}),
            )
            .await
            .unwrap();

        let loaded = store.get_by_token(&token).await.unwrap().unwrap();
        assert_eq!(stored, loaded);
        assert!(loaded.verify_integrity());
    }

    #[tokio::test]
    async fn test_reserve_stops_at_limit() {
        let store = SqliteStore::open_memory().unwrap();
        let id = PolicyId::new("p1");
        store
            .create_policy(&id, &delegatee(), 3600, 2)
            .await
            .unwrap();

        assert_eq!(store.reserve_reencryption(&id).await.unwrap(), Some(1));
        assert_eq!(store.reserve_reencryption(&id).await.unwrap(), Some(2));
        assert_eq!(store.reserve_reencryption(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reserve_missing_policy() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(matches!(
            store.reserve_reencryption(&PolicyId::new("nope")).await,
            Err(StoreError::PolicyNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_release_frees_a_reserved_use() {
        let store = SqliteStore::open_memory().unwrap();
        let id = PolicyId::new("p1");
        store
            .create_policy(&id, &delegatee(), 3600, 1)
            .await
            .unwrap();

        assert_eq!(store.reserve_reencryption(&id).await.unwrap(), Some(1));
        assert_eq!(store.reserve_reencryption(&id).await.unwrap(), None);

        store.release_reencryption(&id).await.unwrap();
        assert_eq!(store.reserve_reencryption(&id).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_promo_requires_existing_record() {
        let store = SqliteStore::open_memory().unwrap();
        let promo = PromoData {
            data: make_channel("p2"),
            expires_at: i64::MAX,
        };

        assert!(matches!(
            store.store_promo_data(&TokenId::new("nope"), promo).await,
            Err(StoreError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_transfer_does_not_touch_ciphertext() {
        let store = SqliteStore::open_memory().unwrap();
        let token = TokenId::new("42");

        store
            .store_user_data(
                &token,
                &WalletAddress::new("0xaaa"),
                make_channel("p1"),
                serde_json::Value::Null,
            )
            .await
            .unwrap();

        let before = store.get_by_token(&token).await.unwrap().unwrap();
        store
            .transfer_ownership(&token, &WalletAddress::new("0xbbb"))
            .await
            .unwrap();
        let after = store.get_by_token(&token).await.unwrap().unwrap();

        assert_eq!(
            before.user_data.payload.ciphertext,
            after.user_data.payload.ciphertext
        );
        assert_eq!(after.owner, WalletAddress::new("0xbbb"));
    }

    #[tokio::test]
    async fn test_resolve_merchant_concurrent() {
        let store = Arc::new(SqliteStore::open_memory().unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.resolve_merchant("Cafe Luna").await.unwrap()
            }));
        }

        let mut merchants = Vec::new();
        for handle in handles {
            merchants.push(handle.await.unwrap());
        }

        let first = &merchants[0];
        assert!(merchants.iter().all(|m| m == first));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sealmint.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store
                .store_user_data(
                    &TokenId::new("1"),
                    &WalletAddress::new("0xaaa"),
                    make_channel("p1"),
                    serde_json::Value::Null,
                )
                .await
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let record = store.get_by_token(&TokenId::new("1")).await.unwrap();
        assert!(record.is_some());
    }
}
