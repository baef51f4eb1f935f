use crate::command::{Command, Step};
use crate::config::Config;
use crate::error::StoreError;
use anyhow::Result;
use libsql::{Builder, Connection, Database as LibsqlDatabase};
use std::path::Path;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

const SYSTEM_MIGRATIONS: &[(&str, &str)] =
    &[("system/000_migrations_table.sql", include_str!("migrations/system/000_migrations_table.sql"))];

const MIGRATIONS: &[(&str, &str)] = &[
    ("001_schema.sql", include_str!("migrations/001_schema.sql")),
    ("002_username_normalized.sql", include_str!("migrations/002_username_normalized.sql")),
];

/// One shared connection. Writers and the list reads take `tx_lock`, whose value records
/// whether a transaction is open on the connection.
pub struct Database {
    db: LibsqlDatabase,
    conn: Connection,
    tx_lock: Mutex<bool>,
    turso_url: Option<String>,
    turso_auth_token: Option<String>,
}

/// An open transaction holding the database lock. Dropping it without
/// [`Database::finish`] leaves the rollback to the next lock holder.
pub(crate) struct Transaction<'a> {
    open: MutexGuard<'a, bool>,
}

impl Database {
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn is_replica(turso_url: &Option<String>, turso_auth_token: &Option<String>) -> bool {
        turso_url.is_some() && turso_auth_token.is_some()
    }

    pub async fn sync(&self) -> Result<()> {
        if Self::is_replica(&self.turso_url, &self.turso_auth_token) {
            self.db
                .sync()
                .await
                .map_err(|e| anyhow::anyhow!("sync failed: {}", e))?;
        }
        Ok(())
    }

    async fn is_migration_applied(conn: &Connection, name: &str) -> Result<bool> {
        let query = "SELECT 1 FROM _migrations WHERE name = ?";
        match conn.query(query, libsql::params![name]).await {
            Ok(mut rows) => Ok(rows.next().await?.is_some()),
            Err(e) => {
                if e.to_string().contains("no such table") {
                    Ok(false)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn record_migration(conn: &Connection, name: &str) -> Result<()> {
        let query = r#"
            INSERT INTO _migrations (name, applied_at)
            VALUES (?, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#;
        conn.execute(query, libsql::params![name]).await?;
        Ok(())
    }

    async fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
        if Self::is_migration_applied(conn, name).await? {
            tracing::debug!(migration = name, "migration already applied, skipping");
            return Ok(());
        }

        tracing::info!(migration = name, "applying migration");
        conn.execute_batch(sql)
            .await
            .map_err(|e| anyhow::anyhow!("failed to execute migration {name}: {e}"))?;

        Self::record_migration(conn, name).await?;
        Ok(())
    }

    pub async fn new(cfg: &Config, data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(cfg.app.get_db());
        let turso_url = cfg.app.turso_url.clone();
        let turso_auth_token = cfg.app.turso_auth_token.clone();

        let db = match (&turso_url, &turso_auth_token) {
            (Some(url), Some(token)) => {
                tracing::info!("[db] running in synced database mode (offline writes)");
                let sync_interval = Duration::from_secs(cfg.app.sync_interval_seconds);
                Builder::new_synced_database(&path, url.clone(), token.clone())
                    .sync_interval(sync_interval)
                    .build()
                    .await?
            }
            _ => {
                tracing::info!(path = ?path, "[db] running in local mode");
                Builder::new_local(&path).build().await?
            }
        };

        Self::init(db, turso_url, turso_auth_token).await
    }

    /// A throwaway database with the full schema applied.
    pub async fn open_in_memory() -> Result<Self> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::init(db, None, None).await
    }

    async fn init(
        db: LibsqlDatabase,
        turso_url: Option<String>,
        turso_auth_token: Option<String>,
    ) -> Result<Self> {
        let conn = db.connect()?;
        conn.query("SELECT 1", ()).await?;

        for (filename, sql) in SYSTEM_MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        for (filename, sql) in MIGRATIONS {
            Self::run_migration(&conn, filename, sql).await?;
        }

        Ok(Database {
            db,
            conn,
            tx_lock: Mutex::new(false),
            turso_url,
            turso_auth_token,
        })
    }

    /// Takes the lock. A transaction still marked open was left behind by a
    /// cancelled caller and is rolled back first.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, bool> {
        let mut open = self.tx_lock.lock().await;
        if *open {
            tracing::warn!("rolling back transaction abandoned by a cancelled request");
            if let Err(e) = self.conn.execute("ROLLBACK", ()).await {
                tracing::warn!(error = %e, "rollback of abandoned transaction failed");
            }
            *open = false;
        }
        open
    }

    /// Takes the lock and opens a transaction. Pair with [`Database::finish`].
    pub(crate) async fn begin(&self) -> Result<Transaction<'_>, StoreError> {
        let mut open = self.lock().await;
        *open = true;
        if let Err(e) = self.conn.execute("BEGIN TRANSACTION", ()).await {
            *open = false;
            return Err(e.into());
        }
        Ok(Transaction { open })
    }

    /// Commits on success, rolls back on error.
    ///
    /// A failed COMMIT or ROLLBACK leaves the transaction marked open for the next [`Database::lock`].
    pub(crate) async fn finish<T>(&self, mut tx: Transaction<'_>, result: Result<T, StoreError>) -> Result<T, StoreError> {
        match result {
            Ok(value) => {
                self.conn.execute("COMMIT", ()).await?;
                *tx.open = false;
                Ok(value)
            }
            Err(e) => {
                match self.conn.execute("ROLLBACK", ()).await {
                    Ok(_) => *tx.open = false,
                    Err(rollback) => tracing::error!(error = %rollback, "rollback failed"),
                }
                Err(e)
            }
        }
    }

    /// Applies `commands` as one atomic unit.
    pub async fn apply_atomically(&self, commands: &[Command]) -> Result<(), StoreError> {
        let tx = self.begin().await?;
        let result = self.apply(commands).await;
        self.finish(tx, result).await
    }

    /// Applies `commands` in order. Callers must hold an open transaction.
    pub(crate) async fn apply(&self, commands: &[Command]) -> Result<(), StoreError> {
        for command in commands {
            self.apply_command(command).await?;
        }
        Ok(())
    }

    /// Returns the number of rows the command's statement touched.
    pub(crate) async fn apply_command(&self, command: &Command) -> Result<u64, StoreError> {
        let changed = match command {
            Command::InsertUrl {
                id,
                compound_hash,
                metadata,
            } => {
                let metadata_json = serde_json::to_string(metadata)?;
                self.conn
                    .execute(
                        r#"
                        INSERT INTO urls (id, url, compound_hash, metadata)
                        VALUES (?, ?, ?, ?)
                        ON CONFLICT(compound_hash) DO NOTHING
                        "#,
                        libsql::params![id.as_str(), metadata.url.as_str(), compound_hash.as_str(), metadata_json],
                    )
                    .await?
            }
            Command::BumpUrlHash { compound_hash } => {
                self.adjust_counter("url_hashes", "count", "compound_hash", compound_hash.as_str(), Step::Increment)
                    .await?
            }
            Command::InsertUrlHash {
                compound_hash,
                url_hash,
            } => {
                self.conn
                    .execute(
                        "INSERT INTO url_hashes (compound_hash, url_hash, count) VALUES (?, ?, 1)",
                        libsql::params![compound_hash.as_str(), url_hash.as_str()],
                    )
                    .await?
            }
            Command::BumpUrlHashVariants { url_hash } => {
                self.conn
                    .execute(
                        r#"
                        INSERT INTO url_hash_variants (url_hash, compound_hashes_count)
                        VALUES (?, 0)
                        ON CONFLICT(url_hash) DO NOTHING
                        "#,
                        libsql::params![url_hash.as_str()],
                    )
                    .await?;
                self.adjust_counter(
                    "url_hash_variants",
                    "compound_hashes_count",
                    "url_hash",
                    url_hash.as_str(),
                    Step::Increment,
                )
                .await?
            }
            Command::InsertUserUrl { id, user_id, url_id } => {
                self.conn
                    .execute(
                        "INSERT INTO user_urls (id, user_id, url_id) VALUES (?, ?, ?)",
                        libsql::params![id.as_str(), user_id.as_str(), url_id.as_str()],
                    )
                    .await?
            }
            Command::Attach {
                user_url_id,
                label,
                order,
            } => {
                let kind = label.kind();
                let query = format!(
                    "INSERT INTO {} (user_url_id, {}, position) VALUES (?, ?, ?)",
                    kind.join_table(),
                    kind.join_column()
                );
                self.conn
                    .execute(&query, libsql::params![user_url_id.as_str(), label.as_str(), i64::from(*order)])
                    .await?
            }
            Command::Detach { user_url_id, label } => {
                let kind = label.kind();
                let query = format!(
                    "DELETE FROM {} WHERE user_url_id = ? AND {} = ?",
                    kind.join_table(),
                    kind.join_column()
                );
                self.conn
                    .execute(&query, libsql::params![user_url_id.as_str(), label.as_str()])
                    .await?
            }
            Command::AdjustUsage { label, step } => {
                self.adjust_counter(label.kind().table(), "usage_count", "id", label.as_str(), *step)
                    .await?
            }
            Command::AdjustProfile {
                user_id,
                counter,
                step,
            } => {
                self.adjust_counter("profiles", counter.column(), "user_id", user_id.as_str(), *step)
                    .await?
            }
            Command::AdjustLikes { user_url_id, step } => {
                self.adjust_counter("user_urls", "likes_count", "id", user_url_id.as_str(), *step)
                    .await?
            }
            Command::InsertLike { user_url_id, user_id } => {
                self.conn
                    .execute(
                        "INSERT INTO likes (user_url_id, user_id) VALUES (?, ?)",
                        libsql::params![user_url_id.as_str(), user_id.as_str()],
                    )
                    .await?
            }
            Command::DeleteLike { user_url_id, user_id } => {
                self.conn
                    .execute(
                        "DELETE FROM likes WHERE user_url_id = ? AND user_id = ?",
                        libsql::params![user_url_id.as_str(), user_id.as_str()],
                    )
                    .await?
            }
            Command::InsertFollow {
                follower_id,
                following_id,
            } => {
                self.conn
                    .execute(
                        "INSERT INTO follows (follower_id, following_id) VALUES (?, ?)",
                        libsql::params![follower_id.as_str(), following_id.as_str()],
                    )
                    .await?
            }
            Command::DeleteFollow {
                follower_id,
                following_id,
            } => {
                self.conn
                    .execute(
                        "DELETE FROM follows WHERE follower_id = ? AND following_id = ?",
                        libsql::params![follower_id.as_str(), following_id.as_str()],
                    )
                    .await?
            }
            Command::InsertFeedEntry {
                id,
                user_id,
                user_url_id,
            } => {
                self.conn
                    .execute(
                        "INSERT INTO feeds (id, user_id, user_url_id) VALUES (?, ?, ?)",
                        libsql::params![id.as_str(), user_id.as_str(), user_url_id.as_str()],
                    )
                    .await?
            }
        };

        Ok(changed)
    }

    /// Read-modify-write of a denormalized counter using [`Step::apply`].
    ///
    /// A missing row is skipped; a decrement at zero stays at zero.
    async fn adjust_counter(
        &self,
        table: &str,
        column: &str,
        key_column: &str,
        key: &str,
        step: Step,
    ) -> Result<u64, StoreError> {
        let current: i64 = {
            let select = format!("SELECT {column} FROM {table} WHERE {key_column} = ?");
            let mut rows = self.conn.query(&select, libsql::params![key]).await?;
            match rows.next().await? {
                Some(row) => row.get(0)?,
                None => {
                    tracing::debug!(table, key, "counter row missing, skipping adjustment");
                    return Ok(0);
                }
            }
        };

        let current = u32::try_from(current.max(0)).unwrap_or(u32::MAX);
        if step == Step::Decrement && current == 0 {
            tracing::debug!(table, column, key, "counter already at zero, clamping decrement");
        }
        let next = step.apply(current);

        let update = format!("UPDATE {table} SET {column} = ? WHERE {key_column} = ?");
        let changed = self
            .conn
            .execute(&update, libsql::params![i64::from(next), key])
            .await?;
        Ok(changed)
    }

    /// Reads a single integer counter. Used by the stores and tests.
    pub(crate) async fn read_counter(
        &self,
        table: &str,
        column: &str,
        key_column: &str,
        key: &str,
    ) -> Result<Option<u32>, StoreError> {
        let select = format!("SELECT {column} FROM {table} WHERE {key_column} = ?");
        let mut rows = self.conn.query(&select, libsql::params![key]).await?;
        match rows.next().await? {
            Some(row) => {
                let value: i64 = row.get(0)?;
                Ok(Some(u32::try_from(value.max(0)).unwrap_or(u32::MAX)))
            }
            None => Ok(None),
        }
    }
}
