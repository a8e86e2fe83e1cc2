//! SQLite-backed durable queue metadata.
//!
//! Only metadata survives a restart; the operation closures themselves
//! cannot be persisted. After a crash the leftover rows are visible through
//! `stranded` listing, and resubmitting an operation under a known id adopts
//! the persisted budget so retry limits hold across restarts.

use std::path::{Path, PathBuf};

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};

use crate::clock::unix_timestamp;

/// Queue row state stored as a string in the database. Terminal operations
/// have no row at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Pending,
    Attempting,
    Scheduled,
}

impl QueueState {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueState::Pending => "pending",
            QueueState::Attempting => "attempting",
            QueueState::Scheduled => "scheduled",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "attempting" => QueueState::Attempting,
            "scheduled" => QueueState::Scheduled,
            _ => QueueState::Pending,
        }
    }
}

/// Persisted operation metadata.
#[derive(Debug, Clone)]
pub struct QueueRow {
    pub id: String,
    pub context: String,
    pub retries_left: u32,
    pub attempt_index: u32,
    pub state: QueueState,
    /// Unix seconds at which a scheduled retry becomes due (0 if not scheduled).
    pub due_at: i64,
    pub last_error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

fn row_from(row: &sqlx::sqlite::SqliteRow) -> QueueRow {
    let state: String = row.get("state");
    QueueRow {
        id: row.get("id"),
        context: row.get("context"),
        retries_left: row.get::<i64, _>("retries_left").max(0) as u32,
        attempt_index: row.get::<i64, _>("attempt_index").max(0) as u32,
        state: QueueState::from_str(&state),
        due_at: row.get("due_at"),
        last_error: row.get("last_error"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Percent-encode a path for a sqlite:// URI so spaces and special chars
/// don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the queue database under the XDG state dir
/// (`~/.local/state/tether/queue.db`).
#[derive(Clone)]
pub struct QueueDb {
    pool: Pool<Sqlite>,
}

impl QueueDb {
    pub fn default_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("tether")?;
        Ok(xdg_dirs.get_state_home().join("tether").join("queue.db"))
    }

    /// Open (or create) the default queue database and run migrations.
    pub async fn open_default() -> Result<Self> {
        Self::open_at(Self::default_path()?).await
    }

    /// Open (or create) the database at a specific path. Creates parent dirs
    /// if needed; tests point this at a temp directory.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let db = QueueDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS operations (
                id TEXT PRIMARY KEY,
                context TEXT NOT NULL,
                retries_left INTEGER NOT NULL,
                attempt_index INTEGER NOT NULL DEFAULT 0,
                state TEXT NOT NULL,
                due_at INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a fresh row, or adopt an existing one left over from a
    /// previous run: its remaining budget and attempt count win over the
    /// caller's, so a crash can't reset retry limits. Returns the row as it
    /// now stands.
    pub async fn enqueue(&self, id: &str, context: &str, retries_left: u32) -> Result<QueueRow> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query(
            r#"
            SELECT id, context, retries_left, attempt_index, state, due_at,
                   last_error, created_at, updated_at
            FROM operations
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let row = match existing {
            Some(row) => {
                let mut adopted = row_from(&row);
                sqlx::query(
                    r#"
                    UPDATE operations
                    SET context = ?1,
                        state = 'pending',
                        due_at = 0,
                        updated_at = ?2
                    WHERE id = ?3
                    "#,
                )
                .bind(context)
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                adopted.context = context.to_string();
                adopted.state = QueueState::Pending;
                adopted.due_at = 0;
                adopted.updated_at = now;
                adopted
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO operations (
                        id, context, retries_left, attempt_index, state,
                        due_at, last_error, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, 0, 'pending', 0, NULL, ?4, ?4)
                    "#,
                )
                .bind(id)
                .bind(context)
                .bind(retries_left as i64)
                .bind(now)
                .execute(&mut *tx)
                .await?;
                QueueRow {
                    id: id.to_string(),
                    context: context.to_string(),
                    retries_left,
                    attempt_index: 0,
                    state: QueueState::Pending,
                    due_at: 0,
                    last_error: None,
                    created_at: now,
                    updated_at: now,
                }
            }
        };
        tx.commit().await?;
        Ok(row)
    }

    pub async fn mark_attempting(&self, id: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE operations
            SET state = 'attempting',
                updated_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_scheduled(
        &self,
        id: &str,
        retries_left: u32,
        attempt_index: u32,
        due_at: i64,
        last_error: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE operations
            SET state = 'scheduled',
                retries_left = ?1,
                attempt_index = ?2,
                due_at = ?3,
                last_error = ?4,
                updated_at = ?5
            WHERE id = ?6
            "#,
        )
        .bind(retries_left as i64)
        .bind(attempt_index as i64)
        .bind(due_at)
        .bind(last_error)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a row (operation reached a terminal state). Returns how many
    /// rows went away, so callers can tell a real removal from a no-op.
    pub async fn remove(&self, id: &str) -> Result<u64> {
        let r = sqlx::query(
            r#"
            DELETE FROM operations
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// Normalize rows left in `attempting` back to `pending` (e.g. after a
    /// crash mid-attempt). Returns the number of rows reset.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let r = sqlx::query(
            r#"
            UPDATE operations
            SET state = 'pending',
                due_at = 0,
                updated_at = ?1
            WHERE state = 'attempting'
            "#,
        )
        .bind(unix_timestamp())
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// All rows in submission order.
    pub async fn list_all(&self) -> Result<Vec<QueueRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, context, retries_left, attempt_index, state, due_at,
                   last_error, created_at, updated_at
            FROM operations
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_from).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM operations")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

/// Open an in-memory database for tests (no disk I/O). A single connection
/// keeps every query on the same in-memory instance.
#[cfg(test)]
pub(crate) async fn open_memory() -> Result<QueueDb> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = QueueDb { pool };
    db.migrate().await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_inserts_then_adopts_persisted_budget() {
        let db = open_memory().await.unwrap();

        let fresh = db.enqueue("op-1", "sync:push", 3).await.unwrap();
        assert_eq!(fresh.retries_left, 3);
        assert_eq!(fresh.state, QueueState::Pending);

        db.mark_scheduled("op-1", 1, 2, 12345, "The request timed out")
            .await
            .unwrap();

        // Re-enqueue under the same id: the persisted budget wins.
        let adopted = db.enqueue("op-1", "sync:push", 99).await.unwrap();
        assert_eq!(adopted.retries_left, 1);
        assert_eq!(adopted.attempt_index, 2);
        assert_eq!(adopted.state, QueueState::Pending);
        assert_eq!(adopted.due_at, 0);
        assert_eq!(db.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn recover_resets_only_attempting_rows() {
        let db = open_memory().await.unwrap();
        db.enqueue("a", "ctx", 3).await.unwrap();
        db.enqueue("b", "ctx", 3).await.unwrap();
        db.enqueue("c", "ctx", 3).await.unwrap();
        db.mark_attempting("a").await.unwrap();
        db.mark_scheduled("b", 2, 1, 999, "err").await.unwrap();

        assert_eq!(db.recover_interrupted().await.unwrap(), 1);

        let rows = db.list_all().await.unwrap();
        let state_of = |id: &str| rows.iter().find(|r| r.id == id).unwrap().state;
        assert_eq!(state_of("a"), QueueState::Pending);
        assert_eq!(state_of("b"), QueueState::Scheduled);
        assert_eq!(state_of("c"), QueueState::Pending);
    }

    #[tokio::test]
    async fn remove_reports_whether_a_row_existed() {
        let db = open_memory().await.unwrap();
        db.enqueue("a", "ctx", 3).await.unwrap();
        assert_eq!(db.remove("a").await.unwrap(), 1);
        assert_eq!(db.remove("a").await.unwrap(), 0);
        assert_eq!(db.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_all_preserves_submission_order() {
        let db = open_memory().await.unwrap();
        db.enqueue("first", "ctx", 3).await.unwrap();
        db.enqueue("second", "ctx", 3).await.unwrap();
        db.enqueue("third", "ctx", 3).await.unwrap();

        let ids: Vec<String> = db
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }
}
