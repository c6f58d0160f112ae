//! DuckDB-backed [`JournalStore`].

use crate::error::{VaultError, VaultResult};
use crate::model::{JournalEntry, UserCredentialRecord};
use crate::store::{JournalStore, RotationCommit};
use duckdb::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

const ENTRY_COLUMNS: &str =
    "id, user_id, content, encrypted_content, is_encrypted, tags_json, mood, created_at";

#[derive(Clone)]
pub struct DuckDbJournalStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbJournalStore {
    /// Opens or creates a store at the given path.
    pub fn open(path: &Path) -> VaultResult<Self> {
        let conn = Connection::open(path)?;
        // DuckDB defaults to ~80% of RAM per connection
        conn.execute_batch("PRAGMA memory_limit='128MB'; PRAGMA threads=2;")?;
        Self::with_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> VaultResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> VaultResult<Self> {
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock_conn(&self) -> VaultResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VaultError::Storage(e.to_string()))
    }

    fn query_entries(&self, sql: &str, user_id: &str) -> VaultResult<Vec<JournalEntry>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![user_id], entry_from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(parse_entry(row?)?);
        }
        Ok(entries)
    }
}

fn initialize_schema(conn: &Connection) -> VaultResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS accounts (
            user_id VARCHAR PRIMARY KEY,
            encryption_salt VARCHAR,
            encryption_key_hash VARCHAR
        );
        CREATE TABLE IF NOT EXISTS journal_entries (
            id VARCHAR PRIMARY KEY,
            user_id VARCHAR NOT NULL,
            content VARCHAR,
            encrypted_content VARCHAR,
            is_encrypted BOOLEAN NOT NULL DEFAULT FALSE,
            tags_json VARCHAR NOT NULL DEFAULT '[]',
            mood VARCHAR,
            created_at BIGINT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_journal_entries_user ON journal_entries(user_id);",
    )?;
    Ok(())
}

/// Raw row; tags stay as JSON until [`parse_entry`].
struct EntryRow {
    id: String,
    user_id: String,
    content: Option<String>,
    encrypted_content: Option<String>,
    is_encrypted: bool,
    tags_json: String,
    mood: Option<String>,
    created_at: i64,
}

fn entry_from_row(row: &Row<'_>) -> duckdb::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        encrypted_content: row.get(3)?,
        is_encrypted: row.get(4)?,
        tags_json: row.get(5)?,
        mood: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn parse_entry(row: EntryRow) -> VaultResult<JournalEntry> {
    let tags: Vec<String> = serde_json::from_str(&row.tags_json)
        .map_err(|e| VaultError::Storage(format!("entry {}: bad tags: {e}", row.id)))?;
    Ok(JournalEntry {
        id: row.id,
        user_id: row.user_id,
        content: row.content,
        encrypted_content: row.encrypted_content,
        is_encrypted: row.is_encrypted,
        tags,
        mood: row.mood,
        created_at: row.created_at,
    })
}

/// Primary-key clash from a writer on another connection to the same file.
fn is_constraint_violation(err: &duckdb::Error) -> bool {
    let message = err.to_string();
    message.contains("Constraint Error") || message.contains("Duplicate key")
}

fn tags_json(entry: &JournalEntry) -> VaultResult<String> {
    serde_json::to_string(&entry.tags).map_err(|e| VaultError::Storage(e.to_string()))
}

/// Runs the statements of a rotation commit. Caller owns BEGIN/COMMIT/ROLLBACK.
fn apply_rotation(conn: &Connection, commit: &RotationCommit) -> VaultResult<()> {
    let current: Option<String> = {
        let mut stmt =
            conn.prepare("SELECT encryption_key_hash FROM accounts WHERE user_id = ?")?;
        let mut rows = stmt.query_map(params![commit.user_id], |row| row.get(0))?;
        match rows.next() {
            Some(hash) => hash?,
            None => return Err(VaultError::AccountNotFound(commit.user_id.clone())),
        }
    };
    if current.as_deref() != Some(commit.previous_key_hash.as_str()) {
        return Err(VaultError::Storage(
            "account key hash changed since rotation was planned".into(),
        ));
    }

    let mut stmt = conn.prepare(
        "UPDATE journal_entries SET encrypted_content = ?
         WHERE id = ? AND user_id = ? AND is_encrypted = TRUE",
    )?;
    for record in &commit.entries {
        let updated = stmt.execute(params![record.token, record.id, commit.user_id])?;
        if updated != 1 {
            return Err(VaultError::EntryNotFound(record.id.clone()));
        }
    }

    conn.execute(
        "UPDATE accounts SET encryption_key_hash = ? WHERE user_id = ?",
        params![commit.new_key_hash, commit.user_id],
    )?;
    Ok(())
}

impl JournalStore for DuckDbJournalStore {
    fn create_account(&self, account: &UserCredentialRecord) -> VaultResult<()> {
        let conn = self.lock_conn()?;
        let existing: i64 = conn.query_row(
            "SELECT COUNT(*) FROM accounts WHERE user_id = ?",
            params![account.user_id],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(VaultError::AccountExists(account.user_id.clone()));
        }
        conn.execute(
            "INSERT INTO accounts (user_id, encryption_salt, encryption_key_hash) VALUES (?, ?, ?)",
            params![
                account.user_id,
                account.encryption_salt,
                account.encryption_key_hash
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                VaultError::AccountExists(account.user_id.clone())
            } else {
                e.into()
            }
        })?;
        Ok(())
    }

    fn account(&self, user_id: &str) -> VaultResult<Option<UserCredentialRecord>> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT user_id, encryption_salt, encryption_key_hash FROM accounts WHERE user_id = ?",
        )?;
        let mut rows = stmt.query_map(params![user_id], |row| {
            Ok(UserCredentialRecord {
                user_id: row.get(0)?,
                encryption_salt: row.get(1)?,
                encryption_key_hash: row.get(2)?,
            })
        })?;
        Ok(rows.next().transpose()?)
    }

    fn insert_entry(&self, entry: &JournalEntry) -> VaultResult<()> {
        let tags = tags_json(entry)?;
        let conn = self.lock_conn()?;
        conn.execute(
            &format!("INSERT INTO journal_entries ({ENTRY_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"),
            params![
                entry.id,
                entry.user_id,
                entry.content,
                entry.encrypted_content,
                entry.is_encrypted,
                tags,
                entry.mood,
                entry.created_at
            ],
        )?;
        Ok(())
    }

    fn entry(&self, user_id: &str, entry_id: &str) -> VaultResult<Option<JournalEntry>> {
        let row = {
            let conn = self.lock_conn()?;
            let mut stmt = conn.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE id = ? AND user_id = ?"
            ))?;
            let mut rows = stmt.query_map(params![entry_id, user_id], entry_from_row)?;
            rows.next().transpose()?
        };
        row.map(parse_entry).transpose()
    }

    fn entries_for_user(&self, user_id: &str) -> VaultResult<Vec<JournalEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE user_id = ?
                 ORDER BY created_at DESC, id DESC"
            ),
            user_id,
        )
    }

    fn encrypted_entries(&self, user_id: &str) -> VaultResult<Vec<JournalEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM journal_entries
                 WHERE user_id = ? AND is_encrypted = TRUE
                 ORDER BY created_at DESC, id DESC"
            ),
            user_id,
        )
    }

    fn update_entry(&self, entry: &JournalEntry) -> VaultResult<()> {
        let tags = tags_json(entry)?;
        let conn = self.lock_conn()?;
        let updated = conn.execute(
            "UPDATE journal_entries
             SET content = ?, encrypted_content = ?, is_encrypted = ?, tags_json = ?, mood = ?
             WHERE id = ? AND user_id = ?",
            params![
                entry.content,
                entry.encrypted_content,
                entry.is_encrypted,
                tags,
                entry.mood,
                entry.id,
                entry.user_id
            ],
        )?;
        if updated == 0 {
            return Err(VaultError::EntryNotFound(entry.id.clone()));
        }
        Ok(())
    }

    fn delete_entry(&self, user_id: &str, entry_id: &str) -> VaultResult<()> {
        let conn = self.lock_conn()?;
        let deleted = conn.execute(
            "DELETE FROM journal_entries WHERE id = ? AND user_id = ?",
            params![entry_id, user_id],
        )?;
        if deleted == 0 {
            return Err(VaultError::EntryNotFound(entry_id.to_string()));
        }
        Ok(())
    }

    fn commit_rotation(&self, commit: &RotationCommit) -> VaultResult<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch("BEGIN TRANSACTION")?;

        match apply_rotation(&conn, commit) {
            Ok(()) => {
                if let Err(e) = conn.execute_batch("COMMIT") {
                    let _ = conn.execute_batch("ROLLBACK");
                    return Err(e.into());
                }
                debug!(user_id = %commit.user_id, entries = commit.entries.len(), "rotation committed");
                Ok(())
            }
            Err(e) => {
                warn!(user_id = %commit.user_id, "rotation commit rolled back");
                let _ = conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }
}
