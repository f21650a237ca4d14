use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Enumerated fact categories. An expired or inactive fact never reaches a
/// routing decision — [`MemoryStore::recall`] enforces that in the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactType {
    Preference,
    Habit,
    Context,
    System,
    Repair,
}

impl FactType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactType::Preference => "preference",
            FactType::Habit => "habit",
            FactType::Context => "context",
            FactType::System => "system",
            FactType::Repair => "repair",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "preference" => Some(FactType::Preference),
            "habit" => Some(FactType::Habit),
            "context" => Some(FactType::Context),
            "system" => Some(FactType::System),
            "repair" => Some(FactType::Repair),
            _ => None,
        }
    }
}

/// An atomic observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: Uuid,
    pub user: Option<String>,
    pub fact_type: FactType,
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub active: bool,
}

/// Input for [`MemoryStore::insert_fact`].
#[derive(Debug, Clone)]
pub struct NewFact {
    pub user: Option<String>,
    pub fact_type: FactType,
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub source: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewFact {
    pub fn new(fact_type: FactType, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            user: None,
            fact_type,
            key: key.into(),
            value: value.into(),
            confidence: 1.0,
            source: "foreground".into(),
            expires_at: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_expiry(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// A durable, promoted fact. At most one row per (user, key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preference {
    pub user: String,
    pub category: String,
    pub key: String,
    pub value: String,
    pub weight: f64,
    /// Lookup-only back-reference to the originating fact; deleting that
    /// fact does not invalidate the preference.
    pub fact_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

/// One row per build/repair attempt. Append-only — the store exposes no way
/// to mutate a repair row after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairRecord {
    pub id: i64,
    pub target: String,
    pub user: Option<String>,
    pub error: String,
    pub fix_summary: String,
    pub success: bool,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit trail of conversation turns; not used for control
/// decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub session_id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The shared persistent store.
pub struct MemoryStore {
    db: Arc<Mutex<Connection>>,
}

impl MemoryStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> forge_core::Result<Self> {
        info!(?path, "opening memory store");

        let conn = Connection::open(path).map_err(map_err)?;

        // WAL for concurrent readers; foreign keys for the embeddings cascade
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )
        .map_err(map_err)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS facts (
                id TEXT PRIMARY KEY,
                user TEXT,
                fact_type TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                confidence REAL DEFAULT 1.0,
                source TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT,
                active INTEGER DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS preferences (
                user TEXT NOT NULL,
                category TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                weight REAL DEFAULT 1.0,
                fact_id TEXT,
                updated_at TEXT NOT NULL,
                UNIQUE(user, key)
            );

            CREATE TABLE IF NOT EXISTS repairs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                target TEXT NOT NULL,
                user TEXT,
                error TEXT NOT NULL,
                fix_summary TEXT NOT NULL,
                success INTEGER NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS embeddings (
                fact_id TEXT NOT NULL REFERENCES facts(id) ON DELETE CASCADE,
                vector BLOB
            );

            CREATE INDEX IF NOT EXISTS idx_facts_type_key ON facts(fact_type, key);
            CREATE INDEX IF NOT EXISTS idx_facts_active ON facts(active);
            CREATE INDEX IF NOT EXISTS idx_repairs_target ON repairs(target);
            CREATE INDEX IF NOT EXISTS idx_conversations_session ON conversations(session_id);
            ",
        )
        .map_err(map_err)?;

        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> forge_core::Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    /// Raw connection guard (for advanced queries and tests).
    pub fn db(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.db.lock()
    }

    // ── Facts ──────────────────────────────────────────────────

    /// Persist a new active fact. Returns the stored row.
    pub fn insert_fact(&self, new: NewFact) -> forge_core::Result<Fact> {
        let fact = Fact {
            id: Uuid::new_v4(),
            user: new.user,
            fact_type: new.fact_type,
            key: new.key,
            value: new.value,
            confidence: new.confidence,
            source: new.source,
            created_at: Utc::now(),
            expires_at: new.expires_at,
            active: true,
        };
        let db = self.db.lock();
        db.execute(
            "INSERT INTO facts (id, user, fact_type, key, value, confidence, source, created_at, expires_at, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)",
            rusqlite::params![
                fact.id.to_string(),
                fact.user,
                fact.fact_type.as_str(),
                fact.key,
                fact.value,
                fact.confidence,
                fact.source,
                fact.created_at.to_rfc3339(),
                fact.expires_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(map_err)?;
        Ok(fact)
    }

    /// Active, unexpired facts — optionally filtered by type and key.
    /// Expired or deactivated facts never leave this query.
    pub fn recall(
        &self,
        fact_type: Option<FactType>,
        key: Option<&str>,
        limit: usize,
    ) -> forge_core::Result<Vec<Fact>> {
        let db = self.db.lock();
        let now = Utc::now().to_rfc3339();
        let mut stmt = db
            .prepare(
                "SELECT id, user, fact_type, key, value, confidence, source, created_at, expires_at, active
                 FROM facts
                 WHERE active = 1
                   AND (expires_at IS NULL OR expires_at > ?1)
                   AND (?2 IS NULL OR fact_type = ?2)
                   AND (?3 IS NULL OR key = ?3)
                 ORDER BY created_at DESC
                 LIMIT ?4",
            )
            .map_err(map_err)?;
        let rows = stmt
            .query_map(
                rusqlite::params![now, fact_type.map(|t| t.as_str()), key, limit as i64],
                row_to_fact,
            )
            .map_err(map_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Soft-delete a fact (supersession). Returns false when no such row.
    pub fn deactivate_fact(&self, id: Uuid) -> forge_core::Result<bool> {
        let db = self.db.lock();
        let rows = db
            .execute(
                "UPDATE facts SET active = 0 WHERE id = ?1",
                rusqlite::params![id.to_string()],
            )
            .map_err(map_err)?;
        Ok(rows > 0)
    }

    /// Deactivate every fact whose expiry has passed. Returns rows touched.
    pub fn sweep_expired(&self) -> forge_core::Result<usize> {
        let db = self.db.lock();
        let now = Utc::now().to_rfc3339();
        db.execute(
            "UPDATE facts SET active = 0 WHERE active = 1 AND expires_at IS NOT NULL AND expires_at <= ?1",
            rusqlite::params![now],
        )
        .map_err(map_err)
    }

    // ── Preferences ────────────────────────────────────────────

    /// Promote or update a preference. At most one row per (user, key) —
    /// upsert, last write wins.
    pub fn upsert_preference(
        &self,
        user: &str,
        category: &str,
        key: &str,
        value: &str,
        weight: f64,
        fact_id: Option<Uuid>,
    ) -> forge_core::Result<()> {
        let db = self.db.lock();
        let now = Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO preferences (user, category, key, value, weight, fact_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(user, key) DO UPDATE SET
                category = excluded.category,
                value = excluded.value,
                weight = excluded.weight,
                fact_id = excluded.fact_id,
                updated_at = excluded.updated_at",
            rusqlite::params![
                user,
                category,
                key,
                value,
                weight,
                fact_id.map(|f| f.to_string()),
                now
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    pub fn get_preference(&self, user: &str, key: &str) -> forge_core::Result<Option<Preference>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT user, category, key, value, weight, fact_id, updated_at
                 FROM preferences WHERE user = ?1 AND key = ?2",
            )
            .map_err(map_err)?;
        stmt.query_row(rusqlite::params![user, key], row_to_preference)
            .optional()
            .map_err(map_err)
    }

    pub fn list_preferences(&self, user: &str) -> forge_core::Result<Vec<Preference>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT user, category, key, value, weight, fact_id, updated_at
                 FROM preferences WHERE user = ?1 ORDER BY updated_at DESC",
            )
            .map_err(map_err)?;
        let rows = stmt
            .query_map(rusqlite::params![user], row_to_preference)
            .map_err(map_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ── Repair history ─────────────────────────────────────────

    /// Append one repair attempt. There is deliberately no update path.
    pub fn record_repair(
        &self,
        target: &str,
        user: Option<&str>,
        error: &str,
        fix_summary: &str,
        success: bool,
    ) -> forge_core::Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO repairs (target, user, error, fix_summary, success, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                target,
                user,
                error,
                fix_summary,
                success as i32,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(map_err)?;
        Ok(())
    }

    /// Repair attempts for one target, newest first.
    pub fn repairs_for_target(
        &self,
        target: &str,
        limit: usize,
    ) -> forge_core::Result<Vec<RepairRecord>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT id, target, user, error, fix_summary, success, created_at
                 FROM repairs WHERE target = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(map_err)?;
        let rows = stmt
            .query_map(rusqlite::params![target, limit as i64], row_to_repair)
            .map_err(map_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    /// Consecutive trailing failures for a target — used by diagnostics to
    /// flag recurring breakage on the same handler.
    pub fn recent_failure_count(&self, target: &str) -> forge_core::Result<usize> {
        let records = self.repairs_for_target(target, 100)?;
        Ok(records.iter().take_while(|r| !r.success).count())
    }

    // ── Conversation turns ─────────────────────────────────────

    pub fn add_turn(&self, session_id: &str, role: &str, content: &str) -> forge_core::Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO conversations (session_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![session_id, role, content, Utc::now().to_rfc3339()],
        )
        .map_err(map_err)?;
        Ok(())
    }

    /// Most recent turns for a session, oldest first.
    pub fn recent_turns(
        &self,
        session_id: &str,
        limit: usize,
    ) -> forge_core::Result<Vec<ConversationTurn>> {
        let db = self.db.lock();
        let mut stmt = db
            .prepare(
                "SELECT session_id, role, content, created_at FROM
                   (SELECT id, session_id, role, content, created_at
                    FROM conversations WHERE session_id = ?1
                    ORDER BY id DESC LIMIT ?2)
                 ORDER BY id ASC",
            )
            .map_err(map_err)?;
        let rows = stmt
            .query_map(rusqlite::params![session_id, limit as i64], |row| {
                Ok(ConversationTurn {
                    session_id: row.get(0)?,
                    role: row.get(1)?,
                    content: row.get(2)?,
                    created_at: parse_ts(row.get::<_, String>(3)?),
                })
            })
            .map_err(map_err)?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }
}

fn map_err(e: rusqlite::Error) -> forge_core::ForgeError {
    forge_core::ForgeError::Memory(e.to_string())
}

fn parse_ts(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_fact(row: &rusqlite::Row<'_>) -> rusqlite::Result<Fact> {
    Ok(Fact {
        id: row
            .get::<_, String>(0)?
            .parse()
            .unwrap_or_else(|_| Uuid::nil()),
        user: row.get(1)?,
        fact_type: FactType::parse(&row.get::<_, String>(2)?).unwrap_or(FactType::Context),
        key: row.get(3)?,
        value: row.get(4)?,
        confidence: row.get(5)?,
        source: row.get(6)?,
        created_at: parse_ts(row.get::<_, String>(7)?),
        expires_at: row
            .get::<_, Option<String>>(8)?
            .map(|s| parse_ts(s)),
        active: row.get::<_, i64>(9)? != 0,
    })
}

fn row_to_preference(row: &rusqlite::Row<'_>) -> rusqlite::Result<Preference> {
    Ok(Preference {
        user: row.get(0)?,
        category: row.get(1)?,
        key: row.get(2)?,
        value: row.get(3)?,
        weight: row.get(4)?,
        fact_id: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| s.parse().ok()),
        updated_at: parse_ts(row.get::<_, String>(6)?),
    })
}

fn row_to_repair(row: &rusqlite::Row<'_>) -> rusqlite::Result<RepairRecord> {
    Ok(RepairRecord {
        id: row.get(0)?,
        target: row.get(1)?,
        user: row.get(2)?,
        error: row.get(3)?,
        fix_summary: row.get(4)?,
        success: row.get::<_, i64>(5)? != 0,
        created_at: parse_ts(row.get::<_, String>(6)?),
    })
}
