//! SQLite-backed [`ElectionStore`].
//!
//! Each call opens its own connection so concurrent requests never share a
//! transaction. Mutations run under `BEGIN IMMEDIATE`, which takes the write
//! lock up front; waiting writers are queued by the busy timeout.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::debug;

use super::domain::{
    Candidate, CandidateId, CandidateVoters, MembershipEvent, Participant, TallyEntry, UserId,
    VoterRecord,
};
use super::store::{ElectionStore, StoreError};

const REGISTRATION_OPEN_KEY: &str = "registration_open";
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteStore {
    const SCHEMA: &'static str = r"
        CREATE TABLE IF NOT EXISTS candidates (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            identity     INTEGER NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            handle       TEXT
        );

        CREATE TABLE IF NOT EXISTS votes (
            identity     INTEGER PRIMARY KEY,
            display_name TEXT NOT NULL,
            handle       TEXT,
            candidate_id INTEGER NOT NULL REFERENCES candidates(id)
        );

        CREATE TABLE IF NOT EXISTS settings (
            key   TEXT PRIMARY KEY,
            value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS membership_events (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            identity  INTEGER NOT NULL,
            joined_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_votes_candidate
        ON votes(candidate_id);
    ";

    /// Open (creating if needed) the database at `path` and apply the schema.
    /// Safe to run against an existing database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        };

        let conn = store.connection()?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(Self::SCHEMA)?;
        debug!(path = %store.path.display(), "election store schema ready");

        Ok(store)
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Membership log in the order events were appended.
    pub fn membership_events(&self) -> Result<Vec<MembershipEvent>, StoreError> {
        let conn = self.connection()?;
        let mut stmt =
            conn.prepare("SELECT identity, joined_at FROM membership_events ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            let member: i64 = row.get(0)?;
            let joined_at: DateTime<Utc> = row.get(1)?;
            Ok(MembershipEvent {
                member: UserId(member),
                joined_at,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    fn connection(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(conn)
    }

    fn write_transaction(conn: &mut Connection) -> Result<Transaction<'_>, StoreError> {
        conn.transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)
    }
}

fn registration_flag(conn: &Connection) -> Result<bool, StoreError> {
    let flag = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![REGISTRATION_OPEN_KEY],
            |row| row.get::<_, bool>(0),
        )
        .optional()?;

    Ok(flag.unwrap_or(true))
}

impl ElectionStore for SqliteStore {
    fn registration_open(&self) -> Result<bool, StoreError> {
        let conn = self.connection()?;
        registration_flag(&conn)
    }

    fn close_registration(&self) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let tx = Self::write_transaction(&mut conn)?;
        tx.execute(
            "INSERT INTO settings (key, value) VALUES (?1, 0)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![REGISTRATION_OPEN_KEY],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn insert_candidate(&self, entrant: &Participant) -> Result<Candidate, StoreError> {
        let mut conn = self.connection()?;
        let tx = Self::write_transaction(&mut conn)?;

        if !registration_flag(&tx)? {
            return Err(StoreError::RegistrationClosed);
        }

        tx.execute(
            "INSERT INTO candidates (identity, display_name, handle) VALUES (?1, ?2, ?3)",
            params![entrant.identity.0, &entrant.display_name, &entrant.handle],
        )?;
        let id = CandidateId(tx.last_insert_rowid());
        tx.commit()?;

        Ok(Candidate {
            id,
            identity: entrant.identity,
            display_name: entrant.display_name.clone(),
            handle: entrant.handle.clone(),
        })
    }

    fn candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT id, identity, display_name, handle
             FROM candidates
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Candidate {
                id: CandidateId(row.get(0)?),
                identity: UserId(row.get(1)?),
                display_name: row.get(2)?,
                handle: row.get(3)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    fn insert_vote(&self, voter: &Participant, candidate: CandidateId) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let tx = Self::write_transaction(&mut conn)?;

        // The primary key on `votes.identity` is checked before the foreign key, so a
        // voter with a record gets `Conflict` whatever candidate they name.
        tx.execute(
            "INSERT INTO votes (identity, display_name, handle, candidate_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![voter.identity.0, &voter.display_name, &voter.handle, candidate.0],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn tally(&self) -> Result<Vec<TallyEntry>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.display_name, COUNT(*) AS votes
             FROM votes v
             JOIN candidates c ON c.id = v.candidate_id
             GROUP BY c.id, c.display_name
             ORDER BY votes DESC, c.id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let votes: i64 = row.get(2)?;
            Ok(TallyEntry {
                candidate_id: CandidateId(row.get(0)?),
                candidate_name: row.get(1)?,
                votes: u64::try_from(votes).unwrap_or_default(),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(StoreError::from)
    }

    fn voters_by_candidate(&self) -> Result<Vec<CandidateVoters>, StoreError> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, c.identity, c.display_name, c.handle,
                    v.identity, v.display_name, v.handle
             FROM votes v
             JOIN candidates c ON c.id = v.candidate_id
             ORDER BY c.id ASC, v.rowid ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            let candidate = Candidate {
                id: CandidateId(row.get(0)?),
                identity: UserId(row.get(1)?),
                display_name: row.get(2)?,
                handle: row.get(3)?,
            };
            let voter = VoterRecord {
                voter: UserId(row.get(4)?),
                display_name: row.get(5)?,
                handle: row.get(6)?,
                candidate_id: candidate.id,
            };
            Ok((candidate, voter))
        })?;

        let mut grouped: Vec<CandidateVoters> = Vec::new();
        for row in rows {
            let (candidate, voter) = row?;
            match grouped.last_mut() {
                Some(group) if group.candidate.id == candidate.id => group.voters.push(voter),
                _ => grouped.push(CandidateVoters {
                    candidate,
                    voters: vec![voter],
                }),
            }
        }

        Ok(grouped)
    }

    fn record_member_joined(&self, member: UserId) -> Result<(), StoreError> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO membership_events (identity, joined_at) VALUES (?1, ?2)",
            params![member.0, Utc::now()],
        )?;
        Ok(())
    }

    fn reset(&self) -> Result<(), StoreError> {
        let mut conn = self.connection()?;
        let tx = Self::write_transaction(&mut conn)?;
        tx.execute("DELETE FROM votes", [])?;
        tx.execute("DELETE FROM candidates", [])?;
        tx.execute("DELETE FROM settings", [])?;
        tx.execute(
            "DELETE FROM sqlite_sequence WHERE name = ?1",
            params!["candidates"],
        )?;
        tx.commit()?;
        Ok(())
    }
}
