use super::domain::{
    Candidate, CandidateId, CandidateVoters, Participant, TallyEntry, UserId,
};

/// Storage abstraction so the engine can be exercised against any backend.
///
/// Every mutating method is one atomic unit of work: it either fully applies or
/// leaves the store untouched. Duplicate detection is the backend's key
/// constraint, reported as [`StoreError::Conflict`].
pub trait ElectionStore: Send + Sync {
    /// Current registration flag; `true` when it has never been written.
    fn registration_open(&self) -> Result<bool, StoreError>;

    /// Flip the registration flag to closed. Closing twice is not an error.
    fn close_registration(&self) -> Result<(), StoreError>;

    /// Insert a candidate keyed by the entrant's identity, checking the
    /// registration flag in the same transaction.
    fn insert_candidate(&self, entrant: &Participant) -> Result<Candidate, StoreError>;

    /// All candidates ordered by id.
    fn candidates(&self) -> Result<Vec<Candidate>, StoreError>;

    /// Insert the voter's record. `MissingReference` when the candidate does
    /// not exist, `Conflict` when the voter already has a record.
    fn insert_vote(&self, voter: &Participant, candidate: CandidateId) -> Result<(), StoreError>;

    /// Vote counts per candidate, highest first, ties by ascending candidate id.
    fn tally(&self) -> Result<Vec<TallyEntry>, StoreError>;

    /// Candidates that received votes (by id) with their voters.
    fn voters_by_candidate(&self) -> Result<Vec<CandidateVoters>, StoreError>;

    /// Append a membership event for a user who joined the group.
    fn record_member_joined(&self, member: UserId) -> Result<(), StoreError>;

    /// Drop all election state so a new election can start.
    fn reset(&self) -> Result<(), StoreError>;
}

/// Error enumeration for store failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("referenced record does not exist")]
    MissingReference,
    #[error("registration is closed")]
    RegistrationClosed,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
            {
                Self::Conflict
            }
            rusqlite::Error::SqliteFailure(failure, _)
                if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                Self::MissingReference
            }
            _ => Self::Unavailable(err.to_string()),
        }
    }
}
