use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;
use tempfile::TempDir;

use crate::election::domain::{
    Candidate, CandidateId, CandidateVoters, Participant, TallyEntry, UserId,
};
use crate::election::store::{ElectionStore, StoreError};
use crate::election::{
    election_router, AccessPolicy, ChatRequest, Command, CommandDispatcher, ElectionApi,
    EligibleVoterSet, PollEngine, SqliteStore,
};

pub(super) const ADMIN: i64 = 1;
pub(super) const POLL_CHAT: i64 = -100;

/// A store on a fresh database file. Keep the directory alive for the test.
pub(super) fn sqlite_store() -> (Arc<SqliteStore>, TempDir) {
    let dir = TempDir::new().expect("temp dir");
    let store = SqliteStore::open(dir.path().join("poll.sqlite3")).expect("open store");
    (Arc::new(store), dir)
}

pub(super) fn eligible(ids: &[i64]) -> EligibleVoterSet {
    ids.iter().copied().map(UserId).collect()
}

pub(super) fn engine_with_voters(ids: &[i64]) -> (PollEngine<SqliteStore>, TempDir) {
    let (store, dir) = sqlite_store();
    (PollEngine::new(store, eligible(ids)), dir)
}

pub(super) fn participant(id: i64, name: &str) -> Participant {
    Participant::new(UserId(id), name, Some(name.to_ascii_lowercase()))
}

pub(super) fn access_policy() -> AccessPolicy {
    AccessPolicy::new(UserId(ADMIN), Some(POLL_CHAT))
}

pub(super) fn dispatcher_with_voters(
    ids: &[i64],
) -> (CommandDispatcher<SqliteStore>, TempDir) {
    let (engine, dir) = engine_with_voters(ids);
    (CommandDispatcher::new(engine, access_policy()), dir)
}

pub(super) fn request(caller: Participant, chat_id: i64, command: Command) -> ChatRequest {
    ChatRequest {
        caller,
        chat_id: Some(chat_id),
        command,
    }
}

pub(super) fn router_for<S>(dispatcher: CommandDispatcher<S>, secret: Option<&str>) -> axum::Router
where
    S: ElectionStore + 'static,
{
    election_router(Arc::new(ElectionApi::new(
        dispatcher,
        secret.map(str::to_string),
    )))
}

/// Store double whose backend is always down.
pub(super) struct UnavailableStore;

impl UnavailableStore {
    fn offline<T>() -> Result<T, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

impl ElectionStore for UnavailableStore {
    fn registration_open(&self) -> Result<bool, StoreError> {
        Self::offline()
    }

    fn close_registration(&self) -> Result<(), StoreError> {
        Self::offline()
    }

    fn insert_candidate(&self, _entrant: &Participant) -> Result<Candidate, StoreError> {
        Self::offline()
    }

    fn candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        Self::offline()
    }

    fn insert_vote(&self, _voter: &Participant, _candidate: CandidateId) -> Result<(), StoreError> {
        Self::offline()
    }

    fn tally(&self) -> Result<Vec<TallyEntry>, StoreError> {
        Self::offline()
    }

    fn voters_by_candidate(&self) -> Result<Vec<CandidateVoters>, StoreError> {
        Self::offline()
    }

    fn record_member_joined(&self, _member: UserId) -> Result<(), StoreError> {
        Self::offline()
    }

    fn reset(&self) -> Result<(), StoreError> {
        Self::offline()
    }
}

pub(super) fn unavailable_dispatcher() -> CommandDispatcher<UnavailableStore> {
    let engine = PollEngine::new(Arc::new(UnavailableStore), eligible(&[10, 11]));
    CommandDispatcher::new(engine, access_policy())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
