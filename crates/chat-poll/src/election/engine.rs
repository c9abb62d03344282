use std::sync::Arc;

use tracing::{debug, error, info};

use super::domain::{
    Candidate, CandidateId, CandidateVoters, Participant, PollPhase, TallyEntry, UserId,
};
use super::eligibility::EligibleVoterSet;
use super::store::{ElectionStore, StoreError};

/// Poll & voting engine composing the store and the eligible voter set.
///
/// The engine holds no mutable state of its own; every request is an
/// independent unit of work against the store.
pub struct PollEngine<S> {
    store: Arc<S>,
    eligible: Arc<EligibleVoterSet>,
}

impl<S> Clone for PollEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            eligible: Arc::clone(&self.eligible),
        }
    }
}

impl<S> PollEngine<S>
where
    S: ElectionStore + 'static,
{
    pub fn new(store: Arc<S>, eligible: EligibleVoterSet) -> Self {
        Self {
            store,
            eligible: Arc::new(eligible),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn eligible_voters(&self) -> &EligibleVoterSet {
        &self.eligible
    }

    pub fn is_registration_open(&self) -> Result<bool, PollError> {
        self.store.registration_open().map_err(unavailable)
    }

    pub fn phase(&self) -> Result<PollPhase, PollError> {
        self.is_registration_open()
            .map(PollPhase::from_registration_flag)
    }

    /// One-way transition `Open -> Closed`.
    pub fn close_registration(&self) -> Result<(), PollError> {
        self.store.close_registration().map_err(unavailable)?;
        info!("candidate registration closed");
        Ok(())
    }

    /// Enter `entrant` as a candidate, returning the assigned id.
    pub fn register(&self, entrant: &Participant) -> Result<CandidateId, PollError> {
        match self.store.insert_candidate(entrant) {
            Ok(candidate) => {
                info!(
                    identity = %entrant.identity,
                    candidate_id = %candidate.id,
                    "candidate registered"
                );
                Ok(candidate.id)
            }
            Err(StoreError::Conflict) => {
                debug!(identity = %entrant.identity, "candidate already registered");
                Err(PollError::AlreadyRegistered)
            }
            Err(StoreError::RegistrationClosed) => {
                debug!(identity = %entrant.identity, "registration attempt after close");
                Err(PollError::RegistrationClosed)
            }
            Err(other) => Err(unavailable(other)),
        }
    }

    pub fn list_candidates(&self) -> Result<Vec<Candidate>, PollError> {
        self.store.candidates().map_err(unavailable)
    }

    /// Record `voter`'s single vote for `candidate`.
    pub fn cast_vote(&self, voter: &Participant, candidate: CandidateId) -> Result<(), PollError> {
        if !self.eligible.contains(voter.identity) {
            debug!(identity = %voter.identity, "vote from ineligible identity");
            return Err(PollError::NotEligible);
        }

        match self.store.insert_vote(voter, candidate) {
            Ok(()) => {
                info!(identity = %voter.identity, candidate_id = %candidate, "vote recorded");
                Ok(())
            }
            Err(StoreError::Conflict) => {
                debug!(identity = %voter.identity, "repeat vote rejected");
                Err(PollError::AlreadyVoted)
            }
            Err(StoreError::MissingReference) => {
                debug!(
                    identity = %voter.identity,
                    candidate_id = %candidate,
                    "vote for unknown candidate"
                );
                Err(PollError::UnknownCandidate(candidate))
            }
            Err(other) => Err(unavailable(other)),
        }
    }

    pub fn tally(&self) -> Result<Vec<TallyEntry>, PollError> {
        self.store.tally().map_err(unavailable)
    }

    pub fn voters_by_candidate(&self) -> Result<Vec<CandidateVoters>, PollError> {
        self.store.voters_by_candidate().map_err(unavailable)
    }

    pub fn record_member_joined(&self, member: UserId) -> Result<(), PollError> {
        self.store.record_member_joined(member).map_err(unavailable)
    }

    /// Clear candidates, votes and the phase flag for a fresh election.
    pub fn reset(&self) -> Result<(), PollError> {
        self.store.reset().map_err(unavailable)?;
        info!("election state reset");
        Ok(())
    }
}

fn unavailable(err: StoreError) -> PollError {
    error!(error = %err, "election store failure");
    PollError::StoreUnavailable(err)
}

/// Outcomes an engine request can be rejected with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PollError {
    #[error("candidate registration is closed")]
    RegistrationClosed,
    #[error("already registered as a candidate")]
    AlreadyRegistered,
    #[error("not eligible to vote")]
    NotEligible,
    #[error("already voted")]
    AlreadyVoted,
    #[error("candidate {0} does not exist")]
    UnknownCandidate(CandidateId),
    #[error(transparent)]
    StoreUnavailable(StoreError),
}

impl PollError {
    /// Expected, user-facing outcomes as opposed to infrastructure faults.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, PollError::StoreUnavailable(_))
    }
}
