//! Single-election poll: candidate registration, one vote per eligible voter,
//! and result reporting, driven by chat commands.

pub mod commands;
pub mod domain;
pub mod eligibility;
pub mod engine;
pub mod router;
pub mod sqlite;
pub mod store;
pub mod telegram;

#[cfg(test)]
mod tests;

pub use commands::{
    rejection_text, render_candidates, render_tally, render_voters_html, AccessPolicy,
    BallotOption, ChatRequest, Command, CommandDispatcher, Reply, TextFormat,
};
pub use domain::{
    Candidate, CandidateId, CandidateVoters, MembershipEvent, Participant, PollPhase, TallyEntry,
    UserId, VoterRecord,
};
pub use eligibility::{EligibilityError, EligibleVoterSet};
pub use engine::{PollEngine, PollError};
pub use router::{election_router, ElectionApi};
pub use sqlite::SqliteStore;
pub use store::{ElectionStore, StoreError};
