use std::fmt;

use serde::{Deserialize, Serialize};

/// External chat identity (the messaging platform's numeric user id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequential identifier assigned to a candidate on registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub i64);

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who is acting, as reported by the transport. Display name and handle are
/// snapshots taken at the time of the request and never refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub identity: UserId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

impl Participant {
    pub fn new(identity: UserId, display_name: impl Into<String>, handle: Option<String>) -> Self {
        Self {
            identity,
            display_name: display_name.into(),
            handle,
        }
    }

    /// `@handle` when the participant has one, otherwise an empty string.
    pub fn mention(&self) -> String {
        self.handle
            .as_deref()
            .map(|handle| format!("@{handle}"))
            .unwrap_or_default()
    }
}

/// Registered entrant in the election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub identity: UserId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

impl Candidate {
    /// Button label used when presenting the ballot.
    pub fn ballot_label(&self) -> String {
        match self.handle.as_deref() {
            Some(handle) => format!("{}. {} @{}", self.id, self.display_name, handle),
            None => format!("{}. {}", self.id, self.display_name),
        }
    }
}

/// A cast vote. One per voter identity, immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterRecord {
    pub voter: UserId,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
    pub candidate_id: CandidateId,
}

/// Whether candidate registration is currently accepting entrants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    RegistrationOpen,
    RegistrationClosed,
}

impl PollPhase {
    pub fn from_registration_flag(open: bool) -> Self {
        if open {
            Self::RegistrationOpen
        } else {
            Self::RegistrationClosed
        }
    }

    pub fn is_registration_open(self) -> bool {
        matches!(self, Self::RegistrationOpen)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RegistrationOpen => "registration open",
            Self::RegistrationClosed => "registration closed",
        }
    }
}

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TallyEntry {
    pub candidate_id: CandidateId,
    pub candidate_name: String,
    pub votes: u64,
}

/// Voters grouped under the candidate they chose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateVoters {
    pub candidate: Candidate,
    pub voters: Vec<VoterRecord>,
}

/// Append-only record of a user joining the group chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MembershipEvent {
    pub member: UserId,
    pub joined_at: chrono::DateTime<chrono::Utc>,
}
