//! Classification, authorization and dispatch of chat commands.
//!
//! The transport hands over a [`ChatRequest`]; the dispatcher decides whether
//! the caller may issue it, runs the matching engine operation and renders the
//! outcome as a [`Reply`]. Requests the caller is not allowed to make are
//! dropped without a reply.

use std::fmt::Write as _;

use serde::Serialize;
use tracing::debug;

use super::domain::{Candidate, CandidateId, CandidateVoters, Participant, TallyEntry, UserId};
use super::engine::{PollEngine, PollError};
use super::store::ElectionStore;

/// Commands understood by the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    RequestPoll,
    RegisterCandidate,
    CloseRegistration,
    CastVote(CandidateId),
    ShowTally,
    ListCandidates,
    ShowVoters,
}

impl Command {
    /// Classify a `/command` message. Bot-name suffixes (`/top@poll_bot`) and
    /// trailing arguments are ignored.
    pub fn parse_text(text: &str) -> Option<Self> {
        let token = text.trim().split_whitespace().next()?;
        let name = token.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        match name {
            "send_poll" => Some(Self::RequestPoll),
            "register_poll" => Some(Self::RegisterCandidate),
            "stop_reg" => Some(Self::CloseRegistration),
            "candidates_list" => Some(Self::ListCandidates),
            "top" => Some(Self::ShowTally),
            "who_voted" => Some(Self::ShowVoters),
            _ => None,
        }
    }

    /// Ballot button presses carry the candidate id as callback data.
    pub fn parse_callback(data: &str) -> Option<Self> {
        data.trim()
            .parse::<i64>()
            .ok()
            .map(|id| Self::CastVote(CandidateId(id)))
    }

    fn requires_admin(self) -> bool {
        matches!(self, Self::RequestPoll | Self::CloseRegistration)
    }

    fn restricted_to_poll_chat(self) -> bool {
        matches!(self, Self::RequestPoll | Self::RegisterCandidate)
    }
}

/// A classified inbound command together with who sent it and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub caller: Participant,
    pub chat_id: Option<i64>,
    pub command: Command,
}

/// Administrator identity and the group the poll runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    pub admin: UserId,
    pub poll_chat: Option<i64>,
}

impl AccessPolicy {
    pub fn new(admin: UserId, poll_chat: Option<i64>) -> Self {
        Self { admin, poll_chat }
    }

    pub fn permits(&self, request: &ChatRequest) -> bool {
        if request.command.requires_admin() && request.caller.identity != self.admin {
            return false;
        }

        match (self.poll_chat, request.command.restricted_to_poll_chat()) {
            (Some(poll_chat), true) => request.chat_id == Some(poll_chat),
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    Plain,
    Html,
}

/// Inline button offering one candidate on the ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BallotOption {
    pub label: String,
    pub candidate_id: CandidateId,
}

/// Outcome of a dispatched command, ready for the transport to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A chat message answering the command.
    Message {
        text: String,
        format: TextFormat,
        ballot: Vec<BallotOption>,
    },
    /// A short acknowledgement shown to the user who pressed a ballot button.
    Notice(String),
}

impl Reply {
    fn plain(text: impl Into<String>) -> Self {
        Self::Message {
            text: text.into(),
            format: TextFormat::Plain,
            ballot: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Reply::Message { text, .. } => text,
            Reply::Notice(text) => text,
        }
    }
}

const GENERIC_FAILURE: &str = "Something went wrong, please try again later.";
const NO_CANDIDATES: &str = "No candidates have registered yet.";
const NO_VOTES: &str = "No votes have been cast yet.";

pub struct CommandDispatcher<S> {
    engine: PollEngine<S>,
    access: AccessPolicy,
}

impl<S> Clone for CommandDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            access: self.access,
        }
    }
}

impl<S> CommandDispatcher<S>
where
    S: ElectionStore + 'static,
{
    pub fn new(engine: PollEngine<S>, access: AccessPolicy) -> Self {
        Self { engine, access }
    }

    pub fn engine(&self) -> &PollEngine<S> {
        &self.engine
    }

    /// Run `request`, returning `None` when the caller is not allowed to issue it.
    pub fn dispatch(&self, request: &ChatRequest) -> Option<Reply> {
        if !self.access.permits(request) {
            debug!(
                identity = %request.caller.identity,
                command = ?request.command,
                "ignoring unauthorized command"
            );
            return None;
        }

        let reply = match request.command {
            Command::RequestPoll => self.request_poll(),
            Command::RegisterCandidate => self.register(&request.caller),
            Command::CloseRegistration => self.close_registration(),
            Command::CastVote(candidate) => self.cast_vote(&request.caller, candidate),
            Command::ShowTally => self.show_tally(),
            Command::ListCandidates => self.list_candidates(),
            Command::ShowVoters => self.show_voters(),
        };

        Some(reply)
    }

    /// Append join events for new group members.
    pub fn members_joined(&self, members: &[UserId]) -> Result<(), PollError> {
        members
            .iter()
            .try_for_each(|member| self.engine.record_member_joined(*member))
    }

    fn request_poll(&self) -> Reply {
        match self.engine.list_candidates() {
            Ok(candidates) if candidates.is_empty() => Reply::plain(NO_CANDIDATES),
            Ok(candidates) => Reply::Message {
                text: "Choose a candidate".to_string(),
                format: TextFormat::Plain,
                ballot: candidates.iter().map(ballot_option).collect(),
            },
            Err(err) => Reply::plain(rejection_text(&err)),
        }
    }

    fn register(&self, caller: &Participant) -> Reply {
        match self.engine.register(caller) {
            Ok(id) => Reply::plain(format!(
                "You are now candidate #{id} in the poll! \u{2705}"
            )),
            Err(err) => Reply::plain(rejection_text(&err)),
        }
    }

    fn close_registration(&self) -> Reply {
        match self.engine.close_registration() {
            Ok(()) => Reply::plain("Candidate registration is now closed."),
            Err(err) => Reply::plain(rejection_text(&err)),
        }
    }

    fn cast_vote(&self, caller: &Participant, candidate: CandidateId) -> Reply {
        match self.engine.cast_vote(caller, candidate) {
            Ok(()) => Reply::Notice(format!("You voted for candidate {candidate}")),
            Err(err) => Reply::Notice(rejection_text(&err)),
        }
    }

    fn show_tally(&self) -> Reply {
        match self.engine.tally() {
            Ok(entries) => Reply::plain(render_tally(&entries)),
            Err(err) => Reply::plain(rejection_text(&err)),
        }
    }

    fn list_candidates(&self) -> Reply {
        match self.engine.list_candidates() {
            Ok(candidates) => Reply::plain(render_candidates(&candidates)),
            Err(err) => Reply::plain(rejection_text(&err)),
        }
    }

    fn show_voters(&self) -> Reply {
        match self.engine.voters_by_candidate() {
            Ok(groups) if groups.is_empty() => Reply::plain(NO_VOTES),
            Ok(groups) => Reply::Message {
                text: render_voters_html(&groups),
                format: TextFormat::Html,
                ballot: Vec::new(),
            },
            Err(err) => Reply::plain(rejection_text(&err)),
        }
    }
}

fn ballot_option(candidate: &Candidate) -> BallotOption {
    BallotOption {
        label: candidate.ballot_label(),
        candidate_id: candidate.id,
    }
}

/// User-facing message for a rejected request. Store failures never leak detail.
pub fn rejection_text(err: &PollError) -> String {
    match err {
        PollError::RegistrationClosed => "Registration is closed.".to_string(),
        PollError::AlreadyRegistered => "You are already a candidate!".to_string(),
        PollError::NotEligible => "You are not allowed to vote.".to_string(),
        PollError::AlreadyVoted => "You have already voted!".to_string(),
        PollError::UnknownCandidate(id) => format!("Candidate {id} does not exist."),
        PollError::StoreUnavailable(_) => GENERIC_FAILURE.to_string(),
    }
}

pub fn render_tally(entries: &[TallyEntry]) -> String {
    if entries.is_empty() {
        return NO_VOTES.to_string();
    }

    let mut out = String::new();
    for (position, entry) in entries.iter().enumerate() {
        let noun = if entry.votes == 1 { "vote" } else { "votes" };
        let _ = writeln!(
            out,
            "{}. {} - {} {}",
            position + 1,
            entry.candidate_name,
            entry.votes,
            noun
        );
    }
    out
}

pub fn render_candidates(candidates: &[Candidate]) -> String {
    if candidates.is_empty() {
        return NO_CANDIDATES.to_string();
    }

    let mut out = String::new();
    for (position, candidate) in candidates.iter().enumerate() {
        let _ = writeln!(out, "{}. {}", position + 1, candidate.display_name);
    }
    out
}

pub fn render_voters_html(groups: &[CandidateVoters]) -> String {
    let mut out = String::new();
    for group in groups {
        let _ = writeln!(
            out,
            "{}. {}:",
            group.candidate.id,
            escape_html(&group.candidate.display_name)
        );
        let mentions: Vec<String> = group
            .voters
            .iter()
            .map(|voter| {
                format!(
                    "<a href=\"tg://user?id={}\">{}</a>",
                    voter.voter,
                    escape_html(&voter.display_name)
                )
            })
            .collect();
        out.push_str(&mentions.join(", "));
        out.push_str("\n\n");
    }
    out
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
