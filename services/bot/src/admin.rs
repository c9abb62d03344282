//! Offline election commands that work directly against the store file.

use chat_poll::config::StoreConfig;
use chat_poll::election::{
    render_candidates, render_tally, CandidateVoters, ElectionStore, EligibleVoterSet,
    PollEngine, SqliteStore,
};
use chat_poll::error::AppError;
use clap::Args;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct StoreArgs {
    /// SQLite database to operate on (defaults to POLL_DATABASE_PATH)
    #[arg(long)]
    pub(crate) database: Option<PathBuf>,
}

impl StoreArgs {
    fn open(self) -> Result<SqliteStore, AppError> {
        let path = self
            .database
            .unwrap_or_else(|| StoreConfig::from_env().database_path);
        Ok(SqliteStore::open(path)?)
    }
}

pub(crate) fn print_tally(args: StoreArgs) -> Result<(), AppError> {
    let store = args.open()?;
    write_tally(&store, &mut io::stdout().lock())
}

pub(crate) fn print_candidates(args: StoreArgs) -> Result<(), AppError> {
    let store = args.open()?;
    write_candidates(&store, &mut io::stdout().lock())
}

pub(crate) fn print_voters(args: StoreArgs) -> Result<(), AppError> {
    let store = args.open()?;
    write_voters(&store, &mut io::stdout().lock())
}

pub(crate) fn close_registration(args: StoreArgs) -> Result<(), AppError> {
    let engine = offline_engine(args.open()?);
    engine.close_registration()?;
    println!("Candidate registration is now closed.");
    Ok(())
}

pub(crate) fn reset_election(args: StoreArgs) -> Result<(), AppError> {
    let engine = offline_engine(args.open()?);
    engine.reset()?;
    println!("Election reset; registration is open again.");
    Ok(())
}

/// Offline commands never cast votes, so the engine runs without a voter list.
fn offline_engine(store: SqliteStore) -> PollEngine<SqliteStore> {
    PollEngine::new(Arc::new(store), EligibleVoterSet::default())
}

fn write_tally<S: ElectionStore, W: Write>(store: &S, out: &mut W) -> Result<(), AppError> {
    let entries = store.tally()?;
    write!(out, "{}", render_tally(&entries))?;
    Ok(())
}

fn write_candidates<S: ElectionStore, W: Write>(store: &S, out: &mut W) -> Result<(), AppError> {
    let candidates = store.candidates()?;
    write!(out, "{}", render_candidates(&candidates))?;
    Ok(())
}

fn write_voters<S: ElectionStore, W: Write>(store: &S, out: &mut W) -> Result<(), AppError> {
    let groups = store.voters_by_candidate()?;
    write!(out, "{}", render_voters_plain(&groups))?;
    Ok(())
}

fn render_voters_plain(groups: &[CandidateVoters]) -> String {
    if groups.is_empty() {
        return "No votes have been cast yet.\n".to_string();
    }

    let mut out = String::new();
    for group in groups {
        let _ = writeln!(
            out,
            "{}. {} ({})",
            group.candidate.id,
            group.candidate.display_name,
            group.voters.len()
        );
        for voter in &group.voters {
            let handle = voter
                .handle
                .as_deref()
                .map(|handle| format!(" @{handle}"))
                .unwrap_or_default();
            let _ = writeln!(
                out,
                "   - {}{} [{}]",
                voter.display_name, handle, voter.voter
            );
        }
    }
    out
}
