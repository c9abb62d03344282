use std::sync::{Arc, Barrier};
use std::thread;

use super::common::*;
use crate::election::domain::{CandidateId, PollPhase, UserId};
use crate::election::store::{ElectionStore, StoreError};
use crate::election::{PollEngine, PollError};

#[test]
fn concurrent_registration_admits_a_single_candidate() {
    let (engine, _dir) = engine_with_voters(&[]);
    let entrant = participant(42, "Ann");
    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));

    let outcomes: Vec<Result<CandidateId, PollError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                let engine = engine.clone();
                let entrant = entrant.clone();
                let barrier = Arc::clone(&barrier);
                scope.spawn(move || {
                    barrier.wait();
                    engine.register(&entrant)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker finished"))
            .collect()
    });

    let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .all(|err| *err == PollError::AlreadyRegistered));
    assert_eq!(engine.list_candidates().expect("candidates").len(), 1);
}

#[test]
fn concurrent_votes_from_one_voter_count_once() {
    let (engine, _dir) = engine_with_voters(&[10]);
    let ann = engine.register(&participant(1, "Ann")).expect("ann registers");
    let bo = engine.register(&participant(2, "Bo")).expect("bo registers");
    let voter = participant(10, "Cy");
    let workers = 6;
    let barrier = Arc::new(Barrier::new(workers));

    let outcomes: Vec<Result<(), PollError>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let engine = engine.clone();
                let voter = voter.clone();
                let barrier = Arc::clone(&barrier);
                let choice = if worker % 2 == 0 { ann } else { bo };
                scope.spawn(move || {
                    barrier.wait();
                    engine.cast_vote(&voter, choice)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker finished"))
            .collect()
    });

    assert_eq!(outcomes.iter().filter(|outcome| outcome.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .all(|err| *err == PollError::AlreadyVoted));

    let tally = engine.tally().expect("tally");
    assert_eq!(tally.iter().map(|entry| entry.votes).sum::<u64>(), 1);
}

#[test]
fn second_vote_is_rejected_and_tally_unchanged() {
    let (engine, _dir) = engine_with_voters(&[10]);
    let ann = engine.register(&participant(1, "Ann")).expect("ann registers");
    let bo = engine.register(&participant(2, "Bo")).expect("bo registers");
    let voter = participant(10, "Cy");

    engine.cast_vote(&voter, ann).expect("first vote");
    let before = engine.tally().expect("tally");

    assert_eq!(engine.cast_vote(&voter, bo), Err(PollError::AlreadyVoted));
    assert_eq!(engine.cast_vote(&voter, ann), Err(PollError::AlreadyVoted));
    assert_eq!(engine.tally().expect("tally"), before);
}

#[test]
fn ineligible_voter_leaves_no_record() {
    let (engine, _dir) = engine_with_voters(&[10]);
    let ann = engine.register(&participant(1, "Ann")).expect("ann registers");

    assert_eq!(
        engine.cast_vote(&participant(99, "Mallory"), ann),
        Err(PollError::NotEligible)
    );
    assert!(engine.tally().expect("tally").is_empty());
    assert!(engine.voters_by_candidate().expect("voters").is_empty());
}

#[test]
fn vote_for_unknown_candidate_leaves_no_record() {
    let (engine, _dir) = engine_with_voters(&[10]);
    engine.register(&participant(1, "Ann")).expect("ann registers");

    assert_eq!(
        engine.cast_vote(&participant(10, "Cy"), CandidateId(7)),
        Err(PollError::UnknownCandidate(CandidateId(7)))
    );
    assert!(engine.voters_by_candidate().expect("voters").is_empty());

    // The rejected attempt did not use up the voter's ballot.
    engine
        .cast_vote(&participant(10, "Cy"), CandidateId(1))
        .expect("vote after rejection");
}

#[test]
fn tally_counts_and_orders_by_votes() {
    let (engine, _dir) = engine_with_voters(&[10, 11, 12, 13]);
    let a = engine.register(&participant(1, "A")).expect("a registers");
    let b = engine.register(&participant(2, "B")).expect("b registers");

    engine.cast_vote(&participant(10, "V1"), b).expect("vote");
    engine.cast_vote(&participant(11, "V2"), a).expect("vote");
    engine.cast_vote(&participant(12, "V3"), a).expect("vote");
    engine.cast_vote(&participant(13, "V4"), a).expect("vote");

    let tally: Vec<(String, u64)> = engine
        .tally()
        .expect("tally")
        .into_iter()
        .map(|entry| (entry.candidate_name, entry.votes))
        .collect();
    assert_eq!(tally, vec![("A".to_string(), 3), ("B".to_string(), 1)]);
}

#[test]
fn tally_breaks_ties_by_candidate_id() {
    let (engine, _dir) = engine_with_voters(&[10, 11]);
    let first = engine.register(&participant(1, "First")).expect("registers");
    let second = engine.register(&participant(2, "Second")).expect("registers");

    engine.cast_vote(&participant(10, "V1"), second).expect("vote");
    engine.cast_vote(&participant(11, "V2"), first).expect("vote");

    let ids: Vec<CandidateId> = engine
        .tally()
        .expect("tally")
        .into_iter()
        .map(|entry| entry.candidate_id)
        .collect();
    assert_eq!(ids, vec![first, second]);
}

#[test]
fn registration_after_close_is_rejected() {
    let (engine, _dir) = engine_with_voters(&[]);
    engine.register(&participant(1, "Ann")).expect("ann registers");
    assert_eq!(engine.phase().expect("phase"), PollPhase::RegistrationOpen);

    engine.close_registration().expect("close");
    engine.close_registration().expect("close again");

    assert_eq!(engine.phase().expect("phase"), PollPhase::RegistrationClosed);
    assert_eq!(
        engine.register(&participant(2, "Bo")),
        Err(PollError::RegistrationClosed)
    );
    assert_eq!(engine.list_candidates().expect("candidates").len(), 1);
}

#[test]
fn duplicate_registration_keeps_original_id() {
    let (engine, _dir) = engine_with_voters(&[]);
    let first = engine.register(&participant(1, "Ann")).expect("ann registers");

    assert_eq!(
        engine.register(&participant(1, "Ann Renamed")),
        Err(PollError::AlreadyRegistered)
    );
    let candidates = engine.list_candidates().expect("candidates");
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].id, first);
    assert_eq!(candidates[0].display_name, "Ann");
}

#[test]
fn voting_is_allowed_while_registration_is_open() {
    let (engine, _dir) = engine_with_voters(&[10]);
    let ann = engine.register(&participant(1, "Ann")).expect("ann registers");

    engine.cast_vote(&participant(10, "Cy"), ann).expect("vote while open");
    engine.register(&participant(2, "Bo")).expect("bo registers later");
    assert_eq!(engine.list_candidates().expect("candidates").len(), 2);
}

#[test]
fn full_election_reports_tally_and_voters() {
    let (engine, _dir) = engine_with_voters(&[10, 11, 12]);
    let ann = engine.register(&participant(1, "Ann")).expect("ann registers");
    let bo = engine.register(&participant(2, "Bo")).expect("bo registers");
    engine.close_registration().expect("close");

    engine.cast_vote(&participant(10, "Vic"), ann).expect("vote");
    engine.cast_vote(&participant(11, "Wen"), ann).expect("vote");
    engine.cast_vote(&participant(12, "Xia"), bo).expect("vote");

    let tally: Vec<(String, u64)> = engine
        .tally()
        .expect("tally")
        .into_iter()
        .map(|entry| (entry.candidate_name, entry.votes))
        .collect();
    assert_eq!(tally, vec![("Ann".to_string(), 2), ("Bo".to_string(), 1)]);

    let groups: Vec<(String, Vec<UserId>)> = engine
        .voters_by_candidate()
        .expect("voters")
        .into_iter()
        .map(|group| {
            (
                group.candidate.display_name,
                group.voters.iter().map(|record| record.voter).collect(),
            )
        })
        .collect();
    assert_eq!(
        groups,
        vec![
            ("Ann".to_string(), vec![UserId(10), UserId(11)]),
            ("Bo".to_string(), vec![UserId(12)]),
        ]
    );
}

#[test]
fn reset_starts_a_new_election() {
    let (engine, _dir) = engine_with_voters(&[10]);
    let ann = engine.register(&participant(1, "Ann")).expect("ann registers");
    engine.cast_vote(&participant(10, "Cy"), ann).expect("vote");
    engine.close_registration().expect("close");

    engine.reset().expect("reset");

    assert_eq!(engine.phase().expect("phase"), PollPhase::RegistrationOpen);
    assert!(engine.tally().expect("tally").is_empty());
    assert_eq!(
        engine.register(&participant(2, "Bo")).expect("bo registers"),
        CandidateId(1)
    );
}

#[test]
fn store_failures_surface_as_unavailable() {
    let engine = PollEngine::new(Arc::new(UnavailableStore), eligible(&[10]));

    assert!(matches!(
        engine.register(&participant(1, "Ann")),
        Err(PollError::StoreUnavailable(StoreError::Unavailable(_)))
    ));
    assert!(matches!(
        engine.cast_vote(&participant(10, "Cy"), CandidateId(1)),
        Err(PollError::StoreUnavailable(_))
    ));
    assert!(matches!(engine.tally(), Err(PollError::StoreUnavailable(_))));

    let err = engine.phase().expect_err("store is down");
    assert!(!err.is_rejection());
}

#[test]
fn eligibility_is_checked_before_the_store() {
    let engine = PollEngine::new(Arc::new(UnavailableStore), eligible(&[10]));
    assert_eq!(
        engine.cast_vote(&participant(99, "Mallory"), CandidateId(1)),
        Err(PollError::NotEligible)
    );
}

#[test]
fn membership_events_are_appended_in_order() {
    let (store, _dir) = sqlite_store();
    let engine = PollEngine::new(Arc::clone(&store), eligible(&[]));

    engine.record_member_joined(UserId(20)).expect("join");
    engine.record_member_joined(UserId(21)).expect("join");
    engine.record_member_joined(UserId(20)).expect("rejoin");
    engine.reset().expect("reset");

    let members: Vec<UserId> = store
        .membership_events()
        .expect("events")
        .into_iter()
        .map(|event| event.member)
        .collect();
    assert_eq!(members, vec![UserId(20), UserId(21), UserId(20)]);
    assert!(store.registration_open().expect("flag"));
}
