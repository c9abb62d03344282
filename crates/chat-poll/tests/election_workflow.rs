use std::fs;
use std::sync::Arc;

use chat_poll::election::{
    render_tally, AccessPolicy, CandidateId, ChatRequest, Command, CommandDispatcher,
    EligibleVoterSet, Participant, PollEngine, PollError, PollPhase, Reply, SqliteStore, UserId,
};

fn member(id: i64, name: &str) -> Participant {
    Participant::new(UserId(id), name, None)
}

#[test]
fn election_state_survives_a_restart() {
    let dir = tempfile::tempdir().expect("temp dir");
    let database = dir.path().join("database.sqlite3");
    let roster = dir.path().join("eligible_voters.txt");
    fs::write(&roster, "10\n11\n\n12\n").expect("roster written");

    {
        let store = Arc::new(SqliteStore::open(&database).expect("store opens"));
        let voters = EligibleVoterSet::from_path(&roster).expect("roster loads");
        let engine = PollEngine::new(store, voters);

        let ann = engine.register(&member(1, "Ann")).expect("ann registers");
        engine.register(&member(2, "Bo")).expect("bo registers");
        engine.close_registration().expect("registration closes");
        engine.cast_vote(&member(10, "Vic"), ann).expect("vote recorded");
    }

    let store = Arc::new(SqliteStore::open(&database).expect("store reopens"));
    let voters = EligibleVoterSet::from_path(&roster).expect("roster loads");
    assert_eq!(voters.len(), 3);
    let engine = PollEngine::new(store, voters);

    assert_eq!(
        engine.phase().expect("phase readable"),
        PollPhase::RegistrationClosed
    );
    assert_eq!(
        engine.cast_vote(&member(10, "Vic"), CandidateId(2)),
        Err(PollError::AlreadyVoted)
    );
    assert_eq!(
        engine.register(&member(3, "Cy")),
        Err(PollError::RegistrationClosed)
    );
    assert_eq!(
        render_tally(&engine.tally().expect("tally")),
        "1. Ann - 1 vote\n"
    );
}

#[test]
fn chat_commands_drive_a_complete_election() {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = Arc::new(SqliteStore::open(dir.path().join("poll.sqlite3")).expect("store opens"));
    let voters: EligibleVoterSet = [10, 11, 12].into_iter().map(UserId).collect();
    let dispatcher = CommandDispatcher::new(
        PollEngine::new(store, voters),
        AccessPolicy::new(UserId(1), None),
    );
    let say = |caller: Participant, command: Command| {
        dispatcher
            .dispatch(&ChatRequest {
                caller,
                chat_id: Some(-100),
                command,
            })
            .map(|reply| reply.text().to_string())
    };

    assert!(say(member(2, "Ann"), Command::RegisterCandidate).is_some());
    assert!(say(member(3, "Bo"), Command::RegisterCandidate).is_some());
    assert_eq!(say(member(2, "Ann"), Command::CloseRegistration), None);
    assert_eq!(
        say(member(1, "Admin"), Command::CloseRegistration).as_deref(),
        Some("Candidate registration is now closed.")
    );

    let ballot = dispatcher
        .dispatch(&ChatRequest {
            caller: member(1, "Admin"),
            chat_id: Some(-100),
            command: Command::RequestPoll,
        })
        .expect("ballot reply");
    match ballot {
        Reply::Message { ballot, .. } => assert_eq!(ballot.len(), 2),
        other => panic!("expected ballot message, got {other:?}"),
    }

    for (voter, candidate) in [(10, 1), (11, 2), (12, 2)] {
        say(
            member(voter, "Voter"),
            Command::CastVote(CandidateId(candidate)),
        );
    }

    assert_eq!(
        say(member(99, "Anyone"), Command::ShowTally).as_deref(),
        Some("1. Bo - 2 votes\n2. Ann - 1 vote\n")
    );
}
