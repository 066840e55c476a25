use action_content::{ActionCatalog, SessionConfig};
use action_core::{ActionError, ActionEventKind, BehaviorRegistry, ReplicationOutcome, SimTime, Tag};
use runtime::{
    Dispatch, Event, EventBus, PLAYER, PeerId, ReplicationEvent, RuntimeError, Session, Topic,
};

fn tag(raw: &str) -> Tag {
    Tag::new(raw).unwrap()
}

fn session_with(config: SessionConfig) -> Session {
    Session::new(
        config,
        ActionCatalog::builtin().unwrap(),
        BehaviorRegistry::with_builtins(),
    )
    .unwrap()
}

fn session(latency_ticks: u32, replicas: usize) -> Session {
    session_with(SessionConfig {
        latency_ticks,
        replicas,
        ..SessionConfig::default()
    })
}

#[test]
fn authority_input_reaches_replica_after_latency() {
    let mut session = session(2, 1);
    let replica = PeerId::Replica(0);

    assert_eq!(
        session.press(PeerId::Authority, "sprint_pressed").unwrap(),
        Dispatch::Applied
    );

    session.run(2).unwrap();
    assert!(!session.owner(replica).unwrap().is_running(&tag("Action.Sprint")));

    session.step().unwrap();
    let replica_owner = session.owner(replica).unwrap();
    assert!(replica_owner.is_running(&tag("Action.Sprint")));
    assert!(replica_owner.active_tags().contains(&tag("Status.Sprinting")));
    assert_eq!(
        replica_owner.action_status(&tag("Action.Sprint")).unwrap().start_time,
        Some(SimTime::ZERO)
    );
    assert!(session.converged());
}

#[test]
fn replica_input_is_executed_by_authority() {
    let mut session = session(1, 2);

    assert_eq!(
        session.press(PeerId::Replica(1), "dash").unwrap(),
        Dispatch::Forwarded
    );
    assert!(!session.authority().is_running(&tag("Action.Dash")));
    assert!(session.replica(1).unwrap().active_tags().is_empty());

    let ticks = session.settle(20).unwrap();
    assert!(ticks > 0);
    assert!(session.is_quiescent());
    assert!(session.converged());
    assert!(session.authority().is_running(&tag("Action.Dash")));
    assert!(session.replica(0).unwrap().is_running(&tag("Action.Dash")));
}

#[test]
fn authority_refuses_blocked_inputs() {
    let mut session = session(0, 1);

    session.start(PeerId::Authority, &tag("Action.Stun")).unwrap();
    let refused = session.press(PeerId::Authority, "dash").unwrap();
    assert!(matches!(
        refused,
        Dispatch::Refused(ActionError::Blocked { .. })
    ));

    // A forwarded request that the authority refuses changes nothing anywhere.
    assert_eq!(
        session.press(PeerId::Replica(0), "primary_attack").unwrap(),
        Dispatch::Forwarded
    );
    session.settle(10).unwrap();
    assert!(!session.authority().is_running(&tag("Action.PrimaryAttack")));
    assert!(session.converged());
}

#[test]
fn release_stops_a_held_sprint() {
    let mut session = session(0, 1);

    session.press(PeerId::Authority, "sprint_pressed").unwrap();
    session.settle(10).unwrap();
    session.press(PeerId::Authority, "sprint_released").unwrap();
    session.settle(10).unwrap();

    let replica = session.replica(0).unwrap();
    assert!(!replica.is_running(&tag("Action.Sprint")));
    assert!(replica.active_tags().is_empty());

    let again = session.press(PeerId::Authority, "sprint_released").unwrap();
    assert!(matches!(
        again,
        Dispatch::Refused(ActionError::NotRunning { .. })
    ));
}

#[test]
fn late_joiner_converges_from_snapshot() {
    let mut session = session(1, 1);
    session.run(5).unwrap();
    session.press(PeerId::Authority, "sprint_pressed").unwrap();
    session.settle(10).unwrap();
    let started_at = session
        .authority()
        .action_status(&tag("Action.Sprint"))
        .unwrap()
        .start_time;

    let joined = session.join_replica().unwrap();
    assert_eq!(joined, PeerId::Replica(1));
    assert!(!session.converged());

    session.settle(10).unwrap();
    assert!(session.converged());
    let late = session.owner(joined).unwrap();
    assert_eq!(
        late.action_status(&tag("Action.Sprint")).unwrap().start_time,
        started_at
    );
    assert_eq!(late.now(), session.now());
}

#[test]
fn triggered_actions_end_after_their_duration() {
    let mut session = session(2, 1);
    let dash = tag("Action.Dash");

    assert_eq!(
        session.press(PeerId::Authority, "dash").unwrap(),
        Dispatch::Applied
    );
    session.settle(10).unwrap();
    assert!(session.replica(0).unwrap().is_running(&dash));

    session.run(10).unwrap();
    session.settle(10).unwrap();
    for peer in session.peers().collect::<Vec<_>>() {
        let owner = session.owner(peer).unwrap();
        assert!(!owner.is_running(&dash), "{} still dashing", peer);
        assert!(owner.active_tags().is_empty());
    }
    assert!(session.converged());

    assert_eq!(
        session.press(PeerId::Authority, "dash").unwrap(),
        Dispatch::Applied
    );
}

#[test]
fn blackhole_cooldown_starts_when_the_cast_ends() {
    let mut session = session(0, 1);
    let blackhole = tag("Action.Blackhole");

    assert_eq!(
        session.press(PeerId::Authority, "blackhole").unwrap(),
        Dispatch::Applied
    );
    // Casting blocks the attack until the cast is over.
    assert!(matches!(
        session.press(PeerId::Authority, "primary_attack").unwrap(),
        Dispatch::Refused(ActionError::Blocked { .. })
    ));

    session.run(12).unwrap();
    assert!(!session.authority().is_running(&blackhole));
    assert!(!session.replica(0).unwrap().is_running(&blackhole));
    assert!(
        session
            .authority()
            .can_start(PLAYER, &tag("Action.PrimaryAttack"))
            .is_ok()
    );

    assert!(matches!(
        session.press(PeerId::Authority, "blackhole").unwrap(),
        Dispatch::Refused(ActionError::Rejected { .. })
    ));

    session.run(25).unwrap();
    assert_eq!(
        session.press(PeerId::Authority, "blackhole").unwrap(),
        Dispatch::Applied
    );
}

#[test]
fn rapid_transitions_arrive_in_order() {
    let bus = EventBus::with_capacity(64);
    let mut replication = bus.subscribe(Topic::Replication);
    let mut actions = bus.subscribe(Topic::Action);
    let mut session = session(3, 1).with_event_bus(bus);

    let sprint = tag("Action.Sprint");
    session.start(PeerId::Authority, &sprint).unwrap();
    session.stop(PeerId::Authority, &sprint).unwrap();
    session.start(PeerId::Authority, &sprint).unwrap();
    session.settle(10).unwrap();

    assert!(session.replica(0).unwrap().is_running(&sprint));

    let mut revisions = Vec::new();
    while let Ok(Event::Replication(ReplicationEvent::UpdateApplied { update, outcome, .. })) =
        replication.try_recv()
    {
        assert_eq!(outcome, ReplicationOutcome::Applied);
        revisions.push(update.revision);
    }
    assert_eq!(revisions, vec![1, 2, 3]);

    let mut replica_kinds = Vec::new();
    while let Ok(event) = actions.try_recv() {
        if let Event::Action(record) = event
            && record.peer == PeerId::Replica(0)
        {
            replica_kinds.push(record.event.kind);
        }
    }
    assert_eq!(
        replica_kinds,
        vec![
            ActionEventKind::Started,
            ActionEventKind::Stopped,
            ActionEventKind::Started
        ]
    );
}

#[test]
fn unknown_input_and_peer_are_errors() {
    let mut session = session(0, 1);

    assert!(matches!(
        session.press(PeerId::Authority, "jump"),
        Err(RuntimeError::UnknownInput { .. })
    ));
    assert!(matches!(
        session.press(PeerId::Replica(3), "dash"),
        Err(RuntimeError::UnknownPeer { .. })
    ));
    assert!(session.peer_state(PeerId::Replica(3)).is_err());
}

#[test]
fn identical_inputs_give_identical_sessions() {
    let script = |session: &mut Session| {
        session.press(PeerId::Authority, "sprint_pressed").unwrap();
        session.run(3).unwrap();
        session.press(PeerId::Replica(0), "blackhole").unwrap();
        session.run(4).unwrap();
        session.start(PeerId::Authority, &tag("Action.Stun")).unwrap();
        session.press(PeerId::Replica(1), "dash").unwrap();
        session.settle(20).unwrap();
    };

    let mut left = session(2, 2);
    let mut right = session(2, 2);
    script(&mut left);
    script(&mut right);

    assert_eq!(left.snapshot(), right.snapshot());
    assert!(left.converged());
}

#[test]
fn convergence_compares_running_actions_too() {
    let catalog = ActionCatalog::from_ron_str(r#"[(name: "Action.Wave")]"#, "wave.ron").unwrap();
    let mut session = Session::new(
        SessionConfig {
            latency_ticks: 2,
            replicas: 1,
            ..SessionConfig::default()
        },
        catalog,
        BehaviorRegistry::new(),
    )
    .unwrap();

    session.start(PeerId::Authority, &tag("Action.Wave")).unwrap();
    session.step().unwrap();

    // No tags are granted, so only the running set differs.
    let snapshot = session.snapshot();
    assert_eq!(snapshot.peers[0].active_tags, snapshot.peers[1].active_tags);
    assert_eq!(
        snapshot.divergent().map(|state| state.peer),
        Some(PeerId::Replica(0))
    );
    assert!(!session.converged());

    session.settle(10).unwrap();
    assert!(session.snapshot().divergent().is_none());
    assert!(session.converged());
}

#[test]
fn snapshot_lists_every_peer() {
    let session = session(0, 2);
    let snapshot = session.snapshot();

    let peers: Vec<_> = snapshot.peers.iter().map(|state| state.peer).collect();
    assert_eq!(
        peers,
        vec![PeerId::Authority, PeerId::Replica(0), PeerId::Replica(1)]
    );
    assert_eq!(session.peers().collect::<Vec<_>>(), peers);
    assert!(snapshot.peers.iter().all(|state| state.running().count() == 0));
}
