use std::fs;

use action_content::{ActionCatalog, ContentFactory};
use action_core::{ActionEventKind, Tag};
use runtime::{
    Dispatch, Event, PeerId, ReplicationEvent, Runtime, RuntimeConfig, RuntimeError, Topic,
};

fn tag(raw: &str) -> Tag {
    Tag::new(raw).unwrap()
}

/// End-to-end: a replica presses dash, the authority runs it, every peer
/// sees it start, and a late joiner catches up.
#[tokio::test]
async fn test_forwarded_dash_scenario() {
    let runtime = Runtime::start(RuntimeConfig::default())
        .await
        .expect("Runtime should start successfully");
    let handle = runtime.handle();

    let mut actions = handle.subscribe(Topic::Action);
    let mut replication = handle.subscribe(Topic::Replication);

    let dispatch = handle.press(PeerId::Replica(0), "dash").await.unwrap();
    assert_eq!(dispatch, Dispatch::Forwarded);

    handle.settle(20).await.unwrap();

    let first = actions.recv().await.unwrap();
    let second = actions.recv().await.unwrap();
    match (first, second) {
        (Event::Action(on_authority), Event::Action(on_replica)) => {
            assert_eq!(on_authority.peer, PeerId::Authority);
            assert_eq!(on_replica.peer, PeerId::Replica(0));
            assert_eq!(on_authority.event.kind, ActionEventKind::Started);
            assert_eq!(on_replica.event.action, tag("Action.Dash"));
        }
        other => panic!("unexpected events: {:?}", other),
    }

    match replication.recv().await.unwrap() {
        Event::Replication(ReplicationEvent::RequestHandled {
            from,
            request,
            admitted,
        }) => {
            assert_eq!(from, PeerId::Replica(0));
            assert_eq!(request.action, tag("Action.Dash"));
            assert!(admitted);
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let joined = handle.join_replica().await.unwrap();
    handle.settle(20).await.unwrap();

    let late = handle.query_peer(joined).await.unwrap();
    assert_eq!(late.running().cloned().collect::<Vec<_>>(), vec![tag("Action.Dash")]);

    let snapshot = handle.query_snapshot().await.unwrap();
    assert_eq!(snapshot.peers.len(), 3);
    assert!(
        snapshot
            .peers
            .iter()
            .all(|peer| peer.active_tags == snapshot.peers[0].active_tags)
    );

    drop(handle);
    runtime.shutdown().await.expect("Runtime should shut down");
}

#[tokio::test]
async fn test_step_reports_tick() {
    let runtime = Runtime::start(RuntimeConfig::default()).await.unwrap();
    let handle = runtime.handle();

    assert_eq!(handle.step(3).await.unwrap(), 3);
    assert_eq!(handle.step(2).await.unwrap(), 5);

    let authority = handle.query_peer(PeerId::Authority).await.unwrap();
    assert!((authority.time.seconds() - 0.5).abs() < 1e-9);

    drop(handle);
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_input_is_reported() {
    let runtime = Runtime::start(RuntimeConfig::default()).await.unwrap();
    let handle = runtime.handle();

    let err = handle.press(PeerId::Authority, "moonwalk").await.unwrap_err();
    assert!(matches!(err, RuntimeError::UnknownInput { .. }));

    // The worker keeps serving after a failed command.
    assert_eq!(
        handle.press(PeerId::Authority, "primary_attack").await.unwrap(),
        Dispatch::Applied
    );

    drop(handle);
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_runtime_from_data_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("session.toml"),
        r#"
replicas = 2
latency_ticks = 0

[owner]
strict_stop = true

[[bindings]]
input = "wave"
command = "start"
action = "Action.Wave"
"#,
    )
    .unwrap();
    fs::create_dir(dir.path().join("actions")).unwrap();
    fs::write(
        dir.path().join("actions").join("emotes.ron"),
        r#"[(name: "Action.Wave", grants_tags: ["Status.Emoting"])]"#,
    )
    .unwrap();

    let factory = ContentFactory::new(dir.path());
    let config = RuntimeConfig::from(factory.load_config().unwrap());
    let catalog: ActionCatalog = factory.load_catalog().unwrap();

    let runtime = Runtime::builder()
        .config(config)
        .catalog(catalog)
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();

    assert_eq!(
        handle.press(PeerId::Authority, "wave").await.unwrap(),
        Dispatch::Applied
    );
    handle.settle(5).await.unwrap();

    let snapshot = handle.query_snapshot().await.unwrap();
    assert_eq!(snapshot.peers.len(), 3);
    for peer in &snapshot.peers {
        assert!(peer.active_tags.contains(&tag("Status.Emoting")));
    }

    drop(handle);
    runtime.shutdown().await.unwrap();
}
