use glam::Vec3;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tomo_companion::{AnimationPlayer, CompanionConfig, CompanionRoster, LocomotionState};
use tomo_core::CompanionId;
use tomo_nav::{CrowdConfig, CrowdNavigationManager, WalkableGeometry};
use tomo_protocol::{ChannelTransport, QueryCorrelator, QueryResponder};
use tomo_server::animation::LoggingAnimationPlayer;
use tomo_server::answerer::SceneAnswerer;
use tomo_server::coordinator::PlayerFactory;
use tomo_server::scene::{Furniture, Position, SceneFacts};
use tomo_server::speech::LoggingSpeech;
use tomo_server::{Coordinator, CoordinatorEvent};

const TICK: Duration = Duration::from_millis(16);

struct Harness {
    coordinator: Coordinator,
    outbound: mpsc::Receiver<String>,
    events: mpsc::Receiver<CoordinatorEvent>,
}

fn harness() -> Harness {
    let (transport, outbound) = ChannelTransport::new(16);
    let transport = Arc::new(transport);
    let (events_tx, events) = mpsc::channel(16);

    let config = CompanionConfig::default();
    let speakers: HashMap<CompanionId, u32> = config
        .roster
        .iter()
        .map(|p| (CompanionId::from_name(&p.name), p.speaker_id))
        .collect();
    let facts = SceneFacts::new(
        vec![Furniture {
            label: "sofa".to_string(),
            position: Position { x: 2.0, y: 0.0, z: 1.0 },
        }],
        Position { x: 0.0, y: 1.6, z: 2.0 },
    );
    let answerer = SceneAnswerer::new(facts, speakers, Arc::new(LoggingSpeech), events_tx);

    let correlator = QueryCorrelator::new(
        transport.clone(),
        Duration::from_secs(10),
        Duration::from_secs(100),
    );
    let responder = QueryResponder::new(Arc::new(answerer), transport);

    let clips: Arc<HashSet<String>> = Arc::new(config.animations.iter().cloned().collect());
    let players: PlayerFactory = Box::new(move |id: &CompanionId| {
        Box::new(LoggingAnimationPlayer::new(
            id.clone(),
            clips.clone(),
            Duration::from_millis(500),
        )) as Box<dyn AnimationPlayer>
    });

    let mut coordinator = Coordinator::new(
        CrowdNavigationManager::new(CrowdConfig::default()),
        CompanionRoster::new(config),
        correlator,
        responder,
        TICK,
    );
    coordinator.spawn_roster(&players);

    Harness {
        coordinator,
        outbound,
        events,
    }
}

fn floor() -> WalkableGeometry {
    WalkableGeometry::rectangle(Vec3::new(-5.0, 0.0, -5.0), Vec3::new(5.0, 0.0, 5.0))
}

fn natsumi() -> CompanionId {
    CompanionId::from_name("natsumi")
}

fn query_frame(id: &str, query_type: &str, body: Value) -> String {
    json!({
        "topic": "queries",
        "body": {
            "jsonrpc": "2.0",
            "id": id,
            "method": "query.send",
            "params": {"from": "companion_natsumi", "type": query_type, "body": body}
        }
    })
    .to_string()
}

fn action_frame(name: &str, params: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "method": "action.send",
        "params": {"name": name, "from": "companion_natsumi", "params": params}
    })
    .to_string()
}

#[tokio::test]
async fn test_query_request_gets_response_frame() {
    let mut h = harness();
    h.coordinator
        .handle_frame(&query_frame("q-1", "objects", json!({})));

    let frame: Value = serde_json::from_str(&h.outbound.recv().await.unwrap()).unwrap();
    assert_eq!(frame["topic"], "queries");
    assert_eq!(frame["body"]["jsonrpc"], "2.0");
    assert_eq!(frame["body"]["id"], "q-1");
    assert_eq!(frame["body"]["result"]["success"], true);
    assert_eq!(frame["body"]["result"]["body"]["list"][0]["label"], "sofa");
}

#[tokio::test]
async fn test_unknown_query_type_answered_with_failure() {
    let mut h = harness();
    h.coordinator
        .handle_frame(&query_frame("q-2", "weather", json!({})));

    let frame: Value = serde_json::from_str(&h.outbound.recv().await.unwrap()).unwrap();
    assert_eq!(frame["body"]["id"], "q-2");
    assert_eq!(frame["body"]["result"]["success"], false);
    assert_eq!(frame["body"]["result"]["body"]["error"], "Unknown query type");
}

#[tokio::test]
async fn test_speak_emotion_becomes_expression() {
    let mut h = harness();
    h.coordinator.handle_frame(&query_frame(
        "q-3",
        "speak",
        json!({"message": "Welcome home!", "emotion": "happy"}),
    ));

    let frame: Value = serde_json::from_str(&h.outbound.recv().await.unwrap()).unwrap();
    assert_eq!(frame["body"]["result"]["success"], true);

    let event = h.events.recv().await.unwrap();
    h.coordinator.handle_event(event);
    let companion = h.coordinator.roster().get(&natsumi()).unwrap().companion();
    assert_eq!(companion.expression.as_deref(), Some("happy"));
}

#[tokio::test]
async fn test_action_frame_moves_companion() {
    let mut h = harness();
    h.coordinator.handle_event(CoordinatorEvent::Bake(floor()));

    let start = h.coordinator.roster().get(&natsumi()).unwrap().companion().position;
    h.coordinator
        .handle_frame(&action_frame("walk", json!({"x": 2.0, "y": 0.0, "z": 2.0})));
    assert_eq!(
        h.coordinator.roster().get(&natsumi()).unwrap().state(),
        LocomotionState::Walk
    );

    for _ in 0..30 {
        h.coordinator.tick(TICK.as_secs_f32());
    }
    let now = h.coordinator.roster().get(&natsumi()).unwrap().companion().position;
    assert!(now.distance(start) > 0.1);
}

#[tokio::test]
async fn test_walk_survives_first_tick() {
    let mut h = harness();
    h.coordinator.handle_event(CoordinatorEvent::Bake(floor()));
    h.coordinator
        .handle_frame(&action_frame("walk", json!({"x": 4.0, "y": 0.0, "z": 0.0})));

    h.coordinator.step();

    let companion = h.coordinator.roster().get(&natsumi()).unwrap().companion();
    assert_eq!(companion.state, LocomotionState::Walk);
    assert!(companion.has_target);
    let agent = companion.agent.unwrap();
    let speed = h.coordinator.crowd().kinematics(agent).unwrap().speed();
    assert!(speed > tomo_nav::ARRIVAL_SPEED_THRESHOLD, "speed {}", speed);
}

#[tokio::test]
async fn test_action_before_bake_is_ignored() {
    let mut h = harness();
    assert!(!h.coordinator.crowd().is_ready());
    h.coordinator
        .handle_frame(&action_frame("walk", json!({"x": 1.0, "y": 0.0, "z": 1.0})));
    assert_eq!(
        h.coordinator.roster().get(&natsumi()).unwrap().state(),
        LocomotionState::Idle
    );
}

#[tokio::test]
async fn test_bake_event_places_companions() {
    let mut h = harness();
    assert_eq!(h.coordinator.crowd().agent_count(), 0);

    h.coordinator.handle_event(CoordinatorEvent::Bake(floor()));
    assert!(h.coordinator.crowd().is_ready());
    assert_eq!(h.coordinator.crowd().agent_count(), 1);
    assert!(h
        .coordinator
        .roster()
        .get(&natsumi())
        .unwrap()
        .companion()
        .agent
        .is_some());

    // Unusable geometry keeps the previous surface
    h.coordinator
        .handle_event(CoordinatorEvent::Bake(WalkableGeometry::default()));
    assert!(h.coordinator.crowd().is_ready());
    assert_eq!(h.coordinator.crowd().agent_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_stops_on_shutdown() {
    let mut h = harness();
    h.coordinator.handle_event(CoordinatorEvent::Bake(floor()));
    h.coordinator
        .handle_frame(&action_frame("gesture", json!({"name": "wave"})));

    let (inbound_tx, inbound) = mpsc::channel(4);
    let (_events_tx, events) = mpsc::channel(4);
    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let run = tokio::spawn(h.coordinator.run(inbound, events, async move {
        let _ = stop_rx.await;
    }));

    // Ticks keep running while the gesture clip plays out
    tokio::time::sleep(Duration::from_millis(800)).await;
    inbound_tx
        .send(action_frame("walk", json!({"x": 1.0, "y": 0.0, "z": 1.0})))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!run.is_finished());

    stop_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), run)
        .await
        .expect("coordinator stops")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_stops_when_inbound_closes() {
    let h = harness();
    let (inbound_tx, inbound) = mpsc::channel::<String>(4);
    let (_events_tx, events) = mpsc::channel(4);
    let run = tokio::spawn(h.coordinator.run(inbound, events, std::future::pending()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    drop(inbound_tx);
    tokio::time::timeout(Duration::from_secs(1), run)
        .await
        .expect("coordinator stops")
        .unwrap();
}
