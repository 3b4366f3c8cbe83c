//! End-to-end scenarios driven against the server context.
//!
//! These tests exercise the full pipeline -- command staging, the tick
//! loop, the effect manager, the journal, and frame composition -- by
//! calling the same entry points the HTTP/WebSocket layer calls, with a
//! plain channel standing in for each client's socket.

use tokio::sync::mpsc;

use gritfall_proto::client::{ClientBody, ClientEnvelope};
use gritfall_proto::codec::decode_server;
use gritfall_proto::server::{NackReason, ServerBody, StateSnapshot};
use gritfall_server::config::ServerConfig;
use gritfall_server::telemetry::Telemetry;
use gritfall_server::{Server, SharedServer};
use gritfall_world::actor::Facing;

// ---------------------------------------------------------------------------
// Harness helpers
// ---------------------------------------------------------------------------

fn make_server(mutate: impl FnOnce(&mut ServerConfig)) -> SharedServer {
    let mut config = ServerConfig::default();
    config.seed = "scenario".to_owned();
    mutate(&mut config);
    let (telemetry, _guard) = Telemetry::new(Vec::new());
    // No sinks registered: the guard owns no threads and may drop.
    Server::new(config, telemetry)
}

fn connect(server: &SharedServer, player_id: &str) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(256);
    server.subscribe(player_id, tx).unwrap();
    rx
}

fn envelope(body: ClientBody, seq: Option<u64>) -> ClientEnvelope {
    ClientEnvelope {
        ver: 1,
        body,
        ack: None,
        seq,
    }
}

fn input(dx: f64, dy: f64, facing: Facing, seq: u64) -> ClientEnvelope {
    envelope(
        ClientBody::Input {
            dx,
            dy,
            facing: Some(facing),
        },
        Some(seq),
    )
}

/// Drain everything currently queued for a client.
fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<ServerBody> {
    let mut out = Vec::new();
    while let Ok(text) = rx.try_recv() {
        out.push(decode_server(&text).expect("server frames decode").body);
    }
    out
}

fn state_frames(bodies: Vec<ServerBody>) -> Vec<StateSnapshot> {
    bodies
        .into_iter()
        .filter_map(|body| match body {
            ServerBody::State(frame) => Some(frame),
            _ => None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// 1. Join and single move
// ---------------------------------------------------------------------------

#[test]
fn join_and_single_move() {
    let server = make_server(|_| {});

    let join = server.join();
    assert_eq!(join.id, "player-1");
    assert_eq!(join.config.seed, "scenario");
    assert!(join.players.iter().any(|p| p.actor.id == "player-1"));
    assert!(!join.effect_catalog_hash.is_empty());

    let initial_x = join
        .players
        .iter()
        .find(|p| p.actor.id == "player-1")
        .unwrap()
        .actor
        .pos
        .x;

    let mut rx = connect(&server, "player-1");
    let replies = server.handle_client_message("player-1", input(1.0, 0.0, Facing::Right, 1));
    assert_eq!(replies.len(), 1);
    match &replies[0] {
        ServerBody::CommandAck { seq, tick } => {
            assert_eq!(*seq, 1);
            assert!(tick.unwrap() > 0);
        }
        other => panic!("expected commandAck, got {other:?}"),
    }

    server.run_tick_fixed();

    let frames = state_frames(drain(&mut rx));
    assert_eq!(frames.len(), 1);
    let moved = frames[0]
        .patches
        .iter()
        .filter_map(|p| match p {
            gritfall_world::patch::Patch::PlayerPos { id, x, .. } if id == "player-1" => Some(*x),
            _ => None,
        })
        .next_back()
        .expect("position patch for the mover");
    assert!(moved > initial_x, "{moved} should exceed {initial_x}");
}

// ---------------------------------------------------------------------------
// 2. Queue-limit reject with retry flag
// ---------------------------------------------------------------------------

#[test]
fn queue_limit_reject_and_retry_flag() {
    let server = make_server(|_| {});
    server.join();
    let _rx = connect(&server, "player-1");

    let mut acks = 0;
    let mut rejects = Vec::new();
    for seq in 1..=17u64 {
        for body in server.handle_client_message("player-1", input(1.0, 0.0, Facing::Right, seq)) {
            match body {
                ServerBody::CommandAck { .. } => acks += 1,
                ServerBody::CommandReject { reason, retry, .. } => rejects.push((reason, retry)),
                other => panic!("unexpected reply {other:?}"),
            }
        }
    }

    assert_eq!(acks, 16);
    assert_eq!(rejects.len(), 1);
    assert_eq!(rejects[0].0, "queue_limit");
    assert_eq!(rejects[0].1, Some(true));
}

#[test]
fn duplicate_seq_is_acked_without_reapplying() {
    let server = make_server(|_| {});
    server.join();
    let _rx = connect(&server, "player-1");

    server.handle_client_message("player-1", input(1.0, 0.0, Facing::Right, 5));
    // Same seq again: idempotent ack, nothing enqueued.
    let replies = server.handle_client_message("player-1", input(0.0, 1.0, Facing::Down, 5));
    assert!(matches!(
        replies.as_slice(),
        [ServerBody::CommandAck { seq: 5, tick: None }]
    ));
}

#[test]
fn unknown_action_rejected_without_enqueue() {
    let server = make_server(|_| {});
    server.join();
    let _rx = connect(&server, "player-1");

    let replies = server.handle_client_message(
        "player-1",
        envelope(
            ClientBody::Action {
                action: "teleport".to_owned(),
            },
            Some(1),
        ),
    );
    match &replies[0] {
        ServerBody::CommandReject { reason, .. } => assert_eq!(reason, "invalid_action"),
        other => panic!("expected reject, got {other:?}"),
    }

    // The sequence was not consumed: seq 1 is still usable.
    let replies = server.handle_client_message("player-1", input(1.0, 0.0, Facing::Right, 1));
    assert!(matches!(replies[0], ServerBody::CommandAck { seq: 1, .. }));
}

// ---------------------------------------------------------------------------
// 3. Keyframe nack and forced resync
// ---------------------------------------------------------------------------

#[test]
fn expired_keyframe_request_nacks_and_forces_resync() {
    let server = make_server(|config| {
        config.keyframe_interval_ticks = 1;
        config.journal.keyframe_capacity = 8;
    });
    server.join();
    let mut rx = connect(&server, "player-1");

    for _ in 0..20 {
        server.run_tick_fixed();
    }
    drain(&mut rx);

    let replies = server.handle_client_message(
        "player-1",
        envelope(ClientBody::KeyframeRequest { keyframe_seq: 1 }, None),
    );
    match &replies[0] {
        ServerBody::KeyframeNack {
            reason,
            sequence,
            catalog,
        } => {
            assert_eq!(*reason, NackReason::Expired);
            assert_eq!(*sequence, 1);
            assert!(catalog.is_some());
        }
        other => panic!("expected keyframeNack, got {other:?}"),
    }

    server.run_tick_fixed();
    let frames = state_frames(drain(&mut rx));
    let last = frames.last().expect("post-nack frame");
    assert!(last.resync);
    assert!(last.players.is_some());
    assert!(last.config.is_some());
    assert!(last.effect_catalog.is_some());
}

#[test]
fn retained_keyframe_request_is_served() {
    let server = make_server(|config| {
        config.keyframe_interval_ticks = 1;
    });
    server.join();
    let _rx = connect(&server, "player-1");

    for _ in 0..5 {
        server.run_tick_fixed();
    }

    let replies = server.handle_client_message(
        "player-1",
        envelope(ClientBody::KeyframeRequest { keyframe_seq: 4 }, None),
    );
    match &replies[0] {
        ServerBody::Keyframe(frame) => {
            assert_eq!(frame.sequence, 4);
            assert!(frame.players.iter().any(|p| p.actor.id == "player-1"));
            assert_eq!(frame.effect_catalog.hash, server.catalog_snapshot().hash);
        }
        other => panic!("expected keyframe, got {other:?}"),
    }
}

#[test]
fn keyframe_requests_are_rate_limited() {
    let server = make_server(|config| {
        config.keyframe_interval_ticks = 1;
    });
    server.join();
    let _rx = connect(&server, "player-1");
    server.run_tick_fixed();

    server.handle_client_message(
        "player-1",
        envelope(ClientBody::KeyframeRequest { keyframe_seq: 1 }, None),
    );
    let replies = server.handle_client_message(
        "player-1",
        envelope(ClientBody::KeyframeRequest { keyframe_seq: 1 }, None),
    );
    assert!(matches!(
        &replies[0],
        ServerBody::KeyframeNack {
            reason: NackReason::RateLimited,
            ..
        }
    ));
}

// ---------------------------------------------------------------------------
// 4. Effect lifecycle ordering over the wire
// ---------------------------------------------------------------------------

#[test]
fn fireball_lifecycle_is_ordered_on_the_wire() {
    let server = make_server(|_| {});
    server.join();
    let mut rx = connect(&server, "player-1");

    server.handle_client_message(
        "player-1",
        envelope(
            ClientBody::Action {
                action: "fireball".to_owned(),
            },
            Some(1),
        ),
    );

    let mut spawns = Vec::new();
    let mut updates = Vec::new();
    let mut ends = Vec::new();
    for _ in 0..60 {
        server.run_tick_fixed();
        for frame in state_frames(drain(&mut rx)) {
            spawns.extend(frame.effect_spawns);
            updates.extend(frame.effect_updates);
            ends.extend(frame.effect_ends);
        }
        // Other effects (wandering NPCs catching fire) may come and go;
        // stop once the bolt itself has ended.
        let bolt_ended = spawns
            .iter()
            .filter(|s| s.entry == "fireball")
            .any(|s| ends.iter().any(|e| e.id == s.id));
        if bolt_ended {
            break;
        }
    }

    let bolt_spawns: Vec<_> = spawns.iter().filter(|s| s.entry == "fireball").collect();
    assert_eq!(bolt_spawns.len(), 1, "exactly one bolt spawn");
    let id = bolt_spawns[0].id;
    assert_eq!(bolt_spawns[0].seq, 1);

    let bolt_updates: Vec<_> = updates.iter().filter(|u| u.id == id).collect();
    assert!(!bolt_updates.is_empty(), "projectile must replicate updates");
    let mut prev = bolt_spawns[0].seq;
    for update in &bolt_updates {
        assert!(update.seq > prev, "seq must strictly increase");
        prev = update.seq;
    }

    let bolt_ends: Vec<_> = ends.iter().filter(|e| e.id == id).collect();
    assert_eq!(bolt_ends.len(), 1, "exactly one end");
    assert!(bolt_ends[0].seq > prev);
    assert!(matches!(
        bolt_ends[0].reason.as_str(),
        "range" | "wall" | "hit"
    ));
}

#[test]
fn melee_effect_ends_with_owner_death_when_attacker_disconnects() {
    let server = make_server(|_| {});
    server.join(); // player-1
    server.join(); // player-2
    let _rx1 = connect(&server, "player-1");
    let mut rx2 = connect(&server, "player-2");

    server.handle_client_message(
        "player-1",
        envelope(
            ClientBody::Action {
                action: "attack".to_owned(),
            },
            Some(1),
        ),
    );
    server.run_tick_fixed();

    let spawns: Vec<_> = state_frames(drain(&mut rx2))
        .into_iter()
        .flat_map(|f| f.effect_spawns)
        .filter(|s| s.entry == "attack")
        .collect();
    assert_eq!(spawns.len(), 1);
    let id = spawns[0].id;

    // The attacker drops mid-swing; the arc must not run out its
    // duration but end with owner-death on the next tick.
    server.disconnect("player-1", "session_closed");
    server.run_tick_fixed();

    let ends: Vec<_> = state_frames(drain(&mut rx2))
        .into_iter()
        .flat_map(|f| f.effect_ends)
        .filter(|e| e.id == id)
        .collect();
    assert_eq!(ends.len(), 1);
    assert_eq!(ends[0].reason.as_str(), "owner-death");
    assert!(ends[0].seq > spawns[0].seq);
}

// ---------------------------------------------------------------------------
// 5. Heartbeats
// ---------------------------------------------------------------------------

#[test]
fn heartbeat_echo_carries_rtt() {
    let server = make_server(|_| {});
    server.join();
    let _rx = connect(&server, "player-1");

    let replies = server.handle_client_message(
        "player-1",
        envelope(ClientBody::Heartbeat { sent_at: 1_000_000 }, None),
    );
    match &replies[0] {
        ServerBody::Heartbeat {
            server_time,
            client_time,
            rtt,
        } => {
            assert!(*server_time > 1_000_000);
            assert_eq!(*client_time, 1_000_000);
            // u64 is trivially non-negative; assert it is also sane.
            assert!(*rtt <= *server_time);
        }
        other => panic!("expected heartbeat, got {other:?}"),
    }
}

#[test]
fn missed_heartbeats_remove_player_and_broadcast_removal() {
    let server = make_server(|config| {
        config.heartbeat_interval = std::time::Duration::from_millis(50);
    });
    server.join(); // player-1
    server.join(); // player-2
    let _rx1 = connect(&server, "player-1");
    let mut rx2 = connect(&server, "player-2");
    server.run_tick_fixed();
    drain(&mut rx2);

    // Only player-2 keeps heartbeating; sweep three intervals.
    let interval = server.config.heartbeat_interval;
    let start = std::time::Instant::now();
    for i in 1..=3u32 {
        server.coordinator.note_heartbeat("player-2", 5);
        let expired = server.coordinator.sweep_heartbeats(
            start + interval * i + std::time::Duration::from_millis(10 * u64::from(i)),
            interval,
            server.config.heartbeat_max_missed,
        );
        for id in expired {
            server.disconnect(&id, "heartbeat_timeout");
        }
    }

    assert!(server.coordinator.subscriber("player-1").is_none());
    assert!(!server.has_player("player-1"));

    server.run_tick_fixed();
    let frames = state_frames(drain(&mut rx2));
    let removed = frames.iter().flat_map(|f| &f.patches).any(|p| {
        matches!(
            p,
            gritfall_world::patch::Patch::PlayerRemoved { id } if id == "player-1"
        )
    });
    assert!(removed, "surviving client must learn about the removal");
}

// ---------------------------------------------------------------------------
// 6. Deterministic replay
// ---------------------------------------------------------------------------

#[test]
fn identical_seed_and_trace_produce_identical_patch_checksums() {
    let run = || {
        let server = make_server(|config| {
            config.seed = "abc".to_owned();
        });
        server.join();
        // No subscriber: patches accumulate in the journal for inspection.
        server.handle_client_message("player-1", input(1.0, 0.0, Facing::Right, 1));
        for tick in 0..30 {
            if tick == 5 {
                server.handle_client_message(
                    "player-1",
                    envelope(
                        ClientBody::Action {
                            action: "fireball".to_owned(),
                        },
                        Some(2),
                    ),
                );
            }
            if tick == 12 {
                server.handle_client_message("player-1", input(0.0, 1.0, Facing::Down, 3));
            }
            server.run_tick_fixed();
        }
        server.pending_patch_checksum()
    };

    assert_eq!(run(), run());
}

// ---------------------------------------------------------------------------
// World reset and resubscribe
// ---------------------------------------------------------------------------

#[test]
fn world_reset_forces_full_resync() {
    let server = make_server(|_| {});
    server.join();
    let mut rx = connect(&server, "player-1");
    server.run_tick_fixed();
    drain(&mut rx);

    let config = server.reset_world(&gritfall_world::config::ResetRequest {
        seed: Some("fresh".to_owned()),
        ..Default::default()
    });
    assert_eq!(config.seed, "fresh");
    assert!(server.has_player("player-1"), "players survive a reset");

    server.run_tick_fixed();
    let frames = state_frames(drain(&mut rx));
    assert!(frames.iter().any(|f| f.resync && f.players.is_some()));
}

#[test]
fn resubscribe_drain_semantics() {
    let server = make_server(|_| {});
    server.join();
    // Generate some patches without a subscriber to drain them.
    server.handle_client_message("player-1", input(1.0, 0.0, Facing::Right, 1));
    server.run_tick_fixed();

    let peek = server.resubscribe(&gritfall_server::ResubscribeRequest {
        drain_patches: Some(false),
        ..Default::default()
    });
    assert!(!peek.patches.is_empty());

    let drained = server.resubscribe(&gritfall_server::ResubscribeRequest {
        drain_patches: Some(true),
        ..Default::default()
    });
    assert!(!drained.patches.is_empty());

    // Drained: nothing left behind.
    let after = server.resubscribe(&gritfall_server::ResubscribeRequest {
        drain_patches: Some(false),
        include_snapshot: Some(false),
        ..Default::default()
    });
    assert!(after.patches.is_empty());
    assert!(after.players.is_none());
    assert!(!after.resync);
}
