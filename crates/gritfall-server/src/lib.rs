//! Gritfall server -- the authoritative arena server context.
//!
//! [`Server`] bundles the world, effect manager, journal, command buffer,
//! and subscriber coordinator behind their own locks, and owns the
//! per-tick orchestration:
//!
//! ```text
//! drain commands -> apply -> step world -> step effects
//!     -> journal (patches + events + keyframe) -> broadcast
//! ```
//!
//! The loop task ([`sim`]) drives [`Server::run_tick`] on a fixed-rate
//! ticker; tests drive it directly with the fixed timestep, which is also
//! how deterministic replay works. Locks are always taken in the same
//! order -- commands, world, effects, journal -- and never held across
//! network I/O.

#![deny(unsafe_code)]

pub mod config;
pub mod coordinator;
pub mod http;
pub mod session;
pub mod sim;
pub mod telemetry;

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use gritfall_effects::catalog::ENTRY_BURNING_AURA;
use gritfall_effects::event::EffectEvent;
use gritfall_effects::intent::EffectIntent;
use gritfall_effects::manager::{EffectManager, EffectSinks, ImpactRecord, ParityRecord};
use gritfall_journal::Journal;
use gritfall_proto::client::{ClientBody, ClientEnvelope};
use gritfall_proto::codec::encode_server;
use gritfall_proto::server::{JoinResponse, KeyframeMsg, NackReason, ServerBody, StateSnapshot};
use gritfall_world::command::{Command, CommandBuffer, CommandPayload};
use gritfall_world::config::{ResetRequest, WorldConfig, BURNING_DURATION_TICKS, REGISTERED_ACTIONS};
use gritfall_world::geom::Vec2;
use gritfall_world::world::{ConsoleOutcome, World};
use gritfall_world::RejectReason;

use config::ServerConfig;
use coordinator::{AckOutcome, Coordinator, SubscribeError};
use telemetry::Telemetry;

// ---------------------------------------------------------------------------
// TickReport
// ---------------------------------------------------------------------------

/// Summary of one executed tick, for telemetry and tests.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub tick: u64,
    pub duration: Duration,
    /// Whether the catch-up clamp truncated the measured dt.
    pub clamped: bool,
    pub commands_applied: usize,
    pub events_emitted: usize,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// The shared server context.
pub struct Server {
    pub config: ServerConfig,
    world: Mutex<World>,
    effects: Mutex<EffectManager>,
    journal: Mutex<Journal>,
    commands: Mutex<CommandBuffer>,
    pub coordinator: Coordinator,
    pub telemetry: Telemetry,
    /// Last completed tick number.
    tick: AtomicU64,
    broadcast_seq: AtomicU64,
    /// Next broadcast must carry full entity sets.
    force_resync: AtomicBool,
    /// Next tick must record a keyframe.
    force_keyframe: AtomicBool,
    overrun_streak: AtomicU32,
    next_player: AtomicU64,
    started_at: Instant,
}

/// Shared handle used by tasks and handlers.
pub type SharedServer = Arc<Server>;

impl Server {
    pub fn new(config: ServerConfig, telemetry: Telemetry) -> SharedServer {
        let world_config = WorldConfig {
            seed: config.seed.clone(),
            ..Default::default()
        };
        Arc::new(Self {
            world: Mutex::new(World::new(world_config)),
            effects: Mutex::new(EffectManager::builtin(&config.seed)),
            journal: Mutex::new(Journal::new(config.journal)),
            commands: Mutex::new(CommandBuffer::new(
                config.command_capacity,
                config.per_actor_limit,
            )),
            coordinator: Coordinator::new(),
            telemetry,
            tick: AtomicU64::new(0),
            broadcast_seq: AtomicU64::new(0),
            force_resync: AtomicBool::new(false),
            force_keyframe: AtomicBool::new(false),
            overrun_streak: AtomicU32::new(0),
            next_player: AtomicU64::new(0),
            started_at: Instant::now(),
            config,
        })
    }

    /// Last completed tick.
    pub fn current_tick(&self) -> u64 {
        self.tick.load(Ordering::SeqCst)
    }

    /// Whether a player with this id is alive in the world.
    pub fn has_player(&self, id: &str) -> bool {
        self.world.lock().has_player(id)
    }

    fn now_unix_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    // -- join / subscribe ---------------------------------------------------

    /// Allocate a player id, spawn the actor, and return the full join
    /// snapshot.
    pub fn join(&self) -> JoinResponse {
        let id = format!("player-{}", self.next_player.fetch_add(1, Ordering::SeqCst) + 1);
        let snapshot = {
            let mut world = self.world.lock();
            world
                .add_player(&id)
                .expect("freshly allocated ids are unique");
            world.snapshot()
        };
        let catalog = self.effects.lock().catalog().snapshot();
        let hash = catalog.hash.clone();

        JoinResponse {
            ver: gritfall_proto::WIRE_VERSION,
            id,
            players: snapshot.players,
            npcs: snapshot.npcs,
            obstacles: snapshot.obstacles,
            effect_triggers: Some(catalog),
            ground_items: Some(snapshot.ground_items),
            patches: None,
            config: snapshot.config,
            resync: true,
            keyframe_interval: Some(self.config.keyframe_interval_ticks),
            effect_catalog_hash: hash,
        }
    }

    /// Register a subscriber channel for a joined player.
    pub fn subscribe(
        &self,
        player_id: &str,
        sender: tokio::sync::mpsc::Sender<String>,
    ) -> Result<(), SubscribeError> {
        self.coordinator.subscribe(player_id, sender)?;
        Ok(())
    }

    /// Disconnect a client: drop the subscription, remove the player, and
    /// purge its journal references. The removal patch emitted by the
    /// world reaches the remaining clients on the next broadcast.
    pub fn disconnect(&self, player_id: &str, reason: &'static str) {
        if self.coordinator.unsubscribe(player_id) {
            self.telemetry
                .counters
                .disconnects
                .fetch_add(1, Ordering::Relaxed);
            self.telemetry.emit_info(
                "sessions",
                "disconnect",
                serde_json::json!({ "player": player_id, "reason": reason }),
            );
        }
        {
            let mut world = self.world.lock();
            world.remove_player(player_id);
            let mut journal = self.journal.lock();
            journal.purge_entity(player_id);
        }
        self.force_keyframe.store(true, Ordering::SeqCst);
    }

    // -- inbound messages ---------------------------------------------------

    /// Process one decoded client message, returning the immediate
    /// replies the session should send.
    pub fn handle_client_message(
        &self,
        player_id: &str,
        envelope: ClientEnvelope,
    ) -> Vec<ServerBody> {
        if let Some(ack) = envelope.ack {
            if let Some(AckOutcome::Regressed { last, got }) =
                self.coordinator.record_ack(player_id, ack)
            {
                self.telemetry
                    .counters
                    .ack_regressions
                    .fetch_add(1, Ordering::Relaxed);
                self.telemetry.emit_warn(
                    "sessions",
                    "ack_regression",
                    serde_json::json!({ "player": player_id, "last": last, "got": got }),
                );
            }
        }

        match envelope.body {
            ClientBody::Heartbeat { sent_at } => {
                let now = Self::now_unix_ms();
                let rtt = now.saturating_sub(sent_at);
                self.coordinator.note_heartbeat(player_id, rtt);
                vec![ServerBody::Heartbeat {
                    server_time: now,
                    client_time: sent_at,
                    rtt,
                }]
            }
            ClientBody::KeyframeRequest { keyframe_seq } => {
                vec![self.handle_keyframe_request(player_id, keyframe_seq)]
            }
            ClientBody::KeyframeCadence { keyframe_interval } => {
                self.coordinator
                    .set_keyframe_interval(player_id, keyframe_interval);
                match envelope.seq {
                    Some(seq) => {
                        self.coordinator.record_command_seq(player_id, seq);
                        vec![ServerBody::CommandAck { seq, tick: None }]
                    }
                    None => Vec::new(),
                }
            }
            ClientBody::Input { dx, dy, facing } => self.stage_command(
                player_id,
                envelope.seq,
                CommandPayload::Input { dx, dy, facing },
            ),
            ClientBody::Path { x, y } => {
                self.stage_command(player_id, envelope.seq, CommandPayload::SetPath { x, y })
            }
            ClientBody::CancelPath => {
                self.stage_command(player_id, envelope.seq, CommandPayload::CancelPath)
            }
            ClientBody::Action { action } => {
                self.stage_command(player_id, envelope.seq, CommandPayload::Action { name: action })
            }
            ClientBody::Console { cmd, qty } => {
                self.stage_command(player_id, envelope.seq, CommandPayload::Console { cmd, qty })
            }
        }
    }

    fn handle_keyframe_request(&self, player_id: &str, keyframe_seq: u64) -> ServerBody {
        if self
            .coordinator
            .keyframe_request_limited(player_id, self.config.keyframe_request_min_interval)
        {
            return ServerBody::KeyframeNack {
                reason: NackReason::RateLimited,
                sequence: keyframe_seq,
                catalog: None,
            };
        }

        let journal = self.journal.lock();
        if let Some(frame) = journal.keyframe_by_sequence(keyframe_seq) {
            return ServerBody::Keyframe(KeyframeMsg {
                sequence: frame.sequence,
                tick: frame.tick,
                players: frame.world.players.clone(),
                npcs: frame.world.npcs.clone(),
                obstacles: frame.world.obstacles.clone(),
                ground_items: frame.world.ground_items.clone(),
                config: frame.world.config.clone(),
                effect_catalog: frame.catalog.clone(),
            });
        }
        drop(journal);

        // Outside the window: the client's incremental state is beyond
        // repair, so the next broadcast goes out full.
        self.force_resync.store(true, Ordering::SeqCst);
        let catalog = self.effects.lock().catalog().snapshot();
        ServerBody::KeyframeNack {
            reason: NackReason::Expired,
            sequence: keyframe_seq,
            catalog: Some(catalog),
        }
    }

    fn stage_command(
        &self,
        player_id: &str,
        seq: Option<u64>,
        payload: CommandPayload,
    ) -> Vec<ServerBody> {
        if let Some(seq) = seq {
            if self.coordinator.is_duplicate_seq(player_id, seq) {
                // Idempotent re-ack; the command is not re-applied.
                return vec![ServerBody::CommandAck { seq, tick: None }];
            }
        }

        let origin_tick = self.current_tick() + 1;
        let rejection = if !self.world.lock().has_player(player_id) {
            Some(RejectReason::UnknownActor)
        } else if matches!(&payload, CommandPayload::Action { name } if !REGISTERED_ACTIONS.contains(&name.as_str()))
        {
            Some(RejectReason::InvalidAction)
        } else {
            let mut commands = self.commands.lock();
            let result = commands.enqueue(player_id, payload, origin_tick);
            self.telemetry
                .counters
                .queue_occupancy
                .store(commands.len(), Ordering::Relaxed);
            result.err()
        };

        match rejection {
            None => {
                if let Some(seq) = seq {
                    self.coordinator.record_command_seq(player_id, seq);
                    vec![ServerBody::CommandAck {
                        seq,
                        tick: Some(origin_tick),
                    }]
                } else {
                    Vec::new()
                }
            }
            Some(reason) => {
                if matches!(reason, RejectReason::QueueLimit | RejectReason::QueueFull) {
                    self.telemetry
                        .counters
                        .command_drops
                        .fetch_add(1, Ordering::Relaxed);
                    self.telemetry.emit_warn(
                        "commands",
                        "command_rejected",
                        serde_json::json!({ "player": player_id, "reason": reason.as_str() }),
                    );
                }
                vec![ServerBody::CommandReject {
                    seq: seq.unwrap_or(0),
                    reason: reason.as_str().to_owned(),
                    retry: Some(reason.retryable()),
                    tick: Some(origin_tick),
                }]
            }
        }
    }

    // -- tick execution -----------------------------------------------------

    /// Execute one tick with the fixed timestep (tests, replay).
    pub fn run_tick_fixed(&self) -> TickReport {
        self.run_tick(self.config.fixed_dt(), false)
    }

    /// Execute one tick with a measured (already clamped) dt.
    pub fn run_tick(&self, dt: f64, clamped: bool) -> TickReport {
        let start = Instant::now();
        let tick = self.tick.fetch_add(1, Ordering::SeqCst) + 1;

        // Seal the command snapshot.
        let drained: Vec<Command> = {
            let mut commands = self.commands.lock();
            let drained = commands.drain();
            self.telemetry
                .counters
                .queue_occupancy
                .store(commands.len(), Ordering::Relaxed);
            drained
        };
        let commands_applied = drained.len();

        let mut console_replies: Vec<(String, ServerBody)> = Vec::new();
        let mut removed_players: Vec<String> = Vec::new();
        let events_emitted;

        {
            let mut world = self.world.lock();
            world.set_tick(tick);

            for command in &drained {
                self.apply_command(&mut world, command, &mut console_replies);
            }

            let conditions_applied = world.step_actors(dt);
            let directives = world.advance_conditions(tick);
            let triggers = world.drain_triggers();

            let mut effects = self.effects.lock();
            for directive in directives {
                effects.apply_directive(directive);
            }
            for applied in conditions_applied {
                if let Some(pos) = world.actor_pos(&applied.actor) {
                    let effect_id = effects.enqueue(EffectIntent::for_attachment(
                        ENTRY_BURNING_AURA,
                        &applied.actor,
                        pos,
                        BURNING_DURATION_TICKS,
                    ));
                    world.attach_condition_effect(&applied.actor, applied.kind, effect_id);
                }
            }
            for trigger in triggers {
                if let Some(intent) = EffectIntent::for_action(&trigger) {
                    effects.enqueue(intent);
                }
            }

            let mut sinks = TelemetryEffectSinks {
                telemetry: &self.telemetry,
            };
            let events: Vec<EffectEvent> =
                effects.advance(tick, self.config.fixed_dt(), &mut world, &mut sinks);
            events_emitted = events.len();

            let mut patches = world.drain_patches();
            for patch in &patches {
                if patch.kind() == "player_removed" {
                    removed_players.push(patch.entity_id().to_owned());
                }
            }

            let make_keyframe = tick % self.config.keyframe_interval_ticks == 0
                || self.force_keyframe.swap(false, Ordering::SeqCst);
            let catalog_snapshot = if make_keyframe {
                Some(effects.catalog().snapshot())
            } else {
                None
            };
            drop(effects);

            let mut journal = self.journal.lock();
            for id in &removed_players {
                // Older buffered patches for the leaver are gone; only the
                // removal itself is replicated.
                journal.purge_entity(id);
                patches.retain(|p| p.entity_id() != id.as_str() || p.kind() == "player_removed");
            }
            journal.record_tick(patches, events);
            if let Some(catalog) = catalog_snapshot {
                journal.record_keyframe(tick, world.snapshot(), catalog);
            }
        }

        for (player, reply) in console_replies {
            self.send_to(&player, &reply);
        }
        for id in &removed_players {
            if self.coordinator.unsubscribe(id) {
                self.telemetry
                    .counters
                    .disconnects
                    .fetch_add(1, Ordering::Relaxed);
            }
        }

        self.broadcast(tick);

        let duration = start.elapsed();
        self.watch_tick_budget(tick, duration);

        TickReport {
            tick,
            duration,
            clamped,
            commands_applied,
            events_emitted,
        }
    }

    fn apply_command(
        &self,
        world: &mut World,
        command: &Command,
        console_replies: &mut Vec<(String, ServerBody)>,
    ) {
        let actor = command.actor.as_str();
        match &command.payload {
            CommandPayload::Input { dx, dy, facing } => {
                // The actor may have died between enqueue and apply.
                let _ = world.set_intent(actor, *dx, *dy, *facing);
            }
            CommandPayload::SetPath { x, y } => {
                let _ = world.set_path(actor, Vec2::new(*x, *y));
            }
            CommandPayload::CancelPath => {
                let _ = world.clear_path(actor);
            }
            CommandPayload::Action { name } => {
                let _ = world.handle_action(actor, name);
            }
            CommandPayload::Console { cmd, qty } => {
                let outcome = world.handle_console(actor, cmd, *qty);
                console_replies.push((actor.to_owned(), console_ack(cmd, &outcome)));
            }
        }
    }

    fn watch_tick_budget(&self, tick: u64, duration: Duration) {
        let budget = self.config.tick_period();
        let threshold = budget.mul_f64(self.config.budget_threshold_ratio);
        if duration <= threshold {
            self.overrun_streak.store(0, Ordering::SeqCst);
            return;
        }

        self.telemetry
            .counters
            .tick_overruns
            .fetch_add(1, Ordering::Relaxed);
        self.telemetry.emit_warn(
            "loop",
            "tick_budget_overrun",
            serde_json::json!({
                "tick": tick,
                "durationMicros": duration.as_micros() as u64,
                "budgetMicros": budget.as_micros() as u64,
            }),
        );

        let streak = self.overrun_streak.fetch_add(1, Ordering::SeqCst) + 1;
        if streak >= self.config.budget_threshold_streak {
            self.overrun_streak.store(0, Ordering::SeqCst);
            self.force_resync.store(true, Ordering::SeqCst);
            self.force_keyframe.store(true, Ordering::SeqCst);
            self.telemetry.emit_warn(
                "loop",
                "tick_budget_alarm",
                serde_json::json!({ "tick": tick, "streak": streak, "resyncScheduled": true }),
            );
        }
    }

    // -- broadcast ----------------------------------------------------------

    /// Compose and fan out this tick's state frames.
    fn broadcast(&self, tick: u64) {
        let subscribers = self.coordinator.snapshot();
        if subscribers.is_empty() {
            return;
        }

        let (patches, events, cursors, keyframe_seq, global_resync) = {
            let mut journal = self.journal.lock();
            let hint = journal.consume_resync_hint(tick);
            if let Some(hint) = &hint {
                self.telemetry.emit_warn(
                    "effects",
                    "resync_hint",
                    serde_json::json!({
                        "reason": hint.reason,
                        "missingSpawns": hint.missing_spawns,
                        "staleSequences": hint.stale_sequences,
                    }),
                );
            }
            let global_resync = self.force_resync.swap(false, Ordering::SeqCst) || hint.is_some();
            (
                journal.drain_patches(),
                journal.drain_events(),
                journal.effect_seq_cursors(),
                journal.last_keyframe_sequence(),
                global_resync,
            )
        };

        let need_full = global_resync
            || subscribers
                .iter()
                .any(|s| !s.state.lock().sent_first_frame);
        let full = if need_full {
            let snapshot = self.world.lock().snapshot();
            let catalog = self.effects.lock().catalog().snapshot();
            Some((snapshot, catalog))
        } else {
            None
        };

        let sequence = self.broadcast_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let base = StateSnapshot {
            tick,
            sequence,
            keyframe_seq,
            players: None,
            npcs: None,
            obstacles: None,
            ground_items: None,
            effect_spawns: events.spawns.clone(),
            effect_updates: events.updates.clone(),
            effect_ends: events.ends.clone(),
            effect_seq_cursors: cursors,
            patches: patches.clone(),
            config: None,
            effect_catalog: None,
            resync: false,
            keyframe_interval: None,
        };

        let mut failed: Vec<String> = Vec::new();
        let mut sent = 0u64;
        for subscriber in &subscribers {
            let (resync_this, interval) = {
                let state = subscriber.state.lock();
                (
                    global_resync || !state.sent_first_frame,
                    state
                        .keyframe_interval
                        .unwrap_or(self.config.keyframe_interval_ticks),
                )
            };

            let mut frame = base.clone();
            frame.keyframe_interval = Some(interval);
            if resync_this {
                let (snapshot, catalog) = full.as_ref().expect("full snapshot prepared");
                frame.resync = true;
                frame.players = Some(snapshot.players.clone());
                frame.npcs = Some(snapshot.npcs.clone());
                frame.obstacles = Some(snapshot.obstacles.clone());
                frame.ground_items = Some(snapshot.ground_items.clone());
                frame.config = Some(snapshot.config.clone());
                frame.effect_catalog = Some(catalog.clone());
            }

            let encoded = encode_server(&ServerBody::State(frame));
            match subscriber.sender.try_send(encoded) {
                Ok(()) => {
                    sent += 1;
                    subscriber.state.lock().sent_first_frame = true;
                }
                Err(_) => {
                    // Channel full (backpressure) or closed: drop the
                    // client and re-emit the deltas next tick.
                    failed.push(subscriber.player_id.clone());
                }
            }
        }
        self.telemetry
            .counters
            .frames_sent
            .fetch_add(sent, Ordering::Relaxed);

        if !failed.is_empty() {
            {
                let mut journal = self.journal.lock();
                journal.restore_patches(patches);
                journal.restore_events(events);
            }
            for id in failed {
                tracing::warn!(player = %id, "subscriber backpressure, disconnecting");
                self.disconnect(&id, "backpressure");
            }
        }
    }

    /// Best-effort direct send to one subscriber.
    pub fn send_to(&self, player_id: &str, body: &ServerBody) {
        if let Some(subscriber) = self.coordinator.subscriber(player_id) {
            let _ = subscriber.sender.try_send(encode_server(body));
        }
    }

    // -- HTTP-facing operations ----------------------------------------------

    /// Current state frame for the resubscribe endpoint.
    pub fn resubscribe(&self, request: &ResubscribeRequest) -> StateSnapshot {
        let include_snapshot = request.include_snapshot.unwrap_or(true);
        let snapshot = if include_snapshot {
            Some(self.world.lock().snapshot())
        } else {
            None
        };
        let catalog = if request.effect_triggers.unwrap_or(false) {
            Some(self.effects.lock().catalog().snapshot())
        } else {
            None
        };

        let mut journal = self.journal.lock();
        let patches = if request.drain_patches.unwrap_or(false) {
            journal.drain_patches()
        } else {
            journal.snapshot_patches()
        };
        let cursors = journal.effect_seq_cursors();
        let keyframe_seq = journal.last_keyframe_sequence();
        drop(journal);

        let take = |flag: Option<bool>| flag.unwrap_or(include_snapshot);
        StateSnapshot {
            tick: self.current_tick(),
            sequence: self.broadcast_seq.load(Ordering::SeqCst),
            keyframe_seq,
            players: snapshot
                .as_ref()
                .filter(|_| take(request.players))
                .map(|s| s.players.clone()),
            npcs: snapshot
                .as_ref()
                .filter(|_| take(request.npcs))
                .map(|s| s.npcs.clone()),
            obstacles: snapshot.as_ref().map(|s| s.obstacles.clone()),
            ground_items: snapshot
                .as_ref()
                .filter(|_| take(request.ground_items))
                .map(|s| s.ground_items.clone()),
            effect_spawns: Vec::new(),
            effect_updates: Vec::new(),
            effect_ends: Vec::new(),
            effect_seq_cursors: cursors,
            patches,
            config: snapshot.as_ref().map(|s| s.config.clone()),
            effect_catalog: catalog,
            resync: include_snapshot,
            keyframe_interval: Some(self.config.keyframe_interval_ticks),
        }
    }

    /// Rebuild the world (and effects) from new generation parameters.
    /// The next broadcast is a forced full resync with a fresh keyframe.
    pub fn reset_world(&self, request: &ResetRequest) -> WorldConfig {
        let config = {
            let mut world = self.world.lock();
            world.reset(request);
            let seed = world.config().seed.clone();
            self.effects.lock().clear(&seed);
            let mut journal = self.journal.lock();
            // Pre-reset deltas describe a world that no longer exists.
            journal.drain_patches();
            journal.drain_events();
            world.config().clone()
        };
        self.force_keyframe.store(true, Ordering::SeqCst);
        self.force_resync.store(true, Ordering::SeqCst);
        self.telemetry.emit_info(
            "loop",
            "world_reset",
            serde_json::json!({ "seed": config.seed }),
        );
        config
    }

    /// Diagnostics payload for the HTTP endpoint.
    pub fn diagnostics(&self) -> serde_json::Value {
        serde_json::json!({
            "status": "ok",
            "serverTime": Self::now_unix_ms(),
            "players": self.world.lock().player_count(),
            "tickRate": self.config.tick_rate,
            "heartbeatMillis": self.config.heartbeat_interval.as_millis() as u64,
            "uptimeMillis": self.started_at.elapsed().as_millis() as u64,
            "telemetry": self.telemetry.counters.snapshot(),
        })
    }

    /// The effect catalog snapshot (HTTP and tests).
    pub fn catalog_snapshot(&self) -> gritfall_effects::catalog::CatalogSnapshot {
        self.effects.lock().catalog().snapshot()
    }

    /// Checksum of the currently buffered patch batch (determinism tests).
    pub fn pending_patch_checksum(&self) -> String {
        gritfall_journal::patch_checksum(&self.journal.lock().snapshot_patches())
    }
}

// ---------------------------------------------------------------------------
// Request/reply helpers
// ---------------------------------------------------------------------------

/// Body accepted by `POST /resubscribe`.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResubscribeRequest {
    pub players: Option<bool>,
    pub npcs: Option<bool>,
    pub effect_triggers: Option<bool>,
    pub ground_items: Option<bool>,
    pub drain_patches: Option<bool>,
    pub include_snapshot: Option<bool>,
}

fn console_ack(cmd: &str, outcome: &ConsoleOutcome) -> ServerBody {
    ServerBody::ConsoleAck {
        cmd: cmd.to_owned(),
        status: if outcome.ok { "ok" } else { "rejected" }.to_owned(),
        reason: outcome.reason.map(str::to_owned),
        qty: outcome.qty,
        stack_id: outcome.stack_id,
        slot: outcome.slot,
    }
}

/// Adapter feeding effect-manager telemetry into the router.
struct TelemetryEffectSinks<'a> {
    telemetry: &'a Telemetry,
}

impl EffectSinks for TelemetryEffectSinks<'_> {
    fn impact(&mut self, record: ImpactRecord) {
        self.telemetry
            .counters
            .effect_impacts
            .fetch_add(1, Ordering::Relaxed);
        self.telemetry.emit_info(
            "effects",
            "impact",
            serde_json::json!({
                "effect": record.effect,
                "entry": record.entry,
                "victim": record.victim,
                "damage": record.damage,
                "tick": record.tick,
            }),
        );
    }

    fn parity(&mut self, record: ParityRecord) {
        self.telemetry
            .counters
            .effect_parity_flushes
            .fetch_add(1, Ordering::Relaxed);
        self.telemetry.emit_info(
            "effects",
            "parity",
            serde_json::json!({
                "effect": record.effect,
                "entry": record.entry,
                "reason": record.reason.as_str(),
                "hitCount": record.hit_count,
                "uniqueVictims": record.unique_victims,
                "damageSum": record.damage_sum,
                "firstHitTick": record.first_hit_tick,
            }),
        );
    }
}
