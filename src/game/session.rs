//! Session context and the per-frame driver.
//!
//! `Game` owns every moving part — store, physics world, win monitor,
//! command watcher, simulation clock, seeded rng — and threads them through
//! each other explicitly. The only ambient state in the crate is the one
//! `thread_local` session below, which exists for the WASM bridge; everything
//! underneath takes `&mut` arguments.
//!
//! Frame order is fixed: reconcile bodies → apply movement → step physics →
//! sync positions into the store → evaluate the win condition. The win scan
//! therefore always sees the frame's own resolved physics state.

use std::cell::RefCell;
use std::collections::HashMap;

use glam::{Vec2, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::game::commands::{CommandWatcher, GenerationRequest};
use crate::game::interact::{self, InteractionOutcome};
use crate::game::physics::{BodyKind, PhysicsWorld};
use crate::game::state::{GameState, Snapshot};
use crate::game::win::WinMonitor;

/// Horizontal speed of the controlled player.
pub const MOVE_SPEED: f32 = 5.0;

/// Autopilot players amble, they don't sprint.
const AUTOPILOT_SPEED: f32 = 1.0;
const AUTOPILOT_PLAN_MIN: f64 = 1.0;
const AUTOPILOT_PLAN_SPREAD: f64 = 2.0;
const AUTOPILOT_INTERACT_CHANCE: f64 = 0.3;

/// Controlled-player input for one frame, as posted by the input layer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrameInput {
    /// Player the direction applies to; defaults to the controlled player.
    #[serde(default)]
    pub player: Option<String>,
    /// Raw ground-plane movement direction (x, z); normalized here.
    #[serde(default)]
    pub dir: [f32; 2],
}

/// A non-controlled player's current wander intent.
#[derive(Debug, Clone, Default)]
struct AutopilotPlan {
    direction: Vec2,
    next_plan_at: f64,
}

pub struct Game {
    state: GameState,
    physics: PhysicsWorld,
    monitor: WinMonitor,
    watcher: CommandWatcher,
    autopilot: HashMap<String, AutopilotPlan>,
    /// Simulation seconds since boot; stamps chat and drives contact timers.
    clock: f64,
    rng: StdRng,
}

impl Game {
    pub fn new(seed: u64) -> Self {
        Self {
            state: GameState::new(),
            physics: PhysicsWorld::new(),
            monitor: WinMonitor::new(),
            watcher: CommandWatcher::new(),
            autopilot: HashMap::new(),
            clock: 0.0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    /// Read-only store access for the route layer.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    // ── Frame driver ───────────────────────────────────────────────

    /// Advance one frame and return the render snapshot.
    pub fn frame(&mut self, dt: f64, input: &FrameInput) -> Snapshot {
        self.clock += dt;
        self.reconcile_bodies();
        self.apply_movement(input);
        self.physics.step(dt as f32);
        self.sync_positions();
        self.monitor
            .evaluate(&mut self.state, &self.physics, self.clock);
        self.render_snapshot()
    }

    /// Make the physics body set match the store: a body per player, a body
    /// per object that is neither carried nor deleted. Positions flow the
    /// other way — a body is only ever (re)created from the store, never
    /// re-posed by it.
    fn reconcile_bodies(&mut self) {
        for (id, player) in &self.state.players {
            if !self.physics.contains(id) {
                self.physics.insert_player(id, player.position);
            }
        }

        let held = self.state.held_object_ids();
        for obj in &self.state.objects {
            if !held.contains(&obj.id) && !self.physics.contains(&obj.id) {
                self.physics.insert_object(obj);
            }
        }
        for id in self.physics.object_ids() {
            let keep = !held.contains(&id) && self.state.object(&id).is_some();
            if !keep {
                self.physics.remove(&id);
            }
        }
    }

    fn apply_movement(&mut self, input: &FrameInput) {
        let controlled = input
            .player
            .clone()
            .or_else(|| self.state.current_player_id.clone());
        let ids: Vec<String> = self.state.players.keys().cloned().collect();
        let mut triggered: Vec<String> = Vec::new();

        for id in ids {
            if controlled.as_deref() == Some(id.as_str()) {
                let dir = Vec2::new(input.dir[0], input.dir[1]);
                let v = if dir.length_squared() > 0.0 {
                    dir.normalize() * MOVE_SPEED
                } else {
                    Vec2::ZERO
                };
                self.physics.set_player_velocity(&id, v.x, v.y);
            } else {
                let direction = {
                    let plan = self.autopilot.entry(id.clone()).or_default();
                    if self.clock >= plan.next_plan_at {
                        plan.next_plan_at = self.clock
                            + AUTOPILOT_PLAN_MIN
                            + self.rng.gen_range(0.0..AUTOPILOT_PLAN_SPREAD);
                        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
                        plan.direction = Vec2::new(angle.cos(), angle.sin()) * AUTOPILOT_SPEED;
                        if self.rng.gen_bool(AUTOPILOT_INTERACT_CHANCE) {
                            triggered.push(id.clone());
                        }
                    }
                    plan.direction
                };
                self.physics.set_player_velocity(&id, direction.x, direction.y);
            }
        }

        for id in triggered {
            self.interact(&id);
        }
    }

    /// Mirror body transforms into the store: every player each frame, plus
    /// a display-only copy of each simulating object's position.
    fn sync_positions(&mut self) {
        let ids: Vec<String> = self.state.players.keys().cloned().collect();
        for id in ids {
            if let Some(pos) = self.physics.translation(&id) {
                self.state.update_player_position(&id, pos);
            }
        }

        let mut mirrored: Vec<(String, Vec3)> = Vec::new();
        self.physics.for_each_body(|tag, pos, _vel| {
            if tag.kind == BodyKind::DynamicObject {
                mirrored.push((tag.id.clone(), pos));
            }
        });
        for (id, pos) in mirrored {
            self.state.mirror_object_position(&id, pos);
        }
    }

    pub fn render_snapshot(&self) -> Snapshot {
        self.state
            .render_snapshot(self.monitor.best_contact_seconds(self.clock))
    }

    // ── Player operations ──────────────────────────────────────────

    pub fn add_player(&mut self, id: &str, color: &str) {
        self.state.add_player(id, color);
    }

    /// Hand control to `id`. Returns false (and changes nothing) for an
    /// unknown player.
    pub fn select_player(&mut self, id: &str) -> bool {
        if !self.state.players.contains_key(id) {
            return false;
        }
        self.state.set_current_player(id);
        true
    }

    /// Resolve one discrete interaction trigger for `player_id`.
    pub fn interact(&mut self, player_id: &str) -> InteractionOutcome {
        interact::resolve(&mut self.state, &self.physics, &mut self.rng, player_id)
    }

    // ── Chat & generation ──────────────────────────────────────────

    /// Append a chat message and scan it for commands. Returns the message
    /// id and any generation requests the host must now perform.
    pub fn add_message(&mut self, player_id: &str, text: &str) -> (String, Vec<GenerationRequest>) {
        let id = self.state.add_message(player_id, text, self.clock);
        let requests = self.watcher.scan(&mut self.state, &mut self.rng);
        (id, requests)
    }

    pub fn pending_generations(&self) -> &[GenerationRequest] {
        self.watcher.pending()
    }

    pub fn apply_world_generation(
        &mut self,
        token: u64,
        message_id: &str,
        text: &str,
    ) -> Result<(), String> {
        self.watcher
            .apply_world_result(&mut self.state, token, message_id, text)
    }

    pub fn apply_object_generation(
        &mut self,
        token: u64,
        message_id: &str,
        payload: &str,
    ) -> Result<String, String> {
        self.watcher
            .apply_object_result(&mut self.state, &mut self.rng, token, message_id, payload)
    }

    // ── World flags ────────────────────────────────────────────────

    pub fn set_world_description(&mut self, desc: &str) {
        self.state.set_world_description(desc);
    }

    pub fn set_is_dreaming(&mut self, is_dreaming: bool) {
        self.state.set_is_dreaming(is_dreaming);
    }

    // ── Resets ─────────────────────────────────────────────────────

    /// Fresh round: starter objects, cleared hands, re-armed win machinery.
    pub fn reset_round(&mut self) {
        self.state.reset_round();
        self.after_reset();
    }

    /// Fresh game: round reset plus chat, theme, and dreaming flag.
    pub fn reset_game(&mut self) {
        self.state.reset_game();
        self.after_reset();
    }

    fn after_reset(&mut self) {
        self.monitor.reset();
        self.watcher.bump_token();
        self.autopilot.clear();
        self.physics.clear_entities();
        self.reconcile_bodies();
    }
}

// ── Bridge session ─────────────────────────────────────────────────

thread_local! {
    static SESSION: RefCell<Game> = RefCell::new(Game::new(0));
}

/// Execute a closure with read access to the session.
pub fn with_session<F, R>(f: F) -> R
where
    F: FnOnce(&Game) -> R,
{
    SESSION.with(|s| f(&s.borrow()))
}

/// Execute a closure with mutable access to the session.
pub fn with_session_mut<F, R>(f: F) -> R
where
    F: FnOnce(&mut Game) -> R,
{
    SESSION.with(|s| f(&mut s.borrow_mut()))
}

/// Replace the entire session (boot, or test isolation).
pub fn replace_session(game: Game) {
    SESSION.with(|s| {
        *s.borrow_mut() = game;
    });
}
