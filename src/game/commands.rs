//! Chat-driven world commands.
//!
//! The watcher observes the append-only chat log and processes each message
//! at most once, keyed by message id. Trigger words decide what happens:
//! "world" asks the external text service for a rewritten theme, "make"
//! either spawns a bulk batch of boxes locally or asks the service for a
//! single object descriptor. The network call itself happens host-side; this
//! module only emits the pending requests and applies their results.
//!
//! Every request carries the watcher's current generation token. Resets bump
//! the token, so a result that completes after a reset is recognized as stale
//! and discarded instead of corrupting the fresh round.

use std::collections::HashSet;

use glam::Vec3;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::shape::Shape;
use crate::game::state::{DEFAULT_BOX_COLOR, GameObject, GameState, ObjectKind};

/// Boxes spawned by one bulk "make" request.
pub const BULK_SPAWN_COUNT: usize = 8;

/// Any of these alongside "make" means a batch, not a single object.
const BULK_KEYWORDS: [&str; 4] = ["bunch", "some", "many", "more"];

/// Fallback color when the descriptor omits one.
const DEFAULT_OBJECT_COLOR: &str = "white";

/// Spawned objects drop in from this height, scattered over ±`SPAWN_SPREAD`.
const SPAWN_HEIGHT: f32 = 5.0;
const SPAWN_SPREAD: f32 = 5.0;

/// An external generation the host still has to perform.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GenerationRequest {
    /// Rewrite the world description from the player's message.
    World {
        token: u64,
        message_id: String,
        player_id: String,
        text: String,
        world_description: String,
    },
    /// Produce a `{label, color, shape}` descriptor for a single object.
    Object {
        token: u64,
        message_id: String,
        player_id: String,
        text: String,
    },
}

impl GenerationRequest {
    pub fn message_id(&self) -> &str {
        match self {
            GenerationRequest::World { message_id, .. } => message_id,
            GenerationRequest::Object { message_id, .. } => message_id,
        }
    }

    pub fn token(&self) -> u64 {
        match self {
            GenerationRequest::World { token, .. } => *token,
            GenerationRequest::Object { token, .. } => *token,
        }
    }
}

/// Wire shape of a single-object generation result.
#[derive(Debug, Deserialize)]
struct ObjectDescriptor {
    label: Option<String>,
    color: Option<String>,
    shape: Option<Shape>,
}

pub struct CommandWatcher {
    /// Message ids already handled; scanning is idempotent against re-reads
    /// of the log.
    processed: HashSet<String>,
    /// Requests emitted but not yet answered by the host.
    pending: Vec<GenerationRequest>,
    /// Current generation token; results from earlier tokens are stale.
    token: u64,
}

impl CommandWatcher {
    pub fn new() -> Self {
        Self {
            processed: HashSet::new(),
            pending: Vec::new(),
            token: 1,
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn pending(&self) -> &[GenerationRequest] {
        &self.pending
    }

    /// Invalidate all in-flight generations. Called by both reset paths.
    pub fn bump_token(&mut self) {
        self.token += 1;
        self.pending.clear();
    }

    /// Process any unseen chat messages. Bulk spawns happen immediately;
    /// everything needing the external service is returned (and remembered)
    /// as a pending request.
    pub fn scan(&mut self, state: &mut GameState, rng: &mut impl Rng) -> Vec<GenerationRequest> {
        let unseen: Vec<(String, String, String)> = state
            .messages
            .iter()
            .filter(|m| !self.processed.contains(&m.id))
            .map(|m| (m.id.clone(), m.player_id.clone(), m.text.clone()))
            .collect();

        let mut emitted = Vec::new();
        for (message_id, player_id, text) in unseen {
            self.processed.insert(message_id.clone());
            let lower = text.to_lowercase();

            if lower.contains("world") {
                emitted.push(GenerationRequest::World {
                    token: self.token,
                    message_id: message_id.clone(),
                    player_id: player_id.clone(),
                    text: text.clone(),
                    world_description: state.world_description.clone(),
                });
            }

            if lower.contains("make") {
                if BULK_KEYWORDS.iter().any(|k| lower.contains(k)) {
                    let batch: Vec<GameObject> =
                        (0..BULK_SPAWN_COUNT).map(|_| bulk_box(rng)).collect();
                    tracing::info!(count = batch.len(), player = %player_id, "bulk box spawn");
                    state.add_objects(batch);
                } else {
                    emitted.push(GenerationRequest::Object {
                        token: self.token,
                        message_id,
                        player_id,
                        text,
                    });
                }
            }
        }

        self.pending.extend(emitted.iter().cloned());
        emitted
    }

    /// Apply a world-description result. Stale tokens and empty text are
    /// rejected and leave the store untouched.
    pub fn apply_world_result(
        &mut self,
        state: &mut GameState,
        token: u64,
        message_id: &str,
        text: &str,
    ) -> Result<(), String> {
        if token != self.token {
            tracing::warn!(token, current = self.token, "discarding stale world result");
            return Err("stale generation token".to_string());
        }
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err("empty world description".to_string());
        }
        self.pending.retain(|r| r.message_id() != message_id);
        tracing::info!(%trimmed, "world description updated");
        state.set_world_description(trimmed);
        Ok(())
    }

    /// Apply a single-object result: parse the descriptor (tolerating
    /// markdown fences and missing fields) and spawn it at a random elevated
    /// point. Returns the new object id.
    pub fn apply_object_result(
        &mut self,
        state: &mut GameState,
        rng: &mut impl Rng,
        token: u64,
        message_id: &str,
        payload: &str,
    ) -> Result<String, String> {
        if token != self.token {
            tracing::warn!(token, current = self.token, "discarding stale object result");
            return Err("stale generation token".to_string());
        }
        let cleaned = payload.replace("```json", "").replace("```", "");
        let descriptor: ObjectDescriptor = serde_json::from_str(cleaned.trim())
            .map_err(|e| format!("invalid object descriptor: {e}"))?;

        self.pending.retain(|r| r.message_id() != message_id);

        let obj = GameObject {
            id: Uuid::new_v4().to_string(),
            kind: ObjectKind::Dynamic,
            position: elevated_spawn(rng),
            color: descriptor
                .color
                .unwrap_or_else(|| DEFAULT_OBJECT_COLOR.to_string()),
            shape: descriptor.shape.unwrap_or_default(),
            scale: Vec3::ONE,
        };
        tracing::info!(
            id = %obj.id,
            label = descriptor.label.as_deref().unwrap_or("Unknown"),
            "generated object spawned"
        );
        let id = obj.id.clone();
        state.add_object(obj);
        Ok(id)
    }
}

impl Default for CommandWatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn elevated_spawn(rng: &mut impl Rng) -> Vec3 {
    Vec3::new(
        rng.gen_range(-SPAWN_SPREAD..SPAWN_SPREAD),
        SPAWN_HEIGHT,
        rng.gen_range(-SPAWN_SPREAD..SPAWN_SPREAD),
    )
}

fn bulk_box(rng: &mut impl Rng) -> GameObject {
    GameObject {
        id: Uuid::new_v4().to_string(),
        kind: ObjectKind::Dynamic,
        position: elevated_spawn(rng),
        color: DEFAULT_BOX_COLOR.to_string(),
        shape: Shape::Box,
        scale: Vec3::ONE,
    }
}
