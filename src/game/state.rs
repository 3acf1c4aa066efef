//! Authoritative game state store.
//!
//! One serde-friendly struct per entity, mutated only through the typed
//! operations below so every mutation leaves a consistent snapshot. While an
//! object is simulating, the physics world owns its live transform and the
//! position stored here is a display-only mirror synced once per frame; the
//! stored value becomes authoritative again only when a body is (re)spawned
//! from it.
//!
//! Missing-entity mutations are deliberate no-ops: async callbacks and the
//! autopilot may race a reset and reference ids that are already gone.

use std::collections::{BTreeMap, HashSet};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::shape::{MeshSpec, Shape};

/// Spawn point for newly added players.
pub const DEFAULT_SPAWN: Vec3 = Vec3::new(0.0, 1.0, 0.0);

/// Goal height for the win condition.
pub const WIN_HEIGHT: f32 = 12.0;

/// Color of the starter wood blocks and of bulk-spawned boxes.
pub const DEFAULT_BOX_COLOR: &str = "#ff9831";

/// Environment theme before anyone rewrites the world.
pub const DEFAULT_WORLD_DESCRIPTION: &str = "A mushroom farm where cute mushmallow characters run around and stack wood blocks. Keep the background stable. Render high quality video game graphics in the Studio Ghibli animation art style.";

/// Theme restored by a full game reset.
const RESET_WORLD_DESCRIPTION: &str = "A miniature mushroom farm where cute mushmallow people run around and build cabins with wood blocks. Keep the background stable. Video game graphics in the Studio Ghibli animation style.";

/// An avatar in the sandbox. At most one held object per player; the held
/// object is logically detached from the world while carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub position: Vec3,
    pub color: String,
    pub held_object_id: Option<String>,
}

/// Whether an object participates in the dynamics simulation or stands fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Static,
    Dynamic,
}

/// A physical block (or merged rocket) in the world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameObject {
    pub id: String,
    pub kind: ObjectKind,
    pub position: Vec3,
    pub color: String,
    pub shape: Shape,
    pub scale: Vec3,
}

/// One entry in the append-only chat log. Timestamps are simulation-clock
/// seconds, not wall clock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub player_id: String,
    pub text: String,
    pub timestamp: f64,
}

/// Inputs for the atomic merge of stacked blocks into one rocket.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub centroid_x: f32,
    pub centroid_z: f32,
    /// Replacement object appended by the merge.
    pub rocket: GameObject,
    /// Horizontal radius around the centroid inside which dynamic objects
    /// are cleared.
    pub clear_radius: f32,
}

/// The complete store. Everything the render layer and the command watcher
/// read lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub world_description: String,
    pub is_dreaming: bool,
    pub players: BTreeMap<String, Player>,
    pub current_player_id: Option<String>,
    pub objects: Vec<GameObject>,
    pub messages: Vec<ChatMessage>,
    pub has_won: bool,
    pub win_height: f32,
}

/// The object set a round starts (and restarts) with.
fn starter_objects() -> Vec<GameObject> {
    vec![
        GameObject {
            id: "dynamic_1".to_string(),
            kind: ObjectKind::Dynamic,
            position: Vec3::new(-2.0, 0.0, 2.0),
            color: DEFAULT_BOX_COLOR.to_string(),
            shape: Shape::Box,
            scale: Vec3::ONE,
        },
        GameObject {
            id: "dynamic_2".to_string(),
            kind: ObjectKind::Dynamic,
            position: Vec3::new(-4.0, 0.0, 4.0),
            color: DEFAULT_BOX_COLOR.to_string(),
            shape: Shape::Box,
            scale: Vec3::ONE,
        },
    ]
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            world_description: DEFAULT_WORLD_DESCRIPTION.to_string(),
            is_dreaming: false,
            players: BTreeMap::new(),
            current_player_id: None,
            objects: starter_objects(),
            messages: Vec::new(),
            has_won: false,
            win_height: WIN_HEIGHT,
        }
    }
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Players ────────────────────────────────────────────────────

    /// Add a player at the default spawn. No-op if the id already exists.
    pub fn add_player(&mut self, id: &str, color: &str) {
        if self.players.contains_key(id) {
            return;
        }
        self.players.insert(
            id.to_string(),
            Player {
                id: id.to_string(),
                position: DEFAULT_SPAWN,
                color: color.to_string(),
                held_object_id: None,
            },
        );
    }

    /// Overwrite a player's mirrored position. No-op if the player is unknown.
    pub fn update_player_position(&mut self, id: &str, position: Vec3) {
        if let Some(player) = self.players.get_mut(id) {
            player.position = position;
        }
    }

    pub fn set_current_player(&mut self, id: &str) {
        self.current_player_id = Some(id.to_string());
    }

    /// Record that `player_id` now carries `object_id`.
    ///
    /// The store does not check whether the object is free; the interaction
    /// resolver validates the at-most-one-holder rule before calling this.
    pub fn pickup_object(&mut self, player_id: &str, object_id: &str) {
        if let Some(player) = self.players.get_mut(player_id) {
            player.held_object_id = Some(object_id.to_string());
        }
    }

    /// Release the held object at `new_position`. No-op if the player is
    /// unknown or empty-handed; if the object was removed while carried, the
    /// held reference is still cleared.
    pub fn drop_object(&mut self, player_id: &str, new_position: Vec3) {
        let Some(player) = self.players.get_mut(player_id) else {
            return;
        };
        let Some(held_id) = player.held_object_id.take() else {
            return;
        };
        if let Some(obj) = self.objects.iter_mut().find(|o| o.id == held_id) {
            obj.position = new_position;
        }
    }

    /// The player currently carrying `object_id`, if any.
    pub fn holder_of(&self, object_id: &str) -> Option<&str> {
        self.players
            .values()
            .find(|p| p.held_object_id.as_deref() == Some(object_id))
            .map(|p| p.id.as_str())
    }

    /// Ids of all objects currently carried by some player.
    pub fn held_object_ids(&self) -> HashSet<String> {
        self.players
            .values()
            .filter_map(|p| p.held_object_id.clone())
            .collect()
    }

    // ── Objects ────────────────────────────────────────────────────

    pub fn add_object(&mut self, obj: GameObject) {
        self.objects.push(obj);
    }

    pub fn add_objects(&mut self, objs: Vec<GameObject>) {
        self.objects.extend(objs);
    }

    pub fn remove_object(&mut self, id: &str) {
        self.objects.retain(|o| o.id != id);
    }

    pub fn object(&self, id: &str) -> Option<&GameObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    /// Per-frame mirror of a simulating body's transform. Display-only; never
    /// fed back into the next physics step.
    pub fn mirror_object_position(&mut self, id: &str, position: Vec3) {
        if let Some(obj) = self.objects.iter_mut().find(|o| o.id == id) {
            obj.position = position;
        }
    }

    // ── Chat ───────────────────────────────────────────────────────

    /// Append a chat message with a generated id. Returns the new id.
    pub fn add_message(&mut self, player_id: &str, text: &str, timestamp: f64) -> String {
        let id = Uuid::new_v4().to_string();
        self.messages.push(ChatMessage {
            id: id.clone(),
            player_id: player_id.to_string(),
            text: text.to_string(),
            timestamp,
        });
        id
    }

    // ── World / win flags ──────────────────────────────────────────

    pub fn set_world_description(&mut self, desc: &str) {
        self.world_description = desc.to_string();
    }

    pub fn set_is_dreaming(&mut self, is_dreaming: bool) {
        self.is_dreaming = is_dreaming;
    }

    pub fn set_has_won(&mut self, has_won: bool) {
        self.has_won = has_won;
    }

    /// Atomically replace the stacked structure with the rocket: clear every
    /// dynamic object within the plan's radius of the centroid, append the
    /// rocket, force-release all held objects, and latch the win flag.
    /// Returns the cleared ids.
    pub fn merge_objects_into_rocket(&mut self, plan: &MergePlan) -> Vec<String> {
        let radius_sq = plan.clear_radius * plan.clear_radius;
        let mut cleared = Vec::new();
        self.objects.retain(|o| {
            let dx = o.position.x - plan.centroid_x;
            let dz = o.position.z - plan.centroid_z;
            let inside = o.kind == ObjectKind::Dynamic && dx * dx + dz * dz <= radius_sq;
            if inside {
                cleared.push(o.id.clone());
            }
            !inside
        });
        self.objects.push(plan.rocket.clone());
        for player in self.players.values_mut() {
            player.held_object_id = None;
        }
        self.has_won = true;
        cleared
    }

    // ── Resets ─────────────────────────────────────────────────────

    /// Restore the starter object set and re-open the round. Chat and the
    /// world description survive.
    pub fn reset_round(&mut self) {
        self.objects = starter_objects();
        for player in self.players.values_mut() {
            player.held_object_id = None;
        }
        self.has_won = false;
    }

    /// Round reset plus a fresh chat log, theme, and dreaming flag. Players
    /// survive; they only go away with the session itself.
    pub fn reset_game(&mut self) {
        self.reset_round();
        self.messages.clear();
        self.world_description = RESET_WORLD_DESCRIPTION.to_string();
        self.is_dreaming = false;
    }

    // ── Render snapshot ────────────────────────────────────────────

    /// Read-only view for the render layer: held objects are filtered out of
    /// the object list (they ride on their carrier instead).
    pub fn render_snapshot(&self, contact_seconds: f64) -> Snapshot {
        let held = self.held_object_ids();
        Snapshot {
            world_description: self.world_description.clone(),
            is_dreaming: self.is_dreaming,
            current_player_id: self.current_player_id.clone(),
            players: self.players.values().cloned().collect(),
            objects: self
                .objects
                .iter()
                .filter(|o| !held.contains(&o.id))
                .map(|o| SnapshotObject {
                    id: o.id.clone(),
                    kind: o.kind,
                    position: o.position,
                    color: o.color.clone(),
                    shape: o.shape,
                    scale: o.scale,
                    mesh: o.shape.mesh_spec(o.scale),
                })
                .collect(),
            has_won: self.has_won,
            win_height: self.win_height,
            contact_seconds,
        }
    }
}

/// A visible object as the render layer sees it.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotObject {
    pub id: String,
    pub kind: ObjectKind,
    pub position: Vec3,
    pub color: String,
    pub shape: Shape,
    pub scale: Vec3,
    pub mesh: MeshSpec,
}

/// Per-frame view handed to the render layer. `contact_seconds` is the best
/// sustained goal contact so far, for near-win feedback.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub world_description: String,
    pub is_dreaming: bool,
    pub current_player_id: Option<String>,
    pub players: Vec<Player>,
    pub objects: Vec<SnapshotObject>,
    pub has_won: bool,
    pub win_height: f32,
    pub contact_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_player_is_idempotent() {
        let mut state = GameState::new();
        state.add_player("Millie", "white");
        state.update_player_position("Millie", Vec3::new(3.0, 1.0, 3.0));
        state.add_player("Millie", "red");

        let player = &state.players["Millie"];
        assert_eq!(player.color, "white");
        assert_eq!(player.position, Vec3::new(3.0, 1.0, 3.0));
    }

    #[test]
    fn update_position_for_unknown_player_is_noop() {
        let mut state = GameState::new();
        state.update_player_position("ghost", Vec3::ONE);
        assert!(state.players.is_empty());
    }

    #[test]
    fn pickup_and_drop_roundtrip() {
        let mut state = GameState::new();
        state.add_player("Boba", "red");
        state.pickup_object("Boba", "dynamic_1");
        assert_eq!(state.holder_of("dynamic_1"), Some("Boba"));
        assert!(state.held_object_ids().contains("dynamic_1"));

        state.drop_object("Boba", Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(state.holder_of("dynamic_1"), None);
        assert_eq!(
            state.object("dynamic_1").unwrap().position,
            Vec3::new(1.0, 2.0, 3.0)
        );
    }

    #[test]
    fn drop_with_empty_hands_is_noop() {
        let mut state = GameState::new();
        state.add_player("Boba", "red");
        let before = state.object("dynamic_1").unwrap().position;
        state.drop_object("Boba", Vec3::new(9.0, 9.0, 9.0));
        assert_eq!(state.object("dynamic_1").unwrap().position, before);
    }

    #[test]
    fn drop_clears_reference_even_if_object_was_removed() {
        let mut state = GameState::new();
        state.add_player("Boba", "red");
        state.pickup_object("Boba", "dynamic_1");
        state.remove_object("dynamic_1");
        state.drop_object("Boba", Vec3::ZERO);
        assert!(state.players["Boba"].held_object_id.is_none());
    }

    #[test]
    fn add_message_generates_unique_ids_and_stamps() {
        let mut state = GameState::new();
        let a = state.add_message("Millie", "hello", 1.5);
        let b = state.add_message("Millie", "hello", 2.5);
        assert_ne!(a, b);
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].timestamp, 1.5);
        assert_eq!(state.messages[1].player_id, "Millie");
    }

    #[test]
    fn merge_clears_dynamics_in_radius_and_latches_win() {
        let mut state = GameState::new();
        state.add_player("Millie", "white");
        state.pickup_object("Millie", "dynamic_1");
        state.add_object(GameObject {
            id: "far_away".to_string(),
            kind: ObjectKind::Dynamic,
            position: Vec3::new(40.0, 0.0, 40.0),
            color: "#fff".to_string(),
            shape: Shape::Box,
            scale: Vec3::ONE,
        });
        state.add_object(GameObject {
            id: "pillar".to_string(),
            kind: ObjectKind::Static,
            position: Vec3::ZERO,
            color: "#fff".to_string(),
            shape: Shape::Box,
            scale: Vec3::ONE,
        });

        let plan = MergePlan {
            centroid_x: -3.0,
            centroid_z: 3.0,
            rocket: GameObject {
                id: "rocket".to_string(),
                kind: ObjectKind::Static,
                position: Vec3::new(-3.0, 4.0, 3.0),
                color: "#ffffff".to_string(),
                shape: Shape::Rocket,
                scale: Vec3::new(2.8, 8.0, 2.8),
            },
            clear_radius: 8.0,
        };
        let mut cleared = state.merge_objects_into_rocket(&plan);
        cleared.sort();

        assert_eq!(cleared, vec!["dynamic_1", "dynamic_2"]);
        assert!(state.has_won);
        assert!(state.object("rocket").is_some());
        // statics and out-of-radius dynamics survive
        assert!(state.object("pillar").is_some());
        assert!(state.object("far_away").is_some());
        // held references are force-cleared
        assert!(state.players["Millie"].held_object_id.is_none());
    }

    #[test]
    fn reset_round_restores_starters_but_keeps_chat() {
        let mut state = GameState::new();
        state.add_player("Millie", "white");
        state.pickup_object("Millie", "dynamic_1");
        state.remove_object("dynamic_2");
        state.set_has_won(true);
        state.add_message("Millie", "hi", 0.0);
        state.set_world_description("lava world");

        state.reset_round();

        let mut ids: Vec<&str> = state.objects.iter().map(|o| o.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["dynamic_1", "dynamic_2"]);
        assert!(!state.has_won);
        assert!(state.players["Millie"].held_object_id.is_none());
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.world_description, "lava world");
    }

    #[test]
    fn reset_game_also_clears_chat_and_theme() {
        let mut state = GameState::new();
        state.add_player("Millie", "white");
        state.add_message("Millie", "hi", 0.0);
        state.set_world_description("lava world");
        state.set_is_dreaming(true);

        state.reset_game();

        assert!(state.messages.is_empty());
        assert!(!state.is_dreaming);
        assert!(state.world_description.contains("miniature mushroom farm"));
        // players persist across a game reset
        assert!(state.players.contains_key("Millie"));
    }

    #[test]
    fn snapshot_excludes_held_objects() {
        let mut state = GameState::new();
        state.add_player("Millie", "white");
        state.pickup_object("Millie", "dynamic_1");

        let snap = state.render_snapshot(0.0);
        assert_eq!(snap.objects.len(), 1);
        assert_eq!(snap.objects[0].id, "dynamic_2");
        assert_eq!(snap.players.len(), 1);
        assert_eq!(
            snap.players[0].held_object_id.as_deref(),
            Some("dynamic_1")
        );
        assert_eq!(snap.win_height, WIN_HEIGHT);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let state = GameState::new();
        let json = serde_json::to_string(&state.render_snapshot(4.2)).unwrap();
        assert!(json.contains("\"world_description\""));
        assert!(json.contains("\"contact_seconds\":4.2"));
        assert!(json.contains("\"geometry\":\"box\""));
    }
}
