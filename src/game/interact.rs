//! Pickup/drop resolution.
//!
//! Each interaction trigger is resolved against live physics-body positions,
//! never against the store's mirrored ones — a settling block may have rolled
//! well away from where the store last saw it. The resolver owns the
//! at-most-one-holder rule: a candidate that is already carried is rejected
//! here, before the store is touched.

use glam::Vec3;
use rand::Rng;

use crate::game::physics::{BodyKind, PhysicsWorld};
use crate::game::state::GameState;

/// Farthest a dynamic object can be and still be grabbed. Generous enough for
/// large AI-generated objects whose origin sits off-center.
pub const PICKUP_RADIUS: f32 = 5.0;

/// Horizontal radius within which a drop snaps on top of another object.
pub const SNAP_RADIUS: f32 = 2.5;

/// Clearance above the stack target so the solver doesn't wake up to an
/// interpenetration.
pub const DROP_GAP: f32 = 0.001;

/// Horizontal scatter applied when a drop finds no stack target.
const DROP_JITTER: f32 = 1.0;

/// Vertical offset of a jittered drop relative to the carrier.
const DROP_HEIGHT: f32 = 1.0;

/// What a single interaction trigger did.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionOutcome {
    PickedUp {
        object_id: String,
    },
    Dropped {
        object_id: String,
        position: Vec3,
        stacked: bool,
    },
    /// Empty-handed with nothing in range, or the nearest candidate is
    /// already carried.
    NoCandidate,
    UnknownPlayer,
}

/// Resolve one interaction trigger for `player_id`: pick up the nearest free
/// dynamic object, or drop the carried one onto the best stack target.
pub fn resolve(
    state: &mut GameState,
    physics: &PhysicsWorld,
    rng: &mut impl Rng,
    player_id: &str,
) -> InteractionOutcome {
    let Some(player) = state.players.get(player_id) else {
        return InteractionOutcome::UnknownPlayer;
    };
    // Physics truth when the player has a body; store position as fallback
    // right after a reset.
    let player_pos = physics.translation(player_id).unwrap_or(player.position);

    match player.held_object_id.clone() {
        Some(held_id) => drop_held(state, physics, rng, player_id, &held_id, player_pos),
        None => pickup_nearest(state, physics, player_id, player_pos),
    }
}

fn pickup_nearest(
    state: &mut GameState,
    physics: &PhysicsWorld,
    player_id: &str,
    player_pos: Vec3,
) -> InteractionOutcome {
    let mut best: Option<(f32, String)> = None;
    physics.for_each_body(|tag, pos, _vel| {
        if tag.kind != BodyKind::DynamicObject || tag.id == player_id {
            return;
        }
        let dist_sq = (pos - player_pos).length_squared();
        if dist_sq >= PICKUP_RADIUS * PICKUP_RADIUS {
            return;
        }
        if best.as_ref().is_none_or(|(b, _)| dist_sq < *b) {
            best = Some((dist_sq, tag.id.clone()));
        }
    });

    let Some((_, object_id)) = best else {
        return InteractionOutcome::NoCandidate;
    };
    // A carried object normally has no body, but two triggers can land
    // between reconciliations; never let a second player grab it.
    if state.holder_of(&object_id).is_some() {
        return InteractionOutcome::NoCandidate;
    }
    state.pickup_object(player_id, &object_id);
    InteractionOutcome::PickedUp { object_id }
}

fn drop_held(
    state: &mut GameState,
    physics: &PhysicsWorld,
    rng: &mut impl Rng,
    player_id: &str,
    held_id: &str,
    player_pos: Vec3,
) -> InteractionOutcome {
    let held_height = state.object(held_id).map_or(1.0, |o| o.scale.y);

    // Closest object in the horizontal plane within the snap radius.
    let mut target: Option<(f32, Vec3, f32)> = None;
    physics.for_each_body(|tag, pos, _vel| {
        if tag.kind == BodyKind::Player || tag.id == held_id {
            return;
        }
        let dx = player_pos.x - pos.x;
        let dz = player_pos.z - pos.z;
        let dist_sq = dx * dx + dz * dz;
        if dist_sq > SNAP_RADIUS * SNAP_RADIUS {
            return;
        }
        if target.as_ref().is_none_or(|(b, _, _)| dist_sq < *b) {
            let top_y = pos.y + tag.scale.y / 2.0;
            target = Some((dist_sq, pos, top_y));
        }
    });

    let (position, stacked) = match target {
        Some((_, target_pos, top_y)) => (
            Vec3::new(
                target_pos.x,
                top_y + held_height / 2.0 + DROP_GAP,
                target_pos.z,
            ),
            true,
        ),
        None => (
            Vec3::new(
                player_pos.x + rng.gen_range(-DROP_JITTER..DROP_JITTER),
                player_pos.y + DROP_HEIGHT,
                player_pos.z + rng.gen_range(-DROP_JITTER..DROP_JITTER),
            ),
            false,
        ),
    };

    state.drop_object(player_id, position);
    InteractionOutcome::Dropped {
        object_id: held_id.to_string(),
        position,
        stacked,
    }
}
