//! Goal-contact tracking and the merge that ends a round.
//!
//! Every frame, each dynamic body whose top surface sits at the win height
//! (and is vertically settled) accrues contact time; leaving the band resets
//! that object's timer to zero. The first object to sustain contact long
//! enough fires the merge exactly once per round: all dynamic objects near
//! the stack's centroid collapse into a single rocket.

use std::collections::HashMap;

use glam::Vec3;
use uuid::Uuid;

use crate::game::physics::{BodyKind, PhysicsWorld};
use crate::game::shape::Shape;
use crate::game::state::{GameObject, GameState, MergePlan, ObjectKind};

/// How far a top surface may sit from the win height and still count.
pub const WIN_TOLERANCE: f32 = 0.5;

/// Vertical speed below which an object counts as settled.
pub const STABILITY_THRESHOLD: f32 = 0.5;

/// Contact must be sustained this long before the merge fires.
pub const SUSTAIN_SECONDS: f64 = 10.0;

/// Render-layer feedback escalates here; no effect on game logic.
pub const NEAR_WIN_SECONDS: f64 = 3.0;

const ROCKET_MIN_HEIGHT: f32 = 4.0;
const ROCKET_MIN_FOOTPRINT: f32 = 2.8;
const ROCKET_FOOTPRINT_RATIO: f32 = 0.35;
const ROCKET_COLOR: &str = "#ffffff";

/// Per-round contact bookkeeping. Ephemeral: lives outside the store and is
/// wiped by every reset.
pub struct WinMonitor {
    /// Simulation-clock second at which each tracked object entered contact.
    contact_start: HashMap<String, f64>,
    /// One-shot latch; re-armed only by `reset`.
    fired: bool,
}

impl WinMonitor {
    pub fn new() -> Self {
        Self {
            contact_start: HashMap::new(),
            fired: false,
        }
    }

    /// Clear all timers and re-arm the merge latch.
    pub fn reset(&mut self) {
        self.contact_start.clear();
        self.fired = false;
    }

    /// Longest running contact, in seconds. Zero when nothing is tracked.
    pub fn best_contact_seconds(&self, now: f64) -> f64 {
        self.contact_start
            .values()
            .map(|start| now - start)
            .fold(0.0, f64::max)
    }

    /// One frame of evaluation. Runs after positions were synced for this
    /// frame, so the store reflects the same physics state the scan sees.
    pub fn evaluate(&mut self, state: &mut GameState, physics: &PhysicsWorld, now: f64) {
        let win_height = state.win_height;
        let mut in_contact: Vec<String> = Vec::new();
        physics.for_each_body(|tag, pos, vel| {
            if tag.kind != BodyKind::DynamicObject {
                return;
            }
            let top = pos.y + tag.scale.y / 2.0;
            if (top - win_height).abs() <= WIN_TOLERANCE && vel.y.abs() < STABILITY_THRESHOLD {
                in_contact.push(tag.id.clone());
            }
        });

        // Leaving the band resets the timer; it does not pause.
        self.contact_start
            .retain(|id, _| in_contact.iter().any(|c| c == id));
        for id in &in_contact {
            self.contact_start.entry(id.clone()).or_insert(now);
        }

        if self.fired || state.has_won {
            return;
        }
        let sustained = self
            .contact_start
            .values()
            .any(|start| now - start >= SUSTAIN_SECONDS);
        if !sustained {
            return;
        }
        if let Some(plan) = merge_plan(physics) {
            self.fired = true;
            let cleared = state.merge_objects_into_rocket(&plan);
            tracing::info!(
                cleared = cleared.len(),
                rocket = %plan.rocket.id,
                "stack merged into rocket"
            );
        }
    }
}

impl Default for WinMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Derive the merge inputs from the live dynamic bodies: rocket position from
/// their centroid, rocket height from the tallest top surface, clear radius
/// equal to that height.
fn merge_plan(physics: &PhysicsWorld) -> Option<MergePlan> {
    let mut positions: Vec<(Vec3, f32)> = Vec::new();
    physics.for_each_body(|tag, pos, _vel| {
        if tag.kind == BodyKind::DynamicObject {
            positions.push((pos, tag.scale.y));
        }
    });
    if positions.is_empty() {
        return None;
    }

    let n = positions.len() as f32;
    let centroid_x = positions.iter().map(|(p, _)| p.x).sum::<f32>() / n;
    let centroid_z = positions.iter().map(|(p, _)| p.z).sum::<f32>() / n;
    let max_top = positions
        .iter()
        .map(|(p, sy)| p.y + sy / 2.0)
        .fold(f32::MIN, f32::max);

    let height = ROCKET_MIN_HEIGHT.max(max_top);
    let footprint = ROCKET_MIN_FOOTPRINT.max(height * ROCKET_FOOTPRINT_RATIO);
    Some(MergePlan {
        centroid_x,
        centroid_z,
        rocket: GameObject {
            id: Uuid::new_v4().to_string(),
            kind: ObjectKind::Static,
            // base resting on the ground plane
            position: Vec3::new(centroid_x, height / 2.0, centroid_z),
            color: ROCKET_COLOR.to_string(),
            shape: Shape::Rocket,
            scale: Vec3::new(footprint, height, footprint),
        },
        clear_radius: height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: &str, position: Vec3) -> GameObject {
        GameObject {
            id: id.to_string(),
            kind: ObjectKind::Dynamic,
            position,
            color: "#ff9831".to_string(),
            shape: Shape::Box,
            scale: Vec3::ONE,
        }
    }

    /// A world with the given blocks mirrored into both state and physics.
    /// Bodies keep their spawn position because nothing steps the world.
    fn world_with(blocks: &[GameObject]) -> (GameState, PhysicsWorld) {
        let mut state = GameState::new();
        state.objects.clear();
        let mut physics = PhysicsWorld::new();
        for b in blocks {
            state.add_object(b.clone());
            physics.insert_object(b);
        }
        (state, physics)
    }

    /// Center height that puts a unit block's top surface exactly at the win
    /// height.
    fn contact_y() -> f32 {
        crate::game::state::WIN_HEIGHT - 0.5
    }

    #[test]
    fn sustained_contact_fires_merge_once() {
        let top = block("top", Vec3::new(0.0, contact_y(), 0.0));
        let (mut state, physics) = world_with(&[top]);
        let mut monitor = WinMonitor::new();

        monitor.evaluate(&mut state, &physics, 0.0);
        assert!(!state.has_won);
        monitor.evaluate(&mut state, &physics, 9.9);
        assert!(!state.has_won);

        monitor.evaluate(&mut state, &physics, 10.0);
        assert!(state.has_won);
        let rockets: Vec<_> = state
            .objects
            .iter()
            .filter(|o| o.shape == Shape::Rocket)
            .collect();
        assert_eq!(rockets.len(), 1);
        assert_eq!(rockets[0].kind, ObjectKind::Static);
        assert!(state.object("top").is_none());

        // latched: no second rocket even though the body still reads in-contact
        monitor.evaluate(&mut state, &physics, 25.0);
        assert_eq!(
            state
                .objects
                .iter()
                .filter(|o| o.shape == Shape::Rocket)
                .count(),
            1
        );
    }

    #[test]
    fn out_of_band_top_surface_is_not_tracked() {
        let low = block("low", Vec3::new(0.0, contact_y() - 1.0, 0.0));
        let (mut state, physics) = world_with(&[low]);
        let mut monitor = WinMonitor::new();

        monitor.evaluate(&mut state, &physics, 0.0);
        monitor.evaluate(&mut state, &physics, 20.0);
        assert!(!state.has_won);
        assert_eq!(monitor.best_contact_seconds(20.0), 0.0);
    }

    #[test]
    fn unsettled_object_is_not_tracked() {
        // Start slightly above the band so one free-fall step leaves the top
        // inside the band but moving faster than the stability threshold.
        let falling = block("falling", Vec3::new(0.0, contact_y() + 0.2, 0.0));
        let (mut state, mut physics) = world_with(&[falling]);
        let mut monitor = WinMonitor::new();

        physics.step(0.1);
        let vel = physics.linvel("falling").unwrap();
        assert!(vel.y.abs() >= STABILITY_THRESHOLD);

        monitor.evaluate(&mut state, &physics, 0.0);
        assert_eq!(monitor.best_contact_seconds(0.0), 0.0);
    }

    #[test]
    fn leaving_contact_resets_only_that_timer() {
        let a = block("a", Vec3::new(0.0, contact_y(), 0.0));
        let b = block("b", Vec3::new(3.0, contact_y(), 0.0));
        let (mut state, mut physics) = world_with(&[a, b]);
        let mut monitor = WinMonitor::new();

        monitor.evaluate(&mut state, &physics, 0.0);
        monitor.evaluate(&mut state, &physics, 8.0);
        assert_eq!(monitor.best_contact_seconds(8.0), 8.0);

        // "a" dips out of the band at second 8
        physics.set_translation("a", Vec3::new(0.0, contact_y() - 2.0, 0.0));
        monitor.evaluate(&mut state, &physics, 8.5);
        // "b" keeps its timer running
        assert_eq!(monitor.best_contact_seconds(8.5), 8.5);

        // "a" re-enters: its clock starts over, independent of "b"
        physics.set_translation("a", Vec3::new(0.0, contact_y(), 0.0));
        monitor.evaluate(&mut state, &physics, 9.0);
        assert_eq!(monitor.contact_start["a"], 9.0);
        assert_eq!(monitor.contact_start["b"], 0.0);
        // b wins at 10.0 regardless of a's reset
        monitor.evaluate(&mut state, &physics, 10.0);
        assert!(state.has_won);
    }

    #[test]
    fn merge_geometry_follows_the_stack() {
        // two-block tower at x=2,z=2: tops at 12.0 and 11.0
        let top = block("top", Vec3::new(2.0, contact_y(), 2.0));
        let below = block("below", Vec3::new(2.0, contact_y() - 1.0, 2.0));
        let (mut state, physics) = world_with(&[top, below]);
        let mut monitor = WinMonitor::new();

        monitor.evaluate(&mut state, &physics, 0.0);
        monitor.evaluate(&mut state, &physics, 10.0);

        let rocket = state
            .objects
            .iter()
            .find(|o| o.shape == Shape::Rocket)
            .expect("rocket");
        assert_eq!(rocket.scale.y, 12.0); // tallest top surface
        assert_eq!(rocket.scale.x, ROCKET_MIN_FOOTPRINT.max(12.0 * 0.35));
        assert_eq!(rocket.position.x, 2.0);
        assert_eq!(rocket.position.z, 2.0);
        assert!(state.object("top").is_none());
        assert!(state.object("below").is_none());
    }

    #[test]
    fn short_stack_gets_minimum_rocket_dimensions() {
        let plan = {
            let lone = block("lone", Vec3::new(0.0, 0.5, 0.0));
            let (_state, physics) = world_with(&[lone]);
            merge_plan(&physics).expect("plan")
        };
        assert_eq!(plan.rocket.scale.y, ROCKET_MIN_HEIGHT);
        assert_eq!(plan.rocket.scale.x, ROCKET_MIN_FOOTPRINT);
        assert_eq!(plan.clear_radius, ROCKET_MIN_HEIGHT);
    }

    #[test]
    fn reset_rearms_the_latch() {
        let top = block("top", Vec3::new(0.0, contact_y(), 0.0));
        let (mut state, physics) = world_with(&[top.clone()]);
        let mut monitor = WinMonitor::new();
        monitor.evaluate(&mut state, &physics, 0.0);
        monitor.evaluate(&mut state, &physics, 10.0);
        assert!(state.has_won);

        state.reset_round();
        monitor.reset();
        assert_eq!(monitor.best_contact_seconds(10.0), 0.0);

        // same physics scene: the fresh round can win again
        state.add_object(top);
        monitor.evaluate(&mut state, &physics, 20.0);
        monitor.evaluate(&mut state, &physics, 30.0);
        assert!(state.has_won);
    }

    #[test]
    fn best_contact_reports_near_win_progress() {
        let top = block("top", Vec3::new(0.0, contact_y(), 0.0));
        let (mut state, physics) = world_with(&[top]);
        let mut monitor = WinMonitor::new();

        monitor.evaluate(&mut state, &physics, 0.0);
        monitor.evaluate(&mut state, &physics, 3.5);
        assert!(monitor.best_contact_seconds(3.5) >= NEAR_WIN_SECONDS);
        assert!(!state.has_won);
    }
}
