//! Rigid-body world adapter.
//!
//! One tagged rapier body per player and per non-held object, plus the
//! untagged arena (ground slab and boundary walls). Live transforms are owned
//! here; callers query them per frame and mirror what they need into the
//! store. Nothing in this module writes to the store.

use std::collections::HashMap;

use glam::Vec3;
use rapier3d::prelude::*;

use crate::game::state::{GameObject, ObjectKind};

/// Players falling below this are assumed to have tunneled out of the arena.
pub const FLOOR_Y: f32 = -10.0;

/// Where tunneled players reappear, with zeroed velocity.
pub const RESPAWN_POSITION: Vec3 = Vec3::new(0.0, 5.0, 0.0);

const GRAVITY: f32 = -9.81;
const ARENA_HALF_EXTENT: f32 = 25.0;
const WALL_HALF_HEIGHT: f32 = 5.0;
const PLAYER_HALF_EXTENTS: Vec3 = Vec3::new(0.4, 0.75, 0.4);

/// What a tagged body stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BodyKind {
    Player,
    StaticObject,
    DynamicObject,
}

impl BodyKind {
    fn for_object(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Static => BodyKind::StaticObject,
            ObjectKind::Dynamic => BodyKind::DynamicObject,
        }
    }
}

/// Identity and footprint metadata attached to each entity body.
#[derive(Debug, Clone)]
pub struct BodyTag {
    pub id: String,
    pub kind: BodyKind,
    pub scale: Vec3,
}

pub struct PhysicsWorld {
    gravity: Vector<Real>,
    integration_parameters: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    tags: HashMap<RigidBodyHandle, BodyTag>,
    handles: HashMap<String, RigidBodyHandle>,
}

fn to_na(v: Vec3) -> Vector<Real> {
    vector![v.x, v.y, v.z]
}

fn to_glam(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

impl PhysicsWorld {
    pub fn new() -> Self {
        let mut world = Self {
            gravity: vector![0.0, GRAVITY, 0.0],
            integration_parameters: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            tags: HashMap::new(),
            handles: HashMap::new(),
        };
        world.spawn_arena();
        world
    }

    /// Ground slab plus four invisible boundary walls. Untagged: the arena is
    /// scenery, not an entity.
    fn spawn_arena(&mut self) {
        let ground = self
            .bodies
            .insert(RigidBodyBuilder::fixed().translation(vector![0.0, -0.5, 0.0]));
        self.colliders.insert_with_parent(
            ColliderBuilder::cuboid(ARENA_HALF_EXTENT, 0.5, ARENA_HALF_EXTENT),
            ground,
            &mut self.bodies,
        );

        let walls = self.bodies.insert(RigidBodyBuilder::fixed());
        let wall_specs: [(Vec3, Vec3); 4] = [
            (
                Vec3::new(0.0, WALL_HALF_HEIGHT, -(ARENA_HALF_EXTENT + 0.5)),
                Vec3::new(ARENA_HALF_EXTENT + 0.5, WALL_HALF_HEIGHT, 0.5),
            ),
            (
                Vec3::new(0.0, WALL_HALF_HEIGHT, ARENA_HALF_EXTENT + 0.5),
                Vec3::new(ARENA_HALF_EXTENT + 0.5, WALL_HALF_HEIGHT, 0.5),
            ),
            (
                Vec3::new(-(ARENA_HALF_EXTENT + 0.5), WALL_HALF_HEIGHT, 0.0),
                Vec3::new(0.5, WALL_HALF_HEIGHT, ARENA_HALF_EXTENT + 0.5),
            ),
            (
                Vec3::new(ARENA_HALF_EXTENT + 0.5, WALL_HALF_HEIGHT, 0.0),
                Vec3::new(0.5, WALL_HALF_HEIGHT, ARENA_HALF_EXTENT + 0.5),
            ),
        ];
        for (center, half) in wall_specs {
            self.colliders.insert_with_parent(
                ColliderBuilder::cuboid(half.x, half.y, half.z).translation(to_na(center)),
                walls,
                &mut self.bodies,
            );
        }
    }

    // ── Body lifecycle ─────────────────────────────────────────────

    /// Create a player body: dynamic, rotations locked, frictionless so walls
    /// don't grab the avatar.
    pub fn insert_player(&mut self, id: &str, position: Vec3) {
        if self.handles.contains_key(id) {
            return;
        }
        let handle = self.bodies.insert(
            RigidBodyBuilder::dynamic()
                .translation(to_na(position))
                .lock_rotations(),
        );
        self.colliders.insert_with_parent(
            ColliderBuilder::cuboid(
                PLAYER_HALF_EXTENTS.x,
                PLAYER_HALF_EXTENTS.y,
                PLAYER_HALF_EXTENTS.z,
            )
            .friction(0.0),
            handle,
            &mut self.bodies,
        );
        self.tags.insert(
            handle,
            BodyTag {
                id: id.to_string(),
                kind: BodyKind::Player,
                scale: PLAYER_HALF_EXTENTS * 2.0,
            },
        );
        self.handles.insert(id.to_string(), handle);
    }

    /// Create a body for an object, fixed or dynamic per its kind, with the
    /// collider its shape maps to.
    pub fn insert_object(&mut self, obj: &GameObject) {
        if self.handles.contains_key(&obj.id) {
            return;
        }
        let builder = match obj.kind {
            ObjectKind::Static => RigidBodyBuilder::fixed(),
            ObjectKind::Dynamic => RigidBodyBuilder::dynamic(),
        };
        let handle = self.bodies.insert(builder.translation(to_na(obj.position)));
        self.colliders
            .insert_with_parent(obj.shape.collider(obj.scale), handle, &mut self.bodies);
        self.tags.insert(
            handle,
            BodyTag {
                id: obj.id.clone(),
                kind: BodyKind::for_object(obj.kind),
                scale: obj.scale,
            },
        );
        self.handles.insert(obj.id.clone(), handle);
    }

    pub fn remove(&mut self, id: &str) {
        let Some(handle) = self.handles.remove(id) else {
            return;
        };
        self.tags.remove(&handle);
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    /// Drop every tagged body; the arena stays.
    pub fn clear_entities(&mut self) {
        let ids: Vec<String> = self.handles.keys().cloned().collect();
        for id in ids {
            self.remove(&id);
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handles.contains_key(id)
    }

    /// Ids of all object bodies (static and dynamic), for reconciliation.
    pub fn object_ids(&self) -> Vec<String> {
        self.tags
            .values()
            .filter(|t| t.kind != BodyKind::Player)
            .map(|t| t.id.clone())
            .collect()
    }

    // ── Simulation ─────────────────────────────────────────────────

    /// Advance the simulation by `dt` seconds, then rescue any player that
    /// fell through the world edge.
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd_solver,
            None,
            &(),
            &(),
        );

        for (handle, tag) in &self.tags {
            if tag.kind != BodyKind::Player {
                continue;
            }
            if let Some(body) = self.bodies.get_mut(*handle) {
                if body.translation().y < FLOOR_Y {
                    body.set_translation(to_na(RESPAWN_POSITION), true);
                    body.set_linvel(vector![0.0, 0.0, 0.0], true);
                }
            }
        }
    }

    // ── Queries & mutations ────────────────────────────────────────

    pub fn translation(&self, id: &str) -> Option<Vec3> {
        let handle = self.handles.get(id)?;
        self.bodies.get(*handle).map(|b| to_glam(b.translation()))
    }

    pub fn linvel(&self, id: &str) -> Option<Vec3> {
        let handle = self.handles.get(id)?;
        self.bodies.get(*handle).map(|b| to_glam(b.linvel()))
    }

    pub fn set_translation(&mut self, id: &str, position: Vec3) {
        if let Some(handle) = self.handles.get(id) {
            if let Some(body) = self.bodies.get_mut(*handle) {
                body.set_translation(to_na(position), true);
            }
        }
    }

    /// Drive a player horizontally, keeping whatever vertical velocity
    /// gravity has imposed.
    pub fn set_player_velocity(&mut self, id: &str, vx: f32, vz: f32) {
        if let Some(handle) = self.handles.get(id) {
            if let Some(body) = self.bodies.get_mut(*handle) {
                let vy = body.linvel().y;
                body.set_linvel(vector![vx, vy, vz], true);
            }
        }
    }

    /// Visit every tagged body with its metadata, translation, and linear
    /// velocity. Visitation order is arbitrary.
    pub fn for_each_body<F>(&self, mut f: F)
    where
        F: FnMut(&BodyTag, Vec3, Vec3),
    {
        for (handle, tag) in &self.tags {
            if let Some(body) = self.bodies.get(*handle) {
                f(tag, to_glam(body.translation()), to_glam(body.linvel()));
            }
        }
    }
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::shape::Shape;

    fn block(id: &str, kind: ObjectKind, position: Vec3) -> GameObject {
        GameObject {
            id: id.to_string(),
            kind,
            position,
            color: "#ff9831".to_string(),
            shape: Shape::Box,
            scale: Vec3::ONE,
        }
    }

    #[test]
    fn inserted_bodies_are_tagged_and_queryable() {
        let mut world = PhysicsWorld::new();
        world.insert_player("Millie", Vec3::new(0.0, 1.0, 0.0));
        world.insert_object(&block("b1", ObjectKind::Dynamic, Vec3::new(2.0, 3.0, 4.0)));

        assert!(world.contains("Millie"));
        assert!(world.contains("b1"));
        assert_eq!(world.translation("b1"), Some(Vec3::new(2.0, 3.0, 4.0)));

        let mut seen = Vec::new();
        world.for_each_body(|tag, _, _| seen.push((tag.id.clone(), tag.kind)));
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("Millie".to_string(), BodyKind::Player),
                ("b1".to_string(), BodyKind::DynamicObject),
            ]
        );
    }

    #[test]
    fn insert_with_existing_id_is_noop() {
        let mut world = PhysicsWorld::new();
        world.insert_object(&block("b1", ObjectKind::Dynamic, Vec3::new(0.0, 5.0, 0.0)));
        world.insert_object(&block("b1", ObjectKind::Dynamic, Vec3::ZERO));
        assert_eq!(world.translation("b1"), Some(Vec3::new(0.0, 5.0, 0.0)));
    }

    #[test]
    fn dynamic_bodies_fall_under_gravity() {
        let mut world = PhysicsWorld::new();
        world.insert_object(&block("faller", ObjectKind::Dynamic, Vec3::new(0.0, 5.0, 0.0)));
        world.insert_object(&block("anchor", ObjectKind::Static, Vec3::new(10.0, 5.0, 0.0)));

        for _ in 0..30 {
            world.step(1.0 / 60.0);
        }

        assert!(world.translation("faller").unwrap().y < 4.9);
        assert_eq!(world.translation("anchor").unwrap().y, 5.0);
    }

    #[test]
    fn player_below_floor_is_respawned() {
        let mut world = PhysicsWorld::new();
        world.insert_player("Millie", Vec3::new(0.0, 1.0, 0.0));
        world.set_translation("Millie", Vec3::new(3.0, -50.0, 3.0));

        world.step(1.0 / 60.0);

        let pos = world.translation("Millie").unwrap();
        assert!((pos - RESPAWN_POSITION).length() < 0.5);
        let vel = world.linvel("Millie").unwrap();
        assert!(vel.length() < 0.5);
    }

    #[test]
    fn fallen_object_is_left_alone() {
        let mut world = PhysicsWorld::new();
        world.insert_object(&block("b1", ObjectKind::Dynamic, Vec3::new(0.0, -50.0, 0.0)));
        world.step(1.0 / 60.0);
        assert!(world.translation("b1").unwrap().y < FLOOR_Y);
    }

    #[test]
    fn player_velocity_preserves_vertical_component() {
        let mut world = PhysicsWorld::new();
        world.insert_player("Millie", Vec3::new(0.0, 10.0, 0.0));
        for _ in 0..10 {
            world.step(1.0 / 60.0);
        }
        let falling = world.linvel("Millie").unwrap();
        assert!(falling.y < 0.0);

        world.set_player_velocity("Millie", 3.0, -2.0);
        let vel = world.linvel("Millie").unwrap();
        assert_eq!(vel.x, 3.0);
        assert_eq!(vel.z, -2.0);
        assert_eq!(vel.y, falling.y);
    }

    #[test]
    fn remove_and_clear_entities_leave_arena_intact() {
        let mut world = PhysicsWorld::new();
        world.insert_player("Millie", Vec3::new(0.0, 1.0, 0.0));
        world.insert_object(&block("b1", ObjectKind::Dynamic, Vec3::ZERO));

        world.remove("b1");
        assert!(!world.contains("b1"));
        assert!(world.contains("Millie"));

        world.clear_entities();
        assert!(!world.contains("Millie"));
        let mut count = 0;
        world.for_each_body(|_, _, _| count += 1);
        assert_eq!(count, 0);

        // the arena still stops a fresh faller
        world.insert_object(&block("b2", ObjectKind::Dynamic, Vec3::new(0.0, 2.0, 0.0)));
        for _ in 0..240 {
            world.step(1.0 / 60.0);
        }
        assert!(world.translation("b2").unwrap().y > -1.0);
    }

    #[test]
    fn object_ids_excludes_players() {
        let mut world = PhysicsWorld::new();
        world.insert_player("Millie", Vec3::ZERO);
        world.insert_object(&block("b1", ObjectKind::Dynamic, Vec3::ZERO));
        world.insert_object(&block("s1", ObjectKind::Static, Vec3::ZERO));

        let mut ids = world.object_ids();
        ids.sort();
        assert_eq!(ids, vec!["b1", "s1"]);
    }
}
