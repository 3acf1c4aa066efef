//! Object shapes and their collider/mesh mappings.
//!
//! `Shape` is the closed set of geometries an object can take. Adding a shape
//! means adding a variant here plus one arm in each mapping below; the
//! exhaustive matches keep the collider and mesh tables in lockstep.

use glam::Vec3;
use rapier3d::prelude::ColliderBuilder;
use serde::{Deserialize, Serialize};

/// Geometry kind for a game object. Serialized with lowercase wire names
/// ("box", "sphere", ...) to match the render layer and the AI descriptor
/// contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Box,
    Sphere,
    Cylinder,
    Cone,
    /// Compound shape produced by the merge action. Rendered as a cone.
    Rocket,
}

impl Default for Shape {
    fn default() -> Self {
        Shape::Box
    }
}

/// Mesh parameters handed to the render layer through snapshots.
///
/// Scale conventions follow the renderer: `scale.x` doubles as the radius for
/// round shapes, `scale.y` is the height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "geometry", rename_all = "lowercase")]
pub enum MeshSpec {
    Box { size: [f32; 3] },
    Sphere { radius: f32 },
    Cylinder { radius: f32, height: f32 },
    Cone { radius: f32, height: f32, segments: u32 },
}

const CONE_SEGMENTS: u32 = 24;

impl Shape {
    /// Collider for a body of this shape at the given scale.
    pub fn collider(self, scale: Vec3) -> ColliderBuilder {
        match self {
            Shape::Box => ColliderBuilder::cuboid(scale.x / 2.0, scale.y / 2.0, scale.z / 2.0),
            Shape::Sphere => ColliderBuilder::ball(scale.x),
            Shape::Cylinder => ColliderBuilder::cylinder(scale.y / 2.0, scale.x),
            Shape::Cone => ColliderBuilder::cone(scale.y / 2.0, scale.x),
            Shape::Rocket => ColliderBuilder::cone(scale.y / 2.0, scale.x),
        }
    }

    /// Mesh descriptor for the render layer.
    pub fn mesh_spec(self, scale: Vec3) -> MeshSpec {
        match self {
            Shape::Box => MeshSpec::Box {
                size: [scale.x, scale.y, scale.z],
            },
            Shape::Sphere => MeshSpec::Sphere { radius: scale.x },
            Shape::Cylinder => MeshSpec::Cylinder {
                radius: scale.x,
                height: scale.y,
            },
            Shape::Cone => MeshSpec::Cone {
                radius: scale.x,
                height: scale.y,
                segments: CONE_SEGMENTS,
            },
            Shape::Rocket => MeshSpec::Cone {
                radius: scale.x,
                height: scale.y,
                segments: CONE_SEGMENTS,
            },
        }
    }
}
