//! Walkable geometry as delivered by the scene-understanding provider

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Indexed triangle soup describing candidate ground surfaces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkableGeometry {
    pub vertices: Vec<Vec3>,
    pub triangles: Vec<[u32; 3]>,
}

impl WalkableGeometry {
    pub fn new(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        Self { vertices, triangles }
    }

    /// Axis-aligned horizontal rectangle at height `min.y`, split into two triangles
    pub fn rectangle(min: Vec3, max: Vec3) -> Self {
        let y = min.y;
        let vertices = vec![
            Vec3::new(min.x, y, min.z),
            Vec3::new(max.x, y, min.z),
            Vec3::new(max.x, y, max.z),
            Vec3::new(min.x, y, max.z),
        ];
        Self {
            vertices,
            triangles: vec![[0, 2, 1], [0, 3, 2]],
        }
    }

    /// Merge several meshes into one, re-basing indices
    pub fn merge<'a>(meshes: impl IntoIterator<Item = &'a WalkableGeometry>) -> Self {
        let mut merged = WalkableGeometry::default();
        for mesh in meshes {
            merged.append(mesh);
        }
        merged
    }

    /// Append another mesh's triangles to this one
    pub fn append(&mut self, other: &WalkableGeometry) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.triangles.extend(
            other
                .triangles
                .iter()
                .map(|[a, b, c]| [a + base, b + base, c + base]),
        );
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }
}
