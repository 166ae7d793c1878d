//! Baked walkable surface: welded triangles with edge adjacency

use crate::error::NavError;
use crate::geometry::WalkableGeometry;
use glam::Vec3;
use std::collections::HashMap;
use tracing::{debug, info};

/// Triangles with less doubled area than this are discarded as degenerate
const MIN_DOUBLE_AREA: f32 = 1e-8;

/// A walkable triangle and its neighbours across each edge.
///
/// Edge `e` runs from `indices[e]` to `indices[(e + 1) % 3]`. Triangles are
/// stored with an upward-facing normal.
#[derive(Debug, Clone)]
pub struct NavTriangle {
    pub indices: [usize; 3],
    pub neighbours: [Option<usize>; 3],
    pub centroid: Vec3,
}

/// Walkable surface built from scene geometry
#[derive(Debug, Clone)]
pub struct NavSurface {
    vertices: Vec<Vec3>,
    triangles: Vec<NavTriangle>,
}

impl NavSurface {
    /// Build a surface, keeping only triangles no steeper than `walkable_slope_degrees`
    pub fn bake(
        geometry: &WalkableGeometry,
        walkable_slope_degrees: f32,
        weld_tolerance: f32,
    ) -> Result<Self, NavError> {
        if geometry.is_empty() {
            return Err(NavError::EmptyGeometry("no triangles supplied".to_string()));
        }

        let vertex_count = geometry.vertices.len();
        if let Some(bad) = geometry
            .triangles
            .iter()
            .find(|tri| tri.iter().any(|&i| i as usize >= vertex_count))
        {
            return Err(NavError::InvalidGeometry(format!(
                "triangle {:?} references a vertex outside 0..{}",
                bad, vertex_count
            )));
        }
        if geometry.vertices.iter().any(|v| !v.is_finite()) {
            return Err(NavError::InvalidGeometry("non-finite vertex".to_string()));
        }

        // Weld coincident vertices so triangles from separate meshes connect
        let mut welded: Vec<Vec3> = Vec::new();
        let mut weld_map: HashMap<(i64, i64, i64), usize> = HashMap::new();
        let remap: Vec<usize> = geometry
            .vertices
            .iter()
            .map(|v| {
                let key = (
                    (v.x / weld_tolerance).round() as i64,
                    (v.y / weld_tolerance).round() as i64,
                    (v.z / weld_tolerance).round() as i64,
                );
                *weld_map.entry(key).or_insert_with(|| {
                    welded.push(*v);
                    welded.len() - 1
                })
            })
            .collect();

        let min_normal_y = walkable_slope_degrees.to_radians().cos();
        let mut triangles = Vec::with_capacity(geometry.triangles.len());
        let mut rejected_slope = 0usize;
        let mut rejected_degenerate = 0usize;

        for tri in &geometry.triangles {
            let mut idx = [
                remap[tri[0] as usize],
                remap[tri[1] as usize],
                remap[tri[2] as usize],
            ];
            if idx[0] == idx[1] || idx[1] == idx[2] || idx[0] == idx[2] {
                rejected_degenerate += 1;
                continue;
            }

            let (a, b, c) = (welded[idx[0]], welded[idx[1]], welded[idx[2]]);
            let normal = (b - a).cross(c - a);
            let double_area = normal.length();
            if double_area < MIN_DOUBLE_AREA {
                rejected_degenerate += 1;
                continue;
            }
            if normal.y.abs() / double_area < min_normal_y {
                rejected_slope += 1;
                continue;
            }
            if normal.y < 0.0 {
                idx.swap(1, 2);
            }

            triangles.push(NavTriangle {
                indices: idx,
                neighbours: [None; 3],
                centroid: (a + b + c) / 3.0,
            });
        }

        if triangles.is_empty() {
            return Err(NavError::EmptyGeometry(format!(
                "no walkable triangles ({} too steep, {} degenerate)",
                rejected_slope, rejected_degenerate
            )));
        }

        link_neighbours(&mut triangles);

        info!(
            "Baked walkable surface: {} triangles, {} vertices ({} too steep, {} degenerate)",
            triangles.len(),
            welded.len(),
            rejected_slope,
            rejected_degenerate
        );

        Ok(Self {
            vertices: welded,
            triangles,
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangle(&self, index: usize) -> Option<&NavTriangle> {
        self.triangles.get(index)
    }

    /// Corner positions of a triangle
    pub fn corners(&self, index: usize) -> [Vec3; 3] {
        let tri = &self.triangles[index];
        [
            self.vertices[tri.indices[0]],
            self.vertices[tri.indices[1]],
            self.vertices[tri.indices[2]],
        ]
    }

    /// Shared edge between two adjacent triangles
    pub fn portal(&self, from: usize, to: usize) -> Option<(Vec3, Vec3)> {
        let tri = self.triangles.get(from)?;
        let edge = tri.neighbours.iter().position(|n| *n == Some(to))?;
        let a = self.vertices[tri.indices[edge]];
        let b = self.vertices[tri.indices[(edge + 1) % 3]];
        Some((a, b))
    }

    /// Nearest walkable point to `point`, and the triangle it lies on.
    ///
    /// Points above or below the surface snap vertically onto it; points
    /// beyond its boundary snap to the closest edge.
    pub fn closest_point(&self, point: Vec3) -> (usize, Vec3) {
        let mut best_vertical: Option<(usize, Vec3, f32)> = None;
        let mut best_any: Option<(usize, Vec3, f32)> = None;

        for index in 0..self.triangles.len() {
            let [a, b, c] = self.corners(index);

            if let Some(height) = height_in_triangle(point, a, b, c) {
                let dy = (point.y - height).abs();
                if best_vertical.map_or(true, |(_, _, d)| dy < d) {
                    best_vertical = Some((index, Vec3::new(point.x, height, point.z), dy));
                }
            }

            let candidate = closest_point_on_triangle(point, a, b, c);
            let dist_sq = candidate.distance_squared(point);
            if best_any.map_or(true, |(_, _, d)| dist_sq < d) {
                best_any = Some((index, candidate, dist_sq));
            }
        }

        match (best_vertical, best_any) {
            (Some((index, projected, _)), _) => (index, projected),
            (None, Some((index, projected, _))) => (index, projected),
            // bake() guarantees at least one triangle
            (None, None) => {
                debug!("closest_point queried on an empty surface");
                (0, point)
            }
        }
    }

    /// Triangle directly above or below `point`, if any
    pub fn locate(&self, point: Vec3) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for index in 0..self.triangles.len() {
            let [a, b, c] = self.corners(index);
            if let Some(height) = height_in_triangle(point, a, b, c) {
                let dy = (point.y - height).abs();
                if best.map_or(true, |(_, d)| dy < d) {
                    best = Some((index, dy));
                }
            }
        }
        best.map(|(index, _)| index)
    }
}

/// Link triangles that share an edge. Non-manifold edges keep their first pairing.
fn link_neighbours(triangles: &mut [NavTriangle]) {
    let mut open_edges: HashMap<(usize, usize), (usize, usize)> = HashMap::new();

    for t in 0..triangles.len() {
        for e in 0..3 {
            let a = triangles[t].indices[e];
            let b = triangles[t].indices[(e + 1) % 3];
            let key = (a.min(b), a.max(b));
            match open_edges.remove(&key) {
                Some((other, other_edge)) => {
                    triangles[t].neighbours[e] = Some(other);
                    triangles[other].neighbours[other_edge] = Some(t);
                }
                None => {
                    open_edges.insert(key, (t, e));
                }
            }
        }
    }
}

/// Height of the triangle at `point`'s XZ position, if the point lies within it
fn height_in_triangle(point: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    const EPS: f32 = 1e-6;

    let v0 = Vec3::new(c.x - a.x, 0.0, c.z - a.z);
    let v1 = Vec3::new(b.x - a.x, 0.0, b.z - a.z);
    let v2 = Vec3::new(point.x - a.x, 0.0, point.z - a.z);

    let denom = v0.x * v1.z - v0.z * v1.x;
    if denom.abs() < EPS {
        return None;
    }
    let u = (v1.z * v2.x - v1.x * v2.z) / denom;
    let v = (v0.x * v2.z - v0.z * v2.x) / denom;

    if u >= -EPS && v >= -EPS && (u + v) <= 1.0 + EPS {
        Some(a.y + (c.y - a.y) * u + (b.y - a.y) * v)
    } else {
        None
    }
}

/// Closest point on triangle `abc` to `p`, by Voronoi region
pub(crate) fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;

    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    a + ab * (vb * denom) + ac * (vc * denom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn floor() -> WalkableGeometry {
        WalkableGeometry::rectangle(Vec3::new(-2.0, 0.0, -2.0), Vec3::new(2.0, 0.0, 2.0))
    }

    #[test]
    fn test_bake_rejects_empty() {
        let result = NavSurface::bake(&WalkableGeometry::default(), 45.0, 0.001);
        assert!(matches!(result, Err(NavError::EmptyGeometry(_))));
    }

    #[test]
    fn test_bake_rejects_out_of_range_index() {
        let geometry = WalkableGeometry::new(vec![Vec3::ZERO], vec![[0, 1, 2]]);
        let result = NavSurface::bake(&geometry, 45.0, 0.001);
        assert!(matches!(result, Err(NavError::InvalidGeometry(_))));
    }

    #[test]
    fn test_bake_drops_walls() {
        let wall = WalkableGeometry::new(
            vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let result = NavSurface::bake(&wall, 45.0, 0.001);
        assert!(matches!(result, Err(NavError::EmptyGeometry(_))));

        let merged = WalkableGeometry::merge([&floor(), &wall]);
        let surface = NavSurface::bake(&merged, 45.0, 0.001).unwrap();
        assert_eq!(surface.triangle_count(), 2);
    }

    #[test]
    fn test_rectangle_halves_are_neighbours() {
        let surface = NavSurface::bake(&floor(), 45.0, 0.001).unwrap();
        assert!(surface.portal(0, 1).is_some());
        assert!(surface.portal(1, 0).is_some());
    }

    #[test]
    fn test_separate_meshes_are_welded() {
        let left = WalkableGeometry::rectangle(Vec3::new(0.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 1.0));
        let right = WalkableGeometry::rectangle(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 1.0));
        let surface = NavSurface::bake(&WalkableGeometry::merge([&left, &right]), 45.0, 0.001).unwrap();

        // Left mesh's first triangle borders the right mesh's second along x = 1
        assert_eq!(surface.triangle_count(), 4);
        assert!(surface.portal(0, 3).is_some());
    }

    #[test]
    fn test_closest_point_snaps_height() {
        let surface = NavSurface::bake(&floor(), 45.0, 0.001).unwrap();
        let (_, p) = surface.closest_point(Vec3::new(0.5, 1.3, 0.5));
        assert!((p - Vec3::new(0.5, 0.0, 0.5)).length() < 1e-5);
    }

    #[test]
    fn test_closest_point_clamps_outside() {
        let surface = NavSurface::bake(&floor(), 45.0, 0.001).unwrap();
        let (_, p) = surface.closest_point(Vec3::new(5.0, 0.0, 0.0));
        assert!((p - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
        assert!(surface.locate(Vec3::new(5.0, 0.0, 0.0)).is_none());
    }
}
