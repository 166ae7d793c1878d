//! Corridor search across the walkable surface
//!
//! A* runs over triangle adjacency, then the triangle corridor is pulled
//! taut into straight waypoints with a funnel pass.

use crate::surface::NavSurface;
use glam::Vec3;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

/// Straightened path from an agent towards its target
#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    /// Waypoints after the start position; the last one is the final destination
    pub waypoints: Vec<Vec3>,
    /// False when the goal was unreachable and the path stops at the closest reachable point
    pub complete: bool,
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    score: f32,
    triangle: usize,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    // Reversed so BinaryHeap pops the lowest score first
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.triangle.cmp(&self.triangle))
    }
}

/// Find a path from `start` to `goal`. Both points are projected onto the surface first.
pub fn find_path(surface: &NavSurface, start: Vec3, goal: Vec3) -> PathResult {
    let (start_tri, start_pos) = surface.closest_point(start);
    let (goal_tri, goal_pos) = surface.closest_point(goal);

    if start_tri == goal_tri {
        return PathResult {
            waypoints: vec![goal_pos],
            complete: true,
        };
    }

    let (corridor, complete) = search(surface, start_tri, goal_tri, goal_pos);
    let end = if complete {
        goal_pos
    } else {
        let [a, b, c] = surface.corners(*corridor.last().unwrap_or(&start_tri));
        crate::surface::closest_point_on_triangle(goal_pos, a, b, c)
    };

    if !complete {
        debug!(
            "Goal ({:.2}, {:.2}, {:.2}) unreachable, stopping at ({:.2}, {:.2}, {:.2})",
            goal_pos.x, goal_pos.y, goal_pos.z, end.x, end.y, end.z
        );
    }

    PathResult {
        waypoints: string_pull(surface, &corridor, start_pos, end),
        complete,
    }
}

/// Triangle corridor from `start` to `goal`, or to the triangle nearest the goal when unreachable
fn search(surface: &NavSurface, start: usize, goal: usize, goal_pos: Vec3) -> (Vec<usize>, bool) {
    let count = surface.triangle_count();
    let mut g_score = vec![f32::INFINITY; count];
    let mut parent: Vec<Option<usize>> = vec![None; count];
    let mut closed = vec![false; count];
    let mut open = BinaryHeap::new();

    let centroid = |t: usize| surface.triangle(t).map(|tri| tri.centroid).unwrap_or(goal_pos);

    g_score[start] = 0.0;
    open.push(OpenNode {
        score: centroid(start).distance(goal_pos),
        triangle: start,
    });

    let mut nearest = (start, centroid(start).distance(goal_pos));
    let mut reached = false;

    while let Some(OpenNode { triangle, .. }) = open.pop() {
        if closed[triangle] {
            continue;
        }
        closed[triangle] = true;

        if triangle == goal {
            reached = true;
            break;
        }

        let heuristic = centroid(triangle).distance(goal_pos);
        if heuristic < nearest.1 {
            nearest = (triangle, heuristic);
        }

        let Some(tri) = surface.triangle(triangle) else {
            continue;
        };
        for next in tri.neighbours.iter().flatten().copied() {
            if closed[next] {
                continue;
            }
            let tentative = g_score[triangle] + centroid(triangle).distance(centroid(next));
            if tentative < g_score[next] {
                g_score[next] = tentative;
                parent[next] = Some(triangle);
                open.push(OpenNode {
                    score: tentative + centroid(next).distance(goal_pos),
                    triangle: next,
                });
            }
        }
    }

    let end = if reached { goal } else { nearest.0 };
    let mut corridor = vec![end];
    let mut current = end;
    while let Some(prev) = parent[current] {
        corridor.push(prev);
        current = prev;
    }
    corridor.reverse();
    (corridor, reached)
}

/// Twice the signed area of triangle `abc` on the XZ plane
fn tri_area_2d(a: Vec3, b: Vec3, c: Vec3) -> f32 {
    let abx = b.x - a.x;
    let abz = b.z - a.z;
    let acx = c.x - a.x;
    let acz = c.z - a.z;
    acx * abz - abx * acz
}

fn same_xz(a: Vec3, b: Vec3) -> bool {
    tomo_core::math::distance_xz_squared(a, b) < 1e-10
}

/// Portal edges along the corridor, as (left, right) pairs
fn portals(surface: &NavSurface, corridor: &[usize], start: Vec3, end: Vec3) -> Vec<(Vec3, Vec3)> {
    let mut portals = Vec::with_capacity(corridor.len() + 1);
    portals.push((start, start));

    for pair in corridor.windows(2) {
        let Some((a, b)) = surface.portal(pair[0], pair[1]) else {
            continue;
        };
        let from = surface.triangle(pair[0]).map(|t| t.centroid).unwrap_or(start);
        let dir = (a + b) * 0.5 - from;
        let side = |p: Vec3| dir.x * (p.z - from.z) - dir.z * (p.x - from.x);
        if side(a) >= side(b) {
            portals.push((a, b));
        } else {
            portals.push((b, a));
        }
    }

    portals.push((end, end));
    portals
}

/// Funnel pass over the corridor portals
fn string_pull(surface: &NavSurface, corridor: &[usize], start: Vec3, end: Vec3) -> Vec<Vec3> {
    let portals = portals(surface, corridor, start, end);
    let mut waypoints = Vec::new();

    let mut apex = start;
    let mut left = portals[0].0;
    let mut right = portals[0].1;
    let mut apex_index = 0;
    let mut left_index = 0;
    let mut right_index = 0;

    let mut i = 1;
    while i < portals.len() {
        let (next_left, next_right) = portals[i];

        if tri_area_2d(apex, right, next_right) <= 0.0 {
            if same_xz(apex, right) || tri_area_2d(apex, left, next_right) > 0.0 {
                right = next_right;
                right_index = i;
            } else {
                // Right crossed over left: the left corner becomes a waypoint
                apex = left;
                apex_index = left_index;
                push_waypoint(&mut waypoints, apex);
                left = apex;
                right = apex;
                left_index = apex_index;
                right_index = apex_index;
                i = apex_index + 1;
                continue;
            }
        }

        if tri_area_2d(apex, left, next_left) >= 0.0 {
            if same_xz(apex, left) || tri_area_2d(apex, right, next_left) < 0.0 {
                left = next_left;
                left_index = i;
            } else {
                apex = right;
                apex_index = right_index;
                push_waypoint(&mut waypoints, apex);
                left = apex;
                right = apex;
                left_index = apex_index;
                right_index = apex_index;
                i = apex_index + 1;
                continue;
            }
        }

        i += 1;
    }

    push_waypoint(&mut waypoints, end);
    waypoints
}

fn push_waypoint(waypoints: &mut Vec<Vec3>, point: Vec3) {
    if waypoints.last().map_or(true, |last| !same_xz(*last, point)) {
        waypoints.push(point);
    }
}
