use geo::Coord;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    dijkstra::Dijkstra,
    geometry::{euclidean_distance, is_inside_any_zone, segment_intersects_any_zone},
    threat_zone::ThreatZone,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatrixParams {
    /// Vertices of the polygon placed around each zone.
    pub ring_vertices: usize,

    /// Maximum number of detour vertices. Above it, no detour is searched and
    /// every blocked pair is unreachable.
    pub max_vertices: usize,
}

impl Default for MatrixParams {
    fn default() -> Self {
        MatrixParams {
            ring_vertices: 16,
            max_vertices: 4096,
        }
    }
}

/// Visibility graph over the detour vertices of every threat zone.
///
/// Edges between ring vertices do not depend on the queried endpoints, so they
/// are computed once and shared by every pair of the matrix.
pub struct VisibilityGraph<'a> {
    zones: &'a [ThreatZone],
    vertices: Vec<Coord>,
    edges: Vec<Vec<(usize, f64)>>,
}

impl<'a> VisibilityGraph<'a> {
    pub fn new(zones: &'a [ThreatZone], params: &MatrixParams) -> Self {
        let mut vertices: Vec<Coord> = zones
            .iter()
            .flat_map(|zone| zone.ring(params.ring_vertices))
            .filter(|vertex| !is_inside_any_zone(*vertex, zones))
            .collect();

        if vertices.len() > params.max_vertices {
            warn!(
                vertices = vertices.len(),
                max_vertices = params.max_vertices,
                "Visibility graph exceeds the vertex budget, detours disabled"
            );
            vertices.clear();
        }

        let mut edges = vec![Vec::new(); vertices.len()];
        for i in 0..vertices.len() {
            for j in (i + 1)..vertices.len() {
                if segment_intersects_any_zone(vertices[i], vertices[j], zones) {
                    continue;
                }

                let distance = euclidean_distance(vertices[i], vertices[j]);
                edges[i].push((j, distance));
                edges[j].push((i, distance));
            }
        }

        debug!(
            zones = zones.len(),
            vertices = vertices.len(),
            "Built visibility graph"
        );

        VisibilityGraph {
            zones,
            vertices,
            edges,
        }
    }

    pub fn vertices(&self) -> &[Coord] {
        &self.vertices
    }

    pub fn is_visible(&self, from: Coord, to: Coord) -> bool {
        !segment_intersects_any_zone(from, to, self.zones)
    }

    /// Shortest polyline from `from` to `to` that never enters a zone.
    ///
    /// Returns `None` when no such polyline exists in the graph, which
    /// includes every query with an endpoint strictly inside a zone.
    pub fn shortest_path(&self, from: Coord, to: Coord) -> Option<(f64, Vec<Coord>)> {
        if self.is_visible(from, to) {
            return Some((euclidean_distance(from, to), vec![from, to]));
        }

        if is_inside_any_zone(from, self.zones) || is_inside_any_zone(to, self.zones) {
            return None;
        }

        let count = self.vertices.len();
        let source = count;
        let target = count + 1;

        let from_edges: Vec<(usize, f64)> = self.endpoint_edges(from);
        let to_weights: Vec<f64> = {
            let mut weights = vec![f64::INFINITY; count];
            for (vertex, distance) in self.endpoint_edges(to) {
                weights[vertex] = distance;
            }
            weights
        };

        let path = Dijkstra::new(count + 2).calc_path(source, target, |node, adjacent| {
            if node == source {
                adjacent.extend(&from_edges);
            } else if node < count {
                adjacent.extend(&self.edges[node]);
                if to_weights[node].is_finite() {
                    adjacent.push((target, to_weights[node]));
                }
            }
        })?;

        let polyline = path
            .nodes
            .iter()
            .map(|&node| match node {
                node if node == source => from,
                node if node == target => to,
                node => self.vertices[node],
            })
            .collect();

        Some((path.weight, polyline))
    }

    fn endpoint_edges(&self, point: Coord) -> Vec<(usize, f64)> {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, vertex)| self.is_visible(point, **vertex))
            .map(|(index, vertex)| (index, euclidean_distance(point, *vertex)))
            .collect()
    }
}
