use std::{f64::consts::PI, hash::Hasher};

use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::geometry::euclidean_distance;

/// Ring vertices are pushed slightly outside the circumscribed polygon so that
/// ring edges, which are tangent to the zone, never count as entering it.
const RING_MARGIN: f64 = 1e-6;

/// Circular keep-out region (SAM site).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThreatZone {
    center: Coord,
    radius: f64,
}

impl ThreatZone {
    pub fn new(center: Coord, radius: f64) -> Self {
        ThreatZone { center, radius }
    }

    pub fn center(&self) -> Coord {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Strict containment: a point at exactly `radius` from the center is outside.
    pub fn contains(&self, point: Coord) -> bool {
        euclidean_distance(self.center, point) < self.radius
    }

    /// Vertices of a regular polygon circumscribing the zone.
    ///
    /// Every polygon edge is tangent to an inflated copy of the boundary circle,
    /// so walking along consecutive vertices stays outside the zone.
    pub fn ring(&self, vertices: usize) -> Vec<Coord> {
        let vertices = vertices.max(3);
        let step = 2.0 * PI / vertices as f64;
        let circumradius = self.radius * (1.0 + RING_MARGIN) / (step / 2.0).cos();

        (0..vertices)
            .map(|k| {
                let angle = step * k as f64;
                Coord {
                    x: self.center.x + circumradius * angle.cos(),
                    y: self.center.y + circumradius * angle.sin(),
                }
            })
            .collect()
    }

    pub(crate) fn hash_into<H: Hasher>(&self, hasher: &mut H) {
        hasher.write_u64(self.center.x.to_bits());
        hasher.write_u64(self.center.y.to_bits());
        hasher.write_u64(self.radius.to_bits());
    }
}
