use std::hash::{Hash, Hasher};

use fxhash::{FxHashMap, FxHasher64};
use geo::Coord;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use tracing::{debug, instrument};

use crate::{
    error::MatrixError,
    geometry::euclidean_distance,
    threat_zone::ThreatZone,
    visibility_graph::{MatrixParams, VisibilityGraph},
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatrixPoint {
    pub id: String,
    pub coord: Coord,
}

impl MatrixPoint {
    pub fn new(id: impl Into<String>, coord: Coord) -> Self {
        MatrixPoint {
            id: id.into(),
            coord,
        }
    }
}

/// Shortest obstacle avoiding path between two points.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    distance: f64,
    polyline: SmallVec<[Coord; 4]>,
}

impl Leg {
    pub fn distance(&self) -> f64 {
        self.distance
    }

    /// Starts at the origin point and ends at the destination point.
    pub fn polyline(&self) -> &[Coord] {
        &self.polyline
    }

    fn reversed(&self) -> Leg {
        Leg {
            distance: self.distance,
            polyline: self.polyline.iter().rev().copied().collect(),
        }
    }
}

/// All-pairs obstacle avoiding distances between mission points.
///
/// Stored as a flat `n * n` vector, `None` meaning unreachable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DistanceMatrix {
    points: Vec<MatrixPoint>,
    index: FxHashMap<String, usize>,
    zones: Vec<ThreatZone>,
    params: MatrixParams,
    legs: Vec<Option<Leg>>,
    fingerprint: u64,
    zones_fingerprint: u64,
}

fn hash_zones<H: Hasher>(zones: &[ThreatZone], params: &MatrixParams, hasher: &mut H) {
    zones.len().hash(hasher);
    for zone in zones {
        zone.hash_into(hasher);
    }
    params.hash(hasher);
}

fn coord_key(coord: Coord) -> (u64, u64) {
    (coord.x.to_bits(), coord.y.to_bits())
}

impl DistanceMatrix {
    pub fn build(
        points: Vec<MatrixPoint>,
        zones: Vec<ThreatZone>,
        params: &MatrixParams,
    ) -> Result<Self, MatrixError> {
        Self::build_with_previous(points, zones, params, None)
    }

    /// Builds the matrix, reusing every leg of `previous` whose endpoints have
    /// the same coordinates when the zones and params are unchanged.
    #[instrument(skip_all, level = "debug", fields(points = points.len(), zones = zones.len()))]
    pub fn build_with_previous(
        points: Vec<MatrixPoint>,
        zones: Vec<ThreatZone>,
        params: &MatrixParams,
        previous: Option<&DistanceMatrix>,
    ) -> Result<Self, MatrixError> {
        validate(&points, &zones)?;

        let n = points.len();
        let index: FxHashMap<String, usize> = points
            .iter()
            .enumerate()
            .map(|(i, point)| (point.id.clone(), i))
            .collect();

        let fingerprint = Self::compute_fingerprint(&points, &zones, params);
        let zones_fingerprint = {
            let mut hasher = FxHasher64::default();
            hash_zones(&zones, params, &mut hasher);
            hasher.finish()
        };

        let previous = previous.filter(|previous| previous.zones_fingerprint == zones_fingerprint);
        let previous_index: FxHashMap<(u64, u64), usize> = previous
            .map(|previous| {
                previous
                    .points
                    .iter()
                    .enumerate()
                    .map(|(i, point)| (coord_key(point.coord), i))
                    .collect()
            })
            .unwrap_or_default();

        let mut legs: Vec<Option<Leg>> = vec![None; n * n];
        let mut pending: Vec<(usize, usize)> = Vec::new();
        let mut reused = 0;

        for i in 0..n {
            legs[i * n + i] = Some(Leg {
                distance: 0.0,
                polyline: smallvec![points[i].coord],
            });

            for j in (i + 1)..n {
                let reusable = previous.and_then(|previous| {
                    let from = previous_index.get(&coord_key(points[i].coord))?;
                    let to = previous_index.get(&coord_key(points[j].coord))?;
                    Some(previous.legs[from * previous.points.len() + to].clone())
                });

                match reusable {
                    Some(leg) => {
                        reused += 1;
                        legs[j * n + i] = leg.as_ref().map(Leg::reversed);
                        legs[i * n + j] = leg;
                    }
                    None => pending.push((i, j)),
                }
            }
        }

        let computed = pending.len();
        if !pending.is_empty() {
            let graph = VisibilityGraph::new(&zones, params);
            let results: Vec<((usize, usize), Option<Leg>)> = pending
                .into_par_iter()
                .map(|(i, j)| {
                    let leg = if points[i].coord == points[j].coord {
                        Some(Leg {
                            distance: 0.0,
                            polyline: smallvec![points[i].coord, points[j].coord],
                        })
                    } else {
                        graph
                            .shortest_path(points[i].coord, points[j].coord)
                            .map(|(distance, polyline)| Leg {
                                distance,
                                polyline: SmallVec::from_vec(polyline),
                            })
                    };
                    ((i, j), leg)
                })
                .collect();

            for ((i, j), leg) in results {
                legs[j * n + i] = leg.as_ref().map(Leg::reversed);
                legs[i * n + j] = leg;
            }
        }

        debug!(reused, computed, "Built distance matrix");

        Ok(DistanceMatrix {
            points,
            index,
            zones,
            params: params.clone(),
            legs,
            fingerprint,
            zones_fingerprint,
        })
    }

    /// Hash of everything the matrix depends on, used as the cache key.
    pub fn compute_fingerprint(
        points: &[MatrixPoint],
        zones: &[ThreatZone],
        params: &MatrixParams,
    ) -> u64 {
        let mut hasher = FxHasher64::default();

        points.len().hash(&mut hasher);
        for point in points {
            point.id.hash(&mut hasher);
            hasher.write_u64(point.coord.x.to_bits());
            hasher.write_u64(point.coord.y.to_bits());
        }
        hash_zones(zones, params, &mut hasher);

        hasher.finish()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[MatrixPoint] {
        &self.points
    }

    pub fn zones(&self) -> &[ThreatZone] {
        &self.zones
    }

    pub fn params(&self) -> &MatrixParams {
        &self.params
    }

    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn coord(&self, index: usize) -> Coord {
        self.points[index].coord
    }

    #[inline(always)]
    pub fn leg(&self, from: usize, to: usize) -> Option<&Leg> {
        self.legs[from * self.points.len() + to].as_ref()
    }

    /// Obstacle avoiding distance, infinite when unreachable.
    #[inline(always)]
    pub fn distance(&self, from: usize, to: usize) -> f64 {
        self.leg(from, to).map_or(f64::INFINITY, Leg::distance)
    }

    pub fn is_reachable(&self, from: usize, to: usize) -> bool {
        self.leg(from, to).is_some()
    }

    pub fn distance_by_id(&self, from: &str, to: &str) -> Option<f64> {
        Some(self.distance(self.index_of(from)?, self.index_of(to)?))
    }

    /// Straight line distance, ignoring zones.
    pub fn direct_distance(&self, from: usize, to: usize) -> f64 {
        euclidean_distance(self.coord(from), self.coord(to))
    }
}

fn validate(points: &[MatrixPoint], zones: &[ThreatZone]) -> Result<(), MatrixError> {
    let mut seen = fxhash::FxHashSet::default();
    for point in points {
        if !point.coord.x.is_finite() || !point.coord.y.is_finite() {
            return Err(MatrixError::NonFiniteCoordinate(point.id.clone()));
        }
        if !seen.insert(point.id.as_str()) {
            return Err(MatrixError::DuplicatePoint(point.id.clone()));
        }
    }

    for (index, zone) in zones.iter().enumerate() {
        if !zone.center().x.is_finite() || !zone.center().y.is_finite() {
            return Err(MatrixError::InvalidZoneCenter(index));
        }
        if !zone.radius().is_finite() || zone.radius() <= 0.0 {
            return Err(MatrixError::InvalidZoneRadius {
                index,
                radius: zone.radius(),
            });
        }
    }

    Ok(())
}
