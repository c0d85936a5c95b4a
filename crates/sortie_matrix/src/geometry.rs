use geo::{
    Coord, Distance, Euclidean, Line, Point,
    algorithm::line_intersection::{LineIntersection, line_intersection},
};

use crate::threat_zone::ThreatZone;

pub fn euclidean_distance(a: Coord, b: Coord) -> f64 {
    Euclidean.distance(Point::from(a), Point::from(b))
}

pub fn polyline_length(points: &[Coord]) -> f64 {
    points
        .windows(2)
        .map(|window| euclidean_distance(window[0], window[1]))
        .sum()
}

/// Endpoints are put in a canonical order so that every computation on `[a, b]`
/// gives bit-identical results for `[b, a]`.
#[inline(always)]
fn canonical(a: Coord, b: Coord) -> (Coord, Coord) {
    if (a.x, a.y) <= (b.x, b.y) {
        (a, b)
    } else {
        (b, a)
    }
}

/// Projection parameter of `p` onto the segment `[a, b]`, clamped to `[0, 1]`.
///
/// ```text
/// t = clamp(((p - a) . (b - a)) / |b - a|^2, 0, 1)
/// ```
///
/// A degenerate segment (`a == b`) returns `0`.
pub fn projection_parameter(p: Coord, a: Coord, b: Coord) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_squared = dx * dx + dy * dy;

    if length_squared == 0.0 {
        return 0.0;
    }

    (((p.x - a.x) * dx + (p.y - a.y) * dy) / length_squared).clamp(0.0, 1.0)
}

/// Closest point to `p` on the segment `[a, b]`.
pub fn closest_point_on_segment(p: Coord, a: Coord, b: Coord) -> Coord {
    let (a, b) = canonical(a, b);
    let t = projection_parameter(p, a, b);

    Coord {
        x: a.x + t * (b.x - a.x),
        y: a.y + t * (b.y - a.y),
    }
}

/// Perpendicular distance from `p` to the segment `[a, b]` (OSD).
///
/// This is the single implementation used for every point-to-segment distance,
/// whether it is a target against a trajectory or a zone center against a leg.
pub fn point_segment_distance(p: Coord, a: Coord, b: Coord) -> f64 {
    euclidean_distance(p, closest_point_on_segment(p, a, b))
}

/// Index of the polyline segment closest to `p`, with its distance.
/// Ties keep the earliest segment.
pub fn nearest_segment(p: Coord, polyline: &[Coord]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;

    for (index, window) in polyline.windows(2).enumerate() {
        let distance = point_segment_distance(p, window[0], window[1]);
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            best = Some((index, distance));
        }
    }

    best
}

/// True if any point of `[a, b]` lies strictly inside `zone`.
///
/// The segment enters the open disc iff its closest point to the center is at
/// a distance strictly smaller than the radius. This is the exact solution of
/// `|a + t (b - a) - c| < r` for some `t` in `[0, 1]`, and it also covers the
/// case of an endpoint inside the zone. A segment that only touches the
/// boundary does not intersect.
pub fn segment_intersects_zone(a: Coord, b: Coord, zone: &ThreatZone) -> bool {
    point_segment_distance(zone.center(), a, b) < zone.radius()
}

pub fn segment_intersects_any_zone(a: Coord, b: Coord, zones: &[ThreatZone]) -> bool {
    zones.iter().any(|zone| segment_intersects_zone(a, b, zone))
}

pub fn is_inside_any_zone(p: Coord, zones: &[ThreatZone]) -> bool {
    zones.iter().any(|zone| zone.contains(p))
}

/// True if the two segments cross at a single interior point.
/// Shared endpoints and collinear overlaps are not crossings.
pub fn segments_cross(a1: Coord, a2: Coord, b1: Coord, b2: Coord) -> bool {
    if a1 == a2 || b1 == b2 {
        return false;
    }

    matches!(
        line_intersection(Line::new(a1, a2), Line::new(b1, b2)),
        Some(LineIntersection::SinglePoint {
            is_proper: true,
            ..
        })
    )
}

pub fn polylines_cross(first: &[Coord], second: &[Coord]) -> bool {
    first.windows(2).any(|a| {
        second
            .windows(2)
            .any(|b| segments_cross(a[0], a[1], b[0], b[1]))
    })
}
