//! GPS track reduction for map display.

use super::{GpsPoint, GpsTracks};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance in metres.
#[must_use]
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Distance from `point` to the segment `start..end`, in metres.
fn segment_distance(point: &GpsPoint, start: &GpsPoint, end: &GpsPoint) -> f64 {
    let dx = end.lng - start.lng;
    let dy = end.lat - start.lat;

    if dx.abs() < 1e-10 && dy.abs() < 1e-10 {
        return haversine_distance(point.lat, point.lng, start.lat, start.lng);
    }

    let t = ((point.lng - start.lng) * dx + (point.lat - start.lat) * dy) / (dx * dx + dy * dy);
    let t = t.clamp(0.0, 1.0);

    haversine_distance(point.lat, point.lng, start.lat + t * dy, start.lng + t * dx)
}

/// Ramer-Douglas-Peucker reduction with tolerance `epsilon_m` metres.
///
/// Endpoints are always kept. Points carry their speed and runtime through
/// unchanged. Pending ranges live on an explicit stack, so long tracks do
/// not deepen the call stack.
#[must_use]
pub fn simplify_track(points: &[GpsPoint], epsilon_m: f64) -> Vec<GpsPoint> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut ranges = vec![(0, last)];
    while let Some((first, end)) = ranges.pop() {
        let mut max_distance = 0.0;
        let mut max_index = first;
        for (i, point) in points.iter().enumerate().take(end).skip(first + 1) {
            let distance = segment_distance(point, &points[first], &points[end]);
            if distance > max_distance {
                max_distance = distance;
                max_index = i;
            }
        }

        if max_distance > epsilon_m {
            keep[max_index] = true;
            ranges.push((first, max_index));
            ranges.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(point, kept)| kept.then_some(*point))
        .collect()
}

/// Simplify every lap of a session.
#[must_use]
pub fn simplify_tracks(tracks: &GpsTracks, epsilon_m: f64) -> GpsTracks {
    tracks
        .iter()
        .map(|(lap, points)| (*lap, simplify_track(points, epsilon_m)))
        .collect()
}
