// src/timing/spline.rs
//
// Monotone cubic (Fritsch-Carlson PCHIP) interpolation over a closed
// loop. Tangents are precomputed once when a lap is promoted to best
// lap; evaluation is then an O(1) map lookup plus a Hermite blend.

use super::lap::{next_key, normalize_key, ReferenceLap};

/// Computes and stores one tangent per point in the lap, in place.
///
/// The track is a closed loop, so the first point's "previous" neighbor
/// is the last point shifted back one lap (-1 position, -lapTime time)
/// and the last point's "next" neighbor is the first point shifted
/// forward one lap. The standard Fritsch-Carlson interior weighting
/// then applies uniformly, including at both ends.
pub fn precompute_tangents(lap: &mut ReferenceLap) {
    let mut sorted: Vec<(u32, f64, f64)> = lap
        .points
        .iter()
        .map(|(&key, p)| (key, p.track_pct, p.elapsed))
        .collect();
    sorted.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    if sorted.len() < 2 {
        return;
    }

    let x: Vec<f64> = sorted.iter().map(|&(_, pct, _)| pct).collect();
    let y: Vec<f64> = sorted.iter().map(|&(_, _, t)| t).collect();
    let tangents = cyclic_pchip_tangents(&x, &y, lap.lap_time());

    for (i, &(key, _, _)) in sorted.iter().enumerate() {
        if let Some(point) = lap.points.get_mut(&key) {
            point.tangent = Some(tangents[i]);
        }
    }
}

/// Fritsch-Carlson tangents with cyclic boundary conditions.
fn cyclic_pchip_tangents(x: &[f64], y: &[f64], lap_time: f64) -> Vec<f64> {
    let n = x.len();
    let mut deltas = vec![0.0; n - 1];
    for k in 0..n - 1 {
        deltas[k] = (y[k + 1] - y[k]) / (x[k + 1] - x[k]);
    }

    // Wrapped secants through the start/finish line.
    let delta_before_first = (y[0] - (y[n - 1] - lap_time)) / (x[0] - (x[n - 1] - 1.0));
    let delta_after_last = (y[0] + lap_time - y[n - 1]) / (x[0] + 1.0 - x[n - 1]);

    let mut tangents = vec![0.0; n];

    tangents[0] = weighted_tangent(
        delta_before_first,
        deltas[0],
        x[0] - (x[n - 1] - 1.0),
        x[1] - x[0],
    );
    tangents[n - 1] = weighted_tangent(
        deltas[n - 2],
        delta_after_last,
        x[n - 1] - x[n - 2],
        x[0] + 1.0 - x[n - 1],
    );
    for k in 1..n - 1 {
        tangents[k] = weighted_tangent(deltas[k - 1], deltas[k], x[k] - x[k - 1], x[k + 1] - x[k]);
    }

    tangents
}

/// Harmonic-mean-style weighting of the two adjacent secant slopes.
/// A sign change between them marks a local extremum: the tangent is
/// forced to zero so the cubic cannot overshoot.
fn weighted_tangent(d_before: f64, d_after: f64, dx_before: f64, dx_after: f64) -> f64 {
    if d_before * d_after <= 0.0 {
        return 0.0;
    }
    let w1 = 2.0 * dx_after + dx_before;
    let w2 = dx_after + 2.0 * dx_before;
    (w1 + w2) / (w1 / d_before + w2 / d_after)
}

/// Interpolated elapsed time at `target_pct`, or `None` when either
/// bracketing grid point or its tangent is missing. Callers fall back
/// to a coarser estimate in that case.
pub fn interpolate_at(lap: &ReferenceLap, target_pct: f64) -> Option<f64> {
    let key0 = normalize_key(target_pct);
    let key1 = next_key(key0);

    let p0 = lap.points.get(&key0)?;
    let p1 = lap.points.get(&key1)?;
    let m0 = p0.tangent?;
    let m1 = p1.tangent?;

    // The stored positions are the precise samples, not the bucket
    // boundaries, so the span comes from the points themselves.
    let mut h = p1.track_pct - p0.track_pct;
    let mut y1 = p1.elapsed;

    if h <= 0.0 {
        // Evaluation window wraps across the finish line.
        h = 1.0 - p0.track_pct + p1.track_pct;
        y1 += lap.lap_time();
    }

    let t = (target_pct - p0.track_pct) / h;
    Some(hermite_basis(t, p0.elapsed, y1, m0 * h, m1 * h))
}

fn hermite_basis(t: f64, y0: f64, y1: f64, m0: f64, m1: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = -2.0 * t3 + 3.0 * t2;
    let h11 = t3 - t2;
    h00 * y0 + h10 * m0 + h01 * y1 + h11 * m1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::lap::{ReferencePoint, BUCKET_COUNT, REFERENCE_INTERVAL};

    /// Lap where elapsed time is `lap_time * pct` at every bucket.
    fn constant_speed_lap(lap_time: f64) -> ReferenceLap {
        let mut lap = ReferenceLap::begin(1, 0.0, 0.0, true);
        for key in 0..BUCKET_COUNT {
            let pct = key as f64 * REFERENCE_INTERVAL;
            lap.points.insert(
                key,
                ReferencePoint {
                    track_pct: pct,
                    elapsed: lap_time * pct,
                    tangent: None,
                },
            );
        }
        lap.finish_time = lap_time;
        precompute_tangents(&mut lap);
        lap
    }

    #[test]
    fn test_constant_speed_tangents() {
        let lap = constant_speed_lap(90.0);
        for point in lap.points.values() {
            let tangent = point.tangent.expect("tangent computed");
            assert!(
                (tangent - 90.0).abs() < 1e-6,
                "constant speed should give uniform tangents, got {tangent}"
            );
        }
    }

    #[test]
    fn test_interpolate_midpoint() {
        let lap = constant_speed_lap(90.0);
        let time = interpolate_at(&lap, 0.5).unwrap();
        assert!((time - 45.0).abs() < 1e-6);
    }

    #[test]
    fn test_interpolate_across_finish_line() {
        let lap = constant_speed_lap(90.0);
        // Last bucket covers [0.9975, 1.0); its neighbor is bucket 0.
        let time = interpolate_at(&lap, 0.9990).unwrap();
        assert!((time - 90.0 * 0.9990).abs() < 1e-3);
    }

    #[test]
    fn test_extremum_tangent_forced_to_zero() {
        let mut lap = ReferenceLap::begin(1, 0.0, 0.0, true);
        let xs = [0.0, 0.25, 0.5, 0.75];
        let ys = [0.0, 10.0, 5.0, 20.0];
        for (&pct, &elapsed) in xs.iter().zip(ys.iter()) {
            lap.points.insert(
                normalize_key(pct),
                ReferencePoint {
                    track_pct: pct,
                    elapsed,
                    tangent: None,
                },
            );
        }
        lap.finish_time = 30.0;
        precompute_tangents(&mut lap);

        // Secants around x=0.25 flip sign (+40 then -20), same at x=0.5
        // (-20 then +60): both are local extrema.
        let p1 = lap.points.get(&normalize_key(0.25)).unwrap();
        let p2 = lap.points.get(&normalize_key(0.5)).unwrap();
        assert_eq!(p1.tangent, Some(0.0));
        assert_eq!(p2.tangent, Some(0.0));
    }

    #[test]
    fn test_no_overshoot_between_points() {
        // Varying pace: time accelerates then decelerates, but stays
        // monotonically increasing around the lap.
        let mut lap = ReferenceLap::begin(1, 0.0, 0.0, true);
        let lap_time = 100.0;
        for key in 0..BUCKET_COUNT {
            let pct = key as f64 * REFERENCE_INTERVAL;
            let elapsed = lap_time * (pct + 0.1 * (std::f64::consts::PI * pct).sin().powi(2) * pct)
                / (1.0 + 0.1 * pct);
            lap.points.insert(
                key,
                ReferencePoint {
                    track_pct: pct,
                    elapsed,
                    tangent: None,
                },
            );
        }
        lap.finish_time = lap_time;
        precompute_tangents(&mut lap);

        for key in 0..BUCKET_COUNT - 1 {
            let y0 = lap.points.get(&key).unwrap().elapsed;
            let y1 = lap.points.get(&(key + 1)).unwrap().elapsed;
            let lo = y0.min(y1);
            let hi = y0.max(y1);
            for step in 1..4 {
                let pct = (key as f64 + step as f64 / 4.0) * REFERENCE_INTERVAL;
                let value = interpolate_at(&lap, pct).unwrap();
                assert!(
                    value >= lo - 1e-9 && value <= hi + 1e-9,
                    "overshoot at pct {pct}: {value} outside [{lo}, {hi}]"
                );
            }
        }
    }

    #[test]
    fn test_missing_point_returns_none() {
        let mut lap = constant_speed_lap(90.0);
        lap.points.remove(&normalize_key(0.5031));
        // The preceding bucket exists but its neighbor is gone.
        assert!(interpolate_at(&lap, 0.5010).is_none());
        // And evaluating inside the removed bucket itself.
        assert!(interpolate_at(&lap, 0.5031).is_none());
    }

    #[test]
    fn test_missing_tangent_returns_none() {
        let mut lap = constant_speed_lap(90.0);
        lap.points.get_mut(&normalize_key(0.5)).unwrap().tangent = None;
        assert!(interpolate_at(&lap, 0.5).is_none());
    }

    #[test]
    fn test_too_few_points_leaves_tangents_unset() {
        let mut lap = ReferenceLap::begin(1, 0.2, 0.0, true);
        lap.finish_time = 50.0;
        precompute_tangents(&mut lap);
        assert!(lap.points.values().all(|p| p.tangent.is_none()));
    }
}
