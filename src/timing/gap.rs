// src/timing/gap.rs
//
// Signed time deltas between two cars from a shared reference lap,
// plus the class-normalized variant for mixed-class fields.

use super::lap::{next_key, normalize_key, ReferenceLap};
use super::spline;

/// Estimated pace inputs for one car in a class-normalized comparison.
#[derive(Debug, Clone, Copy)]
pub struct CarPace {
    /// Estimated elapsed time at the car's current position, seconds.
    pub est_time: f64,
    /// Estimated full lap time for the car's class, seconds.
    pub class_est_time: f64,
}

/// Time by which the car at `pos_a` leads the car at `pos_b`, using the
/// reference lap as the ruler. Positive means `pos_a` is ahead. The raw
/// delta is folded into (-lapTime/2, +lapTime/2] so two cars close
/// together across the start/finish line read as a small gap, not a
/// full lap.
///
/// Returns `None` when the spline has no data at either position;
/// callers fall back to a coarser estimate such as [`linear_time_at`].
pub fn gap_between(lap: &ReferenceLap, pos_a: f64, pos_b: f64) -> Option<f64> {
    let time_a = spline::interpolate_at(lap, pos_a)?;
    let time_b = spline::interpolate_at(lap, pos_b)?;
    let lap_time = lap.lap_time();

    let mut delta = time_a - time_b;
    if delta <= -lap_time / 2.0 {
        delta += lap_time;
    } else if delta > lap_time / 2.0 {
        delta -= lap_time;
    }
    Some(delta)
}

/// Gap between cars of different classes, expressed in the time units
/// of the car behind.
///
/// The ahead car's estimated time is scaled by the ratio of the two
/// class lap times before differencing, so a GT3 chasing a GTP reads a
/// gap that matches its own pace rather than raw seconds. The behind
/// car's class lap time anchors the half-lap wraparound check: the
/// trailing car defines what "a full lap" means for the comparison.
pub fn class_normalized_gap(ahead: CarPace, behind: CarPace, want_gap_to_ahead: bool) -> f64 {
    // Ratio > 1 means the behind car's class is slower, so the gap grows.
    let scaling_ratio = behind.class_est_time / ahead.class_est_time;
    let ahead_time_scaled = ahead.est_time * scaling_ratio;

    let reference_lap_time = behind.class_est_time;

    if want_gap_to_ahead {
        // Gap TO the car ahead, expected positive.
        let mut delta = ahead_time_scaled - behind.est_time;
        if delta < -reference_lap_time / 2.0 {
            delta += reference_lap_time;
        }
        delta
    } else {
        // Gap TO the car behind, expected negative.
        let mut delta = behind.est_time - ahead_time_scaled;
        if delta > reference_lap_time / 2.0 {
            delta -= reference_lap_time;
        }
        delta
    }
}

/// Coarse linear estimate of elapsed time at a position, used when the
/// spline reports no data. Missing grid points degrade to a zero-time
/// anchor rather than failing.
pub fn linear_time_at(lap: &ReferenceLap, track_pct: f64) -> f64 {
    let prev_key = normalize_key(track_pct);
    let next_key = next_key(prev_key);

    let fallback = (0.0, track_pct);
    let (prev_time, prev_pct) = lap
        .points
        .get(&prev_key)
        .map_or(fallback, |p| (p.elapsed, p.track_pct));
    let (next_time, next_pct) = lap
        .points
        .get(&next_key)
        .map_or(fallback, |p| (p.elapsed, p.track_pct));

    let sector_distance = next_pct - prev_pct;
    let distance_covered = track_pct - prev_pct;
    let fraction = if sector_distance == 0.0 {
        distance_covered
    } else {
        distance_covered / sector_distance
    };

    prev_time + fraction * (next_time - prev_time)
}
