// src/timing/lap.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Width of one position bucket, as a fraction of a lap.
pub const REFERENCE_INTERVAL: f64 = 0.0025;

/// Number of quantized position buckets around the track.
pub const BUCKET_COUNT: u32 = 400;

/// A completed lap must fill the whole grid before it is trusted as a
/// reference. Rejects laps captured at too coarse a sample rate, e.g. a
/// connection that only came up near the end of a session.
pub const MIN_POINTS_FOR_VALID_LAP: usize = 400;

/// Quantize a track-position fraction to its bucket index.
///
/// Out-of-range or non-finite input maps to bucket 0, so a bad key can
/// never grow the map beyond the fixed grid.
pub fn normalize_key(track_pct: f64) -> u32 {
    if !track_pct.is_finite() || !(0.0..1.0).contains(&track_pct) {
        return 0;
    }
    ((track_pct / REFERENCE_INTERVAL) as u32).min(BUCKET_COUNT - 1)
}

/// The bucket following `key`, wrapping through the start/finish line.
pub fn next_key(key: u32) -> u32 {
    (key + 1) % BUCKET_COUNT
}

/// One sampled (position, time) pair on a lap. `tangent` is populated
/// only once the lap is finalized as a best lap; it is the derivative of
/// elapsed time with respect to position at this sample.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReferencePoint {
    pub track_pct: f64,
    /// Seconds since the lap started.
    pub elapsed: f64,
    pub tangent: Option<f64>,
}

/// Timing data for one lap: either an active lap being recorded or a
/// finalized best lap usable as an interpolation ruler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceLap {
    pub class_id: i32,
    pub points: HashMap<u32, ReferencePoint>,
    pub start_time: f64,
    pub finish_time: f64,
    pub last_tracked_pct: f64,
    pub is_clean: bool,
}

impl ReferenceLap {
    /// Start a fresh active lap seeded with the current sample as point zero.
    pub fn begin(class_id: i32, track_pct: f64, session_time: f64, is_clean: bool) -> Self {
        let mut points = HashMap::new();
        points.insert(
            normalize_key(track_pct),
            ReferencePoint {
                track_pct,
                elapsed: 0.0,
                tangent: None,
            },
        );
        Self {
            class_id,
            points,
            start_time: session_time,
            finish_time: -1.0,
            last_tracked_pct: track_pct,
            is_clean,
        }
    }

    /// Empty stand-in returned when no reference data exists yet.
    /// Callers must treat it as "no data available".
    pub fn placeholder(class_id: i32) -> Self {
        Self {
            class_id,
            points: HashMap::new(),
            start_time: -1.0,
            finish_time: -1.0,
            last_tracked_pct: -1.0,
            is_clean: false,
        }
    }

    pub fn lap_time(&self) -> f64 {
        self.finish_time - self.start_time
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
