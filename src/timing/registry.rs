// src/timing/registry.rs
//
// Per-car lap recording state machine and the owning store for
// reference laps: one active lap per car, one best lap per car, one
// persisted best lap per class. All writes happen on the telemetry
// tick; the only async edge is the fire-and-forget save queue.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::persistence::{ReferenceLapBridge, SaveQueue, SaveRequest};
use crate::timing::lap::{normalize_key, ReferenceLap, ReferencePoint, MIN_POINTS_FOR_VALID_LAP};
use crate::timing::spline;
use crate::types::CarSample;

/// A lap completes when the previous sample was past this position...
const WRAP_EXIT_PCT: f64 = 0.95;
/// ...and the current sample is before this one.
const WRAP_ENTRY_PCT: f64 = 0.05;

/// Owns all recorded reference-lap state for one session.
///
/// Active laps are mutated in place every tick; the best-per-car and
/// best-per-class maps only change on lap completion. The whole store
/// is cleared on session transition.
pub struct ReferenceRegistry {
    active_laps: HashMap<i32, ReferenceLap>,
    best_laps: HashMap<i32, ReferenceLap>,
    persisted_laps: HashMap<i32, ReferenceLap>,
    series_id: Option<i32>,
    track_id: Option<i32>,
    save_queue: SaveQueue,
    placeholder: ReferenceLap,
}

impl ReferenceRegistry {
    pub fn new(save_queue: SaveQueue) -> Self {
        Self {
            active_laps: HashMap::new(),
            best_laps: HashMap::new(),
            persisted_laps: HashMap::new(),
            series_id: None,
            track_id: None,
            save_queue,
            placeholder: ReferenceLap::placeholder(-1),
        }
    }

    /// Loads the persisted best lap for each class at session start.
    /// A per-class load failure is logged and skipped; the session can
    /// still record fresh laps without it.
    pub async fn initialize(
        &mut self,
        bridge: &dyn ReferenceLapBridge,
        series_id: i32,
        track_id: i32,
        class_list: &[i32],
    ) {
        self.series_id = Some(series_id);
        self.track_id = Some(track_id);

        for &class_id in class_list {
            match bridge.load_reference_lap(series_id, track_id, class_id).await {
                Ok(Some(lap)) => {
                    info!(
                        class_id,
                        lap_time = lap.lap_time(),
                        "loaded persisted reference lap"
                    );
                    self.persisted_laps.insert(class_id, lap);
                }
                Ok(None) => debug!(class_id, "no persisted reference lap"),
                Err(err) => error!(
                    series_id,
                    track_id, class_id, %err,
                    "failed to load reference lap"
                ),
            }
        }
    }

    /// Feed one telemetry tick for one car into the recorder.
    pub fn collect_sample(&mut self, sample: &CarSample) {
        if !sample.track_pct.is_finite()
            || !(0.0..1.0).contains(&sample.track_pct)
            || !sample.session_time.is_finite()
        {
            debug!(
                car_idx = sample.car_idx,
                track_pct = sample.track_pct,
                session_time = sample.session_time,
                "rejecting malformed telemetry sample"
            );
            return;
        }

        let clean_now = sample.surface.is_on_track() && !sample.on_pit_road;

        let lap = match self.active_laps.get_mut(&sample.car_idx) {
            Some(lap) => lap,
            None => {
                self.active_laps.insert(
                    sample.car_idx,
                    ReferenceLap::begin(
                        sample.class_id,
                        sample.track_pct,
                        sample.session_time,
                        clean_now,
                    ),
                );
                return;
            }
        };

        let wrapped = lap.last_tracked_pct > WRAP_EXIT_PCT && sample.track_pct < WRAP_ENTRY_PCT;
        if wrapped {
            lap.finish_time = sample.session_time;
            // Replace the active lap first so a new one starts recording
            // this tick regardless of whether the old one promotes.
            let finished = self.active_laps.insert(
                sample.car_idx,
                ReferenceLap::begin(
                    sample.class_id,
                    sample.track_pct,
                    sample.session_time,
                    clean_now,
                ),
            );
            if let Some(finished) = finished {
                self.promote_if_best(sample.car_idx, finished);
            }
            return;
        }

        // Clean status can only be lost within a lap, never regained.
        if lap.is_clean && !clean_now {
            lap.is_clean = false;
        }

        let key = normalize_key(sample.track_pct);
        if lap.is_clean && !lap.points.contains_key(&key) {
            lap.points.insert(
                key,
                ReferencePoint {
                    track_pct: sample.track_pct,
                    elapsed: sample.session_time - lap.start_time,
                    tangent: None,
                },
            );
        }
        lap.last_tracked_pct = sample.track_pct;
    }

    /// Judge a completed lap and promote it through the best-per-car and
    /// best-per-class stores if it wins.
    fn promote_if_best(&mut self, car_idx: i32, mut lap: ReferenceLap) {
        let lap_time = lap.lap_time();

        if lap.points.len() < MIN_POINTS_FOR_VALID_LAP || lap_time <= 0.0 {
            debug!(
                car_idx,
                points = lap.points.len(),
                lap_time,
                "discarding unreliable lap"
            );
            return;
        }
        if !lap.is_clean {
            debug!(car_idx, lap_time, "discarding dirty lap");
            return;
        }

        let is_new_best = self
            .best_laps
            .get(&car_idx)
            .map_or(true, |best| lap_time < best.lap_time());
        if !is_new_best {
            return;
        }

        spline::precompute_tangents(&mut lap);
        info!(
            car_idx,
            class_id = lap.class_id,
            lap_time,
            "🏁 new best lap"
        );

        let class_id = lap.class_id;
        let persisted_time = self
            .persisted_laps
            .get(&class_id)
            .map_or(f64::INFINITY, |saved| saved.lap_time());

        if lap_time < persisted_time {
            self.persisted_laps.insert(class_id, lap.clone());
            if let (Some(series_id), Some(track_id)) = (self.series_id, self.track_id) {
                let request = SaveRequest {
                    series_id,
                    track_id,
                    class_id,
                    lap: lap.clone(),
                };
                if self.save_queue.send(request).is_err() {
                    warn!(class_id, "persistence worker gone, skipping save");
                }
            }
        }

        self.best_laps.insert(car_idx, lap);
    }

    /// The timing ruler for a car: its own best lap, unless the caller
    /// prefers the class-wide persisted lap or no car-specific best
    /// exists yet. Returns an empty placeholder when nothing is known;
    /// callers must check `is_empty()` before interpolating.
    pub fn reference_lap(
        &self,
        car_idx: i32,
        class_id: i32,
        prefer_persisted: bool,
    ) -> &ReferenceLap {
        match (prefer_persisted, self.best_laps.get(&car_idx)) {
            (false, Some(best)) => best,
            _ => self
                .persisted_laps
                .get(&class_id)
                .unwrap_or(&self.placeholder),
        }
    }

    pub fn best_lap(&self, car_idx: i32) -> Option<&ReferenceLap> {
        self.best_laps.get(&car_idx)
    }

    pub fn persisted_lap(&self, class_id: i32) -> Option<&ReferenceLap> {
        self.persisted_laps.get(&class_id)
    }

    /// Clears everything. Must run on every session transition; recorded
    /// timing data never survives a track/series/session change.
    pub fn reset_session(&mut self) {
        self.active_laps.clear();
        self.best_laps.clear();
        self.persisted_laps.clear();
        self.series_id = None;
        self.track_id = None;
        info!("reference registry reset");
    }

    /// (active, best-per-car, best-per-class) map sizes.
    pub fn lap_counts(&self) -> (usize, usize, usize) {
        (
            self.active_laps.len(),
            self.best_laps.len(),
            self.persisted_laps.len(),
        )
    }
}
