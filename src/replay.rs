// src/replay.rs
//
// Synthetic telemetry source for the demo driver. Generates the same
// per-tick, per-car samples a live sim feed would deliver, with
// optional pit-road visits to exercise dirty-lap handling.

use crate::types::{CarSample, DriverEntry, ReplayConfig, TrackSurface};

/// Pit road occupies this slice of the lap when a car pits.
const PIT_WINDOW: (f64, f64) = (0.45, 0.55);

pub struct SessionReplay {
    cars: Vec<ReplayCar>,
    tick_hz: f64,
    laps: u32,
}

struct ReplayCar {
    car_idx: i32,
    class_id: i32,
    lap_time: f64,
    pit_lap: Option<u32>,
}

impl SessionReplay {
    pub fn from_config(config: &ReplayConfig) -> Self {
        Self {
            cars: config
                .cars
                .iter()
                .map(|c| ReplayCar {
                    car_idx: c.car_idx,
                    class_id: c.class_id,
                    lap_time: c.lap_time,
                    pit_lap: c.pit_lap,
                })
                .collect(),
            tick_hz: config.tick_hz,
            laps: config.laps,
        }
    }

    pub fn roster(&self) -> Vec<DriverEntry> {
        self.cars
            .iter()
            .map(|c| DriverEntry {
                car_idx: c.car_idx,
                class_id: c.class_id,
            })
            .collect()
    }

    /// All samples for the session in tick order, every car each tick.
    pub fn samples(&self) -> Vec<CarSample> {
        let slowest = self
            .cars
            .iter()
            .map(|c| c.lap_time)
            .fold(0.0_f64, f64::max);
        let duration = slowest * (self.laps as f64 + 0.1);
        let total_ticks = (duration * self.tick_hz) as u64;

        let mut samples = Vec::with_capacity(total_ticks as usize * self.cars.len());
        for tick in 0..total_ticks {
            let session_time = tick as f64 / self.tick_hz;
            for car in &self.cars {
                let progress = session_time / car.lap_time;
                let lap_number = progress as u32;
                let track_pct = progress.fract();

                let on_pit_road = car.pit_lap == Some(lap_number)
                    && track_pct >= PIT_WINDOW.0
                    && track_pct < PIT_WINDOW.1;

                samples.push(CarSample {
                    car_idx: car.car_idx,
                    class_id: car.class_id,
                    track_pct,
                    session_time,
                    surface: TrackSurface::OnTrack,
                    on_pit_road,
                });
            }
        }
        samples
    }
}
