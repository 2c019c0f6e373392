// src/main.rs

mod config;
mod persistence;
mod replay;
mod session;
mod timing;
mod types;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use persistence::{spawn_save_worker, JsonFileStore};
use replay::SessionReplay;
use session::{class_list, SessionTracker};
use timing::{class_normalized_gap, gap_between, interpolate_at, linear_time_at, CarPace, ReferenceRegistry};
use types::{CarSample, Config, DriverEntry, SessionIdentity};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("relative_timing=info")
        .init();

    info!("🏁 Reference-Lap Timing Engine Starting");

    let config = Config::load("config.yaml")?;
    info!("✓ Configuration loaded");

    let store: Arc<JsonFileStore> = Arc::new(JsonFileStore::new(&config.storage.path));
    let (save_tx, save_rx) = mpsc::unbounded_channel();
    let save_worker = spawn_save_worker(store.clone(), save_rx);

    let mut registry = ReferenceRegistry::new(save_tx);
    let mut tracker = SessionTracker::new();

    let replay = SessionReplay::from_config(&config.replay);
    let roster = replay.roster();
    let classes = class_list(&roster, config.replay.pace_car_idx);
    info!(?classes, cars = roster.len(), "session roster");

    let identity = SessionIdentity {
        series_id: config.replay.series_id,
        track_id: config.replay.track_id,
        session_num: config.replay.session_num,
        sub_session_id: config.replay.sub_session_id,
    };

    let samples = replay.samples();
    info!(samples = samples.len(), "replaying session telemetry");

    for sample in &samples {
        if tracker.observe(identity) {
            registry.reset_session();
            registry
                .initialize(
                    store.as_ref(),
                    identity.series_id,
                    identity.track_id,
                    &classes,
                )
                .await;
        }
        registry.collect_sample(sample);
    }

    let (active, best, persisted) = registry.lap_counts();
    info!(active, best, persisted, "replay complete");

    report_gaps(
        &registry,
        &roster,
        &samples,
        config.engine.prefer_persisted_reference,
    );

    // Dropping the registry closes the save queue; the worker then
    // flushes whatever is still pending before exiting.
    drop(registry);
    save_worker.await?;

    info!("✓ Done");
    Ok(())
}

/// Relative-timing report for every car pair at their final positions.
fn report_gaps(
    registry: &ReferenceRegistry,
    roster: &[DriverEntry],
    samples: &[CarSample],
    prefer_persisted: bool,
) {
    let mut latest: HashMap<i32, &CarSample> = HashMap::new();
    for sample in samples {
        latest.insert(sample.car_idx, sample);
    }

    for (i, a) in roster.iter().enumerate() {
        for b in roster.iter().skip(i + 1) {
            let (Some(&pos_a), Some(&pos_b)) = (latest.get(&a.car_idx), latest.get(&b.car_idx))
            else {
                continue;
            };

            if a.class_id == b.class_id {
                let lap = registry.reference_lap(a.car_idx, a.class_id, prefer_persisted);
                if lap.is_empty() {
                    warn!(car_a = a.car_idx, car_b = b.car_idx, "no reference lap yet");
                    continue;
                }
                match gap_between(lap, pos_a.track_pct, pos_b.track_pct) {
                    Some(gap) => info!(
                        car_a = a.car_idx,
                        car_b = b.car_idx,
                        class_id = a.class_id,
                        gap = format!("{gap:+.3}s"),
                        "same-class gap"
                    ),
                    None => {
                        // Sparse spline data: degrade to the linear estimate.
                        let gap =
                            linear_time_at(lap, pos_a.track_pct) - linear_time_at(lap, pos_b.track_pct);
                        info!(
                            car_a = a.car_idx,
                            car_b = b.car_idx,
                            gap = format!("{gap:+.3}s"),
                            "same-class gap (linear fallback)"
                        );
                    }
                }
            } else {
                let Some((pace_a, pace_b)) = (estimate_pace(registry, a, pos_a, prefer_persisted))
                    .zip(estimate_pace(registry, b, pos_b, prefer_persisted))
                else {
                    warn!(car_a = a.car_idx, car_b = b.car_idx, "missing class reference");
                    continue;
                };

                let a_is_ahead = pos_a.track_pct >= pos_b.track_pct;
                let (ahead, behind) = if a_is_ahead {
                    (pace_a, pace_b)
                } else {
                    (pace_b, pace_a)
                };
                let gap = class_normalized_gap(ahead, behind, a_is_ahead);
                info!(
                    car_a = a.car_idx,
                    car_b = b.car_idx,
                    gap = format!("{gap:+.3}s"),
                    "cross-class gap"
                );
            }
        }
    }
}

/// Pace inputs for one car: elapsed time at its position on its own
/// class reference plus the class lap time.
fn estimate_pace(
    registry: &ReferenceRegistry,
    driver: &DriverEntry,
    position: &CarSample,
    prefer_persisted: bool,
) -> Option<CarPace> {
    let lap = registry.reference_lap(driver.car_idx, driver.class_id, prefer_persisted);
    if lap.is_empty() {
        return None;
    }
    let est_time = interpolate_at(lap, position.track_pct)
        .unwrap_or_else(|| linear_time_at(lap, position.track_pct));
    Some(CarPace {
        est_time,
        class_est_time: lap.lap_time(),
    })
}
