// src/persistence.rs
//
// Cross-session reference-lap storage. The engine's source of truth is
// always the in-memory registry; this store is a best-effort cache so a
// good lap survives a restart. Saves go through a fire-and-forget queue
// drained by a worker task, so a slow disk can never stall a telemetry
// tick.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::timing::ReferenceLap;

/// External persistence contract: one best lap per (series, track, class).
#[async_trait]
pub trait ReferenceLapBridge: Send + Sync {
    async fn load_reference_lap(
        &self,
        series_id: i32,
        track_id: i32,
        class_id: i32,
    ) -> Result<Option<ReferenceLap>>;

    async fn save_reference_lap(
        &self,
        series_id: i32,
        track_id: i32,
        class_id: i32,
        lap: &ReferenceLap,
    ) -> Result<()>;
}

/// A best-of-class lap queued for persistence.
#[derive(Debug)]
pub struct SaveRequest {
    pub series_id: i32,
    pub track_id: i32,
    pub class_id: i32,
    pub lap: ReferenceLap,
}

pub type SaveQueue = mpsc::UnboundedSender<SaveRequest>;

/// Drains the save queue, logging failures with their scope. Failures
/// are never retried and never reach the recording path. The task ends
/// when every sender is dropped, after flushing pending requests.
pub fn spawn_save_worker(
    bridge: Arc<dyn ReferenceLapBridge>,
    mut requests: mpsc::UnboundedReceiver<SaveRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            match bridge
                .save_reference_lap(
                    request.series_id,
                    request.track_id,
                    request.class_id,
                    &request.lap,
                )
                .await
            {
                Ok(()) => debug!(
                    class_id = request.class_id,
                    lap_time = request.lap.lap_time(),
                    "reference lap saved"
                ),
                Err(err) => error!(
                    series_id = request.series_id,
                    track_id = request.track_id,
                    class_id = request.class_id,
                    %err,
                    "failed to save reference lap"
                ),
            }
        }
    })
}

/// Single-file JSON store keyed by `"{series}_{track}_{class}"`.
/// A missing or unreadable file reads as empty.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn storage_key(series_id: i32, track_id: i32, class_id: i32) -> String {
        format!("{series_id}_{track_id}_{class_id}")
    }

    fn read_all(&self) -> HashMap<String, ReferenceLap> {
        let Ok(contents) = fs::read_to_string(&self.path) else {
            return HashMap::new();
        };
        match serde_json::from_str(&contents) {
            Ok(data) => data,
            Err(err) => {
                error!(path = %self.path.display(), %err, "corrupt reference lap file, starting empty");
                HashMap::new()
            }
        }
    }

    fn write_all(&self, data: &HashMap<String, ReferenceLap>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, json).with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl ReferenceLapBridge for JsonFileStore {
    async fn load_reference_lap(
        &self,
        series_id: i32,
        track_id: i32,
        class_id: i32,
    ) -> Result<Option<ReferenceLap>> {
        let all = self.read_all();
        Ok(all
            .get(&Self::storage_key(series_id, track_id, class_id))
            .cloned())
    }

    async fn save_reference_lap(
        &self,
        series_id: i32,
        track_id: i32,
        class_id: i32,
        lap: &ReferenceLap,
    ) -> Result<()> {
        let mut all = self.read_all();
        all.insert(
            Self::storage_key(series_id, track_id, class_id),
            lap.clone(),
        );
        self.write_all(&all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{precompute_tangents, ReferencePoint};
    use crate::timing::lap::{BUCKET_COUNT, REFERENCE_INTERVAL};

    fn sample_lap(class_id: i32, lap_time: f64) -> ReferenceLap {
        let mut lap = ReferenceLap::begin(class_id, 0.0, 0.0, true);
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

    fn temp_store(name: &str) -> JsonFileStore {
        let path = std::env::temp_dir().join(format!(
            "relative-timing-test-{name}-{}.json",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        JsonFileStore::new(path)
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let store = temp_store("roundtrip");
        let lap = sample_lap(1, 90.0);

        store.save_reference_lap(10, 20, 1, &lap).await.unwrap();
        let loaded = store
            .load_reference_lap(10, 20, 1)
            .await
            .unwrap()
            .expect("lap persisted");

        assert_eq!(loaded.points.len(), lap.points.len());
        assert!((loaded.lap_time() - 90.0).abs() < 1e-9);
        assert!(loaded.points.values().all(|p| p.tangent.is_some()));

        let _ = fs::remove_file(&store.path);
    }

    #[tokio::test]
    async fn test_load_missing_returns_none() {
        let store = temp_store("missing");
        assert!(store.load_reference_lap(1, 2, 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_saves_are_scoped_by_key() {
        let store = temp_store("scoped");
        store
            .save_reference_lap(10, 20, 1, &sample_lap(1, 90.0))
            .await
            .unwrap();
        store
            .save_reference_lap(10, 20, 2, &sample_lap(2, 110.0))
            .await
            .unwrap();

        let class1 = store.load_reference_lap(10, 20, 1).await.unwrap().unwrap();
        let class2 = store.load_reference_lap(10, 20, 2).await.unwrap().unwrap();
        assert!((class1.lap_time() - 90.0).abs() < 1e-9);
        assert!((class2.lap_time() - 110.0).abs() < 1e-9);
        // Different track, nothing stored.
        assert!(store.load_reference_lap(10, 21, 1).await.unwrap().is_none());

        let _ = fs::remove_file(&store.path);
    }
}
