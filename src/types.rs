use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub prefer_persisted_reference: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    pub series_id: i32,
    pub track_id: i32,
    pub session_num: i32,
    pub sub_session_id: i32,
    pub tick_hz: f64,
    pub laps: u32,
    pub pace_car_idx: i32,
    pub cars: Vec<ReplayCarConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayCarConfig {
    pub car_idx: i32,
    pub class_id: i32,
    pub lap_time: f64,
    /// Lap number (0-based) on which this car visits pit road, if any.
    pub pit_lap: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Where the car currently sits relative to the racing surface.
/// Mirrors the sim's track-location channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackSurface {
    NotInWorld,
    OffTrack,
    InPitStall,
    ApproachingPits,
    OnTrack,
}

impl TrackSurface {
    pub fn is_on_track(self) -> bool {
        self == TrackSurface::OnTrack
    }
}

/// One telemetry tick for one car.
#[derive(Debug, Clone, Copy)]
pub struct CarSample {
    pub car_idx: i32,
    pub class_id: i32,
    /// Progress around the lap in [0, 1).
    pub track_pct: f64,
    /// Seconds since the session started.
    pub session_time: f64,
    pub surface: TrackSurface,
    pub on_pit_road: bool,
}

/// Identity of the running session. A change in any field invalidates
/// all recorded timing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionIdentity {
    pub series_id: i32,
    pub track_id: i32,
    pub session_num: i32,
    pub sub_session_id: i32,
}

/// Roster entry, used to derive the set of classes present in a session.
#[derive(Debug, Clone, Copy)]
pub struct DriverEntry {
    pub car_idx: i32,
    pub class_id: i32,
}
