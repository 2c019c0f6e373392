// src/session.rs
//
// Session identity tracking. A change in series, track, session number
// or sub-session invalidates all recorded timing data, so the driver
// must reset and re-initialize the registry when `observe` fires.

use crate::types::{DriverEntry, SessionIdentity};
use tracing::info;

pub struct SessionTracker {
    current: Option<SessionIdentity>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Returns true when the identity differs from the last one seen
    /// (including the very first observation).
    pub fn observe(&mut self, identity: SessionIdentity) -> bool {
        if self.current == Some(identity) {
            return false;
        }
        if let Some(previous) = self.current {
            info!(?previous, ?identity, "session transition");
        }
        self.current = Some(identity);
        true
    }
}

/// Unique, sorted class ids from the roster, excluding the pace car's
/// class so it never pollutes class enumeration.
pub fn class_list(drivers: &[DriverEntry], pace_car_idx: i32) -> Vec<i32> {
    let pace_car_class = drivers
        .iter()
        .find(|d| d.car_idx == pace_car_idx)
        .map(|d| d.class_id);

    let mut ids: Vec<i32> = drivers
        .iter()
        .map(|d| d.class_id)
        .filter(|&class_id| Some(class_id) != pace_car_class)
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
