// src/timing/mod.rs
//
// Reference-lap timing engine.
//
// Data flow:
//   telemetry tick → registry (per-car lap recorder) ─┐
//                      on promotion: spline tangents ─┼→ best/persisted laps
//   save queue  ←  best-of-class promotions ──────────┘
//   gap calculator ← registry reference laps, every tick
//
// The registry owns all lap state and is the only writer; the spline
// module mutates tangents through it exactly once per promoted lap.

pub mod gap;
pub mod lap;
pub mod registry;
pub mod spline;

// Re-exports for ergonomic access from main.rs
pub use gap::{class_normalized_gap, gap_between, linear_time_at, CarPace};
pub use lap::{normalize_key, ReferenceLap, ReferencePoint, MIN_POINTS_FOR_VALID_LAP};
pub use registry::ReferenceRegistry;
pub use spline::{interpolate_at, precompute_tangents};
