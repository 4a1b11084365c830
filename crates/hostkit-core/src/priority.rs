//! Well-known task priorities.
//!
//! Priorities are plain `i32` values: larger runs first. Callers may use
//! any value; these constants only give common reference points.

/// Runs after everything else.
pub const LOWEST: i32 = i32::MIN;
/// Background work.
pub const LOW: i32 = 10;
/// Below normal.
pub const MEDIUM_LOW: i32 = 25;
/// Normal work.
pub const MEDIUM: i32 = 50;
/// Above normal.
pub const MEDIUM_HIGH: i32 = 75;
/// Latency sensitive work.
pub const HIGH: i32 = 100;
/// Runs before everything else.
pub const HIGHEST: i32 = i32::MAX;
