//! Job portal backend core.
//!
//! [`portal`] holds the application lifecycle, capacity accounting, rating
//! aggregation, and the two store backends. [`config`], [`telemetry`], and
//! [`error`] carry the process-level concerns shared with the API service.

pub mod config;
pub mod error;
pub mod portal;
pub mod telemetry;
