// src/acquisition/mod.rs
//! Sensor loading, clock reconciliation and event cropping

pub mod event_sync;
pub mod sample_sync;
pub mod sensor_stream;

pub use event_sync::*;
pub use sample_sync::*;
pub use sensor_stream::*;
