// src/processing/mod.rs
//! Signal feature engine and the filtering primitives behind it

pub mod emg;
pub mod filters;
pub mod imu;
pub mod normalize;
pub mod pipeline;
pub mod rate_estimator;

pub use emg::{EmgChain, EmgChannelOutput, EmgFilters};
pub use filters::{filtfilt, FilterError, FilterKind, FilterSpec, SosFilter};
pub use imu::{ImuRates, Modality};
pub use pipeline::*;
pub use rate_estimator::{estimate_rate, estimate_uniform_rate};
