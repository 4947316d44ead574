// src/config/constants.rs
//! Pipeline-wide constants, grouped by the stage that uses them

/// Clock reconciliation constants
pub mod sync {
    /// Nearest-neighbour match window, half a 50 Hz sample period
    pub const DEFAULT_TOLERANCE_MS: f64 = 10.0;
    pub const MILLISECONDS_PER_SECOND: f64 = 1_000.0;
}

/// Raw Shimmer export layout
pub mod shimmer {
    pub const COLUMN_PREFIX: &str = "Shimmer_";
    pub const CALIBRATED_SUFFIX: &str = "_CAL";
    pub const DELIMITER: u8 = b'\t';

    /// Lines before the header row
    pub const PREAMBLE_LINES: usize = 1;
    /// Lines between the header and the first sample
    pub const UNITS_LINES: usize = 1;

    pub const TIMESTAMP: &str = "TimestampSync_Unix";
    pub const EVENT_MARKER: &str = "Event_Marker";
    pub const BATTERY: &str = "Battery";
    pub const STATUS: &str = "ECG_EMG_Status1";

    /// Raw channel stem to canonical channel name
    pub const CHANNEL_RENAMES: &[(&str, &str)] = &[
        ("Accel_LN_X", "AccelX"),
        ("Accel_LN_Y", "AccelY"),
        ("Accel_LN_Z", "AccelZ"),
        ("EMG_CH1_24BIT", "EMG1"),
        ("EMG_CH2_24BIT", "EMG2"),
        ("Gyro_X", "GyroX"),
        ("Gyro_Y", "GyroY"),
        ("Gyro_Z", "GyroZ"),
        ("Mag_X", "MagX"),
        ("Mag_Y", "MagY"),
        ("Mag_Z", "MagZ"),
    ];
}

/// Filter design limits
pub mod filters {
    pub const MIN_FILTER_ORDER: usize = 1;
    pub const MAX_FILTER_ORDER: usize = 8;
}

/// EMG conditioning chain
pub mod emg {
    pub const CHANNELS: &[&str] = &["EMG1", "EMG2"];

    pub const HIGHPASS_CUTOFF_HZ: f64 = 20.0;
    pub const HIGHPASS_ORDER: usize = 2;

    /// Mains fundamental and first harmonic
    pub const NOTCH_FREQUENCIES_HZ: &[f64] = &[60.0, 120.0];
    pub const NOTCH_QUALITY: f64 = 35.0;

    pub const BANDPASS_LOW_HZ: f64 = 20.0;
    pub const BANDPASS_HIGH_HZ: f64 = 240.0;
    /// Upper band edge never exceeds this fraction of the sampling rate
    pub const BANDPASS_HIGH_FRACTION: f64 = 0.45;
    pub const BANDPASS_ORDER: usize = 4;

    pub const ENVELOPE_CUTOFF_HZ: f64 = 5.0;
    pub const ENVELOPE_ORDER: usize = 4;
    pub const ENVELOPE_SUFFIX: &str = "_ENV";
}

/// IMU conditioning chain
pub mod imu {
    pub const ACCEL_AXES: [&str; 3] = ["AccelX", "AccelY", "AccelZ"];
    pub const GYRO_AXES: [&str; 3] = ["GyroX", "GyroY", "GyroZ"];
    pub const MAG_AXES: [&str; 3] = ["MagX", "MagY", "MagZ"];

    pub const ACCEL_MAGNITUDE: &str = "AccelMag";
    pub const GYRO_MAGNITUDE: &str = "GyroMag";
    pub const MAG_MAGNITUDE: &str = "MagnetMag";

    pub const LOWPASS_ORDER: usize = 4;
    pub const ACCEL_LOWPASS_HZ: f64 = 20.0;
    pub const GYRO_LOWPASS_HZ: f64 = 20.0;
    pub const MAG_LOWPASS_HZ: f64 = 10.0;

    pub const DYNAMIC_HIGHPASS_HZ: f64 = 0.3;
    pub const DYNAMIC_HIGHPASS_ORDER: usize = 2;
    /// Rate the gravity-removal high-pass is designed for. Kept apart from the
    /// estimated accelerometer rate unless configured otherwise.
    pub const DYNAMIC_ASSUMED_RATE_HZ: f64 = 50.0;
    pub const DYNAMIC_SUFFIX: &str = "_DYN";

    /// Absolute change that counts as a genuine new reading
    pub const CHANGE_EPSILON: f64 = 1e-6;
}

/// Normalisation constants
pub mod normalize {
    pub const ZSCORE_EPSILON: f64 = 1e-8;
    pub const ZSCORE_SUFFIX: &str = "_Z";
}

/// Annotation labeling constants
pub mod labeling {
    pub const DEFAULT_FPS: f64 = 120.0;
    pub const START_SENTINEL: &str = "Start";
    pub const END_SENTINEL: &str = "End";
    pub const DEFAULT_ANNOTATION_FILE: &str = "labels.json";
}

/// Stage file names
pub mod paths {
    pub const MERGED: &str = "merged.csv";
    pub const SYNCED: &str = "synced.csv";
    pub const TRIMMED: &str = "trimmed_synced.csv";
    pub const LABELED: &str = "labeled.csv";
    pub const FINAL: &str = "finalized_data.csv";
    pub const RAW_EXTENSION: &str = "csv";
}

/// Environment variable overrides
pub mod env {
    pub const PREFIX: &str = "EMG_PREP_";
}
