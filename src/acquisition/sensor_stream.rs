// src/acquisition/sensor_stream.rs
//! Per-sensor recordings and the raw Shimmer export reader

use crate::config::constants::shimmer;
use crate::error::{PrepError, PrepResult};
use crate::timeline::Column;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Full raw column name, e.g. `Shimmer_A5F2_Gyro_X_CAL`
pub fn raw_column(sensor_id: &str, stem: &str) -> String {
    format!(
        "{}{}_{}{}",
        shimmer::COLUMN_PREFIX,
        sensor_id,
        stem,
        shimmer::CALIBRATED_SUFFIX
    )
}

/// Canonical column name, e.g. `A5F2_GyroX`
pub fn sensor_column(sensor_id: &str, channel: &str) -> String {
    format!("{}_{}", sensor_id, channel)
}

/// One sensor's recording on its own clock (Unix milliseconds)
#[derive(Debug, Clone, PartialEq)]
pub struct SensorStream {
    pub sensor_id: String,
    pub timestamps: Vec<f64>,
    pub channels: Vec<Column>,
    marker_channel: String,
}

impl SensorStream {
    pub fn new(sensor_id: impl Into<String>, timestamps: Vec<f64>, channels: Vec<Column>) -> PrepResult<Self> {
        let sensor_id = sensor_id.into();

        if let Some(bad) = channels.iter().find(|c| c.values.len() != timestamps.len()) {
            return Err(PrepError::invalid_data(
                "sensor stream",
                format!(
                    "channel '{}' of sensor {} has {} rows, expected {}",
                    bad.name,
                    sensor_id,
                    bad.values.len(),
                    timestamps.len()
                ),
            ));
        }
        if timestamps.iter().any(|t| !t.is_finite()) {
            return Err(PrepError::invalid_data(
                "sensor stream",
                format!("sensor {} has non-finite timestamps", sensor_id),
            ));
        }

        let marker_channel = raw_column(&sensor_id, shimmer::EVENT_MARKER);
        Ok(Self {
            sensor_id,
            timestamps,
            channels,
            marker_channel,
        })
    }

    /// Use a non-Shimmer name for this sensor's event marker channel
    pub fn with_marker_channel(mut self, name: impl Into<String>) -> Self {
        self.marker_channel = name.into();
        self
    }

    pub fn marker_channel(&self) -> &str {
        &self.marker_channel
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn channel(&self, name: &str) -> Option<&Column> {
        self.channels.iter().find(|c| c.name == name)
    }

    /// First and last timestamp in recording order
    pub fn window(&self) -> Option<(f64, f64)> {
        Some((*self.timestamps.first()?, *self.timestamps.last()?))
    }

    /// Stable sort of every row by timestamp
    pub fn sorted(mut self) -> Self {
        if self.timestamps.windows(2).all(|w| w[0] <= w[1]) {
            return self;
        }

        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| self.timestamps[a].total_cmp(&self.timestamps[b]));

        self.timestamps = order.iter().map(|&i| self.timestamps[i]).collect();
        for channel in &mut self.channels {
            channel.values = order.iter().map(|&i| channel.values[i]).collect();
        }
        self
    }

    /// Keep only rows at or before `end`
    pub fn clipped_to(mut self, end: f64) -> Self {
        let keep: Vec<bool> = self.timestamps.iter().map(|&t| t <= end).collect();
        let retain = |values: &mut Vec<Option<f64>>| {
            let mut flags = keep.iter();
            values.retain(|_| *flags.next().unwrap_or(&false));
        };

        let mut flags = keep.iter();
        self.timestamps.retain(|_| *flags.next().unwrap_or(&false));
        for channel in &mut self.channels {
            retain(&mut channel.values);
        }
        self
    }
}

/// Read a raw tab-separated Shimmer export from disk
pub fn read_shimmer_export(path: &Path, sensor_id: &str) -> PrepResult<SensorStream> {
    let file = std::fs::File::open(path).map_err(|e| PrepError::io(path, e))?;
    let stream = parse_shimmer_export(file, sensor_id)?;
    debug!(
        sensor = sensor_id,
        path = %path.display(),
        rows = stream.len(),
        channels = stream.channels.len(),
        "loaded raw sensor export"
    );
    Ok(stream)
}

/// Parse a raw Shimmer export.
///
/// Layout: one preamble line, the header, one units line, then samples.
/// Unnamed columns are ignored, unparsable cells become `None` and rows whose
/// timestamp cannot be parsed are dropped.
pub fn parse_shimmer_export<R: Read>(reader: R, sensor_id: &str) -> PrepResult<SensorStream> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(shimmer::DELIMITER)
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = csv_reader.records();
    for _ in 0..shimmer::PREAMBLE_LINES {
        records.next().transpose()?;
    }

    let header = records
        .next()
        .transpose()?
        .ok_or_else(|| PrepError::invalid_data("shimmer export", "missing header row"))?;

    for _ in 0..shimmer::UNITS_LINES {
        records.next().transpose()?;
    }

    let timestamp_name = raw_column(sensor_id, shimmer::TIMESTAMP);
    let timestamp_index = header
        .iter()
        .position(|h| h.trim() == timestamp_name)
        .ok_or_else(|| PrepError::MissingColumn(timestamp_name.clone()))?;

    let channel_indices: Vec<(usize, String)> = header
        .iter()
        .enumerate()
        .filter(|(i, h)| *i != timestamp_index && !h.trim().is_empty())
        .map(|(i, h)| (i, h.trim().to_string()))
        .collect();

    let mut timestamps = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); channel_indices.len()];
    let mut dropped = 0usize;

    for record in records {
        let record = record?;
        let Some(timestamp) = record.get(timestamp_index).and_then(parse_cell) else {
            dropped += 1;
            continue;
        };

        timestamps.push(timestamp);
        for (slot, (index, _)) in values.iter_mut().zip(&channel_indices) {
            slot.push(record.get(*index).and_then(parse_cell));
        }
    }

    if dropped > 0 {
        warn!(sensor = sensor_id, dropped, "dropped rows with unparsable timestamps");
    }

    let channels = channel_indices
        .into_iter()
        .zip(values)
        .map(|((_, name), values)| Column::new(name, values))
        .collect();

    SensorStream::new(sensor_id, timestamps, channels)
}

fn parse_cell(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\"sep=\t\"\n\
Shimmer_A5F2_TimestampSync_Unix_CAL\tShimmer_A5F2_Accel_LN_X_CAL\tShimmer_A5F2_Event_Marker_CAL\t\n\
ms\tm/(s^2)\tno_units\t\n\
1000.0\t9.81\t0\t\n\
1002.0\tbad\t0\t\n\
\t1.0\t0\t\n\
1001.0\t9.79\t5\t\n";

    #[test]
    fn test_parse_export() {
        let stream = parse_shimmer_export(EXPORT.as_bytes(), "A5F2").unwrap();

        assert_eq!(stream.timestamps, vec![1000.0, 1002.0, 1001.0]);
        assert_eq!(stream.channels.len(), 2);

        let accel = stream.channel("Shimmer_A5F2_Accel_LN_X_CAL").unwrap();
        assert_eq!(accel.values, vec![Some(9.81), None, Some(9.79)]);
        assert_eq!(stream.marker_channel(), "Shimmer_A5F2_Event_Marker_CAL");
    }

    #[test]
    fn test_missing_timestamp_column() {
        let result = parse_shimmer_export(EXPORT.as_bytes(), "A19E");
        assert!(matches!(result, Err(PrepError::MissingColumn(_))));
    }

    #[test]
    fn test_sorted_and_clipped() {
        let stream = parse_shimmer_export(EXPORT.as_bytes(), "A5F2").unwrap().sorted();
        assert_eq!(stream.timestamps, vec![1000.0, 1001.0, 1002.0]);
        assert_eq!(
            stream.channel("Shimmer_A5F2_Event_Marker_CAL").unwrap().values,
            vec![Some(0.0), Some(5.0), Some(0.0)]
        );

        let clipped = stream.clipped_to(1001.0);
        assert_eq!(clipped.len(), 2);
        assert_eq!(clipped.channels[0].values.len(), 2);
        assert_eq!(clipped.window(), Some((1000.0, 1001.0)));
    }

    #[test]
    fn test_column_names() {
        assert_eq!(raw_column("A19E", "Gyro_X"), "Shimmer_A19E_Gyro_X_CAL");
        assert_eq!(sensor_column("A19E", "GyroX"), "A19E_GyroX");
    }
}
