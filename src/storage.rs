// src/storage.rs
//! Stage tables on disk
//!
//! Comma-separated, `Time (s)` first, channels in timeline order and the
//! label column last. A missing sample is an empty field.

use crate::error::{PrepError, PrepResult};
use crate::timeline::{Column, Timeline, LABEL_COLUMN, TIME_COLUMN};
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

/// Write `timeline` to `path`, creating parent directories
pub fn write_timeline(timeline: &Timeline, path: &Path) -> PrepResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| PrepError::io(parent, e))?;
    }
    let file = std::fs::File::create(path).map_err(|e| PrepError::io(path, e))?;
    write_table(timeline, std::io::BufWriter::new(file))?;

    debug!(path = %path.display(), rows = timeline.len(), columns = timeline.columns().len(), "wrote stage table");
    Ok(())
}

/// Write `timeline` as CSV to any writer
pub fn write_table<W: Write>(timeline: &Timeline, writer: W) -> PrepResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let labels = timeline.labels();
    let mut header: Vec<&str> = Vec::with_capacity(timeline.columns().len() + 2);
    header.push(TIME_COLUMN);
    header.extend(timeline.column_names());
    if labels.is_some() {
        header.push(LABEL_COLUMN);
    }
    csv_writer.write_record(&header)?;

    let mut record: Vec<String> = Vec::with_capacity(header.len());
    for (row, t) in timeline.time().iter().enumerate() {
        record.clear();
        record.push(t.to_string());
        record.extend(
            timeline
                .columns()
                .iter()
                .map(|c| c.values[row].map(|v| v.to_string()).unwrap_or_default()),
        );
        if let Some(labels) = labels {
            record.push(labels[row].clone().unwrap_or_default());
        }
        csv_writer.write_record(&record)?;
    }

    csv_writer
        .flush()
        .map_err(|e| PrepError::invalid_data("stage table", e.to_string()))?;
    Ok(())
}

/// Load a stage table written by [`write_timeline`]
pub fn read_timeline(path: &Path) -> PrepResult<Timeline> {
    let file = std::fs::File::open(path).map_err(|e| PrepError::io(path, e))?;
    let timeline = read_table(file)?;
    debug!(path = %path.display(), rows = timeline.len(), "loaded stage table");
    Ok(timeline)
}

/// Parse a stage table from any reader
pub fn read_table<R: Read>(reader: R) -> PrepResult<Timeline> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let header = csv_reader.headers()?.clone();

    let time_index = header
        .iter()
        .position(|h| h == TIME_COLUMN)
        .ok_or_else(|| PrepError::MissingColumn(TIME_COLUMN.to_string()))?;
    let label_index = header.iter().position(|h| h == LABEL_COLUMN);

    let channels: Vec<(usize, &str)> = header
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != time_index && Some(*i) != label_index)
        .collect();

    let mut time = Vec::new();
    let mut values: Vec<Vec<Option<f64>>> = vec![Vec::new(); channels.len()];
    let mut labels: Vec<Option<String>> = Vec::new();

    for (line, record) in csv_reader.records().enumerate() {
        let record = record?;
        let t = record
            .get(time_index)
            .and_then(|cell| cell.trim().parse::<f64>().ok())
            .ok_or_else(|| PrepError::invalid_data("stage table", format!("row {} has no time value", line + 1)))?;
        time.push(t);

        for (slot, (index, _)) in values.iter_mut().zip(&channels) {
            slot.push(record.get(*index).and_then(|cell| cell.trim().parse::<f64>().ok()));
        }
        if let Some(index) = label_index {
            labels.push(record.get(index).filter(|l| !l.is_empty()).map(str::to_string));
        }
    }

    let columns = channels
        .iter()
        .zip(values)
        .map(|((_, name), values)| Column::new(*name, values))
        .collect();
    let mut timeline = Timeline::with_columns(time, columns)?;
    if label_index.is_some() {
        timeline.set_labels(labels)?;
    }
    Ok(timeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn labeled() -> Timeline {
        let mut timeline = Timeline::with_columns(
            vec![0.0, 0.01, 0.02],
            vec![
                Column::new("A5F2_EMG1", vec![Some(0.5), None, Some(-1.25)]),
                Column::new("A19E_AccelX", vec![Some(9.81), Some(9.8), Some(9.79)]),
            ],
        )
        .unwrap();
        timeline
            .set_labels(vec![None, Some("reach".into()), Some("reach".into())])
            .unwrap();
        timeline
    }

    #[test]
    fn test_layout() {
        let mut out = Vec::new();
        write_table(&labeled(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Time (s),A5F2_EMG1,A19E_AccelX,Primitive"));
        assert_eq!(lines.next(), Some("0,0.5,9.81,"));
        assert_eq!(lines.next(), Some("0.01,,9.8,reach"));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("labeled.csv");

        let original = labeled();
        write_timeline(&original, &path).unwrap();
        let loaded = read_timeline(&path).unwrap();

        assert_eq!(loaded, original);
    }

    #[test]
    fn test_unlabeled_table() {
        let timeline = Timeline::with_columns(vec![0.0, 1.0], vec![Column::new("x", vec![Some(1.0), None])]).unwrap();
        let mut out = Vec::new();
        write_table(&timeline, &mut out).unwrap();

        let loaded = read_table(out.as_slice()).unwrap();
        assert!(loaded.labels().is_none());
        assert_eq!(loaded.column("x").unwrap(), &[Some(1.0), None]);
    }

    #[test]
    fn test_missing_time_column() {
        let result = read_table("a,b\n1,2\n".as_bytes());
        assert!(matches!(result, Err(PrepError::MissingColumn(_))));
    }
}
