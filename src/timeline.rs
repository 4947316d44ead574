// src/timeline.rs
//! Column-oriented trial table shared by every stage
//!
//! A [`Timeline`] owns one time axis, any number of numeric channels and an
//! optional label column. Missing samples are `None`, never NaN or zero.
//! Stages consume a timeline and hand back a new one.

use crate::error::{PrepError, PrepResult};

/// Name of the time axis in persisted tables
pub const TIME_COLUMN: &str = "Time (s)";

/// Name of the label column written by the labeler
pub const LABEL_COLUMN: &str = "Primitive";

/// Name of the single authoritative event marker channel
pub const EVENT_MARKER_COLUMN: &str = "Event_Marker";

/// A named numeric channel
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Number of present samples
    pub fn present_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Time-indexed table of channels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timeline {
    time: Vec<f64>,
    columns: Vec<Column>,
    labels: Option<Vec<Option<String>>>,
}

impl Timeline {
    /// Create an empty-channel timeline over the given time axis
    pub fn new(time: Vec<f64>) -> Self {
        Self {
            time,
            columns: Vec::new(),
            labels: None,
        }
    }

    /// Create a timeline from a time axis and channels of matching length
    pub fn with_columns(time: Vec<f64>, columns: Vec<Column>) -> PrepResult<Self> {
        let mut timeline = Self::new(time);
        for column in columns {
            timeline.insert_column(column.name, column.values)?;
        }
        Ok(timeline)
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Like [`Timeline::column`] but absence is an error
    pub fn require(&self, name: &str) -> PrepResult<&[Option<f64>]> {
        self.column(name)
            .ok_or_else(|| PrepError::MissingColumn(name.to_string()))
    }

    /// Insert a channel, replacing any existing channel of the same name in place
    pub fn insert_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) -> PrepResult<()> {
        let name = name.into();
        if values.len() != self.time.len() {
            return Err(PrepError::invalid_data(
                "timeline",
                format!(
                    "column '{}' has {} rows, time axis has {}",
                    name,
                    values.len(),
                    self.time.len()
                ),
            ));
        }

        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
        Ok(())
    }

    /// Remove the named channels that exist; absent names are ignored
    pub fn drop_if_present<S: AsRef<str>>(&mut self, names: &[S]) -> usize {
        let before = self.columns.len();
        self.columns
            .retain(|c| !names.iter().any(|n| n.as_ref() == c.name));
        before - self.columns.len()
    }

    /// Remove and return a single channel if present
    pub fn take_column(&mut self, name: &str) -> Option<Column> {
        let index = self.columns.iter().position(|c| c.name == name)?;
        Some(self.columns.remove(index))
    }

    /// Rename channels by `(from, to)` pairs; pairs whose source is absent are ignored
    pub fn rename_if_present<S: AsRef<str>, T: AsRef<str>>(&mut self, pairs: &[(S, T)]) -> usize {
        let mut renamed = 0;
        for column in &mut self.columns {
            if let Some((_, to)) = pairs.iter().find(|(from, _)| from.as_ref() == column.name) {
                column.name = to.as_ref().to_string();
                renamed += 1;
            }
        }
        renamed
    }

    pub fn labels(&self) -> Option<&[Option<String>]> {
        self.labels.as_deref()
    }

    pub fn set_labels(&mut self, labels: Vec<Option<String>>) -> PrepResult<()> {
        if labels.len() != self.time.len() {
            return Err(PrepError::invalid_data(
                "timeline",
                format!("label column has {} rows, time axis has {}", labels.len(), self.time.len()),
            ));
        }
        self.labels = Some(labels);
        Ok(())
    }

    /// Keep the rows whose time satisfies `keep`, preserving order
    pub fn retain_rows<F>(&self, mut keep: F) -> Timeline
    where
        F: FnMut(f64) -> bool,
    {
        let mask: Vec<bool> = self.time.iter().map(|&t| keep(t)).collect();
        self.select(&mask)
    }

    /// Keep only rows with `index < end`
    pub fn truncate_rows(&self, end: usize) -> Timeline {
        let mask: Vec<bool> = (0..self.len()).map(|i| i < end).collect();
        self.select(&mask)
    }

    fn select(&self, mask: &[bool]) -> Timeline {
        fn pick<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
            values
                .iter()
                .zip(mask)
                .filter(|(_, &keep)| keep)
                .map(|(v, _)| v.clone())
                .collect()
        }

        Timeline {
            time: pick(&self.time, mask),
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(c.name.clone(), pick(&c.values, mask)))
                .collect(),
            labels: self.labels.as_ref().map(|l| pick(l, mask)),
        }
    }

    /// Shift the time axis so that `origin` becomes zero
    pub fn rezero(&mut self, origin: f64) {
        for t in &mut self.time {
            *t -= origin;
        }
    }

    /// Apply an affine map to the time axis
    pub fn map_time<F: Fn(f64) -> f64>(&mut self, f: F) {
        for t in &mut self.time {
            *t = f(*t);
        }
    }
}
