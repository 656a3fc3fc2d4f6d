use std::{collections::BTreeMap, fs, io, path::Path};

use log::debug;
use serde::Serialize;

use crate::error::Result;

/// Receives the scalar time series of a training run.
pub trait MetricsSink {
    /// Records `value` for `tag` at `step`.
    fn scalar(&mut self, tag: &str, step: usize, value: f32);
}

impl<S: MetricsSink + ?Sized> MetricsSink for &mut S {
    fn scalar(&mut self, tag: &str, step: usize, value: f32) {
        (**self).scalar(tag, step, value)
    }
}

impl<A: MetricsSink, B: MetricsSink> MetricsSink for (A, B) {
    fn scalar(&mut self, tag: &str, step: usize, value: f32) {
        self.0.scalar(tag, step, value);
        self.1.scalar(tag, step, value);
    }
}

/// Writes every scalar to the log at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl MetricsSink for LogSink {
    fn scalar(&mut self, tag: &str, step: usize, value: f32) {
        debug!(tag = tag, step = step, value = value; "scalar");
    }
}

/// Keeps every scalar in memory, grouped by tag in step order.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct SeriesRecorder {
    series: BTreeMap<String, Vec<(usize, f32)>>,
}

impl SeriesRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded `(step, value)` pairs of `tag`.
    pub fn series(&self, tag: &str) -> &[(usize, f32)] {
        self.series.get(tag).map_or(&[], Vec::as_slice)
    }

    /// Returns every recorded tag, sorted.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| io::Error::other(e).into())
    }

    /// Writes the recorded series to `path` as JSON.
    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl MetricsSink for SeriesRecorder {
    fn scalar(&mut self, tag: &str, step: usize, value: f32) {
        self.series
            .entry(tag.to_string())
            .or_default()
            .push((step, value));
    }
}
