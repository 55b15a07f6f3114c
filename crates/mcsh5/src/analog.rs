//! One analog stream: its channel table and its raw sample matrix.

use std::fmt;

use log::debug;
use mcsh5_format::selection::Hyperslab;

use crate::channel_table::{ChannelRecord, ChannelTable};
use crate::error::{Error, Result};
use crate::reader::{Dataset, Group};
use crate::signal::Signal;

/// Name of the channel descriptor dataset inside a stream group.
pub const INFO_CHANNEL: &str = "InfoChannel";
/// Name of the raw sample matrix inside a stream group.
pub const CHANNEL_DATA: &str = "ChannelData";

/// An analog stream (`Stream_<n>`).
///
/// Holds the stream's group and raw-data handles for its whole life and the
/// channel table read at construction. Signals are decoded on every request.
#[derive(Debug)]
pub struct AnalogStream {
    name: String,
    group: Group,
    data: Dataset,
    table: ChannelTable,
    info_rank: usize,
}

/// Summary of a stream's datasets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    /// Path of the stream group.
    pub path: String,
    /// Rank of the descriptor dataset.
    pub descriptor_rank: usize,
    /// Number of descriptor rows.
    pub channel_count: usize,
    /// Dimensions of the raw sample matrix.
    pub raw_dimensions: Vec<u64>,
}

impl fmt::Display for StreamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Path: {}", self.path)?;
        writeln!(f, "Channel info rank: {}", self.descriptor_rank)?;
        writeln!(f, "Channel count: {}", self.channel_count)?;
        let dims: Vec<String> = self.raw_dimensions.iter().map(u64::to_string).collect();
        write!(f, "Channel data: [ {} ]", dims.join(" "))
    }
}

impl AnalogStream {
    /// Build a stream from its group, display name, descriptor and raw datasets.
    ///
    /// The descriptor handle is released once the table has been read.
    pub fn new(group: Group, name: impl Into<String>, info: Dataset, data: Dataset) -> Result<Self> {
        let name = name.into();
        let table = ChannelTable::read(&info)?;
        let info_rank = info.shape().len();
        drop(info);
        debug!(
            "stream {name}: {} channels, raw matrix {:?}",
            table.len(),
            data.shape()
        );
        Ok(AnalogStream {
            name,
            group,
            data,
            table,
            info_rank,
        })
    }

    /// Open the stream stored in `group`, named after the group's last path segment.
    pub fn open(group: Group) -> Result<Self> {
        let name = group
            .path()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let info = group
            .dataset(INFO_CHANNEL)
            .map_err(|e| e.missing(|| format!("{} has no {INFO_CHANNEL}", group.path())))?;
        let data = group
            .dataset(CHANNEL_DATA)
            .map_err(|e| e.missing(|| format!("{} has no {CHANNEL_DATA}", group.path())))?;
        Self::new(group, name, info, data)
    }

    /// Display name, e.g. `Stream_0`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the stream group.
    pub fn path(&self) -> &str {
        self.group.path()
    }

    /// Number of channels in the descriptor table.
    pub fn channel_count(&self) -> usize {
        self.table.len()
    }

    /// The descriptor table.
    pub fn channels(&self) -> &ChannelTable {
        &self.table
    }

    /// Samples per channel, when the raw matrix is two-dimensional.
    pub fn sample_count(&self) -> Option<u64> {
        match self.data.shape() {
            [_, samples] => Some(*samples),
            _ => None,
        }
    }

    /// Decode the calibrated signal of the channel labelled `label`.
    ///
    /// Every call reads the row again; nothing is cached.
    pub fn signal(&self, label: &str) -> Result<Signal<f32>> {
        let (record, raw) = self.read_row(label)?;
        let calibration = record.calibration();
        if calibration.tick <= 0 {
            return Err(Error::Schema(format!(
                "{}: channel {label:?} has tick {}",
                self.name, calibration.tick
            )));
        }
        Ok(Signal::new(
            calibration.apply_all(&raw),
            calibration.sampling_frequency(),
        ))
    }

    /// The uncalibrated samples of the channel labelled `label`.
    pub fn raw_row(&self, label: &str) -> Result<Vec<i64>> {
        self.read_row(label).map(|(_, raw)| raw)
    }

    fn read_row(&self, label: &str) -> Result<(&ChannelRecord, Vec<i64>)> {
        let record = self.table.get(label).ok_or_else(|| Error::UnknownLabel {
            label: label.to_string(),
            stream: self.name.clone(),
        })?;
        let shape = self.data.shape();
        let [rows, samples] = *shape else {
            return Err(self.shape_error(format!(
                "{} has rank {}, expected 2",
                self.data.path(),
                shape.len()
            )));
        };
        if rows != self.table.len() as u64 {
            return Err(self.shape_error(format!(
                "{} has {rows} rows for {} channels",
                self.data.path(),
                self.table.len()
            )));
        }
        let row = u64::try_from(record.row_index)
            .ok()
            .filter(|&r| r < rows)
            .ok_or_else(|| {
                self.shape_error(format!(
                    "row index {} of channel {label:?} is outside 0..{rows}",
                    record.row_index
                ))
            })?;

        let bytes = self.data.read_hyperslab(&Hyperslab::row(row, samples))?;
        let raw = self.data.decode_ints(&bytes)?;
        Ok((record, raw))
    }

    fn shape_error(&self, reason: String) -> Error {
        Error::Shape {
            stream: self.name.clone(),
            reason,
        }
    }

    /// Summary of the stream's datasets.
    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            path: self.group.path().to_string(),
            descriptor_rank: self.info_rank,
            channel_count: self.table.len(),
            raw_dimensions: self.data.shape().to_vec(),
        }
    }
}
