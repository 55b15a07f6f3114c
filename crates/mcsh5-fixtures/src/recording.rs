//! Recordings in the MultiChannel Systems layout.

use std::io;
use std::path::Path;

use crate::writer::{DatasetSpec, GroupSpec, H5Builder, Layout, TypeSpec, Value};

/// One channel of a stream: its descriptor row and its raw samples.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSpec {
    pub channel_id: i32,
    pub row_index: i32,
    pub group_id: i32,
    pub label: String,
    pub unit: String,
    pub exponent: i32,
    pub ad_zero: i32,
    pub tick: i64,
    pub conversion_factor: i64,
    pub adc_bits: i32,
    pub samples: Vec<i32>,
}

impl ChannelSpec {
    /// Identity calibration at 10 kHz.
    pub fn new(label: impl Into<String>, row_index: i32, samples: Vec<i32>) -> ChannelSpec {
        ChannelSpec {
            channel_id: row_index,
            row_index,
            group_id: 0,
            label: label.into(),
            unit: "V".to_string(),
            exponent: 0,
            ad_zero: 0,
            tick: 100,
            conversion_factor: 1,
            adc_bits: 24,
            samples,
        }
    }

    pub fn calibration(mut self, ad_zero: i32, conversion_factor: i64, exponent: i32) -> Self {
        self.ad_zero = ad_zero;
        self.conversion_factor = conversion_factor;
        self.exponent = exponent;
        self
    }

    pub fn tick(mut self, tick: i64) -> Self {
        self.tick = tick;
        self
    }
}

/// How the descriptor table stores its text fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// Variable-length strings in the global heap, as MCS tools write them.
    #[default]
    Variable,
    /// Null-padded strings of a fixed width.
    Fixed(u32),
}

/// One `Stream_<n>` group.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSpec {
    pub name: String,
    pub channels: Vec<ChannelSpec>,
    /// Storage of `ChannelData`.
    pub layout: Layout,
    pub text: TextEncoding,
    /// Leave out `InfoChannel`.
    pub omit_info: bool,
    /// Leave out `ChannelData`.
    pub omit_data: bool,
    /// Write `ChannelData` as one flat row instead of a matrix.
    pub flat_data: bool,
    /// Rows of `ChannelData`; one per channel when `None`.
    pub rows: Option<usize>,
    /// Extent claimed by the `InfoChannel` dataspace.
    pub info_extent: Option<Vec<u64>>,
    /// Extent claimed by the `ChannelData` dataspace.
    pub data_extent: Option<Vec<u64>>,
}

impl StreamSpec {
    pub fn new(name: impl Into<String>, channels: Vec<ChannelSpec>) -> StreamSpec {
        StreamSpec {
            name: name.into(),
            channels,
            layout: Layout::Contiguous,
            text: TextEncoding::Variable,
            omit_info: false,
            omit_data: false,
            flat_data: false,
            rows: None,
            info_extent: None,
            data_extent: None,
        }
    }

    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn text(mut self, text: TextEncoding) -> Self {
        self.text = text;
        self
    }

    /// The 18-field `InfoChannel` compound, 164 bytes with variable-length text.
    pub fn info_type(&self) -> TypeSpec {
        let text = match self.text {
            TextEncoding::Variable => TypeSpec::VlenString,
            TextEncoding::Fixed(n) => TypeSpec::fixed_string(n),
        };
        TypeSpec::compound([
            ("ChannelID", TypeSpec::i32()),
            ("RowIndex", TypeSpec::i32()),
            ("GroupID", TypeSpec::i32()),
            ("ElectrodeGroup", TypeSpec::i32()),
            ("Label", text.clone()),
            ("RawDataType", text.clone()),
            ("Unit", text.clone()),
            ("Exponent", TypeSpec::i32()),
            ("ADZero", TypeSpec::i32()),
            ("Tick", TypeSpec::i64()),
            ("ConversionFactor", TypeSpec::i64()),
            ("ADCBits", TypeSpec::i32()),
            ("HighPassFilterType", text.clone()),
            ("HighPassFilterCutOffFrequency", text.clone()),
            ("HighPassFilterOrder", TypeSpec::i32()),
            ("LowPassFilterType", text.clone()),
            ("LowPassFilterCutOffFrequency", text),
            ("LowPassFilterOrder", TypeSpec::i32()),
        ])
    }

    fn info(&self) -> DatasetSpec {
        let rows = self
            .channels
            .iter()
            .map(|c| {
                Value::Record(vec![
                    c.channel_id.into(),
                    c.row_index.into(),
                    c.group_id.into(),
                    Value::Int(0),
                    c.label.as_str().into(),
                    "Int".into(),
                    c.unit.as_str().into(),
                    c.exponent.into(),
                    c.ad_zero.into(),
                    c.tick.into(),
                    c.conversion_factor.into(),
                    c.adc_bits.into(),
                    "".into(),
                    "".into(),
                    Value::Int(0),
                    "".into(),
                    "".into(),
                    Value::Int(0),
                ])
            })
            .collect();
        let info = DatasetSpec::new(
            "InfoChannel",
            self.info_type(),
            vec![self.channels.len() as u64],
            rows,
        );
        match &self.info_extent {
            Some(extent) => info.with_declared_shape(extent.clone()),
            None => info,
        }
    }

    /// Raw matrix with one row per channel, placed by row index. Rows no
    /// channel points at, and short channels, are zero filled; channels
    /// whose row lies past `rows` are left out.
    fn data(&self) -> DatasetSpec {
        let rows = self.rows.unwrap_or(self.channels.len());
        let columns = self.channels.iter().map(|c| c.samples.len()).max().unwrap_or(0);
        let mut matrix = vec![0i32; rows * columns];
        for channel in &self.channels {
            let Ok(row) = usize::try_from(channel.row_index) else {
                continue;
            };
            if row < rows {
                let start = row * columns;
                matrix[start..start + channel.samples.len()].copy_from_slice(&channel.samples);
            }
        }
        let shape = if self.flat_data {
            vec![matrix.len() as u64]
        } else {
            vec![rows as u64, columns as u64]
        };
        let layout = match (&self.layout, self.flat_data) {
            (Layout::Chunked { chunk, .. }, true) if chunk.len() != 1 => Layout::Contiguous,
            (layout, _) => layout.clone(),
        };
        let data = DatasetSpec::i32s("ChannelData", shape, &matrix).with_layout(layout);
        match &self.data_extent {
            Some(extent) => data.with_declared_shape(extent.clone()),
            None => data,
        }
    }

    fn group(&self) -> GroupSpec {
        let mut group = GroupSpec::new(&self.name);
        if !self.omit_info {
            group = group.dataset(self.info());
        }
        if !self.omit_data {
            group = group.dataset(self.data());
        }
        group
    }
}

/// A whole recording file.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSpec {
    pub streams: Vec<StreamSpec>,
    /// Write `/Data/Recording_0`.
    pub recording_group: bool,
    /// Write `/Data/Recording_0/AnalogStream`.
    pub analog_group: bool,
}

impl Default for RecordingSpec {
    fn default() -> Self {
        RecordingSpec {
            streams: Vec::new(),
            recording_group: true,
            analog_group: true,
        }
    }
}

impl RecordingSpec {
    pub fn new(streams: Vec<StreamSpec>) -> RecordingSpec {
        RecordingSpec {
            streams,
            ..RecordingSpec::default()
        }
    }

    /// The file tree.
    pub fn tree(&self) -> GroupSpec {
        let mut data = GroupSpec::new("Data");
        if self.recording_group {
            let mut recording = GroupSpec::new("Recording_0");
            if self.analog_group {
                let analog = self
                    .streams
                    .iter()
                    .fold(GroupSpec::new("AnalogStream"), |g, s| g.group(s.group()));
                recording = recording.group(analog);
            }
            data = data.group(recording);
        }
        GroupSpec::default().group(data)
    }

    /// Serialize the recording.
    pub fn build(&self) -> io::Result<Vec<u8>> {
        H5Builder::new(self.tree()).finish()
    }

    /// Serialize the recording and write it to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> io::Result<()> {
        H5Builder::new(self.tree()).write_to(path)
    }
}

/// One stream with channels labelled "1", "2" and "46", all calibrated with
/// ADZero 2048, ConversionFactor 10, Exponent -1 and a 500 µs tick.
///
/// Channel "46" sits in row 2 and starts with the raw value 2148.
pub fn three_channel_recording() -> RecordingSpec {
    let channel = |label: &str, row: i32, base: i32| {
        let samples = (0..8).map(|i| base + 100 + i).collect();
        ChannelSpec::new(label, row, samples)
            .calibration(2048, 10, -1)
            .tick(500)
    };
    RecordingSpec::new(vec![StreamSpec::new(
        "Stream_0",
        vec![channel("1", 0, 0), channel("2", 1, 1000), channel("46", 2, 2048)],
    )])
}
