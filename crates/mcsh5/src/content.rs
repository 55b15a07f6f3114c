//! An MCS recording file and the analog streams of its first recording.

use std::path::Path;

use log::{info, warn};
use mcsh5_format::FormatError;

use crate::analog::AnalogStream;
use crate::error::{Error, Result};
use crate::options::{OpenOptions, StreamFailurePolicy};
use crate::reader::{File, Group};
use crate::utils;

/// Group holding the first recording.
pub const RECORDING_GROUP: &str = "Data/Recording_0";
/// Name of the analog stream group inside a recording.
pub const ANALOG_GROUP: &str = "AnalogStream";

/// A stream that could not be opened and was left out.
#[derive(Debug)]
pub struct SkippedStream {
    /// Member name under the analog stream group.
    pub name: String,
    /// Why it was skipped.
    pub error: Error,
}

/// An open recording file with its analog streams.
///
/// Holds the file and the recording group open for its whole life, plus
/// whatever each [`AnalogStream`] holds. Dropping the container (or calling
/// [`Container::close`]) releases all of them.
#[derive(Debug)]
pub struct Container {
    file: File,
    recording: Group,
    analogs: Vec<AnalogStream>,
    skipped: Vec<SkippedStream>,
}

impl Container {
    /// Open the recording at `path` with default options.
    pub fn open(path: impl AsRef<Path>) -> Result<Container> {
        Self::open_with(path, &OpenOptions::default())
    }

    /// Open the recording at `path`.
    pub fn open_with(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Container> {
        let file = File::open(path, options)?;
        Self::from_file(file, options)
    }

    /// Open a recording held in memory.
    pub fn from_bytes(bytes: Vec<u8>, options: &OpenOptions) -> Result<Container> {
        let file = File::from_bytes(bytes, options)?;
        Self::from_file(file, options)
    }

    fn from_file(file: File, options: &OpenOptions) -> Result<Container> {
        let recording = file
            .group(RECORDING_GROUP)
            .map_err(|e| e.missing(|| format!("no {RECORDING_GROUP} group")))?;

        let mut analogs = Vec::new();
        let mut skipped = Vec::new();
        match recording.group(ANALOG_GROUP) {
            Ok(streams) => {
                for name in streams.member_names()? {
                    match streams.group(&name).and_then(AnalogStream::open) {
                        Ok(stream) => analogs.push(stream),
                        Err(error) => match options.stream_failure_policy {
                            StreamFailurePolicy::Abort => return Err(error),
                            StreamFailurePolicy::Skip => {
                                warn!("skipping stream {name}: {error}");
                                skipped.push(SkippedStream { name, error });
                            }
                        },
                    }
                }
            }
            Err(Error::Format(FormatError::PathNotFound(_))) => {
                info!("{} has no {ANALOG_GROUP} group", recording.path());
            }
            Err(e) => return Err(e),
        }

        info!(
            "recording {}: {} analog streams, {} skipped",
            recording.path(),
            analogs.len(),
            skipped.len()
        );
        Ok(Container {
            file,
            recording,
            analogs,
            skipped,
        })
    }

    /// Analog streams in the order the file enumerates them.
    ///
    /// That order is by member name, not acquisition time.
    pub fn analogs(&self) -> &[AnalogStream] {
        &self.analogs
    }

    /// The stream at `index`.
    pub fn analog(&self, index: usize) -> Option<&AnalogStream> {
        self.analogs.get(index)
    }

    /// The stream whose group is named `name`.
    pub fn analog_by_name(&self, name: &str) -> Option<&AnalogStream> {
        self.analogs.iter().find(|a| a.name() == name)
    }

    /// Number of opened streams.
    pub fn len(&self) -> usize {
        self.analogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analogs.is_empty()
    }

    /// Streams left out under [`StreamFailurePolicy::Skip`].
    pub fn skipped(&self) -> &[SkippedStream] {
        &self.skipped
    }

    /// Take the streams, releasing the file and recording handles.
    ///
    /// The streams keep the underlying file open until they are dropped.
    pub fn into_analogs(self) -> Vec<AnalogStream> {
        self.analogs
    }

    /// Release every handle held by the container and its streams.
    pub fn close(self) {
        drop(self);
    }

    /// Every object path in the file, depth first.
    pub fn tree(&self) -> Result<Vec<String>> {
        utils::group_tree(&self.file)
    }

    /// Number of handles of the file still open.
    pub fn open_handles(&self) -> usize {
        self.file.open_handles()
    }

    /// The underlying file.
    pub fn file(&self) -> &File {
        &self.file
    }

    /// The recording group.
    pub fn recording(&self) -> &Group {
        &self.recording
    }
}

impl<'a> IntoIterator for &'a Container {
    type Item = &'a AnalogStream;
    type IntoIter = std::slice::Iter<'a, AnalogStream>;

    fn into_iter(self) -> Self::IntoIter {
        self.analogs.iter()
    }
}
