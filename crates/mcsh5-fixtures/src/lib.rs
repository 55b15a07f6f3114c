//! Synthetic HDF5 files for tests and benchmarks.
//!
//! [`writer`] serializes an arbitrary tree of groups and datasets;
//! [`recording`] lays out MultiChannel Systems recordings on top of it.

pub mod recording;
pub mod writer;

pub use recording::{three_channel_recording, ChannelSpec, RecordingSpec, StreamSpec, TextEncoding};
pub use writer::{Data, DatasetSpec, GroupSpec, H5Builder, Layout, Node, TypeSpec, Value};
