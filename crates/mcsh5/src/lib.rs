//! Reader for MultiChannel Systems (MCS) electrophysiology recordings.
//!
//! MCS tools store recordings as HDF5 files with a fixed layout: the
//! analog streams of the first recording live under
//! `/Data/Recording_0/AnalogStream/Stream_<n>`, each with a compound
//! `InfoChannel` table describing its channels and a two-dimensional
//! `ChannelData` matrix of raw ADC counts, one row per channel.
//!
//! [`Container`] opens a file and its streams, [`AnalogStream::signal`]
//! returns the calibrated samples of one channel, and [`DatasetInspector`]
//! describes any compound dataset without knowing its schema.
//!
//! ```no_run
//! use mcsh5::Container;
//!
//! # fn main() -> mcsh5::Result<()> {
//! let container = Container::open("recording.h5")?;
//! if let Some(stream) = container.analog(0) {
//!     let signal = stream.signal("46")?;
//!     println!("{} samples at {} Hz", signal.len(), signal.sampling_frequency());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! All parsing is done in pure Rust by [`mcsh5_format`]; the file is
//! memory-mapped when the `mmap` feature is enabled.

pub mod analog;
pub mod calibration;
pub mod channel_table;
pub mod content;
pub mod error;
mod handle;
pub mod inspector;
pub mod options;
pub mod reader;
pub mod signal;
mod storage;
pub mod utils;

pub use mcsh5_format;

pub use analog::{AnalogStream, StreamInfo};
pub use calibration::Calibration;
pub use channel_table::{ChannelRecord, ChannelTable};
pub use content::{Container, SkippedStream};
pub use error::{Error, ErrorKind, Result};
pub use handle::HandleKind;
pub use inspector::{DatasetInspector, Field, FieldKind};
pub use options::{OpenOptions, StreamFailurePolicy};
pub use reader::{Dataset, File, Group, SpaceHandle, TypeHandle};
pub use signal::Signal;
