//! # mcsh5
//!
//! Browse MultiChannel Systems HDF5 recordings from the command line.
//!
//! ## Usage
//!
//! ```bash
//! # List every group and dataset
//! mcsh5 tree recording.h5
//!
//! # Analog streams and their channel tables
//! mcsh5 streams recording.h5
//! mcsh5 channels recording.h5 --stream 0
//!
//! # First ten calibrated samples of channel "46"
//! mcsh5 signal recording.h5 46 --head 10
//!
//! # Field layout of a compound dataset
//! mcsh5 inspect recording.h5 /Data/Recording_0/AnalogStream/Stream_0/InfoChannel
//! ```

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info};

use mcsh5::{Container, DatasetInspector, File, OpenOptions, StreamFailurePolicy};

/// mcsh5 - MultiChannel Systems HDF5 recording browser
#[derive(Parser)]
#[command(name = "mcsh5")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Fail when any analog stream cannot be opened instead of skipping it
    #[arg(long, global = true)]
    strict: bool,

    /// Read the whole file into memory instead of mapping it
    #[arg(long, global = true)]
    no_mmap: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the path of every group and dataset
    Tree {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List the analog streams of the recording
    Streams {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Print the channel table of one stream
    Channels {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Stream position, in name order
        #[arg(short, long, default_value = "0")]
        stream: usize,
    },

    /// Print the calibrated samples of one channel
    Signal {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Channel label
        #[arg(value_name = "LABEL")]
        label: String,

        /// Stream position, in name order
        #[arg(short, long, default_value = "0")]
        stream: usize,

        /// Print only the first N samples
        #[arg(long, value_name = "N")]
        head: Option<usize>,
    },

    /// Describe the fields of a compound dataset
    Inspect {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Absolute path of the dataset
        #[arg(value_name = "DATASET")]
        dataset: String,
    },
}

impl Cli {
    fn options(&self) -> OpenOptions {
        let policy = if self.strict {
            StreamFailurePolicy::Abort
        } else {
            StreamFailurePolicy::Skip
        };
        OpenOptions::new()
            .stream_failure_policy(policy)
            .memory_map(!self.no_mmap)
    }
}

fn init_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let options = cli.options();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    dispatch(cli.command, &options, &mut out)
}

fn dispatch(command: Commands, options: &OpenOptions, out: &mut impl Write) -> Result<()> {
    match command {
        Commands::Tree { file } => run_tree(&file, options, out),
        Commands::Streams { file } => run_streams(&file, options, out),
        Commands::Channels { file, stream } => run_channels(&file, stream, options, out),
        Commands::Signal {
            file,
            label,
            stream,
            head,
        } => run_signal(&file, &label, stream, head, options, out),
        Commands::Inspect { file, dataset } => run_inspect(&file, &dataset, options, out),
    }
}

fn open(path: &Path, options: &OpenOptions) -> Result<Container> {
    info!("Opening {}", path.display());
    let container = Container::open_with(path, options)
        .with_context(|| format!("Failed to open recording {}", path.display()))?;
    debug!(
        "{} analog streams, {} skipped, {} open handles",
        container.len(),
        container.skipped().len(),
        container.open_handles()
    );
    Ok(container)
}

fn run_tree(path: &Path, options: &OpenOptions, out: &mut impl Write) -> Result<()> {
    let file = File::open(path, options)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    for object in mcsh5::utils::group_tree(&file)? {
        writeln!(out, "{object}")?;
    }
    Ok(())
}

fn run_streams(path: &Path, options: &OpenOptions, out: &mut impl Write) -> Result<()> {
    let container = open(path, options)?;
    for (index, stream) in container.analogs().iter().enumerate() {
        let samples = stream
            .sample_count()
            .map_or_else(|| "?".to_string(), |n| n.to_string());
        writeln!(
            out,
            "{index}\t{}\t{} channels\t{samples} samples",
            stream.name(),
            stream.channel_count()
        )?;
    }
    for skipped in container.skipped() {
        writeln!(out, "-\t{}\tskipped: {}", skipped.name, skipped.error)?;
    }
    Ok(())
}

fn run_channels(path: &Path, stream: usize, options: &OpenOptions, out: &mut impl Write) -> Result<()> {
    let container = open(path, options)?;
    let analog = container
        .analog(stream)
        .ok_or_else(|| anyhow!("No analog stream at position {stream}"))?;
    writeln!(out, "{}", analog.info())?;
    writeln!(out, "Row\tLabel\tUnit\tADZero\tConversionFactor\tExponent\tTick")?;
    for record in analog.channels() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            record.row_index,
            record.label,
            record.unit,
            record.ad_zero,
            record.conversion_factor,
            record.exponent,
            record.tick
        )?;
    }
    Ok(())
}

fn run_signal(
    path: &Path,
    label: &str,
    stream: usize,
    head: Option<usize>,
    options: &OpenOptions,
    out: &mut impl Write,
) -> Result<()> {
    let container = open(path, options)?;
    let analog = container
        .analog(stream)
        .ok_or_else(|| anyhow!("No analog stream at position {stream}"))?;
    let signal = analog
        .signal(label)
        .with_context(|| format!("Failed to read channel {label:?} of {}", analog.name()))?;
    writeln!(
        out,
        "# {} samples at {} Hz",
        signal.len(),
        signal.sampling_frequency()
    )?;
    let shown = head.unwrap_or(signal.len()).min(signal.len());
    for sample in &signal.samples()[..shown] {
        writeln!(out, "{sample}")?;
    }
    Ok(())
}

fn run_inspect(path: &Path, dataset: &str, options: &OpenOptions, out: &mut impl Write) -> Result<()> {
    let file = File::open(path, options)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let dataset = file.dataset(dataset)?;
    let inspector = DatasetInspector::build(&dataset)?;
    write!(out, "{}", inspector.structure()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcsh5_fixtures::three_channel_recording;

    fn run(command: Commands) -> Result<String> {
        let mut out = Vec::new();
        dispatch(command, &OpenOptions::default(), &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    fn recording() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.h5");
        three_channel_recording().write_to(&path).unwrap();
        (dir, path)
    }

    #[test]
    fn parses_global_flags() {
        let cli = Cli::try_parse_from(["mcsh5", "signal", "f.h5", "46", "--head", "3", "--strict"]).unwrap();
        assert_eq!(cli.options().stream_failure_policy, StreamFailurePolicy::Abort);
        assert!(cli.options().memory_map);
        assert!(matches!(cli.command, Commands::Signal { head: Some(3), .. }));
    }

    #[test]
    fn signal_head() {
        let (_dir, file) = recording();
        let out = run(Commands::Signal {
            file,
            label: "46".to_string(),
            stream: 0,
            head: Some(2),
        })
        .unwrap();
        assert_eq!(out, "# 8 samples at 2000 Hz\n100\n101\n");
    }

    #[test]
    fn unknown_label_fails() {
        let (_dir, file) = recording();
        let err = run(Commands::Signal {
            file,
            label: "99".to_string(),
            stream: 0,
            head: None,
        })
        .unwrap_err();
        assert!(format!("{err:#}").contains("99"));
    }

    #[test]
    fn streams_and_tree() {
        let (_dir, file) = recording();
        let out = run(Commands::Streams { file: file.clone() }).unwrap();
        assert_eq!(out, "0\tStream_0\t3 channels\t8 samples\n");

        let tree = run(Commands::Tree { file }).unwrap();
        assert!(tree
            .lines()
            .any(|l| l == "/Data/Recording_0/AnalogStream/Stream_0/ChannelData"));
    }

    #[test]
    fn inspect_info_channel() {
        let (_dir, file) = recording();
        let out = run(Commands::Inspect {
            file,
            dataset: "/Data/Recording_0/AnalogStream/Stream_0/InfoChannel".to_string(),
        })
        .unwrap();
        assert!(out.contains("Name: Tick\nOffset: 72\n"));
        assert!(out.contains("Dimensions: [ 3 ]\n"));
    }
}
