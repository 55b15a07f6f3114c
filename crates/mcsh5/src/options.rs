//! Options controlling how a recording is opened.

/// What to do when one analog stream cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamFailurePolicy {
    /// Fail the whole open with the stream's error.
    Abort,
    /// Leave the stream out, log a warning and record it on the container.
    #[default]
    Skip,
}

/// Builder-style options for [`crate::Container::open_with`] and [`crate::File::open`].
///
/// ```
/// use mcsh5::{OpenOptions, StreamFailurePolicy};
///
/// let options = OpenOptions::new()
///     .stream_failure_policy(StreamFailurePolicy::Abort)
///     .memory_map(false);
/// assert!(!options.memory_map);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenOptions {
    /// Policy for streams that fail to construct.
    pub stream_failure_policy: StreamFailurePolicy,
    /// Map the file into memory instead of reading it into a buffer.
    pub memory_map: bool,
    /// Check the lookup3 checksums of version 2 structures.
    pub verify_checksums: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            stream_failure_policy: StreamFailurePolicy::Skip,
            memory_map: cfg!(feature = "mmap"),
            verify_checksums: true,
        }
    }
}

impl OpenOptions {
    /// Default options: skip broken streams, memory-map, verify checksums.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stream failure policy.
    pub fn stream_failure_policy(mut self, policy: StreamFailurePolicy) -> Self {
        self.stream_failure_policy = policy;
        self
    }

    /// Memory-map the file (ignored without the `mmap` feature).
    pub fn memory_map(mut self, yes: bool) -> Self {
        self.memory_map = yes;
        self
    }

    /// Verify checksums of version 2 superblocks and object headers.
    pub fn verify_checksums(mut self, yes: bool) -> Self {
        self.verify_checksums = yes;
        self
    }
}
