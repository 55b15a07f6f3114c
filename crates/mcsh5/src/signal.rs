//! Calibrated sample sequences.

/// Samples of one channel together with their sampling frequency in Hz.
///
/// Cloning copies every sample; a signal is never implicitly copied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signal<T> {
    samples: Vec<T>,
    sampling_frequency: f64,
}

impl<T> Signal<T> {
    /// Wrap `samples` taken at `sampling_frequency` Hz.
    pub fn new(samples: Vec<T>, sampling_frequency: f64) -> Self {
        Signal {
            samples,
            sampling_frequency,
        }
    }

    /// The samples.
    pub fn samples(&self) -> &[T] {
        &self.samples
    }

    /// Give up the samples.
    pub fn into_samples(self) -> Vec<T> {
        self.samples
    }

    /// Samples per second.
    pub fn sampling_frequency(&self) -> f64 {
        self.sampling_frequency
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether there are no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length in seconds, zero when the frequency is unknown.
    pub fn duration(&self) -> f64 {
        if self.sampling_frequency > 0.0 {
            self.samples.len() as f64 / self.sampling_frequency
        } else {
            0.0
        }
    }
}

impl<T> std::ops::Index<usize> for Signal<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.samples[index]
    }
}
