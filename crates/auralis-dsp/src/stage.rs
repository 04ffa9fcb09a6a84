//! The stage trait every graph member implements.

use auralis_core::{ProcessingParameters, StereoBuffer};

/// One member of the mastering chain.
///
/// Stages process a whole chunk buffer in place, reading their settings
/// from the shared [`ProcessingParameters`] value. Contracts:
///
/// - the frame count of `buffer` is unchanged by `process`
/// - the same `(state, buffer, params)` triple always produces the same
///   output, bit for bit
/// - a stage at its disabled sentinel leaves the buffer untouched (the
///   limiter is the one exception: it always enforces its ceiling)
pub trait Stage {
    /// Short stable name, used in logs and reports.
    fn name(&self) -> &'static str;

    /// Process the buffer in place with the given parameters.
    fn process(&mut self, buffer: &mut StereoBuffer, params: &ProcessingParameters);

    /// Clear internal state (filters, envelopes, delay lines).
    fn reset(&mut self);

    /// Recompute sample-rate-dependent coefficients. Implies a reset.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Latency this stage introduces, in samples. Zero for all stages
    /// except the lookahead limiter, which compensates internally and
    /// still reports zero to the graph.
    fn latency_samples(&self) -> usize {
        0
    }
}
