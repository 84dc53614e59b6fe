use crate::error::{Result, TrimError};

/// Resolved trim bounds and fade lengths for one job, all in seconds.
///
/// Invariants: `end > start`, `duration == end - start`, both fades are
/// non-negative and `fade_in + fade_out <= duration`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimFadePlan {
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub fade_in: f64,
    pub fade_out: f64,
    start_requested: bool,
    end_requested: bool,
}

impl TrimFadePlan {
    /// Resolve requested bounds and fades against the probed stream duration.
    ///
    /// A missing end bound defaults to the stream duration; a requested end is
    /// taken as given. Fades longer than the clip are capped to it, and if the two
    /// fades together still exceed the clip they are scaled proportionally so
    /// that they meet exactly.
    pub fn compute(
        stream_duration: f64,
        start: Option<f64>,
        end: Option<f64>,
        fade_in: f64,
        fade_out: f64,
    ) -> Result<Self> {
        let effective_start = start.unwrap_or(0.0);
        let effective_end = end.unwrap_or(stream_duration);

        if effective_start >= effective_end {
            return Err(TrimError::InvalidRange {
                start: effective_start,
                end: effective_end,
            });
        }

        let duration = effective_end - effective_start;
        let mut fade_in = fade_in.max(0.0).min(duration);
        let mut fade_out = fade_out.max(0.0).min(duration);

        let total = fade_in + fade_out;
        if total > duration {
            fade_in = fade_in / total * duration;
            fade_out = (duration - fade_in).max(0.0);
        }

        Ok(Self {
            start: effective_start,
            end: effective_end,
            duration,
            fade_in,
            fade_out,
            start_requested: start.is_some(),
            end_requested: end.is_some(),
        })
    }

    /// Input seek offset, present whenever either bound was requested.
    pub fn seek_offset(&self) -> Option<f64> {
        (self.start_requested || self.end_requested).then_some(self.start)
    }

    /// Output duration limit, present only when an end bound was requested.
    pub fn duration_limit(&self) -> Option<f64> {
        self.end_requested.then_some(self.duration)
    }

    /// Offset of the fade-out within the already-seeked output stream.
    pub fn fade_out_start(&self) -> f64 {
        self.duration - self.fade_out
    }
}
