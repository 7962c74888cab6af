//! Progress events emitted while the engine works.
//!
//! Events are purely observational and carry no identity. They are handed
//! synchronously to a caller-supplied sink in emission order; the percentage
//! is monotonic within a sub-phase but may step backwards between phases
//! (the analysis pass of a two-pass encode ends at 45, the final pass
//! restarts at 50).

/// One progress emission: an overall percentage and a human-readable label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Overall progress, 0-100.
    pub percent: u8,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent,
            message: message.into(),
        }
    }
}
