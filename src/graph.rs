//! Dataflow-graph collaborator interface.
//!
//! Pad wiring semantics live outside this core; scheduled callbacks move
//! frames through these two narrow capabilities.

/// Pull side of a producer pad.
pub trait ProducerPad: Send + Sync {
    type Frame;

    /// Returns the next frame, or `None` when no signal is available.
    fn get(&self) -> Option<Self::Frame>;
}

/// Push side of a source pad, notifying downstream consumers.
pub trait SourcePad: Send + Sync {
    type Frame;

    fn push(&self, frame: Self::Frame);
}
