use crate::shared::resolution::FrameResolution;

/// Domain interface for persisting resolved identity labels.
pub trait LabelSink: Send {
    fn write(&mut self, resolution: &FrameResolution) -> Result<(), Box<dyn std::error::Error>>;

    /// Flushes buffered output. Called once after the last frame.
    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>>;
}
