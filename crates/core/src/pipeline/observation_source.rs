use crate::shared::detection::StreamEvent;

/// Domain interface for the ordered stream of per-frame observations.
pub trait ObservationSource: Send {
    fn events(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<StreamEvent, Box<dyn std::error::Error>>> + '_>;
}
