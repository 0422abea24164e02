use crate::pipeline::observation_source::ObservationSource;
use crate::scene::domain::scene_timeline::SceneTimeline;
use crate::shared::detection::StreamEvent;

/// Decorates an observation source with scene boundaries taken from a
/// timeline: a boundary is emitted before the first frame whose timestamp
/// falls in a different scene than the previous frame.
///
/// Boundaries already present in the inner stream pass through unchanged.
pub struct SceneBoundarySource {
    inner: Box<dyn ObservationSource>,
    timeline: SceneTimeline,
}

impl SceneBoundarySource {
    pub fn new(inner: Box<dyn ObservationSource>, timeline: SceneTimeline) -> Self {
        Self { inner, timeline }
    }
}

impl ObservationSource for SceneBoundarySource {
    fn events(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<StreamEvent, Box<dyn std::error::Error>>> + '_> {
        let timeline = &self.timeline;
        let mut current_scene: Option<usize> = None;
        Box::new(self.inner.events().flat_map(move |event| {
            let frame = match event {
                Ok(StreamEvent::Frame(frame)) => frame,
                other => return vec![other],
            };
            let scene = timeline.scene_index_at(frame.timestamp);
            let crossed = matches!(
                (current_scene, scene),
                (Some(previous), Some(next)) if next != previous
            );
            current_scene = scene.or(current_scene);

            let mut out = Vec::with_capacity(2);
            if crossed {
                out.push(Ok(StreamEvent::SceneBoundary));
            }
            out.push(Ok(StreamEvent::Frame(frame)));
            out
        }))
    }
}
