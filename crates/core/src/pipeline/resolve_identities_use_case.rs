use std::collections::HashSet;
use std::time::Instant;

use crate::lifecycle::identity_lifecycle_manager::{IdentityLifecycleManager, SceneSummary};
use crate::shared::detection::StreamEvent;
use crate::shared::ids::Pid;
use crate::shared::resolution::FrameResolution;

use super::identity_report::{MergedTracks, ResolutionReport};
use super::label_filter::filter_labels;
use super::label_sink::LabelSink;
use super::observation_source::ObservationSource;
use super::resolution_logger::ResolutionLogger;

/// Which labels reach the sink.
#[derive(Clone, Debug, Default)]
pub struct LabelSelection {
    pub keep_pids: Option<HashSet<Pid>>,
    pub drop_pids: Option<HashSet<Pid>>,
    /// Withhold labels of identities seen in a single frame only. Requires
    /// buffering the whole video, since graduation is only final at the end.
    pub drop_transient: bool,
}

/// Orchestrates identity resolution for one video.
///
/// Wires the observation source, the lifecycle manager and the label sink
/// together. This is a single-use struct: `execute` consumes the owned
/// components, so calling it twice will fail.
pub struct ResolveIdentitiesUseCase {
    source: Option<Box<dyn ObservationSource>>,
    sink: Option<Box<dyn LabelSink>>,
    manager: Option<IdentityLifecycleManager>,
    logger: Box<dyn ResolutionLogger>,
    selection: LabelSelection,
}

impl ResolveIdentitiesUseCase {
    pub fn new(
        source: Box<dyn ObservationSource>,
        sink: Box<dyn LabelSink>,
        manager: IdentityLifecycleManager,
        logger: Box<dyn ResolutionLogger>,
        selection: LabelSelection,
    ) -> Self {
        Self {
            source: Some(source),
            sink: Some(sink),
            manager: Some(manager),
            logger,
            selection,
        }
    }

    pub fn execute(&mut self) -> Result<ResolutionReport, Box<dyn std::error::Error>> {
        let mut source = self.source.take().ok_or("Resolution already executed")?;
        let mut sink = self.sink.take().ok_or("Resolution already executed")?;
        let mut manager = self.manager.take().ok_or("Resolution already executed")?;

        let mut report = ResolutionReport::default();
        let mut buffered: Vec<FrameResolution> = Vec::new();

        for event in source.events() {
            match event? {
                StreamEvent::Frame(frame) => {
                    let started = Instant::now();
                    let mut resolution = manager.process_frame(&frame)?;
                    self.logger
                        .timing("resolve", started.elapsed().as_secs_f64() * 1000.0);
                    self.logger
                        .metric("detections", frame.detections.len() as f64);

                    report.frames += 1;
                    report.skipped_detections += resolution.skipped.len();
                    resolution.labels = filter_labels(
                        &resolution.labels,
                        self.selection.keep_pids.as_ref(),
                        self.selection.drop_pids.as_ref(),
                    );

                    if self.selection.drop_transient {
                        buffered.push(resolution);
                    } else {
                        let started = Instant::now();
                        report.labels_written += resolution.labels.len();
                        sink.write(&resolution)?;
                        self.logger
                            .timing("write", started.elapsed().as_secs_f64() * 1000.0);
                    }
                    self.logger.progress(report.frames);
                }
                StreamEvent::SceneBoundary => {
                    let summary = manager.end_scene();
                    self.record_scene(&mut report, summary);
                }
            }
        }

        let summary = manager.end_scene();
        self.record_scene(&mut report, summary);
        let gallery = manager.finish();

        if self.selection.drop_transient {
            let transient: HashSet<Pid> = gallery.transient_pids().into_iter().collect();
            for mut resolution in buffered {
                let before = resolution.labels.len();
                resolution.labels = filter_labels(&resolution.labels, None, Some(&transient));
                report.dropped_transient_labels += before - resolution.labels.len();
                report.labels_written += resolution.labels.len();
                sink.write(&resolution)?;
            }
        }
        sink.close()?;

        let report = report.with_gallery(&gallery);
        self.logger.info(&format!(
            "{} frames, {} scenes, {} identities, {} labels",
            report.frames,
            report.scenes,
            report.identities.len(),
            report.labels_written
        ));
        self.logger.summary();
        Ok(report)
    }

    fn record_scene(&mut self, report: &mut ResolutionReport, summary: SceneSummary) {
        if summary.frames == 0 {
            return;
        }
        report.scenes += 1;
        report.forced_new_identities += summary.forced_new.len();
        report.conflicted_tracks += summary.conflicted_tracks.len();
        report.merged_tracks.extend(
            summary
                .merged_tracks
                .into_iter()
                .map(|(pid, tracks)| MergedTracks {
                    scene: summary.scene,
                    pid,
                    tracks,
                }),
        );
        self.logger.metric("bindings_per_scene", summary.bindings as f64);
        self.logger.info(&format!(
            "Scene {}: {} frames, {} bindings, {} stale, {} expired",
            summary.scene,
            summary.frames,
            summary.bindings,
            summary.staled.len(),
            summary.expired.len()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::engine_config::EngineConfig;
    use crate::pipeline::infrastructure::jsonl_observation_reader::JsonlObservationReader;
    use crate::pipeline::resolution_logger::NullResolutionLogger;
    use crate::shared::bbox::BoundingBox;
    use crate::shared::detection::{Detection, FrameObservations};
    use crate::shared::resolution::IdentityLabel;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    // --- Stubs ---

    struct StubSource {
        events: Vec<StreamEvent>,
    }

    impl ObservationSource for StubSource {
        fn events(
            &mut self,
        ) -> Box<dyn Iterator<Item = Result<StreamEvent, Box<dyn std::error::Error>>> + '_>
        {
            Box::new(self.events.drain(..).map(Ok))
        }
    }

    #[derive(Clone, Default)]
    struct MemorySink {
        labels: Arc<Mutex<Vec<IdentityLabel>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl LabelSink for MemorySink {
        fn write(
            &mut self,
            resolution: &FrameResolution,
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.labels
                .lock()
                .unwrap()
                .extend(resolution.labels.iter().cloned());
            Ok(())
        }

        fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    fn person(track: u32, axis: usize) -> Detection {
        let mut body = vec![0.0; 3];
        body[axis] = 1.0;
        Detection {
            local_track_id: track,
            bbox: BoundingBox::new(axis as f64 * 200.0, 0.0, 50.0, 100.0),
            face_embedding: None,
            body_embedding: Some(body),
        }
    }

    fn frame(frame_index: usize, detections: Vec<Detection>) -> StreamEvent {
        StreamEvent::Frame(FrameObservations {
            frame_index,
            timestamp: frame_index as f64 * 0.04,
            detections,
            anchors: Vec::new(),
        })
    }

    fn use_case(
        events: Vec<StreamEvent>,
        sink: &MemorySink,
        selection: LabelSelection,
    ) -> ResolveIdentitiesUseCase {
        ResolveIdentitiesUseCase::new(
            Box::new(StubSource { events }),
            Box::new(sink.clone()),
            IdentityLifecycleManager::new(EngineConfig::default()).unwrap(),
            Box::new(NullResolutionLogger),
            selection,
        )
    }

    fn video() -> Vec<StreamEvent> {
        vec![
            frame(0, vec![person(1, 0), person(2, 1)]),
            frame(1, vec![person(1, 0)]),
            StreamEvent::SceneBoundary,
            frame(0, vec![person(4, 0), person(5, 2)]),
            frame(1, vec![person(4, 0), person(5, 2)]),
        ]
    }

    #[test]
    fn test_streams_all_labels() {
        let sink = MemorySink::default();
        let report = use_case(video(), &sink, LabelSelection::default())
            .execute()
            .unwrap();

        assert_eq!(report.frames, 4);
        assert_eq!(report.scenes, 2);
        assert_eq!(report.labels_written, 7);
        assert_eq!(report.identities.len(), 3);
        assert_eq!(sink.labels.lock().unwrap().len(), 7);
        assert!(*sink.closed.lock().unwrap());

        let labels = sink.labels.lock().unwrap();
        let track_4 = labels.iter().find(|l| l.local_track_id == 4).unwrap();
        assert_eq!(track_4.pid, Pid(1));
    }

    #[test]
    fn test_drop_transient_withholds_single_frame_identities() {
        let sink = MemorySink::default();
        let selection = LabelSelection {
            drop_transient: true,
            ..Default::default()
        };
        let report = use_case(video(), &sink, selection).execute().unwrap();

        assert_eq!(report.dropped_transient_labels, 1);
        assert_eq!(report.labels_written, 6);
        assert!(sink
            .labels
            .lock()
            .unwrap()
            .iter()
            .all(|l| l.pid != Pid(2)));
    }

    #[test]
    fn test_keep_pids_filters_output() {
        let sink = MemorySink::default();
        let selection = LabelSelection {
            keep_pids: Some(HashSet::from([Pid(1)])),
            ..Default::default()
        };
        let report = use_case(video(), &sink, selection).execute().unwrap();
        assert_eq!(report.labels_written, 4);
    }

    #[test]
    fn test_execute_twice_fails() {
        let sink = MemorySink::default();
        let mut uc = use_case(video(), &sink, LabelSelection::default());
        uc.execute().unwrap();
        assert!(uc.execute().is_err());
    }

    #[test]
    fn test_out_of_order_frames_abort() {
        let sink = MemorySink::default();
        let events = vec![frame(3, Vec::new()), frame(2, Vec::new())];
        let err = use_case(events, &sink, LabelSelection::default())
            .execute()
            .unwrap_err();
        assert!(err.to_string().contains("does not follow"));
    }

    #[test]
    fn test_reads_jsonl_input() {
        let input = concat!(
            r#"{"type":"frame","frame_index":0,"timestamp":0.0,"detections":[{"track_id":1,"bbox":{"x":0,"y":0,"width":10,"height":20},"body":[1,0]}]}"#,
            "\n",
            r#"{"type":"frame","frame_index":1,"timestamp":0.04,"detections":[{"track_id":1,"bbox":{"x":0,"y":0,"width":10,"height":20},"body":[1,0]},{"track_id":2,"bbox":{"x":5,"y":0,"width":10,"height":20}}]}"#,
            "\n"
        );
        let sink = MemorySink::default();
        let mut uc = ResolveIdentitiesUseCase::new(
            Box::new(JsonlObservationReader::from_reader(Cursor::new(input.to_string()))),
            Box::new(sink.clone()),
            IdentityLifecycleManager::new(EngineConfig::default()).unwrap(),
            Box::new(NullResolutionLogger),
            LabelSelection::default(),
        );
        let report = uc.execute().unwrap();
        assert_eq!(report.labels_written, 2);
        assert_eq!(report.skipped_detections, 1);
    }
}
