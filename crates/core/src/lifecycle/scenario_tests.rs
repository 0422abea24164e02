//! End-to-end behaviour of the lifecycle manager over short synthetic videos.

use std::collections::{HashMap, HashSet};

use crate::config::engine_config::EngineConfig;
use crate::gallery::domain::identity_record::IdentityState;
use crate::lifecycle::identity_lifecycle_manager::IdentityLifecycleManager;
use crate::shared::anchor::AnchorObject;
use crate::shared::bbox::BoundingBox;
use crate::shared::detection::{Detection, FrameObservations, StreamEvent};
use crate::shared::ids::{Pid, SceneId, TrackId};
use crate::shared::resolution::{Confidence, FrameResolution};

const FACE_DIM: usize = 4;
const BODY_DIM: usize = 6;
const FRAME_SECS: f64 = 0.04;

struct Person {
    face: Vec<f32>,
    body: Vec<f32>,
}

fn basis(dim: usize, k: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[k] = 1.0;
    v
}

/// Unit vector with cosine `cos` to axis `k`, tilted towards axis `j`.
fn tilted(dim: usize, k: usize, j: usize, cos: f32) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[k] = cos;
    v[j] = (1.0 - cos * cos).sqrt();
    v
}

fn person(k: usize) -> Person {
    Person {
        face: basis(FACE_DIM, k),
        body: basis(BODY_DIM, k),
    }
}

fn seen(track: TrackId, p: &Person, x: f64) -> Detection {
    Detection {
        local_track_id: track,
        bbox: BoundingBox::new(x, 50.0, 50.0, 100.0),
        face_embedding: Some(p.face.clone()),
        body_embedding: Some(p.body.clone()),
    }
}

fn from_behind(track: TrackId, body: &[f32], x: f64) -> Detection {
    Detection {
        local_track_id: track,
        bbox: BoundingBox::new(x, 50.0, 50.0, 100.0),
        face_embedding: None,
        body_embedding: Some(body.to_vec()),
    }
}

fn frame(frame_index: usize, detections: Vec<Detection>) -> StreamEvent {
    StreamEvent::Frame(FrameObservations {
        frame_index,
        timestamp: frame_index as f64 * FRAME_SECS,
        detections,
        anchors: Vec::new(),
    })
}

fn manager(config: EngineConfig) -> IdentityLifecycleManager {
    IdentityLifecycleManager::new(config).unwrap()
}

fn run(manager: &mut IdentityLifecycleManager, events: Vec<StreamEvent>) -> Vec<FrameResolution> {
    let mut results = Vec::new();
    for event in events {
        match event {
            StreamEvent::Frame(frame) => results.push(manager.process_frame(&frame).unwrap()),
            StreamEvent::SceneBoundary => {
                manager.end_scene();
            }
        }
    }
    results
}

fn pid(result: &FrameResolution, track: TrackId) -> Pid {
    result.pid_for(track).unwrap()
}

fn confidence(result: &FrameResolution, track: TrackId) -> Confidence {
    result.label_for(track).unwrap().confidence
}

/// Three people; A shows a face only in the first scene.
fn two_scene_video() -> Vec<StreamEvent> {
    let (a, b, c) = (person(0), person(1), person(2));
    let a_back = tilted(BODY_DIM, 0, 5, 0.98);
    vec![
        frame(0, vec![seen(1, &a, 0.0), seen(2, &b, 200.0), seen(3, &c, 400.0)]),
        frame(1, vec![seen(1, &a, 2.0), seen(2, &b, 202.0), seen(3, &c, 398.0)]),
        frame(2, vec![seen(1, &a, 4.0), seen(2, &b, 204.0), seen(3, &c, 396.0)]),
        StreamEvent::SceneBoundary,
        frame(0, vec![from_behind(10, &a_back, 600.0), seen(11, &b, 50.0), seen(12, &c, 300.0)]),
        frame(1, vec![from_behind(10, &a_back, 602.0), seen(11, &b, 52.0), seen(12, &c, 302.0)]),
        StreamEvent::SceneBoundary,
    ]
}

#[test]
fn test_three_people_keep_identities_across_scenes() {
    let mut m = manager(EngineConfig::default());
    let results = run(&mut m, two_scene_video());

    assert_eq!(pid(&results[0], 1), Pid(1));
    assert_eq!(pid(&results[0], 2), Pid(2));
    assert_eq!(pid(&results[0], 3), Pid(3));

    let second_scene = &results[3];
    assert_eq!(second_scene.scene, 1);
    assert_eq!(pid(second_scene, 10), Pid(1));
    assert_eq!(pid(second_scene, 11), Pid(2));
    assert_eq!(pid(second_scene, 12), Pid(3));
    assert_eq!(confidence(second_scene, 10), Confidence::Confirmed);
    assert_eq!(second_scene.accepted_matches, 3);
    assert_eq!(m.gallery().len(), 3);
}

#[test]
fn test_same_stream_gives_same_labels() {
    let first = run(&mut manager(EngineConfig::default()), two_scene_video());
    let second = run(&mut manager(EngineConfig::default()), two_scene_video());
    assert_eq!(first, second);
}

#[test]
fn test_confirmed_track_maps_to_one_pid_per_scene() {
    let mut events = two_scene_video();
    let (a, b) = (person(0), person(1));
    // Track 1 drifts to B's appearance mid-scene.
    events.extend([
        frame(0, vec![seen(1, &a, 0.0), seen(2, &b, 300.0)]),
        frame(1, vec![seen(1, &a, 0.0)]),
        frame(2, vec![seen(1, &b, 0.0)]),
        frame(3, vec![seen(1, &a, 0.0), seen(2, &b, 300.0)]),
    ]);
    let results = run(&mut manager(EngineConfig::default()), events);

    let mut confirmed: HashMap<(SceneId, TrackId), HashSet<Pid>> = HashMap::new();
    for result in &results {
        for label in &result.labels {
            if label.confidence == Confidence::Confirmed {
                confirmed
                    .entry((result.scene, label.local_track_id))
                    .or_default()
                    .insert(label.pid);
            }
        }
    }
    assert!(confirmed.values().all(|pids| pids.len() == 1));
}

#[test]
fn test_occlusion_split_merges_into_one_identity() {
    let a = person(0);
    let mut m = manager(EngineConfig::default());
    let results = run(
        &mut m,
        vec![
            frame(0, vec![seen(1, &a, 100.0)]),
            frame(1, vec![seen(1, &a, 101.0)]),
            frame(2, vec![seen(1, &a, 102.0)]),
            frame(5, vec![seen(2, &a, 103.0)]),
            frame(6, vec![seen(2, &a, 104.0)]),
        ],
    );

    assert_eq!(pid(&results[3], 2), Pid(1));
    assert_eq!(pid(&results[4], 2), Pid(1));
    let summary = m.end_scene();
    assert_eq!(summary.merged_tracks, vec![(Pid(1), vec![1, 2])]);
    assert_eq!(summary.bindings, 2);
}

#[test]
fn test_near_identical_bodies_with_distinct_faces_stay_apart() {
    let a = person(0);
    let b = Person {
        face: basis(FACE_DIM, 1),
        body: tilted(BODY_DIM, 0, 1, 0.99),
    };
    let mut m = manager(EngineConfig::default());
    let results = run(
        &mut m,
        vec![
            frame(0, vec![seen(1, &a, 100.0)]),
            frame(1, vec![seen(1, &a, 100.0)]),
            // B appears where A just stood.
            frame(3, vec![seen(2, &b, 100.0)]),
            frame(4, vec![seen(1, &a, 100.0), seen(2, &b, 160.0)]),
            StreamEvent::SceneBoundary,
            frame(0, vec![seen(5, &b, 0.0), seen(6, &a, 300.0)]),
        ],
    );

    assert_eq!(pid(&results[2], 2), Pid(2));
    assert_eq!(pid(&results[3], 1), Pid(1));
    assert_eq!(pid(&results[3], 2), Pid(2));
    assert_eq!(pid(&results[4], 5), Pid(2));
    assert_eq!(pid(&results[4], 6), Pid(1));
    assert_eq!(m.gallery().len(), 2);
}

#[test]
fn test_local_track_ids_do_not_leak_across_scenes() {
    let (a, b) = (person(0), person(1));
    let results = run(
        &mut manager(EngineConfig::default()),
        vec![
            frame(0, vec![seen(7, &a, 0.0), seen(8, &b, 300.0)]),
            frame(1, vec![seen(7, &a, 0.0), seen(8, &b, 300.0)]),
            StreamEvent::SceneBoundary,
            frame(0, vec![seen(7, &b, 0.0)]),
        ],
    );
    assert_eq!(pid(&results[0], 7), Pid(1));
    assert_eq!(pid(&results[2], 7), Pid(2));
}

#[test]
fn test_identity_held_by_a_track_is_not_offered_to_others() {
    let a = person(0);
    let results = run(
        &mut manager(EngineConfig::default()),
        vec![
            frame(0, vec![seen(1, &a, 0.0)]),
            frame(1, vec![seen(1, &a, 0.0), seen(3, &a, 200.0)]),
        ],
    );
    assert_eq!(pid(&results[1], 1), Pid(1));
    assert_eq!(pid(&results[1], 3), Pid(2));
    assert_eq!(results[1].created_identities, 1);
}

#[test]
fn test_swapped_track_keeps_first_pid_and_is_flagged() {
    let (a, b) = (person(0), person(1));
    let mut m = manager(EngineConfig::default());
    let results = run(
        &mut m,
        vec![
            frame(0, vec![seen(1, &a, 0.0), seen(2, &b, 300.0)]),
            frame(1, vec![seen(1, &a, 0.0), seen(2, &b, 300.0)]),
            frame(2, vec![seen(1, &b, 0.0)]),
            frame(3, vec![seen(1, &a, 0.0)]),
        ],
    );

    assert_eq!(pid(&results[2], 1), Pid(1));
    assert_eq!(confidence(&results[2], 1), Confidence::LowConfidence);
    assert_eq!(confidence(&results[3], 1), Confidence::LowConfidence);
    assert!(m.bindings().get(1).unwrap().conflicted);
    assert_eq!(m.gallery().get(Pid(1)).unwrap().observations(), 2);
    assert_eq!(m.gallery().get(Pid(2)).unwrap().observations(), 2);

    let summary = m.end_scene();
    assert_eq!(summary.conflicted_tracks, vec![1]);
}

/// A seen in scene 0 with face and body; a faceless half-match in scene 1.
fn ambiguous_setup() -> Vec<StreamEvent> {
    let a = person(0);
    vec![
        frame(0, vec![seen(1, &a, 0.0)]),
        frame(1, vec![seen(1, &a, 0.0)]),
        StreamEvent::SceneBoundary,
    ]
}

fn half_match() -> Vec<f32> {
    tilted(BODY_DIM, 0, 1, 0.6)
}

#[test]
fn test_ambiguous_track_is_deferred_then_forced_new() {
    let mut config = EngineConfig::default();
    config.binding.max_ambiguous_frames = 2;
    let mut m = manager(config);
    let mut events = ambiguous_setup();
    events.extend((0..4).map(|i| frame(i, vec![from_behind(5, &half_match(), 0.0)])));
    let results = run(&mut m, events);

    for result in &results[2..4] {
        assert_eq!(pid(result, 5), Pid(1));
        assert_eq!(confidence(result, 5), Confidence::LowConfidence);
    }
    assert_eq!(pid(&results[4], 5), Pid(2));
    assert_eq!(confidence(&results[4], 5), Confidence::Confirmed);
    assert_eq!(results[4].created_identities, 1);
    assert_eq!(pid(&results[5], 5), Pid(2));
    // Tentative evidence never touched the candidate identity.
    assert_eq!(m.gallery().get(Pid(1)).unwrap().observations(), 2);
}

#[test]
fn test_no_deferral_allowed_creates_identity_at_once() {
    let mut config = EngineConfig::default();
    config.binding.max_ambiguous_frames = 0;
    let mut m = manager(config);
    let mut events = ambiguous_setup();
    events.push(frame(0, vec![from_behind(5, &half_match(), 0.0)]));
    let results = run(&mut m, events);
    assert_eq!(pid(&results[2], 5), Pid(2));
}

#[test]
fn test_ambiguous_track_confirmed_by_later_evidence() {
    let a = person(0);
    let mut m = manager(EngineConfig::default());
    let mut events = ambiguous_setup();
    events.extend([
        frame(0, vec![from_behind(5, &half_match(), 0.0)]),
        frame(1, vec![seen(5, &a, 0.0)]),
        frame(2, vec![from_behind(5, &half_match(), 0.0)]),
    ]);
    let results = run(&mut m, events);

    assert_eq!(confidence(&results[2], 5), Confidence::LowConfidence);
    assert_eq!(pid(&results[3], 5), Pid(1));
    assert_eq!(confidence(&results[3], 5), Confidence::Confirmed);
    assert_eq!(results[3].accepted_matches, 1);
    assert!(m.bindings().get(5).unwrap().is_confirmed());
    assert_eq!(m.gallery().len(), 1);
}

#[test]
fn test_boundary_forces_pending_bindings() {
    let mut m = manager(EngineConfig::default());
    let mut events = ambiguous_setup();
    events.push(frame(0, vec![from_behind(5, &half_match(), 0.0)]));
    run(&mut m, events);

    let summary = m.end_scene();
    assert_eq!(summary.forced_new, vec![(5, Pid(2))]);
    assert_eq!(summary.staled, vec![Pid(1)]);
    assert!(m.bindings().is_empty());
    assert_eq!(m.gallery().len(), 2);
}

#[test]
fn test_invalid_detections_are_skipped() {
    let a = person(0);
    let results = run(
        &mut manager(EngineConfig::default()),
        vec![frame(
            0,
            vec![
                seen(1, &a, 0.0),
                Detection {
                    body_embedding: None,
                    ..seen(2, &a, 100.0)
                },
                from_behind(3, &[1.0, 0.0, 0.0], 200.0),
            ],
        )],
    );

    assert_eq!(results[0].labels.len(), 1);
    let skipped: Vec<TrackId> = results[0].skipped.iter().map(|s| s.local_track_id).collect();
    assert_eq!(skipped, vec![2, 3]);
    assert!(results[0].skipped[1].reason.contains("dimensions"));
}

#[test]
fn test_unseen_identity_expires_after_budget() {
    let mut config = EngineConfig::default();
    config.gallery.staleness_budget_scenes = 1;
    let (a, b) = (person(0), person(1));
    let mut m = manager(config);
    let results = run(
        &mut m,
        vec![
            frame(0, vec![seen(1, &a, 0.0)]),
            frame(1, vec![seen(1, &a, 0.0)]),
            StreamEvent::SceneBoundary,
            frame(0, vec![seen(1, &b, 0.0)]),
            frame(1, vec![seen(1, &b, 0.0)]),
            StreamEvent::SceneBoundary,
            frame(0, vec![seen(1, &b, 0.0)]),
        ],
    );
    assert_eq!(m.gallery().get(Pid(1)).unwrap().state(), IdentityState::Stale);
    let summary = m.end_scene();
    assert_eq!(summary.expired, vec![Pid(1)]);
    assert_eq!(pid(&results[4], 1), Pid(2));

    let after = run(&mut m, vec![frame(0, vec![seen(1, &a, 0.0)])]);
    assert_eq!(pid(&after[0], 1), Pid(3));
    assert_eq!(m.gallery().get(Pid(1)).unwrap().state(), IdentityState::Expired);
}

#[test]
fn test_stale_identity_reactivates_on_return() {
    let (a, b) = (person(0), person(1));
    let mut m = manager(EngineConfig::default());
    let results = run(
        &mut m,
        vec![
            frame(0, vec![seen(1, &a, 0.0)]),
            frame(1, vec![seen(1, &a, 0.0)]),
            StreamEvent::SceneBoundary,
            frame(0, vec![seen(1, &b, 0.0)]),
            frame(1, vec![seen(1, &b, 0.0)]),
            StreamEvent::SceneBoundary,
        ],
    );
    assert_eq!(results.len(), 4);
    assert_eq!(m.gallery().get(Pid(1)).unwrap().state(), IdentityState::Stale);

    let back = run(&mut m, vec![frame(0, vec![seen(4, &a, 0.0)])]);
    assert_eq!(pid(&back[0], 4), Pid(1));
    let record = m.gallery().get(Pid(1)).unwrap();
    assert_eq!(record.state(), IdentityState::Active);
    assert_eq!(record.staleness(), 0);
    assert_eq!(record.scenes_seen(), 2);
}

#[test]
fn test_single_frame_identity_never_graduates() {
    let (a, b) = (person(0), person(1));
    let mut m = manager(EngineConfig::default());
    run(
        &mut m,
        vec![
            frame(0, vec![seen(1, &a, 0.0), seen(2, &b, 300.0)]),
            frame(1, vec![seen(1, &a, 0.0)]),
        ],
    );
    let gallery = m.finish();
    assert_eq!(gallery.get(Pid(1)).unwrap().state(), IdentityState::Active);
    assert_eq!(gallery.get(Pid(2)).unwrap().state(), IdentityState::New);
    assert_eq!(gallery.transient_pids(), vec![Pid(2)]);
}

fn anchor(class: &str, x: f64, y: f64) -> AnchorObject {
    AnchorObject {
        class: class.to_string(),
        bbox: BoundingBox::new(x, y, 20.0, 20.0),
    }
}

fn furnished(
    frame_index: usize,
    detections: Vec<Detection>,
    anchors: Vec<AnchorObject>,
) -> StreamEvent {
    StreamEvent::Frame(FrameObservations {
        frame_index,
        timestamp: frame_index as f64 * FRAME_SECS,
        detections,
        anchors,
    })
}

/// Twins in identical clothes, one by a chair and one by a desk. Both then
/// drop out and a re-issued track appears halfway between them.
fn twins_then_stranger(body: &[f32], anchors: Vec<AnchorObject>) -> Vec<StreamEvent> {
    let twin = basis(BODY_DIM, 0);
    vec![
        furnished(
            0,
            vec![from_behind(1, &twin, 0.0), from_behind(2, &twin, 400.0)],
            vec![anchor("chair", 40.0, 140.0), anchor("desk", 440.0, 140.0)],
        ),
        furnished(1, vec![from_behind(3, body, 200.0)], anchors),
    ]
}

#[test]
fn test_nearby_anchor_breaks_appearance_tie() {
    let twin = basis(BODY_DIM, 0);
    let mut m = manager(EngineConfig::default());
    let events = twins_then_stranger(&twin, vec![anchor("desk", 240.0, 140.0)]);
    let results = run(&mut m, events);

    assert_eq!(pid(&results[0], 1), Pid(1));
    assert_eq!(pid(&results[0], 2), Pid(2));
    assert_eq!(pid(&results[1], 3), Pid(2));
    assert_eq!(confidence(&results[1], 3), Confidence::Confirmed);
    assert_eq!(results[1].accepted_matches, 1);
}

#[test]
fn test_without_anchors_tie_goes_to_lower_pid() {
    let twin = basis(BODY_DIM, 0);
    let mut m = manager(EngineConfig::default());
    let results = run(&mut m, twins_then_stranger(&twin, Vec::new()));
    assert_eq!(pid(&results[1], 3), Pid(1));
}

#[test]
fn test_anchor_alone_does_not_match_a_stranger() {
    let stranger = basis(BODY_DIM, 3);
    let mut m = manager(EngineConfig::default());
    let mut events = twins_then_stranger(&stranger, Vec::new());
    // The stranger stands exactly where the second twin stood, by the same desk.
    events[1] = furnished(
        1,
        vec![from_behind(3, &stranger, 400.0)],
        vec![anchor("desk", 440.0, 140.0)],
    );
    let results = run(&mut m, events);

    assert_eq!(pid(&results[1], 3), Pid(3));
    assert_eq!(results[1].accepted_matches, 0);
    assert_eq!(results[1].created_identities, 1);
}
