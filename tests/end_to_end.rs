use pathsense::{
    Engine, EngineConfig, FallbackNarrator, Frame, HazardPriority, ScriptedPath,
    ScriptedTracker, StaticCaptioner,
};

const FPS: f64 = 30.0;

fn engine() -> Engine {
    Engine::new(
        EngineConfig::default(),
        Box::new(ScriptedTracker::approaching_car(90)),
        Box::new(StaticCaptioner::new("A street with a car ahead.")),
        Box::new(FallbackNarrator),
    )
    .expect("engine")
}

#[test]
fn approaching_car_triggers_stop_warning() {
    let mut engine = engine();
    let frame = Frame::blank(64, 36).expect("frame");

    let mut first_hazard_frame = None;
    let mut last_report = None;
    for frame_id in 1..=90u64 {
        let timestamp = (frame_id - 1) as f64 / FPS;
        let report = engine
            .process_frame(&frame, Some(frame_id), Some(timestamp))
            .expect("process frame");
        assert_eq!(report.detections.len(), 1);

        if !report.hazards.is_empty() {
            first_hazard_frame.get_or_insert(frame_id);
            assert!(report
                .hazards
                .iter()
                .all(|h| h.priority == HazardPriority::High && h.object_id == 1));
        }
        last_report = Some(report);
    }

    // The car holds still for the first half of the script.
    let first = first_hazard_frame.expect("hazard raised");
    assert!(first > 46, "hazard raised while stationary at frame {}", first);

    let last = last_report.expect("report");
    assert_eq!(last.frame_id, 90);
    assert_eq!(last.hazards.len(), 1);
    assert!(last.hazards[0].reason.contains("in center zone"));
    assert_eq!(last.warning.as_deref(), Some("STOP! Car in front of you"));
}

#[test]
fn narration_after_approach_describes_rapid_approach() {
    let mut engine = engine();
    let frame = Frame::blank(64, 36).expect("frame");
    for frame_id in 1..=90u64 {
        engine
            .process_frame(&frame, Some(frame_id), Some((frame_id - 1) as f64 / FPS))
            .expect("process frame");
    }

    let report = engine.narrate(&frame).expect("narrate");
    assert_eq!(report.movements, vec!["Car: Approaching rapidly".to_string()]);
    assert_eq!(report.narration, None);
    assert_eq!(report.text, "Scene: A street with a car ahead.");

    let status = engine.status();
    assert_eq!(status.frames_processed, 90);
    assert_eq!(status.tracked_objects, 1);
}

#[test]
fn stale_objects_are_dropped_after_missing_frames() {
    // A bus seen only in the first frame of a long script.
    let tracker = ScriptedTracker::new(
        vec![ScriptedPath {
            class_name: "bus".to_string(),
            track_id: Some(5),
            steps: (0, 0),
            from_center: (200.0, 200.0),
            to_center: (200.0, 200.0),
            from_area: 900.0,
            to_area: 900.0,
        }],
        1000,
    );
    let mut engine = Engine::new(
        EngineConfig::default(),
        Box::new(tracker),
        Box::new(StaticCaptioner::default()),
        Box::new(FallbackNarrator),
    )
    .expect("engine");
    let frame = Frame::blank(64, 36).expect("frame");

    for frame_id in 1..=59u64 {
        engine
            .process_frame(&frame, Some(frame_id), Some((frame_id - 1) as f64 / FPS))
            .expect("process frame");
    }
    // Cleanup at frame 30 found it only 29 frames behind.
    assert_eq!(engine.store().len(), 1);

    engine
        .process_frame(&frame, Some(60), Some(59.0 / FPS))
        .expect("process frame");
    assert!(engine.store().is_empty());
}
