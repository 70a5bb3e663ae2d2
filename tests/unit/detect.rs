use super::*;

#[test]
fn default_scan_is_sequential_from_the_start() {
    let opts = ScanOpts::default();
    assert_eq!(opts.start, FrameIndex(0));
    assert_eq!(opts.end, None);
    assert_eq!(opts.segments, 1);
    opts.validate().unwrap();
}

#[test]
fn validate_rejects_bad_ranges_and_counts() {
    let bad = [
        ScanOpts {
            segments: 0,
            ..ScanOpts::default()
        },
        ScanOpts {
            threads: Some(0),
            ..ScanOpts::default()
        },
        ScanOpts {
            start: FrameIndex(10),
            end: Some(FrameIndex(3)),
            ..ScanOpts::default()
        },
        ScanOpts {
            progress_every_frames: 0,
            ..ScanOpts::default()
        },
    ];
    for opts in bad {
        assert!(
            matches!(opts.validate(), Err(VeilcutError::Validation(_))),
            "{opts:?}"
        );
    }
}

#[test]
fn scan_opts_parse_from_partial_json() {
    let opts: ScanOpts =
        serde_json::from_str(r#"{"segments": 4, "end": 120, "hw_accel": "off"}"#).unwrap();
    assert_eq!(opts.segments, 4);
    assert_eq!(opts.end, Some(FrameIndex(120)));
    assert_eq!(opts.hw_accel, HwAccel::Off);
    assert_eq!(opts.decode_opts().hw_accel, HwAccel::Off);
    assert!(serde_json::from_str::<ScanOpts>(r#"{"segmnts": 4}"#).is_err());
}

#[test]
fn closures_are_detectors() {
    let mut calls = 0;
    let mut detector = |f: &FrameRgba| {
        calls += 1;
        vec![FaceRegion::new(0.0, 0.0, f.width as f32, f.height as f32, 1.0)]
    };
    let frame = FrameRgba::new(4, 2).unwrap();
    let found = detector.detect(&frame);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].width, 4.0);
    drop(detector);
    assert_eq!(calls, 1);
}

#[test]
fn thread_pool_honours_thread_count() {
    let pool = build_thread_pool(Some(2)).unwrap();
    assert_eq!(pool.current_num_threads(), 2);
}

#[test]
fn scanning_a_missing_file_fails() {
    let err = scan_faces(
        "/definitely/not/here.mp4",
        || |_: &FrameRgba| Vec::<FaceRegion>::new(),
        &ScanOpts::default(),
        &mut crate::progress::NoProgress,
        &CancelToken::new(),
    )
    .unwrap_err();
    assert!(matches!(err, VeilcutError::Decode(_)), "{err}");
}

#[test]
fn frames_without_faces_are_still_recorded() {
    let frame = FrameRgba::new(32, 18).unwrap();
    let empty = detection_frame(&frame, Vec::new(), Some(0.4));
    assert!(empty.regions.is_empty());
    assert_eq!((empty.frame_width, empty.frame_height), (32, 18));
    assert_eq!(empty.min_confidence, Some(0.4));

    let found = detection_frame(
        &frame,
        vec![FaceRegion::new(1.0, 2.0, 8.0, 8.0, 0.9)],
        None,
    );
    assert_eq!(found.regions.len(), 1);
    assert_eq!(found.min_confidence, None);
}
