use super::*;

fn info(fps: (u32, u32), tb: (i32, i32), start_pts: i64) -> VideoInfo {
    VideoInfo {
        width: 64,
        height: 48,
        fps: Fps::new(fps.0, fps.1).unwrap(),
        time_base: TimeBase {
            num: tb.0,
            den: tb.1,
        },
        start_pts,
        frame_count: 0,
        duration_secs: 0.0,
        codec: "h264".to_string(),
        has_audio: false,
    }
}

#[test]
fn info_maps_indices_through_start_pts() {
    let i = info((25, 1), (1, 12800), 1024);
    assert_eq!(i.pts_for(FrameIndex(0)), 1024);
    assert_eq!(i.pts_for(FrameIndex(2)), 1024 + 1024);
    assert_eq!(i.frame_for(1024 + 1024), FrameIndex(2));
    assert_eq!(i.frame_for(0), FrameIndex(0));
}

#[test]
fn in_order_indices_never_repeat_on_jittery_timestamps() {
    let i = info((25, 1), (1, 1000), 0);
    let mut last = None;
    let mut seen = Vec::new();
    for pts in [Some(0), Some(40), Some(59), Some(80), None, Some(200)] {
        let index = i.next_index(pts, last, FrameIndex(0));
        last = Some(index);
        seen.push(index.0);
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn in_order_indices_start_from_the_first_timestamp() {
    let i = info((30, 1), (1, 15360), 0);
    assert_eq!(i.next_index(Some(i.pts_for(FrameIndex(7))), None, FrameIndex(3)), FrameIndex(7));
    assert_eq!(i.next_index(None, None, FrameIndex(3)), FrameIndex(3));
    assert_eq!(
        i.next_index(Some(i.pts_for(FrameIndex(9))), Some(FrameIndex(4)), FrameIndex(3)),
        FrameIndex(9)
    );
}

#[test]
fn decode_opts_default_to_auto_hardware() {
    assert_eq!(DecodeOpts::default().hw_accel, HwAccel::Auto);
    let off: DecodeOpts = serde_json::from_str(r#"{"hw_accel": "off"}"#).unwrap();
    assert_eq!(off.hw_accel, HwAccel::Off);
    assert!(serde_json::from_str::<DecodeOpts>(r#"{"hw_accel": "cuda"}"#).is_err());
}

#[test]
fn opening_a_missing_file_is_a_decode_error() {
    let err = DecodeSession::open("/definitely/not/here.mkv", &DecodeOpts::default())
        .err()
        .unwrap();
    assert!(matches!(err, VeilcutError::Decode(_)), "{err}");
}

#[test]
fn cache_does_not_keep_failed_opens() {
    let mut cache = SessionCache::new(DecodeOpts::default());
    assert!(cache.get_or_open("/definitely/not/here.mkv").is_err());
    assert!(cache.is_empty());
    assert!(!cache.dispose("/definitely/not/here.mkv"));
}
