use super::*;

#[test]
fn candidates_start_with_the_requested_codec() {
    assert_eq!(
        video_candidates(codec::Id::VP9, Some(codec::Id::H264)),
        vec![codec::Id::VP9, codec::Id::H264, codec::Id::MPEG4]
    );
}

#[test]
fn candidates_are_deduplicated() {
    assert_eq!(
        video_candidates(codec::Id::H264, Some(codec::Id::H264)),
        vec![codec::Id::H264, codec::Id::MPEG4]
    );
    assert_eq!(
        video_candidates(codec::Id::MPEG4, None),
        vec![codec::Id::MPEG4, codec::Id::H264]
    );
}

#[test]
fn none_is_never_a_candidate() {
    assert_eq!(
        video_candidates(codec::Id::None, Some(codec::Id::None)),
        VIDEO_FALLBACKS.to_vec()
    );
}

#[test]
fn yuv420p_is_preferred() {
    assert_eq!(
        pick_pixel_format(Some(vec![Pixel::RGB24, Pixel::YUV420P])),
        Pixel::YUV420P
    );
    assert_eq!(pick_pixel_format(Some(vec![Pixel::NV12, Pixel::P010LE])), Pixel::NV12);
    assert_eq!(pick_pixel_format(Some(vec![])), Pixel::YUV420P);
    assert_eq!(pick_pixel_format(None), Pixel::YUV420P);
}

#[test]
fn resized_frames_are_scaled_to_the_encoder_size() {
    crate::decode::init_ffmpeg().unwrap();
    let dir = std::env::temp_dir().join(format!(
        "veilcut_encode_resize_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("resized.mkv");

    let mut octx = format::output(&path).unwrap();
    let mut notices = Vec::new();
    let mut enc = VideoEncoder::negotiate(
        &mut octx,
        codec::Id::MPEG4,
        64,
        48,
        Fps::new(25, 1).unwrap(),
        &mut notices,
    )
    .unwrap();
    octx.write_header().unwrap();
    enc.sync_stream_time_base(&octx);

    for (i, (w, h)) in [(64, 48), (32, 24), (80, 60)].into_iter().enumerate() {
        let frame = FrameRgba::new(w, h).unwrap();
        enc.encode(&mut octx, &frame, Some(i as i64)).unwrap();
    }
    enc.finish(&mut octx).unwrap();
    octx.write_trailer().unwrap();
    assert_eq!(enc.frames(), 3);
    assert_eq!(enc.codec_id(), codec::Id::MPEG4);

    std::fs::remove_dir_all(&dir).ok();
}
