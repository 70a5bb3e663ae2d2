use super::*;

fn rgba_frame(width: u32, height: u32, value: u8) -> frame::Video {
    let mut f = frame::Video::new(Pixel::RGBA, width, height);
    f.data_mut(0).fill(value);
    f
}

#[test]
fn fixed_size_output_ignores_source_size_changes() {
    let mut conv = FrameConverter::with_size(Pixel::YUV420P, 64, 48);
    for (w, h) in [(64, 48), (32, 16), (96, 72)] {
        let out = conv.convert(&rgba_frame(w, h, 90)).unwrap();
        assert_eq!(out.format(), Pixel::YUV420P);
        assert_eq!((out.width(), out.height()), (64, 48), "source {w}x{h}");
    }
}

#[test]
fn default_output_follows_the_source() {
    let mut conv = FrameConverter::new(Pixel::RGBA);
    let out = conv.convert(&rgba_frame(20, 10, 7)).unwrap();
    assert_eq!((out.width(), out.height()), (20, 10));
    let out = conv.convert(&rgba_frame(8, 6, 7)).unwrap();
    assert_eq!((out.width(), out.height()), (8, 6));
}

#[test]
fn working_frame_round_trips_through_libav_frame() {
    let mut src = FrameRgba::with_stride(5, 3, 32).unwrap();
    for y in 0..3 {
        for (i, b) in src.row_mut(y).iter_mut().enumerate() {
            *b = (y as usize * 20 + i) as u8;
        }
    }
    let mut video = frame::Video::empty();
    fill_video_from_rgba(&src, &mut video).unwrap();
    assert_eq!((video.width(), video.height()), (5, 3));

    let mut back = FrameRgba::default();
    FrameConverter::new(Pixel::RGBA)
        .convert_into_rgba(&video, &mut back)
        .unwrap();
    assert_eq!(back.to_packed(), src.to_packed());
}

#[test]
fn empty_frames_are_rejected() {
    let mut conv = FrameConverter::new(Pixel::RGBA);
    assert!(matches!(
        conv.convert(&frame::Video::empty()),
        Err(VeilcutError::Decode(_))
    ));
}
