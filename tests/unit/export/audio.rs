use super::*;

#[test]
fn exact_rate_is_kept() {
    assert_eq!(pick_sample_rate(Some(vec![44100, 48000]), 48000), 48000);
}

#[test]
fn nearest_rate_is_chosen() {
    assert_eq!(pick_sample_rate(Some(vec![8000, 16000]), 44100), 16000);
    assert_eq!(pick_sample_rate(Some(vec![96000, 22050, 48000]), 44100), 48000);
}

#[test]
fn unrestricted_encoders_keep_the_source_rate() {
    assert_eq!(pick_sample_rate(None, 44100), 44100);
    assert_eq!(pick_sample_rate(Some(vec![]), 32000), 32000);
    assert_eq!(pick_sample_rate(Some(vec![0, -1]), 22050), 22050);
}

#[test]
fn encoder_layouts_collapse_to_mono_or_stereo() {
    assert_eq!(output_channels(0), 1);
    assert_eq!(output_channels(1), 1);
    assert_eq!(output_channels(2), 2);
    assert_eq!(output_channels(6), 2);
    assert_eq!(output_mask(1), ChannelLayoutMask::MONO);
    assert_eq!(output_mask(2), ChannelLayoutMask::STEREO);
}

#[test]
fn multichannel_input_is_downmixed_not_misread() {
    use ffmpeg::format::sample::Type;

    let mut input = frame::Audio::new(Sample::F32(Type::Planar), 480, ChannelLayoutMask::_5POINT1);
    input.set_rate(48_000);
    for plane in 0..6 {
        input.data_mut(plane).fill(0);
    }
    let source = AudioFormat::of(&input);
    assert_eq!(source.channels, 6);

    let target = AudioFormat {
        format: Sample::F32(Type::Planar),
        channels: 2,
        rate: 48_000,
    };
    let mut resampler = build_resampler(&input, target).unwrap();
    let mut out = frame::Audio::new(target.format, 1024, output_mask(target.channels));
    resampler.run(&input, &mut out).unwrap();
    assert_eq!(out.ch_layout().channels(), 2);
}

#[test]
fn fallback_order_prefers_aac() {
    assert_eq!(AUDIO_FALLBACKS[0], codec::Id::AAC);
    assert!(!AUDIO_FALLBACKS.contains(&codec::Id::None));
}
