use super::*;
use ffmpeg_next::format::sample::Type;

fn plane(values: std::ops::Range<u32>) -> Vec<u8> {
    values.flat_map(|v| (v as f32).to_ne_bytes()).collect()
}

#[test]
fn planar_fifo_keeps_one_queue_per_channel() {
    let mut fifo = SampleFifo::new(Sample::F32(Type::Planar), ChannelLayoutMask::STEREO, 2);
    assert!(fifo.is_empty());
    let left = plane(0..300);
    let right = plane(1000..1300);
    fifo.push_planes(&[&left, &right], 300);
    assert_eq!(fifo.len(), 300);

    let out = fifo.pop_frame(256).unwrap();
    assert_eq!(out.samples(), 256);
    assert_eq!(&out.data(0)[..8], &left[..8]);
    assert_eq!(&out.data(1)[..4], &right[..4]);
    assert_eq!(fifo.len(), 44);

    let tail = fifo.pop_frame(256).unwrap();
    assert_eq!(tail.samples(), 44);
    assert_eq!(&tail.data(0)[..4], &left[256 * 4..257 * 4]);
    assert!(fifo.pop_frame(256).is_none());
}

#[test]
fn packed_fifo_interleaves_channels_in_one_queue() {
    let mut fifo = SampleFifo::new(Sample::I16(Type::Packed), ChannelLayoutMask::STEREO, 2);
    let interleaved: Vec<u8> = (0u16..20).flat_map(|v| v.to_ne_bytes()).collect();
    fifo.push_planes(&[&interleaved], 10);
    assert_eq!(fifo.len(), 10);
    let out = fifo.pop_frame(4).unwrap();
    assert_eq!(&out.data(0)[..16], &interleaved[..16]);
    assert_eq!(fifo.len(), 6);
}

#[test]
fn short_input_is_dropped() {
    let mut fifo = SampleFifo::new(Sample::F32(Type::Planar), ChannelLayoutMask::STEREO, 2);
    let left = plane(0..10);
    fifo.push_planes(&[&left], 10);
    assert!(fifo.is_empty());
    fifo.push_planes(&[&left, &left[..8]], 10);
    assert!(fifo.is_empty());
}

#[test]
fn planes_longer_than_needed_are_trimmed() {
    let mut fifo = SampleFifo::new(Sample::F32(Type::Planar), ChannelLayoutMask::MONO, 1);
    let padded = plane(0..64);
    fifo.push_planes(&[&padded], 5);
    assert_eq!(fifo.len(), 5);
    let out = fifo.pop_frame(100).unwrap();
    assert_eq!(out.samples(), 5);
}
