use super::*;
use crate::mask::region::{FaceRegion, RegionFrame};
use crate::mask::source::AlphaMask;

fn checkerboard(w: u32, h: u32, stride: usize) -> FrameRgba {
    let mut f = FrameRgba::with_stride(w, h, stride).unwrap();
    f.data.fill(0xAB);
    for y in 0..h {
        let row = f.row_mut(y);
        for x in 0..w as usize {
            let on = (x + y as usize) % 2 == 0;
            row[x * 4] = if on { 255 } else { 0 };
            row[x * 4 + 1] = (x * 16) as u8;
            row[x * 4 + 2] = if on { 30 } else { 220 };
            row[x * 4 + 3] = 255;
        }
    }
    f
}

/// Clamped-window box blur computed pixel by pixel.
fn naive_box_blur(src: &FrameRgba, r: u32) -> Vec<u8> {
    let (w, h) = (src.width, src.height);
    let mut out = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            let (x0, x1) = (x.saturating_sub(r), (x + r + 1).min(w));
            let (y0, y1) = (y.saturating_sub(r), (y + r + 1).min(h));
            let count = (x1 - x0) * (y1 - y0);
            let mut sums = [0u32; 3];
            for yy in y0..y1 {
                for xx in x0..x1 {
                    let p = src.pixel(xx, yy);
                    for c in 0..3 {
                        sums[c] += u32::from(p[c]);
                    }
                }
            }
            for s in sums {
                out.push(((s + count / 2) / count) as u8);
            }
            out.push(255);
        }
    }
    out
}

fn compositor() -> MaskCompositor {
    MaskCompositor::new(BlurTuning::default()).unwrap()
}

#[test]
fn zero_mask_leaves_frame_untouched() {
    let mut frame = checkerboard(16, 16, 72);
    let before = frame.clone();
    let mask = AlphaMask::filled(16, 16, 0);
    let changed = compositor()
        .apply_masked_blur(&mut frame, FrameMask::Dense(&mask), 4)
        .unwrap();
    assert!(!changed);
    assert_eq!(frame, before);
}

#[test]
fn no_mask_and_zero_radius_leave_frame_untouched() {
    let mut c = compositor();
    let mut frame = checkerboard(8, 8, 32);
    let before = frame.clone();
    assert!(!c.apply_masked_blur(&mut frame, FrameMask::None, 4).unwrap());
    let full = AlphaMask::filled(8, 8, 255);
    assert!(!c.apply_masked_blur(&mut frame, FrameMask::Dense(&full), 0).unwrap());
    assert_eq!(frame, before);
}

#[test]
fn full_mask_equals_clamped_box_blur() {
    let mut frame = checkerboard(16, 16, 64);
    let expected = naive_box_blur(&frame, 2);
    let mask = AlphaMask::filled(16, 16, 255);
    assert!(
        compositor()
            .apply_masked_blur(&mut frame, FrameMask::Dense(&mask), 2)
            .unwrap()
    );
    assert_eq!(frame.to_packed(), expected);
}

#[test]
fn padded_stride_matches_packed_and_keeps_padding() {
    let mut mask = AlphaMask::filled(16, 16, 0);
    for y in 4..12 {
        for x in 4..12 {
            mask.data[y * 16 + x] = 255;
        }
    }

    let mut packed = checkerboard(16, 16, 64);
    compositor()
        .apply_masked_blur(&mut packed, FrameMask::Dense(&mask), 3)
        .unwrap();

    let mut padded = checkerboard(16, 16, 64 + 12);
    compositor()
        .apply_masked_blur(&mut padded, FrameMask::Dense(&mask), 3)
        .unwrap();

    assert_eq!(padded.to_packed(), packed.to_packed());
    for y in 0..16usize {
        let pad = &padded.data[y * 76 + 64..y * 76 + 76];
        assert!(pad.iter().all(|b| *b == 0xAB));
    }
}

#[test]
fn pixels_outside_the_mask_are_unchanged() {
    let mut frame = checkerboard(16, 16, 64);
    for y in 4..8 {
        for x in 4..8 {
            frame.row_mut(y)[x * 4 + 3] = 10;
        }
    }
    let before = frame.clone();
    let mut mask = AlphaMask::filled(16, 16, 0);
    for y in 4..8 {
        for x in 4..8 {
            mask.data[y * 16 + x] = 255;
        }
    }
    compositor()
        .apply_masked_blur(&mut frame, FrameMask::Dense(&mask), 2)
        .unwrap();

    for y in 0..16 {
        for x in 0..16 {
            let inside = (4..8).contains(&x) && (4..8).contains(&y);
            if inside {
                assert_eq!(frame.pixel(x, y)[3], 255);
            } else {
                assert_eq!(frame.pixel(x, y), before.pixel(x, y), "({x},{y})");
            }
        }
    }
}

#[test]
fn mismatched_dense_mask_is_ignored() {
    let mut frame = checkerboard(16, 16, 64);
    let before = frame.clone();
    let mask = AlphaMask::filled(8, 8, 255);
    let changed = compositor()
        .apply_masked_blur(&mut frame, FrameMask::Dense(&mask), 4)
        .unwrap();
    assert!(!changed);
    assert_eq!(frame, before);
}

#[test]
fn dropped_mask_frame_is_still_blurred() {
    let mut c = compositor();
    let full = AlphaMask::filled(16, 16, 255);
    let empty = AlphaMask::filled(16, 16, 0);
    let original = checkerboard(16, 16, 64);

    let mut f0 = original.clone();
    assert!(c.apply_masked_blur(&mut f0, FrameMask::Dense(&full), 2).unwrap());

    let mut f1 = original.clone();
    assert!(c.apply_masked_blur(&mut f1, FrameMask::Dense(&empty), 2).unwrap());
    assert!(c.alpha.iter().all(|a| *a >= 191));
    assert_ne!(f1, original);

    let mut f2 = original.clone();
    assert!(c.apply_masked_blur(&mut f2, FrameMask::Dense(&full), 2).unwrap());
    assert_eq!(f2, f0);
}

#[test]
fn scanned_frame_without_faces_keeps_fading_blur() {
    use crate::foundation::core::FrameIndex;
    use crate::mask::source::MaskSource;
    use crate::mask::track::RegionTrack;

    let face = FaceRegion::new(16.0, 16.0, 32.0, 32.0, 0.9);
    let mut track = RegionTrack::new();
    track.insert(FrameIndex(0), RegionFrame::new(64, 64, vec![face]));
    track.insert(FrameIndex(1), RegionFrame::new(64, 64, Vec::new()));
    track.insert(FrameIndex(2), RegionFrame::new(64, 64, vec![face]));

    let mut c = compositor();
    let original = checkerboard(64, 64, 256);
    let mut blurred = Vec::new();
    for i in 0..3 {
        let mut f = original.clone();
        let changed = c
            .apply_masked_blur(&mut f, track.mask_for(FrameIndex(i)), 4)
            .unwrap();
        assert!(changed, "frame {i}");
        if i == 1 {
            assert!(c.alpha[32 * 64 + 32] >= 191);
        }
        blurred.push(f);
    }
    assert_ne!(blurred[1].pixel(32, 32), original.pixel(32, 32));
    assert_eq!(blurred[1].pixel(32, 32)[3], 255);

    // A frame the scan never covered stays unmasked once history has decayed away.
    let mut fresh = compositor();
    let mut f = original.clone();
    assert!(
        !fresh
            .apply_masked_blur(&mut f, track.mask_for(FrameIndex(7)), 4)
            .unwrap()
    );
    assert_eq!(f, original);
}

#[test]
fn reset_forgets_history() {
    let mut c = compositor();
    let full = AlphaMask::filled(8, 8, 255);
    let empty = AlphaMask::filled(8, 8, 0);
    let mut f = checkerboard(8, 8, 32);
    c.apply_masked_blur(&mut f, FrameMask::Dense(&full), 2).unwrap();
    c.reset();
    let mut g = checkerboard(8, 8, 32);
    assert!(!c.apply_masked_blur(&mut g, FrameMask::Dense(&empty), 2).unwrap());
    assert_eq!(g, checkerboard(8, 8, 32));
}

#[test]
fn regions_blur_only_inside_the_ellipse() {
    let mut frame = checkerboard(64, 64, 256);
    let before = frame.clone();
    let regions = RegionFrame::new(64, 64, vec![FaceRegion::new(24.0, 24.0, 16.0, 16.0, 0.9)]);
    assert!(
        compositor()
            .apply_masked_blur(&mut frame, FrameMask::Regions(&regions), 6)
            .unwrap()
    );
    assert_ne!(frame.pixel(32, 32), before.pixel(32, 32));
    assert_eq!(frame.pixel(0, 0), before.pixel(0, 0));
    assert_eq!(frame.pixel(63, 63), before.pixel(63, 63));
    assert_eq!(frame.pixel(32, 5), before.pixel(32, 5));
}

#[test]
fn frame_size_change_restarts_history() {
    let mut c = compositor();
    let mut f = checkerboard(8, 8, 32);
    c.apply_masked_blur(&mut f, FrameMask::Dense(&AlphaMask::filled(8, 8, 255)), 2)
        .unwrap();
    let mut g = checkerboard(12, 6, 48);
    let changed = c
        .apply_masked_blur(&mut g, FrameMask::Dense(&AlphaMask::filled(12, 6, 0)), 2)
        .unwrap();
    assert!(!changed);
}

#[test]
fn invalid_tuning_is_rejected() {
    let mut t = BlurTuning::default();
    t.temporal_decay = -1.0;
    assert!(MaskCompositor::new(t).is_err());
}
