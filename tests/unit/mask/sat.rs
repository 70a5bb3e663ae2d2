use super::*;

fn gradient(w: u32, h: u32, stride: usize) -> FrameRgba {
    let mut f = FrameRgba::with_stride(w, h, stride).unwrap();
    f.data.fill(0xFF);
    for y in 0..h {
        let row = f.row_mut(y);
        for x in 0..w as usize {
            row[x * 4] = (x as u32 + y * 10) as u8;
            row[x * 4 + 1] = (y * 3) as u8;
            row[x * 4 + 2] = 200;
            row[x * 4 + 3] = 255;
        }
    }
    f
}

fn naive(f: &FrameRgba, x0: u32, y0: u32, x1: u32, y1: u32) -> [u64; 3] {
    let mut out = [0u64; 3];
    for y in y0..y1 {
        for x in x0..x1 {
            let p = f.pixel(x, y);
            for c in 0..3 {
                out[c] += u64::from(p[c]);
            }
        }
    }
    out
}

#[test]
fn window_sums_match_naive_over_full_frame() {
    let f = gradient(6, 5, 24);
    let mut sat = SummedAreaTable::new();
    let full = PixelRect {
        x0: 0,
        y0: 0,
        x1: 6,
        y1: 5,
    };
    sat.build(&f, full).unwrap();
    for (x0, y0, x1, y1) in [(0, 0, 6, 5), (1, 1, 3, 4), (5, 4, 6, 5), (2, 0, 2, 5)] {
        assert_eq!(sat.window_sum(x0, y0, x1, y1), naive(&f, x0, y0, x1, y1));
    }
}

#[test]
fn sub_rect_table_uses_absolute_coordinates() {
    let f = gradient(8, 8, 32);
    let mut sat = SummedAreaTable::new();
    sat.build(
        &f,
        PixelRect {
            x0: 2,
            y0: 3,
            x1: 7,
            y1: 8,
        },
    )
    .unwrap();
    assert_eq!(sat.window_sum(3, 4, 6, 7), naive(&f, 3, 4, 6, 7));
    assert_eq!(sat.window_sum(2, 3, 7, 8), naive(&f, 2, 3, 7, 8));
}

#[test]
fn row_padding_is_not_summed() {
    let f = gradient(3, 3, 20);
    let mut sat = SummedAreaTable::new();
    let full = PixelRect {
        x0: 0,
        y0: 0,
        x1: 3,
        y1: 3,
    };
    sat.build(&f, full).unwrap();
    assert_eq!(sat.window_sum(0, 0, 3, 3), naive(&f, 0, 0, 3, 3));
}

#[test]
fn rebuild_reuses_the_table() {
    let mut sat = SummedAreaTable::new();
    let big = gradient(16, 16, 64);
    sat.build(
        &big,
        PixelRect {
            x0: 0,
            y0: 0,
            x1: 16,
            y1: 16,
        },
    )
    .unwrap();
    let small = gradient(4, 4, 16);
    sat.build(
        &small,
        PixelRect {
            x0: 0,
            y0: 0,
            x1: 4,
            y1: 4,
        },
    )
    .unwrap();
    assert_eq!(sat.window_sum(0, 0, 4, 4), naive(&small, 0, 0, 4, 4));
}

#[test]
fn window_sums_beyond_32_bits_stay_exact() {
    // Corner entries as an 8K full-white table would hold them, without allocating one.
    let big = 7680u64 * 4320 * 255;
    let sat = SummedAreaTable {
        rect: Some(PixelRect {
            x0: 0,
            y0: 0,
            x1: 2,
            y1: 1,
        }),
        cols: 3,
        sums: vec![
            [0; 3],
            [0; 3],
            [0; 3],
            [0; 3],
            [big - 300; 3],
            [big; 3],
        ],
    };
    assert!(big > u64::from(u32::MAX));
    assert_eq!(sat.window_sum(0, 0, 2, 1), [big; 3]);
    assert_eq!(sat.window_sum(1, 0, 2, 1), [300; 3]);
}
