use super::*;

#[test]
fn smoothstep_endpoints_and_midpoint() {
    assert_eq!(smoothstep01(0.0), 0.0);
    assert_eq!(smoothstep01(1.0), 1.0);
    assert!((smoothstep01(0.5) - 0.5).abs() < 1e-6);
    assert_eq!(smoothstep01(-3.0), 0.0);
    assert_eq!(smoothstep01(7.0), 1.0);
}

#[test]
fn smoothstep_is_monotonic() {
    let mut prev = 0.0;
    for i in 0..=100 {
        let v = smoothstep01(i as f32 / 100.0);
        assert!(v >= prev);
        prev = v;
    }
}

#[test]
fn lerp_u8_endpoints_are_exact() {
    for base in [0u8, 10, 128, 255] {
        for top in [0u8, 77, 200, 255] {
            assert_eq!(lerp_u8(base, top, 0), base);
            assert_eq!(lerp_u8(base, top, 255), top);
        }
    }
}

#[test]
fn lerp_u8_rounds_to_nearest() {
    assert_eq!(lerp_u8(0, 255, 128), 128);
    assert_eq!(lerp_u8(100, 100, 37), 100);
    assert_eq!(lerp_u8(0, 100, 51), 20);
}
