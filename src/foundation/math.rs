/// `t^2 (3 - 2t)` on a clamped `t`.
pub(crate) fn smoothstep01(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Blend `top` over `base` with 8-bit weight `a`, rounding to nearest.
pub(crate) fn lerp_u8(base: u8, top: u8, a: u8) -> u8 {
    let a = u32::from(a);
    ((u32::from(top) * a + u32::from(base) * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
