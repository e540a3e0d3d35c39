//! Integer range mapping shared by the calibration mapper, waveform scaling
//! and sequence interpolation.
//!
//! The naive `(value - src_lo) * (dst_hi - dst_lo) / (src_hi - src_lo)` form
//! overflows 32-bit arithmetic for the µA/µV magnitudes this instrument works
//! with, so mapping is done in two stages: normalize the offset into a fixed
//! 14-bit fractional domain (0..=16384), then rescale into the destination
//! range. The quantization this introduces is one part in 16384 of the
//! destination span.

/// Fractional domain used by [`map_range`], 16384 == 1.0.
pub const MAP_ONE: i64 = 1 << 14;

/// Linearly map `value` from `[src_lo, src_hi]` onto `[dst_lo, dst_hi]`.
///
/// Values outside the source range extrapolate; the destination range may be
/// inverted (`dst_hi < dst_lo`). Both endpoints map exactly. A degenerate
/// source range returns `dst_lo`.
pub fn map_range(value: i32, src_lo: i32, src_hi: i32, dst_lo: i32, dst_hi: i32) -> i32 {
    let src_span = src_hi as i64 - src_lo as i64;
    if src_span == 0 {
        return dst_lo;
    }
    let norm = div_round((value as i64 - src_lo as i64) * MAP_ONE, src_span);
    let dst_span = dst_hi as i64 - dst_lo as i64;
    let out = dst_lo as i64 + div_round(norm * dst_span, MAP_ONE);
    out.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Division rounding half away from zero. Plain truncation costs an extra
/// count of round-trip error, which the calibration tolerance cannot spare.
fn div_round(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if 2 * r.abs() >= b.abs() {
        if (a < 0) == (b < 0) { q + 1 } else { q - 1 }
    } else {
        q
    }
}
