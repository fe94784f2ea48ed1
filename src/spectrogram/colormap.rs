//! Magma color map.
//!
//! Nine evenly spaced anchors of the perceptually uniform "magma" map,
//! linearly interpolated. Dark purple-black for quiet cells, pale yellow for
//! the loudest.

const MAGMA: [[f32; 3]; 9] = [
    [0.0, 0.0, 4.0],
    [28.0, 16.0, 68.0],
    [79.0, 18.0, 123.0],
    [129.0, 37.0, 129.0],
    [181.0, 54.0, 122.0],
    [229.0, 80.0, 100.0],
    [251.0, 135.0, 97.0],
    [254.0, 194.0, 135.0],
    [252.0, 253.0, 191.0],
];

/// Map `t` in `[0, 1]` to an RGB color. Values outside the range are clamped.
pub fn magma(t: f32) -> [u8; 3] {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let pos = t * (MAGMA.len() - 1) as f32;
    let lo = (pos.floor() as usize).min(MAGMA.len() - 2);
    let frac = pos - lo as f32;

    let a = MAGMA[lo];
    let b = MAGMA[lo + 1];
    [
        (a[0] + (b[0] - a[0]) * frac).round() as u8,
        (a[1] + (b[1] - a[1]) * frac).round() as u8,
        (a[2] + (b[2] - a[2]) * frac).round() as u8,
    ]
}
