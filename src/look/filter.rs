//! Spatial filters on lightness planes: the film-like detail blur, box
//! downscaling, local variance and bilinear upsampling.
//!
//! All filters are mask-aware: transparent pixels contribute nothing and
//! edges are clamped.

/// Binomial 5-tap kernel, normalized.
const KERNEL_5: [f32; 5] = [1.0 / 16.0, 4.0 / 16.0, 6.0 / 16.0, 4.0 / 16.0, 1.0 / 16.0];

/// Shortest edge the halation working grid may be downscaled to.
pub const MIN_DOWNSCALED_EDGE: usize = 64;
pub const MAX_DOWNSCALE_FACTOR: usize = 4;

fn convolve_rows(src: &[f32], width: usize, height: usize, stride: usize) -> Vec<f32> {
    let mut out = vec![0.0; src.len()];
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in KERNEL_5.iter().enumerate() {
                let offset = (k as isize - 2) * stride as isize;
                let sx = (x as isize + offset).clamp(0, width as isize - 1) as usize;
                acc += w * src[row + sx];
            }
            out[row + x] = acc;
        }
    }
    out
}

fn convolve_cols(src: &[f32], width: usize, height: usize, stride: usize) -> Vec<f32> {
    let mut out = vec![0.0; src.len()];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in KERNEL_5.iter().enumerate() {
                let offset = (k as isize - 2) * stride as isize;
                let sy = (y as isize + offset).clamp(0, height as isize - 1) as usize;
                acc += w * src[sy * width + x];
            }
            out[y * width + x] = acc;
        }
    }
    out
}

/// One separable 5-tap pass with taps spaced `stride` pixels apart,
/// normalized by the blurred mask.
fn masked_pass(values: &[f32], mask: &[f32], width: usize, height: usize, stride: usize) -> Vec<f32> {
    let weighted: Vec<f32> = values.iter().zip(mask).map(|(v, m)| v * m).collect();
    let num = convolve_cols(&convolve_rows(&weighted, width, height, stride), width, height, stride);
    let den = convolve_cols(&convolve_rows(mask, width, height, stride), width, height, stride);

    num.iter()
        .zip(&den)
        .zip(values)
        .map(|((&n, &d), &v)| if d > 1e-6 { n / d } else { v })
        .collect()
}

/// Heavier "film-like" blur: two 5-tap separable passes, the second with
/// its taps twice as far apart.
pub fn film_blur(values: &[f32], mask: &[f32], width: usize, height: usize) -> Vec<f32> {
    let first = masked_pass(values, mask, width, height, 1);
    masked_pass(&first, mask, width, height, 2)
}

/// RMS of `values - blurred` over opaque pixels whose value lies in
/// `[lo, hi]`. `None` when no pixel qualifies.
pub fn detail_rms(values: &[f32], blurred: &[f32], mask: &[f32], lo: f32, hi: f32) -> Option<f32> {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for ((&v, &bl), &m) in values.iter().zip(blurred).zip(mask) {
        if m <= 0.0 || v < lo || v > hi {
            continue;
        }
        let d = f64::from(v - bl);
        sum += d * d;
        count += 1;
    }
    (count > 0).then(|| (sum / count as f64).sqrt() as f32)
}

/// Mid-tone micro-contrast of a lightness plane.
pub fn midtone_micro_contrast(l: &[f32], mask: &[f32], width: usize, height: usize) -> Option<f32> {
    let blurred = film_blur(l, mask, width, height);
    detail_rms(l, &blurred, mask, 0.25, 0.75)
}

/// Largest integer factor up to 4 that keeps both downscaled edges at or
/// above 64 pixels; 1 for small images.
pub fn downscale_factor(width: usize, height: usize) -> usize {
    (1..=MAX_DOWNSCALE_FACTOR)
        .rev()
        .find(|&f| width / f >= MIN_DOWNSCALED_EDGE && height / f >= MIN_DOWNSCALED_EDGE)
        .unwrap_or(1)
}

/// A downscaled plane with its per-cell opaque fraction.
#[derive(Debug, Clone)]
pub struct Downscaled {
    pub width: usize,
    pub height: usize,
    pub values: Vec<f32>,
    pub mask: Vec<f32>,
}

/// Box-averages `values` over `factor`×`factor` cells, counting opaque
/// pixels only.
pub fn box_downscale(values: &[f32], mask: &[f32], width: usize, height: usize, factor: usize) -> Downscaled {
    let factor = factor.max(1);
    let dw = width.div_ceil(factor);
    let dh = height.div_ceil(factor);
    let mut out_values = vec![0.0; dw * dh];
    let mut out_mask = vec![0.0; dw * dh];

    for dy in 0..dh {
        for dx in 0..dw {
            let (mut sum, mut opaque, mut total) = (0.0f32, 0.0f32, 0.0f32);
            for y in dy * factor..((dy + 1) * factor).min(height) {
                for x in dx * factor..((dx + 1) * factor).min(width) {
                    let i = y * width + x;
                    sum += values[i] * mask[i];
                    opaque += mask[i];
                    total += 1.0;
                }
            }
            let di = dy * dw + dx;
            if opaque > 0.0 {
                out_values[di] = sum / opaque;
                out_mask[di] = opaque / total;
            }
        }
    }

    Downscaled {
        width: dw,
        height: dh,
        values: out_values,
        mask: out_mask,
    }
}

/// Variance over each cell's 3×3 neighbourhood, opaque cells only.
pub fn local_variance_3x3(values: &[f32], mask: &[f32], width: usize, height: usize) -> Vec<f32> {
    let mut out = vec![0.0; values.len()];
    for y in 0..height {
        for x in 0..width {
            let (mut sum, mut sum_sq, mut n) = (0.0f32, 0.0f32, 0.0f32);
            for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    let i = ny * width + nx;
                    if mask[i] <= 0.0 {
                        continue;
                    }
                    sum += values[i];
                    sum_sq += values[i] * values[i];
                    n += 1.0;
                }
            }
            if n > 0.0 {
                let mean = sum / n;
                out[y * width + x] = (sum_sq / n - mean * mean).max(0.0);
            }
        }
    }
    out
}

/// Samples a plane with bilinear interpolation.
fn sample_bilinear(plane: &[f32], width: usize, height: usize, x: f32, y: f32) -> f32 {
    let x = x.clamp(0.0, (width - 1) as f32);
    let y = y.clamp(0.0, (height - 1) as f32);
    let x0 = (x.floor() as usize).min(width - 1);
    let y0 = (y.floor() as usize).min(height - 1);
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let v00 = plane[y0 * width + x0];
    let v10 = plane[y0 * width + x1];
    let v01 = plane[y1 * width + x0];
    let v11 = plane[y1 * width + x1];

    let v0 = v00 * (1.0 - fx) + v10 * fx;
    let v1 = v01 * (1.0 - fx) + v11 * fx;

    v0 * (1.0 - fy) + v1 * fy
}

/// Upsamples a plane downscaled by `factor` back to `width`×`height`,
/// sampling at pixel centers.
pub fn bilinear_upsample(src: &Downscaled, plane: &[f32], width: usize, height: usize, factor: usize) -> Vec<f32> {
    let scale = factor.max(1) as f32;
    let mut out = vec![0.0; width * height];
    for y in 0..height {
        let sy = (y as f32 + 0.5) / scale - 0.5;
        for x in 0..width {
            let sx = (x as f32 + 0.5) / scale - 0.5;
            out[y * width + x] = sample_bilinear(plane, src.width, src.height, sx, sy);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn checker(width: usize, height: usize) -> Vec<f32> {
        (0..width * height)
            .map(|i| if (i % width + i / width) % 2 == 0 { 0.4 } else { 0.6 })
            .collect()
    }

    #[test]
    fn test_blur_preserves_flat_plane() {
        let values = vec![0.42; 12 * 9];
        let mask = vec![1.0; 12 * 9];
        let blurred = film_blur(&values, &mask, 12, 9);
        for v in blurred {
            assert_abs_diff_eq!(v, 0.42, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_blur_ignores_transparent_pixels() {
        let mut values = vec![0.5; 16];
        let mut mask = vec![1.0; 16];
        values[5] = 0.0;
        mask[5] = 0.0;
        let blurred = film_blur(&values, &mask, 4, 4);
        assert_abs_diff_eq!(blurred[6], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_detail_rms_of_checker() {
        let values = checker(16, 16);
        let mask = vec![1.0; 256];
        let rms = midtone_micro_contrast(&values, &mask, 16, 16).unwrap();
        assert!(rms > 0.05 && rms < 0.11, "rms {rms}");
    }

    #[test]
    fn test_detail_rms_none_outside_midtones() {
        let values = vec![0.95; 16];
        let mask = vec![1.0; 16];
        assert!(midtone_micro_contrast(&values, &mask, 4, 4).is_none());
    }

    #[test]
    fn test_downscale_factor_bounds() {
        assert_eq!(downscale_factor(32, 32), 1);
        assert_eq!(downscale_factor(128, 128), 2);
        assert_eq!(downscale_factor(4000, 3000), 4);
        assert_eq!(downscale_factor(1000, 100), 1);
    }

    #[test]
    fn test_box_downscale_averages_opaque_only() {
        let values = vec![0.2, 0.4, 0.9, 0.9];
        let mask = vec![1.0, 1.0, 0.0, 0.0];
        let ds = box_downscale(&values, &mask, 2, 2, 2);
        assert_eq!((ds.width, ds.height), (1, 1));
        assert_abs_diff_eq!(ds.values[0], 0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(ds.mask[0], 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_local_variance() {
        let flat = local_variance_3x3(&[0.5; 9], &[1.0; 9], 3, 3);
        assert!(flat.iter().all(|&v| v < 1e-9));
        let spiky = local_variance_3x3(&[0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0], &[1.0; 9], 3, 3);
        assert!(spiky[4] > 0.09);
    }

    #[test]
    fn test_bilinear_upsample_constant() {
        let ds = Downscaled {
            width: 2,
            height: 2,
            values: vec![0.7; 4],
            mask: vec![1.0; 4],
        };
        let up = bilinear_upsample(&ds, &ds.values, 4, 4, 2);
        assert_eq!(up.len(), 16);
        for v in up {
            assert_abs_diff_eq!(v, 0.7, epsilon = 1e-6);
        }
    }
}
