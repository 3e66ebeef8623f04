//! Deterministic hashing and value noise for procedural textures.

/// Fast 3-value hash with xorshift
#[inline(always)]
pub fn hash3(a: u64, b: u64, c: u64) -> u64 {
    let mut seed = a
        .wrapping_mul(2654435761)
        .wrapping_add(b.wrapping_mul(2246822519))
        .wrapping_add(c);
    seed ^= seed << 13;
    seed ^= seed >> 7;
    seed ^= seed << 17;
    seed
}

/// Map a hash to [0, 1) using splitmix64 finalisation.
#[inline(always)]
pub fn unit_float(seed: u64) -> f64 {
    let mut x = seed.wrapping_mul(0x9e3779b97f4a7c15);
    x ^= x >> 30;
    x = x.wrapping_mul(0xbf58476d1ce4e5b9);
    x ^= x >> 27;
    x = x.wrapping_mul(0x94d049bb133111eb);
    x ^= x >> 31;
    (x >> 11) as f64 / 9007199254740992.0
}

#[inline(always)]
fn lattice(x: i64, y: i64, period: i64, seed: u64) -> f64 {
    let x = x.rem_euclid(period.max(1));
    unit_float(hash3(x as u64, y as u64, seed))
}

#[inline(always)]
fn smooth(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

/// Smoothly interpolated lattice noise in [0, 1), repeating every `period`
/// units along x.
pub fn value_noise(x: f64, y: f64, period: i64, seed: u64) -> f64 {
    let (x0, y0) = (x.floor(), y.floor());
    let (tx, ty) = (smooth(x - x0), smooth(y - y0));
    let (ix, iy) = (x0 as i64, y0 as i64);

    let top = lattice(ix, iy, period, seed) * (1.0 - tx) + lattice(ix + 1, iy, period, seed) * tx;
    let bottom =
        lattice(ix, iy + 1, period, seed) * (1.0 - tx) + lattice(ix + 1, iy + 1, period, seed) * tx;
    top * (1.0 - ty) + bottom * ty
}

/// Sum of `octaves` noise layers, each at twice the frequency and half the
/// amplitude of the previous one. Normalised to [0, 1).
pub fn fractal_noise(u: f64, v: f64, base_period: i64, octaves: u32, seed: u64) -> f64 {
    let mut sum = 0.0;
    let mut amplitude = 1.0;
    let mut total = 0.0;
    let mut period = base_period;
    for octave in 0..octaves {
        sum += value_noise(u * period as f64, v * period as f64, period, seed + octave as u64)
            * amplitude;
        total += amplitude;
        amplitude *= 0.5;
        period *= 2;
    }
    sum / total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        assert_eq!(hash3(1, 2, 3), hash3(1, 2, 3));
        assert_ne!(hash3(1, 2, 3), hash3(3, 2, 1));
    }

    #[test]
    fn test_unit_float_range() {
        for seed in 0..1000 {
            let v = unit_float(seed);
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_noise_wraps_horizontally() {
        let a = fractal_noise(0.0, 0.3, 4, 3, 7);
        let b = fractal_noise(1.0, 0.3, 4, 3, 7);
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_noise_is_continuous() {
        let a = value_noise(2.5, 3.5, 16, 1);
        let b = value_noise(2.5001, 3.5, 16, 1);
        assert!((a - b).abs() < 1e-3);
    }
}
